//! Price lookup and refresh policy
//!
//! Combines the Scryfall client with the local price history: single
//! lookups are answered from the cache while it is fresh, and the refresh
//! run turns repeated polls into a history of price changes.

use crate::database::{Observation, PriceStore};
use crate::error::{PriceError, Result};
use crate::price::Usd;
use crate::scryfall::{CardPrinting, ScryfallClient};
use chrono::Utc;
use std::time::Duration;

/// What a refresh did for one card
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// Price moved, a new observation was appended
    Changed { old: Usd, new: Usd },
    /// Price unchanged, second observation appended to show it held
    Confirmed(Usd),
    /// Price unchanged, latest observation moved to now
    Unchanged(Usd),
    /// Card had no history, first observation recorded
    Started(Usd),
}

/// Result of refreshing one card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RefreshReport {
    pub card_name: String,
    pub outcome: RefreshOutcome,
}

/// Pick the cheapest printing that is neither a promo nor unpriced.
///
/// `printings` must be ordered by descending USD price (Scryfall's
/// `order=usd&dir=desc`), so the cheapest valid printing is the last one left
/// after filtering.
pub fn select_cheapest_valid(printings: &[CardPrinting]) -> Option<&CardPrinting> {
    printings
        .iter()
        .rev()
        .find(|p| !p.is_promo() && p.usd_price().is_some())
}

/// Card price lookups backed by Scryfall and a local price history
pub struct PriceService {
    client: ScryfallClient,
    store: PriceStore,
}

impl PriceService {
    pub fn new(client: ScryfallClient, store: PriceStore) -> Self {
        Self { client, store }
    }

    pub fn store(&self) -> &PriceStore {
        &self.store
    }

    /// Current USD price of `card_name`.
    ///
    /// With `use_cache`, a fresh cached price is returned without touching the
    /// network, and a fetched price is recorded. Without it the store is
    /// neither read nor written. `timeout` bounds each request.
    pub fn get_price(
        &mut self,
        card_name: &str,
        timeout: Duration,
        use_cache: bool,
    ) -> Result<Usd> {
        if use_cache {
            if let Some(price) = self.store.check_cache(card_name)? {
                log::debug!("Cache hit for \"{}\": {}", card_name, price);
                return Ok(price);
            }
        }

        let price = self.find_cheapest_valid_printing(card_name, timeout)?;

        if use_cache {
            self.store.record(card_name, price)?;
        }
        Ok(price)
    }

    /// Price of the cheapest English, non-promo printing with a USD price
    pub fn find_cheapest_valid_printing(&self, card_name: &str, timeout: Duration) -> Result<Usd> {
        let printings = self.printings(card_name, timeout)?;

        let cheapest = select_cheapest_valid(&printings)
            .ok_or_else(|| PriceError::NoValidPrinting(card_name.to_string()))?;
        let price = cheapest
            .usd_price()
            .ok_or_else(|| PriceError::NoValidPrinting(card_name.to_string()))?;

        log::debug!(
            "Cheapest valid printing of \"{}\": {} ({}) at {}",
            card_name,
            cheapest.set_name,
            cheapest.set,
            price
        );
        Ok(price)
    }

    /// Every English printing of `card_name`, most expensive first
    pub fn printings(&self, card_name: &str, timeout: Duration) -> Result<Vec<CardPrinting>> {
        match self.client.search_printings(card_name, timeout)? {
            Some(printings) if !printings.is_empty() => Ok(printings),
            _ => Err(PriceError::NoMatch(card_name.to_string())),
        }
    }

    /// Full Scryfall data for the card with exactly this name
    pub fn card(&self, card_name: &str, timeout: Duration) -> Result<CardPrinting> {
        self.client.fetch_named_card(card_name, timeout)
    }

    /// Refresh stored prices for `card_name`, or for every stored card.
    ///
    /// Stops at the first card that fails and returns its error.
    pub fn refresh_all(
        &mut self,
        card_name: Option<&str>,
        timeout: Duration,
    ) -> Result<Vec<RefreshReport>> {
        log::info!("----DB update {}----", Utc::now());

        let targets: Vec<(String, Vec<Observation>)> = match card_name {
            Some(name) => vec![(name.to_string(), self.store.history(name)?)],
            None => self.store.all_histories()?.into_iter().collect(),
        };

        let mut reports = Vec::with_capacity(targets.len());
        for (name, history) in targets {
            let outcome = self.refresh_card(&name, &history, timeout)?;
            reports.push(RefreshReport {
                card_name: name,
                outcome,
            });
        }
        Ok(reports)
    }

    /// Refresh one card given its current history
    ///
    /// An unchanged price is stamped with the time the fetch started.
    fn refresh_card(
        &mut self,
        name: &str,
        history: &[Observation],
        timeout: Duration,
    ) -> Result<RefreshOutcome> {
        log::info!("__{}__: fetching current price...", name);
        let fetched_at = Utc::now();
        let price = self.get_price(name, timeout, false)?;

        let Some(last) = history.last() else {
            log::info!("__{}__: No stored history, recording {}.", name, price);
            self.store.record(name, price)?;
            return Ok(RefreshOutcome::Started(price));
        };

        if price != last.price {
            log::info!(
                "__{}__: Price changed: {} -> {}.  Adding new db entry.",
                name,
                last.price,
                price
            );
            self.store.record(name, price)?;
            Ok(RefreshOutcome::Changed {
                old: last.price,
                new: price,
            })
        } else if history.len() == 1 {
            log::info!(
                "__{}__: Adding second db entry for stable price {}.",
                name,
                price
            );
            self.store.record(name, price)?;
            Ok(RefreshOutcome::Confirmed(price))
        } else {
            log::info!(
                "__{}__: Price unchanged from {}.  Updating timestamp for record with timestamp {}.",
                name,
                price,
                last.timestamp
            );
            self.store.retimestamp(name, last.timestamp, fetched_at)?;
            Ok(RefreshOutcome::Unchanged(price))
        }
    }
}

#[cfg(test)]
#[path = "price_service_tests.rs"]
mod tests;
