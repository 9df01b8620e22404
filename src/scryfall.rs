//! Scryfall API client for card lookups and printing searches
//!
//! Blocking reqwest client. Every request first takes a turn on the
//! client's [`RequestThrottle`], so requests through one client never start
//! closer together than the configured interval.

use crate::config::Config;
use crate::error::{PriceError, Result};
use crate::price::Usd;
use crate::rate_limiter::RequestThrottle;
use reqwest::blocking::{Client, Response};
use reqwest::header::ACCEPT;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

const USER_AGENT: &str = "sf_price_fetcher/0.1";

/// Set type Scryfall uses for promotional printings
pub const PROMO_SET_TYPE: &str = "promo";

/// One printing of a card as returned by Scryfall.
///
/// Only the fields the price logic needs are typed. Everything else is kept
/// in `extra` so the full card can be printed back out.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CardPrinting {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub set: String,
    #[serde(default)]
    pub set_name: String,
    #[serde(default)]
    pub set_type: String,
    #[serde(default)]
    pub lang: String,
    #[serde(default)]
    pub prices: CardPrices,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct CardPrices {
    /// Decimal string such as "3.50", or null when Scryfall has no USD price
    #[serde(default)]
    pub usd: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl CardPrinting {
    /// USD price of this printing, if Scryfall lists a usable one
    pub fn usd_price(&self) -> Option<Usd> {
        let raw = self.prices.usd.as_deref()?;
        match raw.parse() {
            Ok(price) => Some(price),
            Err(e) => {
                log::warn!("Ignoring price of {} ({}): {}", self.name, self.set, e);
                None
            }
        }
    }

    pub fn is_promo(&self) -> bool {
        self.set_type == PROMO_SET_TYPE
    }
}

/// Paginated list wrapper of the search endpoint
#[derive(Debug, Deserialize)]
struct CardList {
    #[serde(default)]
    data: Option<Vec<CardPrinting>>,
}

/// Scryfall API error response
#[derive(Debug, Deserialize)]
struct ScryfallError {
    #[serde(default)]
    code: String,
    #[serde(default)]
    details: String,
}

/// Rate limited client for the Scryfall REST API
pub struct ScryfallClient {
    http: Client,
    base_url: String,
    throttle: RequestThrottle,
}

impl ScryfallClient {
    /// Create a client against `base_url` that spaces requests with `throttle`
    pub fn new(base_url: impl Into<String>, throttle: RequestThrottle) -> Result<Self> {
        let http = Client::builder().user_agent(USER_AGENT).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self {
            http,
            base_url,
            throttle,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(
            config.api_base.clone(),
            RequestThrottle::new(config.min_request_interval),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Fetch a card by its exact name
    ///
    /// A 404 from Scryfall means no card has that name and maps to
    /// [`PriceError::NoMatch`].
    pub fn fetch_named_card(&self, card_name: &str, timeout: Duration) -> Result<CardPrinting> {
        let url = format!("{}/cards/named", self.base_url);
        let response = self.get(&url, &[("exact", card_name)], timeout)?;

        match response.status() {
            status if status.is_success() => Ok(response.json::<CardPrinting>()?),
            StatusCode::NOT_FOUND => Err(PriceError::NoMatch(card_name.to_string())),
            _ => Err(remote_error(response)),
        }
    }

    /// Search all English printings of an exact card name.
    ///
    /// Results are sorted by USD price from high to low, with unpriced
    /// printings last. Returns `None` when Scryfall finds nothing.
    pub fn search_printings(
        &self,
        card_name: &str,
        timeout: Duration,
    ) -> Result<Option<Vec<CardPrinting>>> {
        let url = format!("{}/cards/search", self.base_url);
        let query = format!("lang:en !\"{}\"", card_name);
        let params = [
            ("unique", "prints"),
            ("order", "usd"),
            ("dir", "desc"),
            ("q", query.as_str()),
        ];
        let response = self.get(&url, &params, timeout)?;

        match response.status() {
            status if status.is_success() => {
                let list: CardList = response.json()?;
                if list.data.is_none() {
                    log::debug!("Search for \"{}\" returned no data field", card_name);
                }
                Ok(list.data)
            }
            StatusCode::NOT_FOUND => {
                log::debug!("Search for \"{}\" found no cards", card_name);
                Ok(None)
            }
            _ => Err(remote_error(response)),
        }
    }

    /// Send a throttled GET request
    fn get(&self, url: &str, query: &[(&str, &str)], timeout: Duration) -> Result<Response> {
        self.throttle.wait_turn();

        let response = self
            .http
            .get(url)
            .query(query)
            .header(ACCEPT, "application/json")
            .timeout(timeout)
            .send()?;

        log::debug!("Scryfall request: {} -> {}", response.url(), response.status());
        Ok(response)
    }
}

/// Turn an unexpected response into [`PriceError::Remote`]
fn remote_error(response: Response) -> PriceError {
    let status = response.status();
    let details = match response.json::<ScryfallError>() {
        Ok(err) if !err.details.is_empty() => format!("{}: {}", err.code, err.details),
        _ => status
            .canonical_reason()
            .unwrap_or("unexpected status")
            .to_string(),
    };
    PriceError::Remote { status, details }
}

#[cfg(test)]
#[path = "scryfall_tests.rs"]
mod tests;
