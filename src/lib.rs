//! sf_price_fetcher - MTG card prices from Scryfall
//!
//! Looks up card prices on Scryfall, spaces requests at least 100ms apart,
//! and keeps every fetched price in a local SQLite history. Repeated lookups
//! within a day are answered from that history.

pub mod config;
pub mod database;
pub mod error;
pub mod price;
pub mod price_service;
pub mod rate_limiter;
pub mod scryfall;

pub use config::Config;
pub use database::{Observation, PriceStore};
pub use error::{PriceError, Result, StorageError};
pub use price::Usd;
pub use price_service::{select_cheapest_valid, PriceService, RefreshOutcome, RefreshReport};
pub use rate_limiter::RequestThrottle;
pub use scryfall::{CardPrinting, ScryfallClient};

/// Open the configured price database and Scryfall client as one service
pub fn open_service(config: &Config) -> Result<PriceService> {
    let store = PriceStore::open(&config.database_path, config.cache_expiry)?;
    let client = ScryfallClient::from_config(config)?;
    Ok(PriceService::new(client, store))
}
