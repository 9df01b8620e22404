//! Error types for sf_price_fetcher
//!
//! Every transport and storage failure is folded into one of the
//! [`PriceError`] kinds before it leaves the library.

use thiserror::Error;

/// Unified error type for price lookups
#[derive(Debug, Error)]
pub enum PriceError {
    /// Request timed out or failed at the transport level
    #[error("Network error: {0}")]
    Network(#[source] reqwest::Error),
    /// Scryfall answered, but not with something we can use
    #[error("Scryfall error (HTTP {status}): {details}")]
    Remote {
        status: reqwest::StatusCode,
        details: String,
    },
    /// No card exists under this name
    #[error("Invalid card name \"{0}\"")]
    NoMatch(String),
    /// Printings exist, but every one is a promo or has no USD price
    #[error("No valid results for card name \"{0}\"")]
    NoValidPrinting(String),
    /// Local price database failed
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),
}

/// Failures of the local SQLite price history
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("database: {0}")]
    Database(#[from] rusqlite::Error),
    #[error("I/O: {0}")]
    Io(#[from] std::io::Error),
    /// The `cards` table exists but does not look like ours
    #[error("schema mismatch: {0}")]
    Schema(String),
    /// A stored row could not be decoded
    #[error("corrupt row: {0}")]
    Corrupt(String),
    #[error("no observation for \"{name}\" at {timestamp}")]
    MissingObservation { name: String, timestamp: String },
}

impl From<reqwest::Error> for PriceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            PriceError::Remote {
                status: err.status().unwrap_or(reqwest::StatusCode::OK),
                details: format!("malformed response: {}", err),
            }
        } else {
            PriceError::Network(err)
        }
    }
}

impl From<rusqlite::Error> for PriceError {
    fn from(err: rusqlite::Error) -> Self {
        PriceError::Storage(StorageError::Database(err))
    }
}

impl From<std::io::Error> for PriceError {
    fn from(err: std::io::Error) -> Self {
        PriceError::Storage(StorageError::Io(err))
    }
}

/// Result alias for price lookups
pub type Result<T> = std::result::Result<T, PriceError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rusqlite_errors_become_storage_errors() {
        let err: PriceError = rusqlite::Error::QueryReturnedNoRows.into();
        assert!(matches!(
            err,
            PriceError::Storage(StorageError::Database(_))
        ));
    }

    #[test]
    fn io_errors_become_storage_errors() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let err: PriceError = io.into();
        assert!(matches!(err, PriceError::Storage(StorageError::Io(_))));
        assert!(err.to_string().contains("read-only"));
    }

    #[test]
    fn display_names_the_card() {
        let err = PriceError::NoValidPrinting("Black Lotus".to_string());
        assert_eq!(
            err.to_string(),
            "No valid results for card name \"Black Lotus\""
        );
        let err = PriceError::NoMatch("Blak Lotus".to_string());
        assert_eq!(err.to_string(), "Invalid card name \"Blak Lotus\"");
    }

    #[test]
    fn remote_error_includes_status() {
        let err = PriceError::Remote {
            status: reqwest::StatusCode::SERVICE_UNAVAILABLE,
            details: "try again later".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("503"));
        assert!(text.contains("try again later"));
    }
}
