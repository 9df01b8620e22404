//! sf_price_fetcher - card price fetcher for scryfall.com
//!
//! Prints the price of a card, its full Scryfall data, or all of its
//! printings, or refreshes the stored price history.
//!
//! Exit codes: 0 on success, 1 on any lookup or storage error, 2 on usage
//! errors.

use clap::error::ErrorKind;
use clap::{ArgGroup, CommandFactory, Parser};
use sf_price_fetcher::config::{default_db_path, DEFAULT_CACHE_EXPIRY_HOURS};
use sf_price_fetcher::{open_service, Config, PriceService, RefreshOutcome};
use std::path::PathBuf;
use std::time::Duration;

/// Card price fetcher for scryfall.com
#[derive(Parser, Debug)]
#[command(name = "sf_price_fetcher")]
#[command(version, about, long_about = None)]
#[command(group(ArgGroup::new("action").args(["card", "search", "update"])))]
struct Args {
    /// Card name to look up
    card_name: Option<String>,

    /// Print full card data instead of just the price
    #[arg(short, long)]
    card: bool,

    /// Search for the card name and print all unique printings
    #[arg(short, long)]
    search: bool,

    /// Update prices for CARD_NAME, or all cards in the database if no name is given
    #[arg(short, long)]
    update: bool,

    /// Path to the SQLite price database
    #[arg(long, default_value_os_t = default_db_path())]
    database: PathBuf,

    /// Request timeout in seconds
    #[arg(long, default_value = "5", value_parser = parse_timeout)]
    timeout: Duration,

    /// Hours a stored price is served without asking Scryfall again
    #[arg(long, default_value_t = DEFAULT_CACHE_EXPIRY_HOURS)]
    cache_hours: u32,

    /// Skip the price database for this lookup
    #[arg(long, default_value_t = false)]
    no_cache: bool,
}

fn parse_timeout(s: &str) -> Result<Duration, String> {
    let secs: f64 = s.parse().map_err(|e| format!("{}", e))?;
    if !secs.is_finite() || secs <= 0.0 {
        return Err(format!("timeout must be a positive number of seconds, got {}", s));
    }
    Duration::try_from_secs_f64(secs).map_err(|e| format!("{}", e))
}

fn main() {
    // Initialize logger. Set RUST_LOG to control the level, e.g. RUST_LOG=debug
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = Config {
        database_path: args.database.clone(),
        cache_expiry: chrono::Duration::hours(i64::from(args.cache_hours)),
        timeout: args.timeout,
        ..Config::default()
    };
    log::debug!("Database path: {}", config.database_path.display());

    let mut service = match open_service(&config) {
        Ok(service) => service,
        Err(e) => {
            log::error!("Failed to open price database: {}", e);
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(&args, &mut service, config.timeout) {
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(
    args: &Args,
    service: &mut PriceService,
    timeout: Duration,
) -> sf_price_fetcher::Result<()> {
    if args.update {
        let reports = service.refresh_all(args.card_name.as_deref(), timeout)?;
        for report in &reports {
            println!("{}: {}", report.card_name, describe(&report.outcome));
        }
        return Ok(());
    }

    let card_name = required_card_name(args);

    if args.card {
        let card = service.card(card_name, timeout)?;
        print_json(&card);
    } else if args.search {
        let printings = service.printings(card_name, timeout)?;
        print_json(&printings);
    } else {
        let price = service.get_price(card_name, timeout, !args.no_cache)?;
        println!("{}: {}", card_name, price);
    }
    Ok(())
}

/// Card name for actions that need one; exits with a usage error otherwise
fn required_card_name(args: &Args) -> &str {
    match args.card_name.as_deref() {
        Some(name) if !name.trim().is_empty() => name,
        _ => Args::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                "a CARD_NAME is required unless --update is given",
            )
            .exit(),
    }
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(json) => println!("{}", json),
        Err(e) => log::error!("Failed to format card data: {}", e),
    }
}

fn describe(outcome: &RefreshOutcome) -> String {
    match outcome {
        RefreshOutcome::Changed { old, new } => format!("{} -> {}", old, new),
        RefreshOutcome::Confirmed(price) => format!("{} (confirmed)", price),
        RefreshOutcome::Unchanged(price) => format!("{} (unchanged)", price),
        RefreshOutcome::Started(price) => format!("{} (new)", price),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn args_are_well_formed() {
        Args::command().debug_assert();
    }

    #[test]
    fn actions_are_mutually_exclusive() {
        let result = Args::try_parse_from(["sf_price_fetcher", "-c", "-s", "Sol Ring"]);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::ArgumentConflict);
    }

    #[test]
    fn update_without_name_parses() {
        let args = Args::try_parse_from(["sf_price_fetcher", "-u"]).unwrap();
        assert!(args.update);
        assert!(args.card_name.is_none());
    }

    #[test]
    fn timeout_accepts_fractional_seconds() {
        let args =
            Args::try_parse_from(["sf_price_fetcher", "--timeout", "2.5", "Sol Ring"]).unwrap();
        assert_eq!(args.timeout, Duration::from_millis(2500));
        assert_eq!(args.card_name.as_deref(), Some("Sol Ring"));
    }

    #[test]
    fn timeout_rejects_non_positive() {
        assert!(parse_timeout("0").is_err());
        assert!(parse_timeout("-1").is_err());
        assert!(parse_timeout("soon").is_err());
    }
}
