//! Shared CLI helpers: store selection, reply printing, banner.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use colored::Colorize;
use tracing::warn;

use tertulia_core::config::Config;
use tertulia_store::{DataStore, HostedStore, MemoryStore};

/// Pick the data store for this run.
///
/// The hosted database wins whenever it is configured. `--in-memory` falls
/// back to a seeded [`MemoryStore`]; without it a missing database is fatal.
pub fn build_store(
    config: &Config,
    in_memory: bool,
    timeout: Duration,
) -> Result<Arc<dyn DataStore>> {
    if config.database.is_configured() {
        if in_memory {
            warn!("database is configured; ignoring --in-memory");
        }
        let store = HostedStore::new(&config.database, timeout)
            .context("failed to create database client")?;
        return Ok(Arc::new(store));
    }

    if !in_memory {
        bail!(
            "database not configured: set SUPABASE_URL and SUPABASE_KEY, \
             or pass --in-memory to use a throwaway store"
        );
    }

    warn!("no database configured, using the in-memory store (data is lost on exit)");
    Ok(Arc::new(MemoryStore::seeded()))
}

/// Print a model reply to stdout.
pub fn print_reply(reply: &str) {
    println!();
    println!("{}", "Tertulia".cyan().bold());
    println!("{reply}");
    println!();
}

/// Print the banner shown when the gateway starts.
pub fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    println!();
    println!("{}  v{}", "Tertulia".cyan().bold(), version.dimmed());
    println!();
}

// ─────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_database_without_in_memory_fails() {
        let config = Config::default();
        let err = build_store(&config, false, Duration::from_secs(1)).err().unwrap();
        assert!(err.to_string().contains("database not configured"));
    }

    #[tokio::test]
    async fn test_in_memory_store_is_seeded() {
        let config = Config::default();
        let store = build_store(&config, true, Duration::from_secs(1)).unwrap();
        assert_eq!(store.list_models().await.unwrap().len(), 1);
    }

    #[test]
    fn test_configured_database_wins() {
        let mut config = Config::default();
        config.database.url = "https://db.example.co".into();
        config.database.key = "service-key".into();
        let store = build_store(&config, true, Duration::from_secs(1)).unwrap();
        assert_ne!(store.display_name(), MemoryStore::new().display_name());
    }
}
