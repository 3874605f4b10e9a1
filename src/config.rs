//! Runtime configuration
//!
//! All knobs come from the environment with sensible defaults, so the demo
//! binary and the integration tests can tune the pipelines without code
//! changes.

use anyhow::Result;
use std::env;

#[derive(Debug, Clone)]
pub struct Config {
    /// Target size of the initial generation run.
    pub total_transactions: usize,
    /// Records per streamed batch.
    pub batch_size: usize,
    /// Records per analytics chunk between partial emissions.
    pub chunk_size: usize,
    /// Quiet window before a visible-set change dispatches a fresh analysis.
    pub debounce_ms: u64,
    /// Visible sets smaller than this are not analyzed at all.
    pub min_analyze_threshold: usize,
    /// Pause between streamed generation batches.
    pub stream_delay_ms: u64,
    /// Result cap used when compact view is enabled.
    pub items_per_page: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            total_transactions: 10_000,
            batch_size: 500,
            chunk_size: 1000,
            debounce_ms: 250,
            min_analyze_threshold: 500,
            stream_delay_ms: 50,
            items_per_page: 50,
        }
    }
}

fn env_parsed<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv::dotenv().ok();
        let defaults = Config::default();

        Ok(Self {
            total_transactions: env_parsed("TOTAL_TRANSACTIONS", defaults.total_transactions),
            batch_size: env_parsed("BATCH_SIZE", defaults.batch_size),
            chunk_size: env_parsed("CHUNK_SIZE", defaults.chunk_size),
            debounce_ms: env_parsed("DEBOUNCE_MS", defaults.debounce_ms),
            min_analyze_threshold: env_parsed(
                "MIN_ANALYZE_THRESHOLD",
                defaults.min_analyze_threshold,
            ),
            stream_delay_ms: env_parsed("STREAM_DELAY_MS", defaults.stream_delay_ms),
            items_per_page: env_parsed("ITEMS_PER_PAGE", defaults.items_per_page),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.total_transactions, 10_000);
        assert_eq!(config.batch_size, 500);
        assert_eq!(config.chunk_size, 1000);
        assert_eq!(config.debounce_ms, 250);
        assert_eq!(config.min_analyze_threshold, 500);
    }
}
