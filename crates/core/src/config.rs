use std::env;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Key lookup used to build a config; the process environment in production.
type Lookup<'a> = &'a dyn Fn(&str) -> Option<String>;

/// Read a profiled key: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_opt(lookup: Lookup<'_>, profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = lookup(&prefixed).filter(|s| !s.is_empty()) {
            return Some(v);
        }
    }
    lookup(key).filter(|s| !s.is_empty())
}

fn profiled_usize(lookup: Lookup<'_>, profile: &str, key: &str, default: usize) -> usize {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn profiled_u64(lookup: Lookup<'_>, profile: &str, key: &str, default: u64) -> u64 {
    profiled_opt(lookup, profile, key)
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub ingest: IngestConfig,
    pub breaker: BreakerConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `FLEETPOS_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_opt("FLEETPOS_PROFILE").unwrap_or_default();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        Self::from_lookup(profile, &env_opt)
    }

    /// Build config from an arbitrary key lookup.
    pub fn from_lookup(profile: &str, lookup: Lookup<'_>) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            ingest: IngestConfig::from_lookup(lookup, p),
            breaker: BreakerConfig::from_lookup(lookup, p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!(
            "  ingest:   batch_size={}, workers={}, queue={}, delimiter={:?}",
            self.ingest.batch_size,
            self.ingest.max_workers,
            self.ingest.queue_capacity,
            self.ingest.delimiter
        );
        tracing::info!(
            "  breaker:  max_failures={}, reset_timeout={:?}",
            self.breaker.max_failures,
            self.breaker.reset_timeout()
        );
    }

    /// Return a view safe for API responses and CLI output.
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "ingest": {
                "batch_size": self.ingest.batch_size,
                "max_workers": self.ingest.max_workers,
                "queue_capacity": self.ingest.queue_capacity,
                "delimiter": self.ingest.delimiter.to_string(),
            },
            "breaker": {
                "max_failures": self.breaker.max_failures,
                "reset_timeout_ms": self.breaker.reset_timeout_ms,
            },
        })
    }
}

// ── Ingest ────────────────────────────────────────────────────

pub const DEFAULT_BATCH_SIZE: usize = 10_000;
pub const DEFAULT_MAX_WORKERS: usize = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Records per bulk write.
    pub batch_size: usize,
    /// Number of concurrent persistence workers.
    pub max_workers: usize,
    /// Batches that may wait on the work queue before the producer blocks.
    pub queue_capacity: usize,
    /// Field separator of the input rows.
    pub delimiter: char,
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_BATCH_SIZE,
            max_workers: DEFAULT_MAX_WORKERS,
            queue_capacity: DEFAULT_MAX_WORKERS,
            delimiter: ',',
        }
    }
}

impl IngestConfig {
    /// Create a config with the given batch size and worker count.
    ///
    /// The queue holds one pending batch per worker. Both values are
    /// clamped to a minimum of 1.
    pub fn new(batch_size: usize, max_workers: usize) -> Self {
        let max_workers = max_workers.max(1);
        Self {
            batch_size: batch_size.max(1),
            max_workers,
            queue_capacity: max_workers,
            delimiter: ',',
        }
    }

    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity.max(1);
        self
    }

    pub fn with_delimiter(mut self, delimiter: char) -> Self {
        self.delimiter = delimiter;
        self
    }

    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        let batch_size = profiled_usize(lookup, p, "INGEST_BATCH_SIZE", DEFAULT_BATCH_SIZE);
        let max_workers = profiled_usize(lookup, p, "INGEST_MAX_WORKERS", DEFAULT_MAX_WORKERS);
        let mut config = Self::new(batch_size, max_workers);
        if let Some(capacity) = profiled_opt(lookup, p, "INGEST_QUEUE_CAPACITY")
            .and_then(|v| v.trim().parse().ok())
        {
            config = config.with_queue_capacity(capacity);
        }
        if let Some(delimiter) = profiled_opt(lookup, p, "INGEST_DELIMITER")
            .and_then(|v| parse_delimiter(&v))
        {
            config = config.with_delimiter(delimiter);
        }
        config
    }
}

/// Parse a single-character delimiter; `\t` and `tab` mean a tab.
pub fn parse_delimiter(value: &str) -> Option<char> {
    match value {
        "\\t" | "tab" => Some('\t'),
        _ => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) if c != '"' && c != '\n' && c != '\r' => Some(c),
                _ => None,
            }
        }
    }
}

// ── Circuit breaker ───────────────────────────────────────────

pub const DEFAULT_MAX_FAILURES: u32 = 5;
pub const DEFAULT_RESET_TIMEOUT_MS: u64 = 1_000;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BreakerConfig {
    /// Consecutive failures that open the circuit.
    pub max_failures: u32,
    /// Time an open circuit waits before admitting a trial call.
    pub reset_timeout_ms: u64,
}

impl Default for BreakerConfig {
    fn default() -> Self {
        Self {
            max_failures: DEFAULT_MAX_FAILURES,
            reset_timeout_ms: DEFAULT_RESET_TIMEOUT_MS,
        }
    }
}

impl BreakerConfig {
    /// `max_failures` is clamped to a minimum of 1.
    pub fn new(max_failures: u32, reset_timeout: Duration) -> Self {
        Self {
            max_failures: max_failures.max(1),
            reset_timeout_ms: u64::try_from(reset_timeout.as_millis()).unwrap_or(u64::MAX),
        }
    }

    pub fn reset_timeout(&self) -> Duration {
        Duration::from_millis(self.reset_timeout_ms)
    }

    fn from_lookup(lookup: Lookup<'_>, p: &str) -> Self {
        let max_failures =
            profiled_u64(lookup, p, "BREAKER_MAX_FAILURES", u64::from(DEFAULT_MAX_FAILURES));
        let reset_timeout_ms =
            profiled_u64(lookup, p, "BREAKER_RESET_TIMEOUT_MS", DEFAULT_RESET_TIMEOUT_MS);
        Self::new(
            u32::try_from(max_failures).unwrap_or(u32::MAX),
            Duration::from_millis(reset_timeout_ms),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::from_lookup("", &lookup_from(&[]));
        assert_eq!(config.ingest.batch_size, 10_000);
        assert_eq!(config.ingest.max_workers, 100);
        assert_eq!(config.ingest.queue_capacity, 100);
        assert_eq!(config.ingest.delimiter, ',');
        assert_eq!(config.breaker.max_failures, 5);
        assert_eq!(config.breaker.reset_timeout(), Duration::from_secs(1));
        assert_eq!(config.profile_label(), "default");
    }

    #[test]
    fn profile_prefixed_keys_win() {
        let lookup = lookup_from(&[
            ("INGEST_BATCH_SIZE", "500"),
            ("PROD_INGEST_BATCH_SIZE", "2000"),
            ("INGEST_MAX_WORKERS", "8"),
        ]);
        let config = Config::from_lookup("prod", &lookup);
        assert_eq!(config.profile, "PROD");
        assert_eq!(config.ingest.batch_size, 2000);
        assert_eq!(config.ingest.max_workers, 8);
        assert_eq!(config.ingest.queue_capacity, 8);
    }

    #[test]
    fn invalid_and_zero_values_are_corrected() {
        let lookup = lookup_from(&[
            ("INGEST_BATCH_SIZE", "0"),
            ("INGEST_MAX_WORKERS", "lots"),
            ("BREAKER_MAX_FAILURES", "0"),
            ("INGEST_DELIMITER", ";;"),
        ]);
        let config = Config::from_lookup("", &lookup);
        assert_eq!(config.ingest.batch_size, 1);
        assert_eq!(config.ingest.max_workers, DEFAULT_MAX_WORKERS);
        assert_eq!(config.breaker.max_failures, 1);
        assert_eq!(config.ingest.delimiter, ',');
    }

    #[test]
    fn explicit_queue_capacity_and_delimiter() {
        let lookup = lookup_from(&[
            ("INGEST_QUEUE_CAPACITY", "3"),
            ("INGEST_DELIMITER", "tab"),
            ("BREAKER_RESET_TIMEOUT_MS", "250"),
        ]);
        let config = Config::from_lookup("", &lookup);
        assert_eq!(config.ingest.queue_capacity, 3);
        assert_eq!(config.ingest.delimiter, '\t');
        assert_eq!(config.breaker.reset_timeout(), Duration::from_millis(250));
    }

    #[test]
    fn delimiter_parsing() {
        assert_eq!(parse_delimiter(";"), Some(';'));
        assert_eq!(parse_delimiter("\\t"), Some('\t'));
        assert_eq!(parse_delimiter("\""), None);
        assert_eq!(parse_delimiter(""), None);
    }

    #[test]
    fn redacted_summary_has_all_sections() {
        let summary = Config::default().redacted_summary();
        assert_eq!(summary["profile"], "default");
        assert_eq!(summary["ingest"]["delimiter"], ",");
        assert_eq!(summary["breaker"]["reset_timeout_ms"], 1000);
    }
}
