//! Application configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use outbox::PublisherConfig;
use projections::{ConsumerConfig, UnknownEventPolicy};

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Process configuration with sensible defaults.
///
/// Reads from environment variables:
/// - `HOST`: bind address (default `"0.0.0.0"`)
/// - `PORT`: listen port (default `3000`)
/// - `RUST_LOG`: tracing filter directive (default `"info"`)
/// - `LOG_FORMAT`: `pretty` or `json` (default `pretty`)
/// - `DATABASE_URL`: PostgreSQL connection string; in-memory stores when unset
/// - `OUTBOX_BATCH_SIZE`: entries read per publisher cycle (default `50`)
/// - `OUTBOX_IDLE_DELAY_MS`: sleep after a partial batch (default `2000`)
/// - `BROKER_EXCHANGE`: topic exchange name (default `"listing.events"`)
/// - `BROKER_QUEUE`: search consumer queue (default `"search.listings"`)
/// - `CONSUMER_PREFETCH`: deliveries in flight per consumer (default `10`)
/// - `UNKNOWN_EVENT_POLICY`: `ack_and_drop` or `reject` (default `ack_and_drop`)
///
/// Unparseable values fall back to the default.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub log_level: String,
    pub log_format: LogFormat,
    pub database_url: Option<String>,
    pub outbox_batch_size: usize,
    pub outbox_idle_delay: Duration,
    pub broker_exchange: String,
    pub broker_queue: String,
    pub consumer_prefetch: usize,
    pub unknown_event_policy: UnknownEventPolicy,
}

impl Config {
    /// Loads configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration through `lookup`, which returns the raw value of a
    /// variable if it is set.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let lookup = &lookup;

        Self {
            host: lookup("HOST").unwrap_or(defaults.host),
            port: parse_var(lookup, "PORT").unwrap_or(defaults.port),
            log_level: lookup("RUST_LOG").unwrap_or(defaults.log_level),
            log_format: match lookup("LOG_FORMAT").as_deref().map(str::trim) {
                Some(f) if f.eq_ignore_ascii_case("json") => LogFormat::Json,
                _ => defaults.log_format,
            },
            database_url: lookup("DATABASE_URL").filter(|url| !url.trim().is_empty()),
            outbox_batch_size: parse_var(lookup, "OUTBOX_BATCH_SIZE")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.outbox_batch_size),
            outbox_idle_delay: parse_var(lookup, "OUTBOX_IDLE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.outbox_idle_delay),
            broker_exchange: lookup("BROKER_EXCHANGE").unwrap_or(defaults.broker_exchange),
            broker_queue: lookup("BROKER_QUEUE").unwrap_or(defaults.broker_queue),
            consumer_prefetch: parse_var(lookup, "CONSUMER_PREFETCH")
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.consumer_prefetch),
            unknown_event_policy: parse_var(lookup, "UNKNOWN_EVENT_POLICY")
                .unwrap_or(defaults.unknown_event_policy),
        }
    }

    /// Returns the `"host:port"` bind address string.
    pub fn addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn publisher_config(&self) -> PublisherConfig {
        PublisherConfig::default()
            .with_batch_size(self.outbox_batch_size)
            .with_idle_delay(self.outbox_idle_delay)
    }

    pub fn consumer_config(&self) -> ConsumerConfig {
        ConsumerConfig {
            queue: self.broker_queue.clone(),
            prefetch: self.consumer_prefetch,
            unknown_event_policy: self.unknown_event_policy,
        }
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    lookup(key).and_then(|value| value.trim().parse().ok())
}

impl Default for Config {
    fn default() -> Self {
        let publisher = PublisherConfig::default();
        let consumer = ConsumerConfig::default();
        Self {
            host: "0.0.0.0".to_string(),
            port: 3000,
            log_level: "info".to_string(),
            log_format: LogFormat::default(),
            database_url: None,
            outbox_batch_size: publisher.batch_size,
            outbox_idle_delay: publisher.idle_delay,
            broker_exchange: "listing.events".to_string(),
            broker_queue: consumer.queue,
            consumer_prefetch: consumer.prefetch,
            unknown_event_policy: consumer.unknown_event_policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn from_pairs(pairs: &[(&str, &str)]) -> Config {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_values() {
        let config = from_pairs(&[]);
        assert_eq!(config.addr(), "0.0.0.0:3000");
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Pretty);
        assert!(config.database_url.is_none());
        assert_eq!(config.outbox_batch_size, 50);
        assert_eq!(config.outbox_idle_delay, Duration::from_secs(2));
        assert_eq!(config.broker_exchange, "listing.events");
        assert_eq!(config.broker_queue, "search.listings");
        assert_eq!(config.consumer_prefetch, 10);
        assert_eq!(config.unknown_event_policy, UnknownEventPolicy::AckAndDrop);
    }

    #[test]
    fn test_overrides() {
        let config = from_pairs(&[
            ("HOST", "127.0.0.1"),
            ("PORT", "8080"),
            ("LOG_FORMAT", "JSON"),
            ("DATABASE_URL", "postgres://localhost/listings"),
            ("OUTBOX_BATCH_SIZE", "200"),
            ("OUTBOX_IDLE_DELAY_MS", "250"),
            ("BROKER_QUEUE", "search.listings.v2"),
            ("CONSUMER_PREFETCH", "32"),
            ("UNKNOWN_EVENT_POLICY", "reject"),
        ]);

        assert_eq!(config.addr(), "127.0.0.1:8080");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(
            config.database_url.as_deref(),
            Some("postgres://localhost/listings")
        );

        let publisher = config.publisher_config();
        assert_eq!(publisher.batch_size, 200);
        assert_eq!(publisher.idle_delay, Duration::from_millis(250));

        let consumer = config.consumer_config();
        assert_eq!(consumer.queue, "search.listings.v2");
        assert_eq!(consumer.prefetch, 32);
        assert_eq!(consumer.unknown_event_policy, UnknownEventPolicy::Reject);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = from_pairs(&[
            ("PORT", "eighty"),
            ("OUTBOX_BATCH_SIZE", "0"),
            ("CONSUMER_PREFETCH", "-1"),
            ("UNKNOWN_EVENT_POLICY", "maybe"),
            ("DATABASE_URL", "  "),
        ]);

        assert_eq!(config.port, 3000);
        assert_eq!(config.outbox_batch_size, 50);
        assert_eq!(config.consumer_prefetch, 10);
        assert_eq!(config.unknown_event_policy, UnknownEventPolicy::AckAndDrop);
        assert!(config.database_url.is_none());
    }
}
