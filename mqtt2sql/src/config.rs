//! Configuration surface for the bridge.
//!
//! A single [Settings] value is built once at startup (optional
//! `config/default` file, overridden by environment variables) and passed
//! explicitly to every component that needs it. There is no ambient global
//! configuration lookup.

use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

pub use config::ConfigError;

use crate::filter::FilterPolicy;

/// Top-level settings: the broker side, the database side and the writer's
/// retry policy.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub broker: BrokerSettings,
    pub database: DatabaseSettings,
    pub writer: WriterSettings,
}

/// MQTT broker connection and subscription settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrokerSettings {
    pub host: String,
    pub port: u16,
    /// Keepalive interval handed to the broker client, in seconds.
    pub keepalive_secs: u64,
    /// QoS level to subscribe with (0/1/2).
    pub qos: u8,
    /// Comma-separated topic whitelist. `*` may be used in place of the
    /// broker's `#` multi-level wildcard, which is awkward in some
    /// environment files.
    pub topics: String,
    /// Comma-separated topic blacklist; matching topics are never stored,
    /// even when a whitelist pattern delivered them.
    pub topics_blacklist: String,
    /// Drop retained messages redelivered by the broker.
    pub skip_retained: bool,
    /// Drop messages with an empty payload.
    pub skip_empty: bool,
}

impl Default for BrokerSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 1883,
            keepalive_secs: 60,
            qos: 0,
            topics: "#".to_string(),
            topics_blacklist: String::new(),
            skip_retained: false,
            skip_empty: false,
        }
    }
}

impl BrokerSettings {
    pub fn keepalive(&self) -> Duration {
        Duration::from_secs(self.keepalive_secs)
    }

    /// The parsed whitelist patterns to subscribe to. An empty list would
    /// leave the subscriber with nothing to wait for, so it falls back to
    /// the `#` catch-all.
    pub fn topic_patterns(&self) -> Vec<String> {
        let patterns = parse_topics(&self.topics);
        if patterns.is_empty() {
            vec!["#".to_string()]
        } else {
            patterns
        }
    }

    /// The parsed blacklist patterns.
    pub fn blacklist_patterns(&self) -> Vec<String> {
        parse_topics(&self.topics_blacklist)
    }

    /// The filter policy implied by these settings.
    pub fn filter_policy(&self) -> FilterPolicy {
        FilterPolicy {
            skip_retained: self.skip_retained,
            skip_empty: self.skip_empty,
            blacklist: self.blacklist_patterns(),
        }
    }
}

/// MySQL/MariaDB connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseSettings {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
    pub charset: String,
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3306,
            database: "mqtt".to_string(),
            user: "root".to_string(),
            password: String::new(),
            charset: "utf8mb4".to_string(),
        }
    }
}

/// Retry policy of the writer's drain loop.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WriterSettings {
    /// Seconds to wait after a failed insert before requeueing the
    /// message.
    pub insert_retry_delay_secs: u64,
    /// Upper bound on a single queue wait; on expiry the stop token is
    /// re-checked. Also the delay between database connection attempts.
    pub poll_interval_secs: u64,
}

impl Default for WriterSettings {
    fn default() -> Self {
        Self {
            insert_retry_delay_secs: 10,
            poll_interval_secs: 30,
        }
    }
}

impl WriterSettings {
    pub fn insert_retry_delay(&self) -> Duration {
        Duration::from_secs(self.insert_retry_delay_secs)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }
}

/// Load settings from the optional `config/default` file, then from
/// environment variables (`BROKER__HOST`, `DATABASE__PASSWORD`, ...).
/// Unspecified options fall back to their defaults.
pub fn load_config() -> Result<Settings, ConfigError> {
    let builder = Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(Environment::default().separator("__"));
    builder.build()?.try_deserialize()
}

/// Split a comma-separated pattern list, trimming whitespace and
/// substituting `*` with the broker's multi-level wildcard.
fn parse_topics(line: &str) -> Vec<String> {
    line.split(',')
        .map(|topic| topic.trim().replace('*', "#"))
        .filter(|topic| !topic.is_empty())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let settings = Settings::default();
        assert_eq!(settings.broker.port, 1883);
        assert_eq!(settings.broker.topic_patterns(), vec!["#"]);
        assert!(settings.broker.blacklist_patterns().is_empty());
        assert_eq!(settings.database.port, 3306);
        assert_eq!(settings.database.charset, "utf8mb4");
        assert_eq!(settings.writer.insert_retry_delay(), Duration::from_secs(10));
        assert_eq!(settings.writer.poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn parses_topic_lists() {
        assert_eq!(
            parse_topics("home/*, sensors/+/temperature ,plain"),
            vec!["home/#", "sensors/+/temperature", "plain"]
        );
        assert!(parse_topics("").is_empty());
        assert!(parse_topics(" , ").is_empty());
    }

    #[test]
    fn empty_whitelist_falls_back_to_catch_all() {
        let broker = BrokerSettings {
            topics: " , ".to_string(),
            ..Default::default()
        };
        assert_eq!(broker.topic_patterns(), vec!["#"]);
        // the blacklist has no such fallback
        assert!(broker.blacklist_patterns().is_empty());
    }

    #[test]
    fn filter_policy_from_settings() {
        let broker = BrokerSettings {
            skip_retained: true,
            topics_blacklist: "secret/*".to_string(),
            ..Default::default()
        };
        let policy = broker.filter_policy();
        assert!(policy.skip_retained);
        assert!(!policy.skip_empty);
        assert_eq!(policy.blacklist, vec!["secret/#"]);
    }
}
