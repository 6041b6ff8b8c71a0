//! Filtering of inbound publications before they reach the delivery queue.
//!
//! The filter is a pure function of the message descriptor and the
//! configured policy: retained messages and empty payloads can be skipped,
//! and a blacklist of topic patterns takes precedence over whatever the
//! subscription whitelist let through. Pattern syntax is the broker's own
//! topic-filter syntax (`+` for one level, `#` for the remainder).

/// Policy knobs for [TopicFilter]. Derived from
/// [BrokerSettings](crate::config::BrokerSettings) at startup.
#[derive(Debug, Clone, Default)]
pub struct FilterPolicy {
    /// Drop retained messages redelivered by the broker.
    pub skip_retained: bool,
    /// Drop messages with an empty payload.
    pub skip_empty: bool,
    /// Patterns whose matching topics are never stored.
    pub blacklist: Vec<String>,
}

/// Decides whether an inbound publication should be queued for storage.
#[derive(Debug, Clone, Default)]
pub struct TopicFilter {
    policy: FilterPolicy,
}

impl TopicFilter {
    pub fn new(policy: FilterPolicy) -> Self {
        Self { policy }
    }

    /// Accept or reject a raw inbound publication. No side effects:
    /// identical inputs always yield identical results.
    pub fn accept(&self, topic: &str, payload: &str, retained: bool) -> bool {
        if retained && self.policy.skip_retained {
            return false;
        }
        if payload.is_empty() && self.policy.skip_empty {
            return false;
        }
        !self
            .policy
            .blacklist
            .iter()
            .any(|pattern| topic_matches(pattern, topic))
    }
}

/// MQTT topic-filter matching. `+` matches exactly one level, `#` matches
/// the remainder of the topic including the parent level (`a/#` matches
/// `a`).
pub fn topic_matches(pattern: &str, topic: &str) -> bool {
    let mut pattern_levels = pattern.split('/');
    let mut topic_levels = topic.split('/');
    loop {
        match (pattern_levels.next(), topic_levels.next()) {
            (Some("#"), _) => return true,
            (Some("+"), Some(_)) => continue,
            (Some(p), Some(t)) if p == t => continue,
            (None, None) => return true,
            _ => return false,
        }
    }
}
