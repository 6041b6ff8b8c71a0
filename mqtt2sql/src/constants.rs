use std::time::Duration;

/// Fixed delay between broker connection attempts. Connection errors are
/// never fatal; the subscriber retries at this interval until a stop is
/// requested.
pub const BROKER_RECONNECT_BACKOFF: Duration = Duration::from_secs(10);
