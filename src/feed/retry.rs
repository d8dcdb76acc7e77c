use tokio::time::Duration;

use crate::error::FeedError;

/// Reconnect policy for feed connectors: unlimited retries with a fixed
/// delay, applied only to classified [`FeedError`]s.
#[derive(Clone, Debug, PartialEq)]
pub struct ReconnectPolicy {
    pub backoff: Duration,
    /// Upper bound on a single connect attempt.
    pub connect_timeout: Duration,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self {
            backoff: Duration::from_secs(5),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ReconnectPolicy {
    pub fn fixed(backoff: Duration) -> Self {
        Self {
            backoff,
            ..Default::default()
        }
    }

    /// Delay before the next connect after `err`. The same for every attempt.
    pub fn delay_for(&self, err: &FeedError) -> Duration {
        match err {
            FeedError::Connect(_) | FeedError::Stream(_) | FeedError::Closed => self.backoff,
        }
    }
}
