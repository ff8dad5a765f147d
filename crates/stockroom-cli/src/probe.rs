//! Backend reachability probe feeding the connectivity signal.

use std::time::Duration;

use stockroom_core::connectivity::ConnectivitySignal;

use crate::error::CliError;

/// Periodically checks whether the backend answers HTTP at all.
///
/// Any response, error statuses included, counts as reachable; only
/// transport failures (DNS, refused connection, timeout) count as offline.
#[derive(Debug, Clone)]
pub struct ReachabilityProbe {
    client: reqwest::Client,
    url: String,
    interval: Duration,
}

impl ReachabilityProbe {
    pub fn new(
        url: impl Into<String>,
        interval: Duration,
        timeout: Duration,
    ) -> Result<Self, CliError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            url: url.into(),
            interval,
        })
    }

    pub async fn check(&self) -> bool {
        match self.client.head(&self.url).send().await {
            Ok(response) => {
                tracing::debug!("Backend answered probe with {}", response.status());
                true
            }
            Err(error) => {
                tracing::debug!("Backend probe failed: {error}");
                false
            }
        }
    }

    /// Update `signal` after every check; never returns
    pub async fn run(&self, signal: &ConnectivitySignal) {
        let mut ticker = tokio::time::interval(self.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            signal.set_online(self.check().await);
        }
    }
}
