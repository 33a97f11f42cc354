//! Poll-until-ready waits.
//!
//! Hardware gives no notifications, so readiness is observed by re-running
//! a probe at a fixed period. With a timeout the wait ends no earlier than
//! the timeout and no later than one period after it, even when a probe
//! hangs.

use std::future::Future;
use std::time::Duration;

use tokio::time::Instant;

use crate::errors::{ProvisionError, ProvisionResult};

/// How often a still-pending wait reports progress at info level.
const PROGRESS_EVERY: Duration = Duration::from_secs(30);

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Readiness<T> {
    Ready(T),
    TimedOut { waited: Duration },
}

#[derive(Debug, Clone, Copy)]
pub struct Poller {
    interval: Duration,
    timeout: Option<Duration>,
}

impl Poller {
    /// Wait indefinitely, probing every `interval`.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Probe until it yields a value or the timeout passes.
    ///
    /// A probe returning `Err` aborts the wait immediately.
    pub async fn wait_until<T, F, Fut>(&self, what: &str, mut probe: F) -> ProvisionResult<Readiness<T>>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProvisionResult<Option<T>>>,
    {
        let start = Instant::now();
        let mut last_report = start;
        tracing::info!("Waiting for {}...", what);

        // A hung probe must not stretch the wait past timeout plus one period.
        let deadline = self.timeout.map(|t| start + t + self.interval);

        loop {
            let probed = match deadline {
                Some(deadline) => match tokio::time::timeout_at(deadline, probe()).await {
                    Ok(probed) => probed?,
                    Err(_) => {
                        let elapsed = start.elapsed();
                        tracing::warn!(
                            elapsed_s = elapsed.as_secs(),
                            "Gave up waiting for {}; probe did not return",
                            what
                        );
                        return Ok(Readiness::TimedOut { waited: elapsed });
                    }
                },
                None => probe().await?,
            };
            if let Some(value) = probed {
                tracing::info!(elapsed_s = start.elapsed().as_secs(), "Detected {}", what);
                return Ok(Readiness::Ready(value));
            }

            let elapsed = start.elapsed();
            if let Some(timeout) = self.timeout
                && elapsed >= timeout
            {
                tracing::warn!(elapsed_s = elapsed.as_secs(), "Gave up waiting for {}", what);
                return Ok(Readiness::TimedOut { waited: elapsed });
            }

            if last_report.elapsed() >= PROGRESS_EVERY {
                tracing::info!(elapsed_s = elapsed.as_secs(), "Still waiting for {}", what);
                last_report = Instant::now();
            }

            tokio::time::sleep(self.interval).await;
        }
    }

    /// Like [`Poller::wait_until`], with a timeout turned into
    /// [`ProvisionError::Timeout`].
    pub async fn require<T, F, Fut>(&self, what: &str, probe: F) -> ProvisionResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProvisionResult<Option<T>>>,
    {
        match self.wait_until(what, probe).await? {
            Readiness::Ready(value) => Ok(value),
            Readiness::TimedOut { waited } => Err(ProvisionError::Timeout {
                what: what.to_string(),
                after: self.timeout.unwrap_or(waited),
            }),
        }
    }

    /// Wait for a boolean readiness predicate.
    pub async fn require_true<F, Fut>(&self, what: &str, mut predicate: F) -> ProvisionResult<()>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = ProvisionResult<bool>>,
    {
        self.require(what, || {
            let check = predicate();
            async move { Ok(check.await?.then_some(())) }
        })
        .await
    }
}
