use async_trait::async_trait;
use log::warn;
use std::time::Duration;

use super::{RangeSource, RemoteObject};
use crate::error::{Error, Result};

/// Retries transient fetch failures of the wrapped source with linear back-off.
///
/// Status failures (404, 416, ...) are returned immediately.
pub struct RetryingSource<S> {
    inner: S,
    max_retry: u32,
    backoff: Duration,
}

impl<S: RangeSource> RetryingSource<S> {
    pub fn new(inner: S, max_retry: u32) -> Self {
        Self {
            inner,
            max_retry,
            backoff: Duration::from_millis(500),
        }
    }

    /// Base delay; attempt `n` waits `n * backoff`.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RangeSource> RangeSource for RetryingSource<S> {
    async fn probe_size(&self) -> Result<RemoteObject> {
        self.inner.probe_size().await
    }

    async fn fetch_range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        let mut retry_count = 0;
        loop {
            match self.inner.fetch_range(start, length).await {
                Err(Error::FetchFailed { cause, .. })
                    if cause.is_transient() && retry_count < self.max_retry =>
                {
                    retry_count += 1;
                    warn!(
                        "Connection error, retry {}/{}: {}",
                        retry_count, self.max_retry, cause
                    );
                    tokio::time::sleep(self.backoff * retry_count).await;
                }
                other => return other,
            }
        }
    }

    fn name(&self) -> &str {
        self.inner.name()
    }
}
