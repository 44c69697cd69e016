use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{ACCEPT_RANGES, CONTENT_LENGTH, CONTENT_RANGE, HeaderMap, RANGE};
use reqwest::{Client, StatusCode, Url};
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use super::{RangeSource, RemoteObject};
use crate::error::{Error, FetchCause, Result};

/// HTTP Range source for a single remote URL
pub struct HttpRangeSource {
    client: Client,
    url: String,
    transferred_bytes: AtomicU64,
}

impl HttpRangeSource {
    /// Create a source with its own client using the given request timeout.
    pub fn new(url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(std::io::Error::other)?;
        Ok(Self::with_client(client, url))
    }

    /// Create a source sharing an existing client.
    pub fn with_client(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
            transferred_bytes: AtomicU64::new(0),
        }
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    /// Get total body bytes received from the network
    pub fn transferred_bytes(&self) -> u64 {
        self.transferred_bytes.load(Ordering::Relaxed)
    }

    /// Size probe through `Range: bytes=0-0`, for servers that refuse HEAD or
    /// omit Content-Length there.
    async fn probe_with_range(&self) -> Result<(Option<u64>, bool)> {
        let resp = self
            .client
            .get(&self.url)
            .header(RANGE, "bytes=0-0")
            .send()
            .await
            .map_err(|e| Error::fetch(0, 1, e))?;

        let status = resp.status();
        match status {
            StatusCode::PARTIAL_CONTENT | StatusCode::RANGE_NOT_SATISFIABLE => {
                let total = header_str(resp.headers(), CONTENT_RANGE).and_then(content_range_total);
                Ok((total, true))
            }
            // The server ignored the range; the full length is in Content-Length.
            // Dropping the response abandons the body without reading it.
            s if s.is_success() => Ok((content_length(resp.headers()), false)),
            s => Err(Error::fetch(0, 1, FetchCause::Status(s))),
        }
    }

    fn host(&self) -> String {
        Url::parse(&self.url)
            .ok()
            .and_then(|u| u.host_str().map(str::to_string))
            .unwrap_or_else(|| self.url.clone())
    }
}

#[async_trait]
impl RangeSource for HttpRangeSource {
    async fn probe_size(&self) -> Result<RemoteObject> {
        debug!("HEAD {}", self.url);

        let mut total_size = None;
        let mut accepts_ranges = false;

        match self.client.head(&self.url).send().await {
            Ok(resp) if resp.status().is_success() => {
                accepts_ranges = header_str(resp.headers(), ACCEPT_RANGES)
                    .is_some_and(|v| v.split(',').any(|unit| unit.trim() == "bytes"));
                // A zero length on HEAD is as good as no answer for an archive.
                total_size = content_length(resp.headers()).filter(|&n| n > 0);
            }
            Ok(resp) => debug!("HEAD {} returned {}", self.url, resp.status()),
            Err(e) => debug!("HEAD {} failed: {}", self.url, e),
        }

        if total_size.is_none() {
            let (total, ranged) = self.probe_with_range().await?;
            total_size = total;
            accepts_ranges |= ranged;
        }

        if !accepts_ranges {
            warn!(
                "{} does not support byte ranges. Proceeding anyway...",
                self.host()
            );
        }

        debug!("{}: size={:?} ranges={}", self.url, total_size, accepts_ranges);

        Ok(RemoteObject {
            url: self.url.clone(),
            total_size,
            accepts_ranges,
        })
    }

    async fn fetch_range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 {
            return Ok(Vec::new());
        }

        let end = start
            .checked_add(length - 1)
            .ok_or_else(|| Error::malformed(format!("range {start}+{length} overflows")))?;
        debug!("GET {} bytes={}-{}", self.url, start, end);

        let resp = self
            .client
            .get(&self.url)
            .header(RANGE, format!("bytes={start}-{end}"))
            .send()
            .await
            .map_err(|e| Error::fetch(start, length, e))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(Error::fetch(start, length, FetchCause::Status(status)));
        }

        // A 206 for some other range would pass every later length check.
        if status == StatusCode::PARTIAL_CONTENT {
            let served = header_str(resp.headers(), CONTENT_RANGE).and_then(content_range_start);
            if let Some(served) = served.filter(|&s| s != start) {
                return Err(Error::fetch(
                    start,
                    length,
                    FetchCause::RangeMismatch {
                        requested: start,
                        served,
                    },
                ));
            }
        }

        let body = resp
            .bytes()
            .await
            .map_err(|e| Error::fetch(start, length, e))?;
        self.transferred_bytes
            .fetch_add(body.len() as u64, Ordering::Relaxed);

        let data = if status == StatusCode::PARTIAL_CONTENT {
            let keep = body.len().min(length as usize);
            body[..keep].to_vec()
        } else {
            // 200 means the whole object came back; cut our range out of it.
            debug!("{} ignored the Range header", self.url);
            let from = (start as usize).min(body.len());
            let to = from.saturating_add(length as usize).min(body.len());
            body[from..to].to_vec()
        };

        Ok(data)
    }

    fn name(&self) -> &str {
        &self.url
    }
}

fn header_str(headers: &HeaderMap, name: reqwest::header::HeaderName) -> Option<&str> {
    headers.get(name).and_then(|v| v.to_str().ok())
}

fn content_length(headers: &HeaderMap) -> Option<u64> {
    header_str(headers, CONTENT_LENGTH).and_then(|s| s.trim().parse().ok())
}

/// First byte position from `Content-Range: bytes 100-199/1234`.
fn content_range_start(value: &str) -> Option<u64> {
    let spec = value.trim().strip_prefix("bytes")?.trim_start();
    let (start, _) = spec.split_once('-')?;
    start.trim().parse().ok()
}

/// Total length from `Content-Range: bytes 0-0/1234` or `bytes */1234`.
fn content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.rsplit_once('/')?;
    total.trim().parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_range_totals() {
        assert_eq!(content_range_total("bytes 0-0/10000"), Some(10000));
        assert_eq!(content_range_total("bytes */512"), Some(512));
        assert_eq!(content_range_total("bytes 0-0/*"), None);
        assert_eq!(content_range_total("garbage"), None);
    }

    #[test]
    fn parses_content_range_starts() {
        assert_eq!(content_range_start("bytes 100-199/1234"), Some(100));
        assert_eq!(content_range_start("bytes 0-0/*"), Some(0));
        assert_eq!(content_range_start("bytes */512"), None);
        assert_eq!(content_range_start("items 1-2/3"), None);
    }
}
