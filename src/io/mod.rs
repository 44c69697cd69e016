mod http;
mod local;
mod memory;
mod retry;

pub use http::HttpRangeSource;
pub use local::LocalFileSource;
pub use memory::MemorySource;
pub use retry::RetryingSource;

use async_trait::async_trait;

use crate::error::Result;

/// What a size probe learned about the remote object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteObject {
    pub url: String,
    /// Declared total length, `None` when the server would not say.
    pub total_size: Option<u64>,
    /// Whether the server advertised `Accept-Ranges: bytes`.
    pub accepts_ranges: bool,
}

/// Random access to a byte source by range.
///
/// There is no caching here: fetching the same range twice costs two round
/// trips. Callers that revisit data keep their own copy.
#[async_trait]
pub trait RangeSource: Send + Sync {
    /// Establish the total size and range support of the object.
    async fn probe_size(&self) -> Result<RemoteObject>;

    /// Fetch `length` bytes starting at `start`.
    ///
    /// The returned buffer may be shorter than `length` when the object ends
    /// first; callers that require an exact length check it themselves.
    async fn fetch_range(&self, start: u64, length: u64) -> Result<Vec<u8>>;

    /// Name used for archive-kind sniffing and log lines.
    fn name(&self) -> &str;
}

