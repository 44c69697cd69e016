use std::time::Duration;

/// Default number of leading bytes fetched for TAR listing and extraction.
pub const DEFAULT_TAR_PREFIX_BYTES: u64 = 2_000_000;

/// Default number of leading bytes fetched when gunzipping a single-file `.gz`.
pub const DEFAULT_GZIP_WINDOW_BYTES: u64 = 2_000_000;

/// Bytes fetched to decode a gzip member header (enough for a long `FNAME`).
pub const DEFAULT_GZIP_HEADER_BYTES: u64 = 1024;

/// Network limits applied by the archive services.
///
/// TAR and GZIP carry no index, so everything they can see is bounded by a
/// fetched prefix. Members beginning past the prefix are invisible.
#[derive(Debug, Clone)]
pub struct FetchPolicy {
    pub tar_prefix_bytes: u64,
    pub gzip_window_bytes: u64,
    pub gzip_header_bytes: u64,
    /// Per-request timeout for the HTTP source.
    pub timeout: Duration,
    /// Retries for transient transport failures. Zero disables retrying.
    pub max_retries: u32,
}

impl Default for FetchPolicy {
    fn default() -> Self {
        Self {
            tar_prefix_bytes: DEFAULT_TAR_PREFIX_BYTES,
            gzip_window_bytes: DEFAULT_GZIP_WINDOW_BYTES,
            gzip_header_bytes: DEFAULT_GZIP_HEADER_BYTES,
            timeout: Duration::from_secs(30),
            max_retries: 0,
        }
    }
}
