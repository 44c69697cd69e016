use std::io;

use reqwest::StatusCode;

/// Why a single range request failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchCause {
    #[error("unexpected HTTP status {0}")]
    Status(StatusCode),

    #[error(transparent)]
    Transport(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] io::Error),

    #[error("server answered with a range starting at {served} instead of {requested}")]
    RangeMismatch { requested: u64, served: u64 },
}

impl FetchCause {
    /// Timeouts and refused connections are worth another attempt; statuses are not.
    pub fn is_transient(&self) -> bool {
        match self {
            FetchCause::Transport(e) => e.is_timeout() || e.is_connect(),
            FetchCause::Io(e) => matches!(
                e.kind(),
                io::ErrorKind::Interrupted | io::ErrorKind::TimedOut
            ),
            FetchCause::Status(_) | FetchCause::RangeMismatch { .. } => false,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("failed to fetch {length} bytes at offset {start}: {cause}")]
    FetchFailed {
        start: u64,
        length: u64,
        #[source]
        cause: FetchCause,
    },

    #[error("cannot find the end of central directory record; not a ZIP archive")]
    CentralDirectoryNotFound,

    #[error("entry data size mismatch: expected {expected} bytes, got {actual}")]
    DataSizeMismatch { expected: u64, actual: u64 },

    #[error("unsupported compression method: {method}")]
    UnsupportedCompressionMethod { method: u16 },

    #[error("entry '{filename}' not found in the archive")]
    EntryNotFound { filename: String },

    #[error("malformed archive: {reason}")]
    Malformed { reason: String },

    #[error("remote object size is unknown")]
    SizeUnknown,

    #[error("descriptor does not belong to a {expected} archive")]
    DescriptorMismatch { expected: &'static str },

    #[error("cannot infer archive kind from '{name}'")]
    UnsupportedArchive { name: String },

    #[error("decompression failed: {0}")]
    Decompress(#[source] io::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}

impl Error {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        Error::Malformed {
            reason: reason.into(),
        }
    }

    pub(crate) fn fetch(start: u64, length: u64, cause: impl Into<FetchCause>) -> Self {
        Error::FetchFailed {
            start,
            length,
            cause: cause.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_failures_are_not_transient() {
        let cause = FetchCause::Status(StatusCode::NOT_FOUND);
        assert!(!cause.is_transient());

        let err = Error::fetch(10, 20, cause);
        assert_eq!(
            err.to_string(),
            "failed to fetch 20 bytes at offset 10: unexpected HTTP status 404 Not Found"
        );
    }

    #[test]
    fn timed_out_io_is_transient() {
        let cause = FetchCause::Io(io::Error::new(io::ErrorKind::TimedOut, "slow disk"));
        assert!(cause.is_transient());
    }
}
