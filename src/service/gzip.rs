use async_trait::async_trait;
use log::{debug, warn};
use std::sync::Arc;

use super::{ArchiveKind, ArchiveService, EntryDescriptor};
use crate::config::FetchPolicy;
use crate::error::{Error, Result};
use crate::gzip::{self, GZIP_MIN_SIZE};
use crate::io::RangeSource;
use crate::stream::EntryStream;

/// The single member of a plain `.gz` object.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipEntry {
    pub filename: String,
    /// Size of the whole object, when the probe established it.
    pub compressed_size: Option<u64>,
    /// `ISIZE` from the trailer: the original size modulo 2^32.
    pub uncompressed_size: Option<u64>,
    pub mtime: u32,
}

/// A gzip file seen as an archive of exactly one entry.
pub struct GzipService<R: RangeSource> {
    reader: Arc<R>,
    header_bytes: u64,
    window_bytes: u64,
}

impl<R: RangeSource> GzipService<R> {
    pub fn new(reader: Arc<R>, policy: &FetchPolicy) -> Self {
        Self {
            reader,
            header_bytes: policy.gzip_header_bytes,
            window_bytes: policy.gzip_window_bytes,
        }
    }

    async fn read_isize(&self, total: u64) -> Result<Option<u64>> {
        if total < GZIP_MIN_SIZE {
            return Ok(None);
        }
        let trailer = self.reader.fetch_range(total - 4, 4).await?;
        Ok(<[u8; 4]>::try_from(trailer.as_slice())
            .ok()
            .map(|b| u32::from_le_bytes(b) as u64))
    }
}

/// Entry name derived from the object name: last path segment without `.gz`.
pub(crate) fn name_from_source(source: &str) -> String {
    let path = source.split(['?', '#']).next().unwrap_or(source);
    let segment = path.rsplit(['/', '\\']).next().unwrap_or(path);
    let stem = segment
        .strip_suffix(".gz")
        .or_else(|| segment.strip_suffix(".GZ"))
        .unwrap_or(segment);

    if stem.is_empty() {
        "unknown".to_string()
    } else {
        stem.to_string()
    }
}

#[async_trait]
impl<R: RangeSource> ArchiveService for GzipService<R> {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Gzip
    }

    async fn list_files(&self) -> Result<Vec<EntryDescriptor>> {
        let object = self.reader.probe_size().await?;
        let header_len = object
            .total_size
            .map_or(self.header_bytes, |total| total.min(self.header_bytes));
        let head = self.reader.fetch_range(0, header_len).await?;
        let header = gzip::parse_header(&head)?;

        let filename = header
            .filename
            .unwrap_or_else(|| name_from_source(self.reader.name()));
        let uncompressed_size = match object.total_size {
            Some(total) => self.read_isize(total).await?,
            None => None,
        };
        debug!("gzip member '{}' (isize={:?})", filename, uncompressed_size);

        Ok(vec![EntryDescriptor::Gzip(GzipEntry {
            filename,
            compressed_size: object.total_size,
            uncompressed_size,
            mtime: header.mtime,
        })])
    }

    async fn extract_file(&self, entry: &EntryDescriptor) -> Result<EntryStream> {
        if !matches!(entry, EntryDescriptor::Gzip(_)) {
            return Err(Error::DescriptorMismatch { expected: "gzip" });
        }

        let object = self.reader.probe_size().await?;
        let window = object
            .total_size
            .map_or(self.window_bytes, |total| total.min(self.window_bytes));
        let raw = self.reader.fetch_range(0, window).await?;

        let truncated = match object.total_size {
            Some(total) => (raw.len() as u64) < total,
            None => raw.len() as u64 >= self.window_bytes,
        };
        if truncated {
            warn!(
                "{}: only the first {} compressed bytes are decoded",
                self.reader.name(),
                raw.len()
            );
        }

        Ok(EntryStream::plain(gzip::gunzip_window(&raw, truncated)?))
    }
}
