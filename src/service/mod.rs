//! One façade per archive kind.
//!
//! The kind is chosen up front, either from the object's name or explicitly,
//! and [`open_service`] maps it to its implementation with a plain `match`.
//! Every supported kind is listed in [`ArchiveKind::ALL`].

mod gzip;
mod tar;
mod zip;

pub use self::gzip::{GzipEntry, GzipService};
pub use self::tar::TarService;
pub use self::zip::ZipService;

use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use crate::config::FetchPolicy;
use crate::error::{Error, Result};
use crate::io::RangeSource;
use crate::stream::EntryStream;
use crate::tar::TarEntry;
use crate::zip::ZipEntry;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArchiveKind {
    Zip,
    Tar,
    TarGz,
    Gzip,
}

impl ArchiveKind {
    pub const ALL: [ArchiveKind; 4] = [
        ArchiveKind::Zip,
        ArchiveKind::Tar,
        ArchiveKind::TarGz,
        ArchiveKind::Gzip,
    ];

    /// Infer the kind from a URL or path suffix, ignoring any query string.
    pub fn from_name(name: &str) -> Option<Self> {
        let path = name.split(['?', '#']).next().unwrap_or(name);
        let path = path.to_ascii_lowercase();

        if path.ends_with(".tar.gz") || path.ends_with(".tgz") {
            Some(ArchiveKind::TarGz)
        } else if path.ends_with(".tar") {
            Some(ArchiveKind::Tar)
        } else if path.ends_with(".zip") {
            Some(ArchiveKind::Zip)
        } else if path.ends_with(".gz") {
            Some(ArchiveKind::Gzip)
        } else {
            None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ArchiveKind::Zip => "zip",
            ArchiveKind::Tar => "tar",
            ArchiveKind::TarGz => "tar.gz",
            ArchiveKind::Gzip => "gz",
        }
    }
}

impl fmt::Display for ArchiveKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ArchiveKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "zip" => Ok(ArchiveKind::Zip),
            "tar" => Ok(ArchiveKind::Tar),
            "tar.gz" | "tgz" => Ok(ArchiveKind::TarGz),
            "gz" | "gzip" => Ok(ArchiveKind::Gzip),
            _ => Err(Error::UnsupportedArchive {
                name: s.to_string(),
            }),
        }
    }
}

/// An entry as returned by [`ArchiveService::list_files`].
///
/// Only hand a descriptor back to the service that produced it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryDescriptor {
    Zip(ZipEntry),
    Tar(TarEntry),
    Gzip(GzipEntry),
}

impl EntryDescriptor {
    pub fn filename(&self) -> &str {
        match self {
            EntryDescriptor::Zip(e) => &e.filename,
            EntryDescriptor::Tar(e) => &e.filename,
            EntryDescriptor::Gzip(e) => &e.filename,
        }
    }

    /// Decompressed size, when the archive records it.
    pub fn size(&self) -> Option<u64> {
        match self {
            EntryDescriptor::Zip(e) => Some(e.uncompressed_size),
            EntryDescriptor::Tar(e) => Some(e.size),
            EntryDescriptor::Gzip(e) => e.uncompressed_size,
        }
    }

    pub fn is_directory(&self) -> bool {
        match self {
            EntryDescriptor::Zip(e) => e.is_directory,
            EntryDescriptor::Tar(e) => e.is_directory,
            EntryDescriptor::Gzip(_) => false,
        }
    }

    /// Lower-cased extension of the entry name, if any.
    pub fn extension(&self) -> Option<String> {
        Path::new(self.filename())
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
    }
}

/// Uniform listing and extraction over one archive.
#[async_trait]
pub trait ArchiveService: Send + Sync {
    fn kind(&self) -> ArchiveKind;

    /// Entries in archive order.
    async fn list_files(&self) -> Result<Vec<EntryDescriptor>>;

    /// Open one entry previously returned by [`list_files`](Self::list_files).
    async fn extract_file(&self, entry: &EntryDescriptor) -> Result<EntryStream>;
}

/// Build the service for `kind` over `source`.
pub fn open_service<R: RangeSource + 'static>(
    kind: ArchiveKind,
    source: Arc<R>,
    policy: &FetchPolicy,
) -> Box<dyn ArchiveService> {
    match kind {
        ArchiveKind::Zip => Box::new(ZipService::new(source)),
        ArchiveKind::Tar => Box::new(TarService::new(source, policy.tar_prefix_bytes, false)),
        ArchiveKind::TarGz => Box::new(TarService::new(source, policy.tar_prefix_bytes, true)),
        ArchiveKind::Gzip => Box::new(GzipService::new(source, policy)),
    }
}
