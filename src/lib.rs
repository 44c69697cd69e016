//! # rpeek
//!
//! Look inside remote archives without downloading them.
//!
//! This library lists and extracts single entries of ZIP, TAR, TAR.GZ and
//! GZIP objects served over HTTP, using Range requests to fetch only the bytes
//! that matter: the central directory and one payload for ZIP, a bounded
//! leading window for the formats that have no index. Local files go through
//! the same code path.
//!
//! ## Features
//!
//! - ZIP central directory listing, including ZIP64 archives
//! - STORED and DEFLATE entry extraction
//! - TAR and TAR.GZ listing and extraction within a configurable prefix window
//! - Single-file GZIP with original-name recovery
//! - Static registry of content handlers with observable text fallback
//!
//! ## Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//! use rpeek::{ArchiveKind, FetchPolicy, HttpRangeSource, open_service};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let url = "https://example.com/archive.zip";
//!     let source = Arc::new(HttpRangeSource::new(url, Duration::from_secs(30))?);
//!
//!     let kind = ArchiveKind::from_name(url).unwrap_or(ArchiveKind::Zip);
//!     let service = open_service(kind, source, &FetchPolicy::default());
//!
//!     for entry in service.list_files().await? {
//!         println!("{}", entry.filename());
//!     }
//!
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod config;
pub mod error;
pub mod gzip;
pub mod handler;
pub mod io;
pub mod service;
pub mod stream;
pub mod tar;
pub mod zip;

pub use cli::Cli;
pub use config::FetchPolicy;
pub use error::{Error, FetchCause, Result};
pub use handler::{ContentHandler, ContentKind, HandlerRegistry, Resolution};
pub use io::{HttpRangeSource, LocalFileSource, MemorySource, RangeSource, RemoteObject, RetryingSource};
pub use service::{ArchiveKind, ArchiveService, EntryDescriptor, open_service};
pub use stream::EntryStream;
pub use crate::tar::{TarEntry, TarPrefix, TarPrefixReader};
pub use crate::zip::{ZipEntry, ZipEntryOpener, ZipIndexReader};
