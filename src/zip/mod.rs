//! ZIP archive indexing and single-entry extraction over range reads.
//!
//! ## Architecture
//!
//! - [`structures`]: binary records (EOCD, ZIP64 trailer, headers) and the entry descriptor
//! - [`index`]: [`ZipIndexReader`], which finds and decodes the central directory
//! - [`opener`]: [`ZipEntryOpener`], which resolves a local header and streams one entry
//!
//! ## Supported Features
//!
//! - Archive comments up to the format maximum
//! - ZIP64 extra fields and the ZIP64 end of central directory
//! - STORED and DEFLATE entries
//!
//! ## Limitations
//!
//! - No encryption support
//! - No multi-disk archive support
//! - CRC32 is recorded but not checked

pub mod index;
pub mod opener;
mod structures;

pub use index::{ZipIndexReader, find_eocd, parse_entries};
pub use opener::ZipEntryOpener;
pub use structures::*;
