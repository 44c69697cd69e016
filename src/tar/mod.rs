//! TAR and TAR.GZ listing from a bounded leading window.
//!
//! TAR has no index, so members are discovered by walking headers from the
//! start of the archive. Only the first `prefix_bytes` of the object are ever
//! fetched; members past that window are invisible.

mod header;
pub mod prefix;

pub use header::{BLOCK_SIZE, EntryKind};
pub use prefix::{TarEntries, TarEntry, TarMember, TarPrefix, TarPrefixReader};
