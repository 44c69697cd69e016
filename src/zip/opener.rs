use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::RangeSource;
use crate::stream::EntryStream;

use super::structures::{CompressionMethod, LFH_SIGNATURE, LFH_SIZE, ZipEntry};

/// Opens single members of a ZIP archive by their central directory entry.
pub struct ZipEntryOpener<R: RangeSource> {
    reader: Arc<R>,
}

impl<R: RangeSource> ZipEntryOpener<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    /// Fetch the member's payload and wrap it in a decompressing stream.
    ///
    /// Two range requests: the fixed local header, then exactly
    /// `compressed_size` bytes of data.
    pub async fn open(&self, entry: &ZipEntry) -> Result<EntryStream> {
        let data_offset = self.data_offset(entry).await?;

        let data = self
            .reader
            .fetch_range(data_offset, entry.compressed_size)
            .await?;
        if entry.compressed_size > 0 && data.len() as u64 != entry.compressed_size {
            return Err(Error::DataSizeMismatch {
                expected: entry.compressed_size,
                actual: data.len() as u64,
            });
        }

        debug!(
            "{}: {} bytes at {} ({:?})",
            entry.filename,
            data.len(),
            data_offset,
            entry.compression_method
        );

        match entry.compression_method {
            CompressionMethod::Stored => Ok(EntryStream::plain(data)),
            CompressionMethod::Deflate => Ok(EntryStream::raw_deflate(data)),
            CompressionMethod::Unknown(method) => {
                Err(Error::UnsupportedCompressionMethod { method })
            }
        }
    }

    /// Resolve where the member's data begins.
    ///
    /// The local header's name and extra lengths may differ from the central
    /// directory's, so they are read from the local header itself.
    pub async fn data_offset(&self, entry: &ZipEntry) -> Result<u64> {
        let lfh = self
            .reader
            .fetch_range(entry.header_offset, LFH_SIZE as u64)
            .await?;
        if lfh.len() < LFH_SIZE || &lfh[0..4] != LFH_SIGNATURE {
            return Err(Error::malformed(format!(
                "invalid local file header at {} for '{}'",
                entry.header_offset, entry.filename
            )));
        }

        let mut cursor = Cursor::new(&lfh[26..LFH_SIZE]);
        let file_name_length = cursor.read_u16::<LittleEndian>()? as u64;
        let extra_field_length = cursor.read_u16::<LittleEndian>()? as u64;

        entry
            .header_offset
            .checked_add(LFH_SIZE as u64 + file_name_length + extra_field_length)
            .ok_or_else(|| Error::malformed("local header offset overflows"))
    }
}
