//! Central directory location and decoding.
//!
//! ZIP archives are read from the end:
//! 1. Fetch the tail window and find the End of Central Directory (EOCD)
//! 2. If its size/offset fields are saturated, follow the ZIP64 locator
//! 3. Fetch the central directory in one range request and decode it
//!
//! Only the tail and the directory itself cross the network, which is what
//! makes listing a remote archive cheap.

use byteorder::{LittleEndian, ReadBytesExt};
use log::debug;
use std::io::Cursor;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::io::RangeSource;

use super::structures::*;

/// How far back from the end the EOCD signature is searched for: the EOCD
/// itself plus the largest possible archive comment.
pub const EOCD_SEARCH_WINDOW: u64 = 65536;

/// Reads the central directory of one archive.
///
/// Holds nothing but the source; every [`list_files`](Self::list_files)
/// call re-reads the index.
pub struct ZipIndexReader<R: RangeSource> {
    reader: Arc<R>,
}

impl<R: RangeSource> ZipIndexReader<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self { reader }
    }

    /// Probe the object, then fetch and decode its central directory.
    pub async fn list_files(&self) -> Result<Vec<ZipEntry>> {
        let object = self.reader.probe_size().await?;
        let total_size = object.total_size.ok_or(Error::SizeUnknown)?;

        let cd_data = self.locate_central_directory(total_size).await?;
        let entries = parse_entries(&cd_data)?;
        debug!("{}: {} central directory entries", self.reader.name(), entries.len());

        Ok(entries)
    }

    /// Find the EOCD in the last 64 KiB and fetch the central directory it
    /// points to.
    ///
    /// # Errors
    ///
    /// [`Error::CentralDirectoryNotFound`] when no EOCD signature is present in
    /// the window; a failed tail fetch surfaces as [`Error::FetchFailed`].
    pub async fn locate_central_directory(&self, total_size: u64) -> Result<Vec<u8>> {
        let window_len = EOCD_SEARCH_WINDOW.min(total_size);
        let window_start = total_size - window_len;
        let window = self.reader.fetch_range(window_start, window_len).await?;

        let pos = find_eocd(&window).ok_or(Error::CentralDirectoryNotFound)?;
        let eocd = EndOfCentralDirectory::from_bytes(&window[pos..])?;
        let eocd_offset = window_start + pos as u64;
        debug!(
            "EOCD at {} (entries={}, comment={} bytes)",
            eocd_offset, eocd.total_entries, eocd.comment_len
        );

        let (cd_offset, cd_size) = if eocd.needs_zip64() {
            let eocd64 = self.read_zip64_eocd(&window, pos, eocd_offset).await?;
            debug!("ZIP64 EOCD: entries={}", eocd64.total_entries);
            (eocd64.cd_offset, eocd64.cd_size)
        } else {
            (eocd.cd_offset as u64, eocd.cd_size as u64)
        };

        // Read the entire Central Directory in one request
        let cd_data = self.reader.fetch_range(cd_offset, cd_size).await?;
        if cd_data.len() as u64 != cd_size {
            return Err(Error::malformed(format!(
                "central directory truncated: expected {} bytes at {}, got {}",
                cd_size,
                cd_offset,
                cd_data.len()
            )));
        }

        Ok(cd_data)
    }

    /// Follow the ZIP64 locator that sits immediately before the EOCD.
    async fn read_zip64_eocd(
        &self,
        window: &[u8],
        eocd_pos: usize,
        eocd_offset: u64,
    ) -> Result<Zip64Eocd> {
        let locator = if eocd_pos >= Zip64EocdLocator::SIZE {
            Zip64EocdLocator::from_bytes(&window[eocd_pos - Zip64EocdLocator::SIZE..eocd_pos])?
        } else {
            let locator_offset = eocd_offset
                .checked_sub(Zip64EocdLocator::SIZE as u64)
                .ok_or_else(|| Error::malformed("no room for a ZIP64 locator"))?;
            let buf = self
                .reader
                .fetch_range(locator_offset, Zip64EocdLocator::SIZE as u64)
                .await?;
            Zip64EocdLocator::from_bytes(&buf)?
        };

        let buf = self
            .reader
            .fetch_range(locator.eocd64_offset, Zip64Eocd::MIN_SIZE as u64)
            .await?;
        Zip64Eocd::from_bytes(&buf)
    }
}

/// Position of the last EOCD signature that still has room for a full record
/// after it.
pub fn find_eocd(window: &[u8]) -> Option<usize> {
    let last = window.len().checked_sub(EndOfCentralDirectory::SIZE)?;
    (0..=last)
        .rev()
        .find(|&i| &window[i..i + 4] == EndOfCentralDirectory::SIGNATURE)
}

/// Decode every central directory record in `cd_data`, in order.
///
/// Records must tile the buffer exactly: one that runs past the end is an
/// error rather than a silently dropped entry.
pub fn parse_entries(cd_data: &[u8]) -> Result<Vec<ZipEntry>> {
    let mut entries = Vec::new();
    let mut offset = 0;

    while offset < cd_data.len() {
        let (entry, consumed) = parse_cdfh(&cd_data[offset..])
            .map_err(|e| match e {
                Error::Malformed { reason } => {
                    Error::malformed(format!("{reason} (record at {offset})"))
                }
                other => other,
            })?;
        entries.push(entry);
        offset += consumed;
    }

    Ok(entries)
}

/// Parse one Central Directory File Header, returning the entry and the
/// number of bytes the record occupies.
fn parse_cdfh(rec: &[u8]) -> Result<(ZipEntry, usize)> {
    if rec.len() < CDFH_SIZE {
        return Err(Error::malformed("truncated central directory record"));
    }
    if &rec[0..4] != CDFH_SIGNATURE {
        return Err(Error::malformed("invalid central directory file header"));
    }

    let mut cursor = Cursor::new(&rec[..CDFH_SIZE]);
    cursor.set_position(10);
    let compression_method = cursor.read_u16::<LittleEndian>()?;
    let packed_date_time = cursor.read_u32::<LittleEndian>()?;
    let crc32 = cursor.read_u32::<LittleEndian>()?;
    let mut compressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let mut uncompressed_size = cursor.read_u32::<LittleEndian>()? as u64;
    let file_name_length = cursor.read_u16::<LittleEndian>()? as usize;
    let extra_field_length = cursor.read_u16::<LittleEndian>()? as usize;
    let file_comment_length = cursor.read_u16::<LittleEndian>()? as usize;
    cursor.set_position(42);
    let mut header_offset = cursor.read_u32::<LittleEndian>()? as u64;

    let record_len = CDFH_SIZE + file_name_length + extra_field_length + file_comment_length;
    if rec.len() < record_len {
        return Err(Error::malformed("central directory record overruns the directory"));
    }

    let name_end = CDFH_SIZE + file_name_length;
    let file_name = String::from_utf8_lossy(&rec[CDFH_SIZE..name_end]).into_owned();
    let extra = &rec[name_end..name_end + extra_field_length];

    resolve_zip64(
        extra,
        &mut uncompressed_size,
        &mut compressed_size,
        &mut header_offset,
    )?;

    let entry = ZipEntry {
        is_directory: file_name.ends_with('/'),
        filename: file_name,
        header_offset,
        compression_method: CompressionMethod::from_u16(compression_method),
        compressed_size,
        uncompressed_size,
        crc32,
        modified: DosDateTime::from_packed(packed_date_time),
    };

    Ok((entry, record_len))
}

/// Replace saturated 32-bit fields with their values from the Zip64 extra block.
///
/// The block stores only the saturated fields, 8 bytes each, in the order
/// uncompressed size, compressed size, local header offset.
fn resolve_zip64(
    extra: &[u8],
    uncompressed_size: &mut u64,
    compressed_size: &mut u64,
    header_offset: &mut u64,
) -> Result<()> {
    let sentinel = ZIP64_SENTINEL as u64;
    let mut fields: Vec<&mut u64> = [uncompressed_size, compressed_size, header_offset]
        .into_iter()
        .filter(|v| **v == sentinel)
        .collect();
    if fields.is_empty() {
        return Ok(());
    }

    let mut pos = 0;
    while pos + 4 <= extra.len() {
        let mut cursor = Cursor::new(&extra[pos..pos + 4]);
        let header_id = cursor.read_u16::<LittleEndian>()?;
        let field_size = cursor.read_u16::<LittleEndian>()? as usize;
        let data_start = pos + 4;
        let data_end = data_start + field_size;
        if data_end > extra.len() {
            break;
        }

        if header_id == ZIP64_EXTRA_ID {
            if field_size < fields.len() * 8 {
                return Err(Error::malformed(format!(
                    "ZIP64 extra field holds {} bytes, {} needed",
                    field_size,
                    fields.len() * 8
                )));
            }
            let mut cursor = Cursor::new(&extra[data_start..data_end]);
            for field in fields.iter_mut() {
                **field = cursor.read_u64::<LittleEndian>()?;
            }
            return Ok(());
        }

        pos = data_end;
    }

    Err(Error::malformed("saturated size or offset without a ZIP64 extra field"))
}
