use byteorder::{LittleEndian, ReadBytesExt};
use std::io::Cursor;
use std::path::Path;

use crate::error::{Error, Result};

/// Value of a saturated 32-bit size or offset field.
pub const ZIP64_SENTINEL: u32 = 0xFFFF_FFFF;

/// Extra-field header ID of the Zip64 extended information block.
pub const ZIP64_EXTRA_ID: u16 = 0x0001;

/// ZIP compression methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    Stored,
    Deflate,
    Unknown(u16),
}

impl CompressionMethod {
    pub fn from_u16(value: u16) -> Self {
        match value {
            0 => CompressionMethod::Stored,
            8 => CompressionMethod::Deflate,
            _ => CompressionMethod::Unknown(value),
        }
    }
}

/// End of Central Directory (EOCD) - 22 bytes minimum
#[derive(Debug, Clone)]
pub struct EndOfCentralDirectory {
    pub total_entries: u16,
    pub cd_size: u32,
    pub cd_offset: u32,
    pub comment_len: u16,
}

impl EndOfCentralDirectory {
    pub const SIGNATURE: &'static [u8] = b"PK\x05\x06";
    pub const SIZE: usize = 22;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::malformed("invalid end of central directory record"));
        }

        // Skip the signature and the two disk-number fields.
        let mut cursor = Cursor::new(&data[8..Self::SIZE]);
        let _disk_entries = cursor.read_u16::<LittleEndian>()?;

        Ok(Self {
            total_entries: cursor.read_u16::<LittleEndian>()?,
            cd_size: cursor.read_u32::<LittleEndian>()?,
            cd_offset: cursor.read_u32::<LittleEndian>()?,
            comment_len: cursor.read_u16::<LittleEndian>()?,
        })
    }

    /// The central directory size or offset did not fit in 32 bits.
    pub fn needs_zip64(&self) -> bool {
        self.cd_size == ZIP64_SENTINEL || self.cd_offset == ZIP64_SENTINEL
    }
}

/// ZIP64 End of Central Directory Locator - 20 bytes
#[derive(Debug, Clone)]
pub struct Zip64EocdLocator {
    pub eocd64_offset: u64,
}

impl Zip64EocdLocator {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x07";
    pub const SIZE: usize = 20;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::malformed("invalid ZIP64 end of central directory locator"));
        }

        let mut cursor = Cursor::new(&data[8..16]);
        Ok(Self {
            eocd64_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// ZIP64 End of Central Directory - 56 bytes minimum
#[derive(Debug, Clone)]
pub struct Zip64Eocd {
    pub total_entries: u64,
    pub cd_size: u64,
    pub cd_offset: u64,
}

impl Zip64Eocd {
    pub const SIGNATURE: &'static [u8] = b"PK\x06\x06";
    pub const MIN_SIZE: usize = 56;

    pub fn from_bytes(data: &[u8]) -> Result<Self> {
        if data.len() < Self::MIN_SIZE || &data[0..4] != Self::SIGNATURE {
            return Err(Error::malformed("invalid ZIP64 end of central directory record"));
        }

        // Fields before offset 32 (record size, versions, disk numbers,
        // entries on this disk) are not needed.
        let mut cursor = Cursor::new(&data[32..Self::MIN_SIZE]);
        Ok(Self {
            total_entries: cursor.read_u64::<LittleEndian>()?,
            cd_size: cursor.read_u64::<LittleEndian>()?,
            cd_offset: cursor.read_u64::<LittleEndian>()?,
        })
    }
}

/// Central Directory File Header (CDFH) - 46 bytes minimum
pub const CDFH_SIGNATURE: &[u8] = b"PK\x01\x02";
pub const CDFH_SIZE: usize = 46;

/// Local File Header (LFH) - 30 bytes
pub const LFH_SIGNATURE: &[u8] = b"PK\x03\x04";
pub const LFH_SIZE: usize = 30;

/// Calendar fields of a packed MS-DOS date/time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DosDateTime {
    pub year: u16,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl DosDateTime {
    /// Decode the 32-bit value found at offset 12 of a central directory
    /// record: time in the low half, date in the high half.
    ///
    /// From the low bit upward the groups are 5, 6, 5, 5, 4 and 7 bits wide:
    /// seconds/2, minutes, hours, day, month and years since 1980.
    pub fn from_packed(value: u32) -> Self {
        let mut rest = value;
        let mut take = |bits: u32| {
            let field = rest & ((1 << bits) - 1);
            rest >>= bits;
            field
        };

        let half_seconds = take(5);
        let minute = take(6);
        let hour = take(5);
        let day = take(5);
        let month = take(4);
        let year = take(7);

        Self {
            year: year as u16 + 1980,
            month: month as u8,
            day: day as u8,
            hour: hour as u8,
            minute: minute as u8,
            second: (half_seconds * 2) as u8,
        }
    }

    /// `[year, month, day, hour, minute, second]`
    pub fn to_array(&self) -> [u16; 6] {
        [
            self.year,
            self.month as u16,
            self.day as u16,
            self.hour as u16,
            self.minute as u16,
            self.second as u16,
        ]
    }
}

/// One member as described by the central directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ZipEntry {
    pub filename: String,
    pub is_directory: bool,
    /// Absolute offset of the local file header, Zip64-resolved.
    pub header_offset: u64,
    pub compression_method: CompressionMethod,
    pub compressed_size: u64,
    pub uncompressed_size: u64,
    /// Recorded checksum; never verified.
    pub crc32: u32,
    pub modified: DosDateTime,
}

impl ZipEntry {
    /// File extension without the dot, if any.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.filename).extension().and_then(|e| e.to_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_packed_dos_timestamp() {
        // 2023-06-15 13:45:30
        let date: u32 = ((2023 - 1980) << 9) | (6 << 5) | 15;
        let time: u32 = (13 << 11) | (45 << 5) | (30 / 2);
        let dt = DosDateTime::from_packed(date << 16 | time);

        assert_eq!(dt.to_array(), [2023, 6, 15, 13, 45, 30]);
    }

    #[test]
    fn zero_timestamp_is_1980() {
        assert_eq!(DosDateTime::from_packed(0).to_array(), [1980, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn eocd_detects_saturated_fields() {
        let mut rec = Vec::new();
        rec.extend_from_slice(EndOfCentralDirectory::SIGNATURE);
        rec.extend_from_slice(&[0; 4]);
        rec.extend_from_slice(&1u16.to_le_bytes());
        rec.extend_from_slice(&1u16.to_le_bytes());
        rec.extend_from_slice(&ZIP64_SENTINEL.to_le_bytes());
        rec.extend_from_slice(&100u32.to_le_bytes());
        rec.extend_from_slice(&0u16.to_le_bytes());

        let eocd = EndOfCentralDirectory::from_bytes(&rec).unwrap();
        assert_eq!(eocd.total_entries, 1);
        assert_eq!(eocd.cd_offset, 100);
        assert!(eocd.needs_zip64());
    }

    #[test]
    fn rejects_bad_signature() {
        let rec = [0u8; EndOfCentralDirectory::SIZE];
        assert!(matches!(
            EndOfCentralDirectory::from_bytes(&rec),
            Err(Error::Malformed { .. })
        ));
    }

    #[test]
    fn extension_of_nested_path() {
        let entry = ZipEntry {
            filename: "docs/readme.md".into(),
            is_directory: false,
            header_offset: 0,
            compression_method: CompressionMethod::Stored,
            compressed_size: 0,
            uncompressed_size: 0,
            crc32: 0,
            modified: DosDateTime::default(),
        };
        assert_eq!(entry.extension(), Some("md"));
    }
}
