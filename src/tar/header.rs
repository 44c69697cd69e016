//! 512-byte TAR header blocks (v7, ustar, GNU) and PAX records.

use crate::error::{Error, Result};

pub const BLOCK_SIZE: usize = 512;

/// Interpretation of the type flag at offset 156.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    HardLink,
    Symlink,
    Directory,
    /// GNU `L`: the body is the name of the next entry.
    GnuLongName,
    /// GNU `K`: the body is the link target of the next entry.
    GnuLongLink,
    /// PAX `x`: records applying to the next entry.
    PaxExtended,
    /// PAX `g`: records applying to the rest of the archive.
    PaxGlobal,
    Other(u8),
}

impl EntryKind {
    pub fn from_flag(flag: u8) -> Self {
        match flag {
            b'0' | b'\0' | b'7' => EntryKind::File,
            b'1' => EntryKind::HardLink,
            b'2' => EntryKind::Symlink,
            b'5' => EntryKind::Directory,
            b'L' => EntryKind::GnuLongName,
            b'K' => EntryKind::GnuLongLink,
            b'x' => EntryKind::PaxExtended,
            b'g' => EntryKind::PaxGlobal,
            other => EntryKind::Other(other),
        }
    }

    /// Metadata records that describe the following header instead of a member.
    pub fn is_metadata(&self) -> bool {
        matches!(
            self,
            EntryKind::GnuLongName
                | EntryKind::GnuLongLink
                | EntryKind::PaxExtended
                | EntryKind::PaxGlobal
        )
    }
}

/// Decoded header block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    pub name: String,
    pub size: u64,
    pub kind: EntryKind,
}

/// An all-zero block marks the end of the archive.
pub fn is_zero_block(block: &[u8]) -> bool {
    block.iter().all(|&b| b == 0)
}

/// Decode one header block, verifying its checksum.
pub fn parse_header(block: &[u8]) -> Result<Header> {
    if block.len() < BLOCK_SIZE {
        return Err(Error::malformed("truncated tar header"));
    }

    let stored = parse_numeric(&block[148..156])?;
    let (unsigned, signed) = checksums(block);
    if stored != unsigned && stored as i64 != signed {
        return Err(Error::malformed(format!(
            "tar header checksum mismatch (stored {stored}, computed {unsigned})"
        )));
    }

    let mut name = cstr(&block[0..100]);
    // POSIX ustar splits long paths into prefix + name. GNU headers reuse
    // the prefix area for other fields, so only trust it under "ustar\0".
    if &block[257..263] == b"ustar\0" {
        let prefix = cstr(&block[345..500]);
        if !prefix.is_empty() {
            name = format!("{prefix}/{name}");
        }
    }

    Ok(Header {
        name,
        size: parse_numeric(&block[124..136])?,
        kind: EntryKind::from_flag(block[156]),
    })
}

/// Sum of the header bytes with the checksum field read as spaces, both as
/// unsigned and (for historic writers) signed bytes.
fn checksums(block: &[u8]) -> (u64, i64) {
    let mut unsigned = 0u64;
    let mut signed = 0i64;
    for (i, &b) in block[..BLOCK_SIZE].iter().enumerate() {
        let b = if (148..156).contains(&i) { b' ' } else { b };
        unsigned += b as u64;
        signed += b as i8 as i64;
    }
    (unsigned, signed)
}

/// Numeric field: NUL/space padded octal, or GNU base-256 when the high bit
/// of the first byte is set.
pub fn parse_numeric(field: &[u8]) -> Result<u64> {
    if field.first().is_some_and(|&b| b & 0x80 != 0) {
        let mut value: u64 = (field[0] & 0x7f) as u64;
        for &b in &field[1..] {
            value = value
                .checked_mul(256)
                .and_then(|v| v.checked_add(b as u64))
                .ok_or_else(|| Error::malformed("tar numeric field overflows 64 bits"))?;
        }
        return Ok(value);
    }

    let text: &[u8] = {
        let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
        let s = &field[..end];
        let start = s.iter().position(|&b| b != b' ').unwrap_or(s.len());
        let stop = s.iter().rposition(|&b| b != b' ').map_or(start, |p| p + 1);
        &s[start..stop.max(start)]
    };
    if text.is_empty() {
        return Ok(0);
    }

    std::str::from_utf8(text)
        .ok()
        .and_then(|s| u64::from_str_radix(s, 8).ok())
        .ok_or_else(|| {
            Error::malformed(format!(
                "invalid octal field {:?}",
                String::from_utf8_lossy(text)
            ))
        })
}

/// NUL-terminated string field.
pub fn cstr(field: &[u8]) -> String {
    let end = field.iter().position(|&b| b == 0).unwrap_or(field.len());
    String::from_utf8_lossy(&field[..end]).into_owned()
}

/// Values from a PAX extended header that override the next header.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PaxOverrides {
    pub path: Option<String>,
    pub size: Option<u64>,
}

/// Parse `"<len> <key>=<value>\n"` records.
pub fn parse_pax(mut data: &[u8]) -> Result<PaxOverrides> {
    let mut overrides = PaxOverrides::default();

    while !data.is_empty() && data[0] != 0 {
        let bad = || Error::malformed("malformed PAX record");

        let space = data.iter().position(|&b| b == b' ').ok_or_else(bad)?;
        let len: usize = std::str::from_utf8(&data[..space])
            .ok()
            .and_then(|s| s.parse().ok())
            .ok_or_else(bad)?;
        if len <= space + 1 || len > data.len() {
            return Err(bad());
        }

        let record = &data[space + 1..len];
        let record = record.strip_suffix(b"\n").unwrap_or(record);
        if let Some(eq) = record.iter().position(|&b| b == b'=') {
            let value = &record[eq + 1..];
            match &record[..eq] {
                b"path" => overrides.path = Some(String::from_utf8_lossy(value).into_owned()),
                b"size" => {
                    overrides.size = std::str::from_utf8(value).ok().and_then(|s| s.parse().ok())
                }
                _ => {}
            }
        }

        data = &data[len..];
    }

    Ok(overrides)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn header(name: &str, size: u64, flag: u8) -> Vec<u8> {
        let mut block = vec![0u8; BLOCK_SIZE];
        block[..name.len()].copy_from_slice(name.as_bytes());
        block[100..107].copy_from_slice(b"0000644");
        block[124..135].copy_from_slice(format!("{size:011o}").as_bytes());
        block[156] = flag;
        block[257..263].copy_from_slice(b"ustar\0");
        block[263..265].copy_from_slice(b"00");
        block[148..156].fill(b' ');
        let sum: u64 = block.iter().map(|&b| b as u64).sum();
        block[148..155].copy_from_slice(format!("{sum:06o}\0").as_bytes());
        block
    }

    #[test]
    fn decodes_ustar_header() {
        let h = parse_header(&header("dir/file.txt", 1234, b'0')).unwrap();
        assert_eq!(h.name, "dir/file.txt");
        assert_eq!(h.size, 1234);
        assert_eq!(h.kind, EntryKind::File);
    }

    #[test]
    fn joins_ustar_prefix() {
        let mut block = header("file.txt", 1, b'0');
        block[345..349].copy_from_slice(b"deep");
        block[148..156].fill(b' ');
        let sum: u64 = block.iter().map(|&b| b as u64).sum();
        block[148..155].copy_from_slice(format!("{sum:06o}\0").as_bytes());

        assert_eq!(parse_header(&block).unwrap().name, "deep/file.txt");
    }

    #[test]
    fn checksum_mismatch_is_rejected() {
        let mut block = header("a", 1, b'0');
        block[0] = b'b';
        assert!(matches!(parse_header(&block), Err(Error::Malformed { .. })));
    }

    #[test]
    fn numeric_fields() {
        assert_eq!(parse_numeric(b"00000000017\0").unwrap(), 15);
        assert_eq!(parse_numeric(b"   17 \0\0").unwrap(), 15);
        assert_eq!(parse_numeric(b"\0\0\0\0").unwrap(), 0);
        assert_eq!(parse_numeric(&[0x80, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 0]).unwrap(), 1 << 32);
        assert!(parse_numeric(b"0009\0").is_err());
    }

    #[test]
    fn type_flags() {
        assert_eq!(EntryKind::from_flag(b'5'), EntryKind::Directory);
        assert_eq!(EntryKind::from_flag(0), EntryKind::File);
        assert!(EntryKind::from_flag(b'x').is_metadata());
        assert!(!EntryKind::from_flag(b'2').is_metadata());
    }

    #[test]
    fn pax_path_and_size() {
        let data = b"29 path=a/very/long/name.txt\n13 size=4096\n20 mtime=1700000000\n";
        let pax = parse_pax(data).unwrap();
        assert_eq!(pax.path.as_deref(), Some("a/very/long/name.txt"));
        assert_eq!(pax.size, Some(4096));
    }

    #[test]
    fn pax_bad_length() {
        assert!(parse_pax(b"99 path=x\n").is_err());
    }
}
