//! gzip member headers and bounded decompression of a fetched window.

use flate2::read::MultiGzDecoder;
use log::debug;
use std::io::{ErrorKind, Read};

use crate::error::{Error, Result};

/// ID1, ID2 and CM=8 (deflate).
pub const GZIP_MAGIC: [u8; 3] = [0x1f, 0x8b, 0x08];

/// Size of the fixed member header.
pub const GZIP_HEADER_SIZE: usize = 10;

/// Header plus the CRC32/ISIZE trailer of an empty member.
pub const GZIP_MIN_SIZE: u64 = 18;

const FEXTRA: u8 = 0x04;
const FNAME: u8 = 0x08;

/// Fields of interest from a gzip member header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GzipHeader {
    /// Original file name (`FNAME`), decoded as ISO-8859-1.
    pub filename: Option<String>,
    /// Modification time as Unix seconds, 0 when unset.
    pub mtime: u32,
}

/// Decode the header at the start of `data`.
///
/// `data` may be just a prefix of the object; a name running past its end is
/// returned as far as it goes.
pub fn parse_header(data: &[u8]) -> Result<GzipHeader> {
    if data.len() < GZIP_HEADER_SIZE || data[..3] != GZIP_MAGIC {
        return Err(Error::malformed("not a gzip stream"));
    }

    let flags = data[3];
    let mtime = u32::from_le_bytes([data[4], data[5], data[6], data[7]]);
    let mut pos = GZIP_HEADER_SIZE;

    if flags & FEXTRA != 0 {
        let xlen = data
            .get(pos..pos + 2)
            .map(|b| u16::from_le_bytes([b[0], b[1]]) as usize)
            .ok_or_else(|| Error::malformed("gzip extra field cut short"))?;
        pos += 2 + xlen;
    }

    let filename = if flags & FNAME != 0 {
        let rest = data.get(pos..).unwrap_or_default();
        let end = rest.iter().position(|&b| b == 0).unwrap_or(rest.len());
        let name: String = rest[..end].iter().map(|&b| b as char).collect();
        (!name.is_empty()).then_some(name)
    } else {
        None
    };

    Ok(GzipHeader { filename, mtime })
}

/// Gunzip a fetched window of a gzip object.
///
/// When `truncated` is set the window ends before the object does, so the
/// decoder running out of input is the expected way for the stream to end and
/// everything decoded up to that point is returned. Corrupt data is reported
/// either way.
pub fn gunzip_window(data: &[u8], truncated: bool) -> Result<Vec<u8>> {
    let mut decoder = MultiGzDecoder::new(data);
    let mut out = Vec::new();
    let mut buf = vec![0u8; 64 * 1024];

    loop {
        match decoder.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => out.extend_from_slice(&buf[..n]),
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) if truncated && e.kind() == ErrorKind::UnexpectedEof => {
                debug!(
                    "gzip window ends mid-stream after {} decoded bytes ({})",
                    out.len(),
                    e
                );
                break;
            }
            Err(e) => return Err(Error::Decompress(e)),
        }
    }

    Ok(out)
}
