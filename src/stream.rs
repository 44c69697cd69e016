//! The decompressed byte stream handed to content handlers.

use flate2::read::DeflateDecoder;
use std::io::{self, Cursor, Read};

/// Single-pass stream over one member's decompressed bytes.
///
/// Yields exactly the member's content and then EOF. It cannot be rewound;
/// reopen the entry to read it again.
pub enum EntryStream {
    /// Bytes already in their final form (ZIP stored, TAR, gunzipped GZIP).
    Plain(Cursor<Vec<u8>>),
    /// Headerless DEFLATE payload, inflated as it is read.
    Deflate(DeflateDecoder<Cursor<Vec<u8>>>),
}

impl EntryStream {
    pub fn plain(data: Vec<u8>) -> Self {
        EntryStream::Plain(Cursor::new(data))
    }

    pub fn raw_deflate(data: Vec<u8>) -> Self {
        EntryStream::Deflate(DeflateDecoder::new(Cursor::new(data)))
    }

    /// Drain the rest of the stream into memory.
    pub fn read_all(mut self) -> io::Result<Vec<u8>> {
        let mut out = Vec::new();
        self.read_to_end(&mut out)?;
        Ok(out)
    }
}

impl Read for EntryStream {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        match self {
            EntryStream::Plain(inner) => inner.read(buf),
            EntryStream::Deflate(inner) => inner.read(buf),
        }
    }
}

impl std::fmt::Debug for EntryStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EntryStream::Plain(_) => f.write_str("EntryStream::Plain"),
            EntryStream::Deflate(_) => f.write_str("EntryStream::Deflate"),
        }
    }
}
