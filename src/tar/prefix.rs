use log::{debug, warn};
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::gzip;
use crate::io::RangeSource;

use super::header::{self, BLOCK_SIZE, EntryKind, PaxOverrides};

/// One member as seen by the sequential header scan.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TarEntry {
    pub filename: String,
    pub size: u64,
    pub is_directory: bool,
}

/// A header together with the part of its body inside the window.
#[derive(Debug)]
pub struct TarMember<'a> {
    pub entry: TarEntry,
    body: &'a [u8],
}

impl<'a> TarMember<'a> {
    /// Whether the whole body lies inside the fetched window.
    pub fn is_complete(&self) -> bool {
        self.body.len() as u64 == self.entry.size
    }

    /// The member's bytes, exactly `entry.size` of them.
    ///
    /// # Errors
    ///
    /// [`Error::DataSizeMismatch`] when the window cuts the body short.
    pub fn body(&self) -> Result<&'a [u8]> {
        if !self.is_complete() {
            return Err(Error::DataSizeMismatch {
                expected: self.entry.size,
                actual: self.body.len() as u64,
            });
        }
        Ok(self.body)
    }
}

/// Lazy, single-pass scan over the members of a TAR byte buffer.
///
/// Skipping a member is just not looking at its body. The scan ends at an
/// all-zero block, at the first header that does not fit in the buffer, or
/// after yielding an error.
pub struct TarEntries<'a> {
    data: &'a [u8],
    pos: usize,
    done: bool,
}

impl<'a> TarEntries<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            done: false,
        }
    }

    fn finish(&mut self) -> Option<Result<TarMember<'a>>> {
        self.done = true;
        None
    }
}

impl<'a> Iterator for TarEntries<'a> {
    type Item = Result<TarMember<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }

        let mut long_name: Option<String> = None;
        let mut pax = PaxOverrides::default();

        loop {
            let remaining = self.data.get(self.pos..).unwrap_or_default();
            if remaining.len() < BLOCK_SIZE {
                if !remaining.is_empty() {
                    debug!("partial tar header at {} ignored", self.pos);
                }
                return self.finish();
            }

            let block = &remaining[..BLOCK_SIZE];
            if header::is_zero_block(block) {
                return self.finish();
            }

            let header = match header::parse_header(block) {
                Ok(h) => h,
                Err(e) => {
                    self.done = true;
                    return Some(Err(e));
                }
            };

            let size = pax.size.unwrap_or(header.size);
            let body_start = self.pos + BLOCK_SIZE;
            let size_in_memory = usize::try_from(size).unwrap_or(usize::MAX);
            let body_end = body_start.saturating_add(size_in_memory).min(self.data.len());
            let body = &self.data[body_start..body_end];
            let padded = size_in_memory
                .checked_next_multiple_of(BLOCK_SIZE)
                .unwrap_or(usize::MAX);
            self.pos = body_start.saturating_add(padded);

            if header.kind.is_metadata() {
                // Metadata cut off by the window leaves the next member unknowable.
                if body.len() != size_in_memory {
                    return self.finish();
                }
                match header.kind {
                    EntryKind::GnuLongName => long_name = Some(header::cstr(body)),
                    EntryKind::PaxExtended => match header::parse_pax(body) {
                        Ok(p) => pax = p,
                        Err(e) => {
                            self.done = true;
                            return Some(Err(e));
                        }
                    },
                    _ => {}
                }
                continue;
            }

            let filename = pax.path.take().or(long_name.take()).unwrap_or(header.name);
            let is_directory = header.kind == EntryKind::Directory
                || (header.kind == EntryKind::File && filename.ends_with('/'));

            return Some(Ok(TarMember {
                entry: TarEntry {
                    filename,
                    size,
                    is_directory,
                },
                body,
            }));
        }
    }
}

/// The logical TAR bytes fetched for one invocation.
///
/// Created once by [`TarPrefixReader::fetch`] and shared by listing and
/// extraction, so the network is hit once per session and never across
/// sessions.
#[derive(Debug, Clone)]
pub struct TarPrefix {
    data: Vec<u8>,
    truncated: bool,
}

impl TarPrefix {
    /// Wrap decoded TAR bytes; `truncated` records that the object continues
    /// past them.
    pub fn new(data: Vec<u8>, truncated: bool) -> Self {
        Self { data, truncated }
    }

    pub fn entries(&self) -> TarEntries<'_> {
        TarEntries::new(&self.data)
    }

    /// Every member whose header lies inside the window, in archive order.
    pub fn list_files(&self) -> Result<Vec<TarEntry>> {
        self.entries().map(|m| m.map(|m| m.entry)).collect()
    }

    /// Bytes of the first non-directory member named `filename`.
    pub fn extract_file(&self, filename: &str) -> Result<Vec<u8>> {
        for member in self.entries() {
            let member = member?;
            if member.entry.filename == filename && !member.entry.is_directory {
                return member.body().map(<[u8]>::to_vec);
            }
        }

        Err(Error::EntryNotFound {
            filename: filename.to_string(),
        })
    }

    /// Whether the remote object extends past the fetched window.
    pub fn is_truncated(&self) -> bool {
        self.truncated
    }

    /// Logical (decompressed) TAR bytes available.
    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// Fetches the bounded leading window of a TAR or TAR.GZ object.
pub struct TarPrefixReader<R: RangeSource> {
    reader: Arc<R>,
    prefix_bytes: u64,
    gzipped: bool,
}

impl<R: RangeSource> TarPrefixReader<R> {
    pub fn new(reader: Arc<R>, prefix_bytes: u64, gzipped: bool) -> Self {
        Self {
            reader,
            prefix_bytes,
            gzipped,
        }
    }

    /// Fetch up to `prefix_bytes` from the start of the object and gunzip
    /// them if needed.
    ///
    /// For gzip the bound applies to compressed bytes, so the number of TAR
    /// bytes it yields depends on the compression ratio.
    pub async fn fetch(&self) -> Result<TarPrefix> {
        let object = self.reader.probe_size().await?;
        let window = object
            .total_size
            .map_or(self.prefix_bytes, |total| total.min(self.prefix_bytes));

        let raw = self.reader.fetch_range(0, window).await?;
        let truncated = match object.total_size {
            Some(total) => (raw.len() as u64) < total,
            None => raw.len() as u64 >= self.prefix_bytes,
        };
        if truncated {
            warn!(
                "{}: only the first {} bytes are scanned; members beyond them are not visible",
                self.reader.name(),
                raw.len()
            );
        }

        let data = if self.gzipped {
            gzip::gunzip_window(&raw, truncated)?
        } else {
            raw
        };
        debug!(
            "{}: {} tar bytes in window (gzip={})",
            self.reader.name(),
            data.len(),
            self.gzipped
        );

        Ok(TarPrefix::new(data, truncated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::MemorySource;
    use flate2::Compression;
    use flate2::write::GzEncoder;
    use std::io::Write;

    fn header(name: &str, size: usize, flag: u8) -> Vec<u8> {
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

    fn member(name: &str, body: &[u8], flag: u8) -> Vec<u8> {
        let mut out = header(name, body.len(), flag);
        out.extend_from_slice(body);
        out.resize(out.len().next_multiple_of(BLOCK_SIZE), 0);
        out
    }

    fn archive(members: &[Vec<u8>]) -> Vec<u8> {
        let mut out = members.concat();
        out.extend_from_slice(&[0; 2 * BLOCK_SIZE]);
        out
    }

    fn sample() -> Vec<u8> {
        archive(&[
            member("d/", b"", b'5'),
            member("d/a.txt", b"hello", b'0'),
            member("d/b.bin", &[7u8; 700], b'0'),
        ])
    }

    #[test]
    fn lists_members_in_order() {
        let entries = TarPrefix::new(sample(), false).list_files().unwrap();
        assert_eq!(
            entries,
            vec![
                TarEntry { filename: "d/".into(), size: 0, is_directory: true },
                TarEntry { filename: "d/a.txt".into(), size: 5, is_directory: false },
                TarEntry { filename: "d/b.bin".into(), size: 700, is_directory: false },
            ]
        );
    }

    #[test]
    fn extracts_exact_bytes() {
        let prefix = TarPrefix::new(sample(), false);
        assert_eq!(prefix.extract_file("d/a.txt").unwrap(), b"hello");
        assert_eq!(prefix.extract_file("d/b.bin").unwrap(), vec![7u8; 700]);
    }

    #[test]
    fn directories_are_never_extracted() {
        let prefix = TarPrefix::new(sample(), false);
        assert!(matches!(
            prefix.extract_file("d/"),
            Err(Error::EntryNotFound { .. })
        ));
        assert!(matches!(
            prefix.extract_file("missing.txt"),
            Err(Error::EntryNotFound { .. })
        ));
    }

    #[test]
    fn first_matching_member_wins() {
        let data = archive(&[member("x", b"one", b'0'), member("x", b"two", b'0')]);
        assert_eq!(TarPrefix::new(data, false).extract_file("x").unwrap(), b"one");
    }

    #[test]
    fn stops_at_zero_block() {
        let mut data = archive(&[member("a", b"1", b'0')]);
        data.extend(member("after-end", b"2", b'0'));
        let entries = TarPrefix::new(data, false).list_files().unwrap();
        assert_eq!(entries.len(), 1);
    }

    #[test]
    fn slash_suffix_on_regular_file_means_directory() {
        let data = archive(&[member("old-style-dir/", b"", b'0')]);
        assert!(TarPrefix::new(data, false).list_files().unwrap()[0].is_directory);
    }

    #[test]
    fn header_cut_by_window_is_absent() {
        let full = sample();
        // Second header starts at 512; cut it in half.
        let cut = full[..BLOCK_SIZE + 200].to_vec();
        let entries = TarPrefix::new(cut, true).list_files().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, "d/");
    }

    #[test]
    fn window_ending_exactly_before_a_header() {
        let full = sample();
        let cut = full[..3 * BLOCK_SIZE].to_vec(); // "d/" + "d/a.txt" with its body block
        let prefix = TarPrefix::new(cut, true);
        assert_eq!(prefix.list_files().unwrap().len(), 2);
        assert_eq!(prefix.extract_file("d/a.txt").unwrap(), b"hello");
    }

    #[test]
    fn body_cut_by_window_is_listed_but_not_extracted() {
        let full = sample();
        // "d/b.bin" header is at 1536; keep it plus 100 bytes of body.
        let cut = full[..4 * BLOCK_SIZE + 100].to_vec();
        let prefix = TarPrefix::new(cut, true);

        let entries = prefix.list_files().unwrap();
        assert_eq!(entries.len(), 3);
        assert_eq!(entries[2].size, 700);

        assert!(matches!(
            prefix.extract_file("d/b.bin"),
            Err(Error::DataSizeMismatch { expected: 700, actual: 100 })
        ));
    }

    #[test]
    fn gnu_long_name_applies_to_next_member() {
        let long = format!("{}/file.txt", "x".repeat(150));
        let mut name_body = long.clone().into_bytes();
        name_body.push(0);
        let data = archive(&[
            member("././@LongLink", &name_body, b'L'),
            member("truncated-name", b"data", b'0'),
        ]);

        let prefix = TarPrefix::new(data, false);
        let entries = prefix.list_files().unwrap();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].filename, long);
        assert_eq!(prefix.extract_file(&long).unwrap(), b"data");
    }

    #[test]
    fn pax_path_overrides_header_name() {
        let record = "26 path=pax/long/name.txt\n";
        assert_eq!(record.len(), 26);
        let data = archive(&[
            member("PaxHeaders/x", record.as_bytes(), b'x'),
            member("short", b"abc", b'0'),
            member("plain", b"z", b'0'),
        ]);

        let names: Vec<_> = TarPrefix::new(data, false)
            .list_files()
            .unwrap()
            .into_iter()
            .map(|e| e.filename)
            .collect();
        assert_eq!(names, ["pax/long/name.txt", "plain"]);
    }

    #[test]
    fn corrupt_header_is_reported() {
        let mut data = sample();
        data[BLOCK_SIZE + 3] ^= 0xff;
        let result = TarPrefix::new(data, false).list_files();
        assert!(matches!(result, Err(Error::Malformed { .. })));
    }

    #[tokio::test]
    async fn fetches_and_gunzips_window() {
        let mut enc = GzEncoder::new(Vec::new(), Compression::default());
        enc.write_all(&sample()).unwrap();
        let gz = enc.finish().unwrap();

        let source = Arc::new(MemorySource::new("a.tar.gz", gz));
        let prefix = TarPrefixReader::new(source.clone(), 2_000_000, true)
            .fetch()
            .await
            .unwrap();

        assert!(!prefix.is_truncated());
        assert_eq!(prefix.list_files().unwrap().len(), 3);
        assert_eq!(source.fetch_count(), 1);
    }

    #[tokio::test]
    async fn window_is_bounded_by_prefix_bytes() {
        let data = sample();
        let source = Arc::new(MemorySource::new("a.tar", data));
        let prefix = TarPrefixReader::new(source, 1024, false)
            .fetch()
            .await
            .unwrap();

        assert!(prefix.is_truncated());
        assert_eq!(prefix.len(), 1024);
        let names: Vec<_> = prefix
            .list_files()
            .unwrap()
            .into_iter()
            .map(|e| e.filename)
            .collect();
        assert_eq!(names, ["d/", "d/a.txt"]);
        assert!(matches!(
            prefix.extract_file("d/a.txt"),
            Err(Error::DataSizeMismatch { .. })
        ));
    }
}
