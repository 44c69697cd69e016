use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::OnceCell;

use super::{ArchiveKind, ArchiveService, EntryDescriptor};
use crate::error::{Error, Result};
use crate::io::RangeSource;
use crate::stream::EntryStream;
use crate::tar::{TarPrefix, TarPrefixReader};

/// TAR and TAR.GZ over a bounded prefix.
///
/// The prefix is fetched on first use and kept for the lifetime of the
/// service, so listing followed by extraction costs one download.
pub struct TarService<R: RangeSource> {
    reader: TarPrefixReader<R>,
    gzipped: bool,
    session: OnceCell<TarPrefix>,
}

impl<R: RangeSource> TarService<R> {
    pub fn new(reader: Arc<R>, prefix_bytes: u64, gzipped: bool) -> Self {
        Self {
            reader: TarPrefixReader::new(reader, prefix_bytes, gzipped),
            gzipped,
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<&TarPrefix> {
        self.session.get_or_try_init(|| self.reader.fetch()).await
    }
}

#[async_trait]
impl<R: RangeSource> ArchiveService for TarService<R> {
    fn kind(&self) -> ArchiveKind {
        if self.gzipped {
            ArchiveKind::TarGz
        } else {
            ArchiveKind::Tar
        }
    }

    async fn list_files(&self) -> Result<Vec<EntryDescriptor>> {
        let entries = self.session().await?.list_files()?;
        Ok(entries.into_iter().map(EntryDescriptor::Tar).collect())
    }

    async fn extract_file(&self, entry: &EntryDescriptor) -> Result<EntryStream> {
        let EntryDescriptor::Tar(entry) = entry else {
            return Err(Error::DescriptorMismatch { expected: "tar" });
        };
        let data = self.session().await?.extract_file(&entry.filename)?;
        Ok(EntryStream::plain(data))
    }
}
