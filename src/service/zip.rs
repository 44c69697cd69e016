use async_trait::async_trait;
use std::sync::Arc;

use super::{ArchiveKind, ArchiveService, EntryDescriptor};
use crate::error::{Error, Result};
use crate::io::RangeSource;
use crate::stream::EntryStream;
use crate::zip::{ZipEntryOpener, ZipIndexReader};

pub struct ZipService<R: RangeSource> {
    index: ZipIndexReader<R>,
    opener: ZipEntryOpener<R>,
}

impl<R: RangeSource> ZipService<R> {
    pub fn new(reader: Arc<R>) -> Self {
        Self {
            index: ZipIndexReader::new(reader.clone()),
            opener: ZipEntryOpener::new(reader),
        }
    }
}

#[async_trait]
impl<R: RangeSource> ArchiveService for ZipService<R> {
    fn kind(&self) -> ArchiveKind {
        ArchiveKind::Zip
    }

    async fn list_files(&self) -> Result<Vec<EntryDescriptor>> {
        let entries = self.index.list_files().await?;
        Ok(entries.into_iter().map(EntryDescriptor::Zip).collect())
    }

    async fn extract_file(&self, entry: &EntryDescriptor) -> Result<EntryStream> {
        match entry {
            EntryDescriptor::Zip(entry) => self.opener.open(entry).await,
            _ => Err(Error::DescriptorMismatch { expected: "zip" }),
        }
    }
}
