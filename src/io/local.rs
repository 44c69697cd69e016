use async_trait::async_trait;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::Path;
use std::sync::Mutex;

use super::{RangeSource, RemoteObject};
use crate::error::{Error, Result};

/// Local file exposed through the same range interface as a remote object
pub struct LocalFileSource {
    name: String,
    file: Mutex<File>,
    size: u64,
}

impl LocalFileSource {
    pub fn new(path: &Path) -> Result<Self> {
        let file = File::open(path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            name: path.to_string_lossy().into_owned(),
            file: Mutex::new(file),
            size,
        })
    }
}

#[async_trait]
impl RangeSource for LocalFileSource {
    async fn probe_size(&self) -> Result<RemoteObject> {
        Ok(RemoteObject {
            url: self.name.clone(),
            total_size: Some(self.size),
            accepts_ranges: true,
        })
    }

    async fn fetch_range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        if length == 0 || start >= self.size {
            return Ok(Vec::new());
        }

        let want = length.min(self.size - start);
        let mut buf = Vec::with_capacity(want as usize);

        // A poisoned lock only means another read panicked mid-way; the seek
        // below repositions the handle anyway.
        let mut file = self.file.lock().unwrap_or_else(|e| e.into_inner());
        file.seek(SeekFrom::Start(start))
            .map_err(|e| Error::fetch(start, length, e))?;
        (&mut *file)
            .take(want)
            .read_to_end(&mut buf)
            .map_err(|e| Error::fetch(start, length, e))?;

        Ok(buf)
    }

    fn name(&self) -> &str {
        &self.name
    }
}
