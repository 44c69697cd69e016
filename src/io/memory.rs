use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::{RangeSource, RemoteObject};
use crate::error::Result;

/// In-memory object, mainly for tests and for callers that already hold the bytes.
pub struct MemorySource {
    name: String,
    data: Vec<u8>,
    fetches: AtomicUsize,
}

impl MemorySource {
    pub fn new(name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            data,
            fetches: AtomicUsize::new(0),
        }
    }

    /// Number of `fetch_range` calls served so far.
    pub fn fetch_count(&self) -> usize {
        self.fetches.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl RangeSource for MemorySource {
    async fn probe_size(&self) -> Result<RemoteObject> {
        Ok(RemoteObject {
            url: self.name.clone(),
            total_size: Some(self.data.len() as u64),
            accepts_ranges: true,
        })
    }

    async fn fetch_range(&self, start: u64, length: u64) -> Result<Vec<u8>> {
        self.fetches.fetch_add(1, Ordering::Relaxed);
        let len = self.data.len() as u64;
        let from = start.min(len) as usize;
        let to = start.saturating_add(length).min(len) as usize;
        Ok(self.data[from..to].to_vec())
    }

    fn name(&self) -> &str {
        &self.name
    }
}
