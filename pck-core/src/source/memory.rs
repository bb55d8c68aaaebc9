use std::io::Read;

use super::PackSource;

/// A pack held entirely in memory.
#[derive(Clone, Debug, Default)]
pub struct MemorySource {
    data: Vec<u8>,
}

impl MemorySource {
    pub fn new(data: impl Into<Vec<u8>>) -> Self {
        Self { data: data.into() }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl PackSource for MemorySource {
    fn open_range(
        &self,
        _raw_path: &str,
        offset: u64,
        size: u64,
    ) -> std::io::Result<Box<dyn Read + Send + '_>> {
        let len = self.data.len() as u64;
        let start = offset.min(len) as usize;
        let end = offset.saturating_add(size).min(len) as usize;
        Ok(Box::new(&self.data[start..end]))
    }
}
