use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::PackSource;

/// A pack file on disk; entries are byte ranges inside it.
#[derive(Clone, Debug)]
pub struct PackedBlobSource {
    path: PathBuf,
}

impl PackedBlobSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PackSource for PackedBlobSource {
    fn open_range(
        &self,
        _raw_path: &str,
        offset: u64,
        size: u64,
    ) -> std::io::Result<Box<dyn Read + Send + '_>> {
        // fresh descriptor per reader, workers never share a cursor
        let mut f = File::open(&self.path)?;
        f.seek(SeekFrom::Start(offset))?;
        Ok(Box::new(f.take(size)))
    }
}
