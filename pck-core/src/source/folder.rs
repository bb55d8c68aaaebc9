use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::PackSource;
use crate::util::sanitize::{join_virtual, normalize};

/// Loose files under a directory; an entry's raw path names its file.
#[derive(Clone, Debug)]
pub struct FolderSource {
    root: PathBuf,
}

impl FolderSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn file_path(&self, raw_path: &str) -> PathBuf {
        join_virtual(&self.root, &normalize(raw_path).path)
    }
}

impl PackSource for FolderSource {
    fn open_range(
        &self,
        raw_path: &str,
        offset: u64,
        size: u64,
    ) -> std::io::Result<Box<dyn Read + Send + '_>> {
        let mut f = File::open(self.file_path(raw_path))?;
        if offset > 0 {
            f.seek(SeekFrom::Start(offset))?;
        }
        Ok(Box::new(f.take(size)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_res_paths_under_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/file.txt"), b"loose bytes").unwrap();

        let src = FolderSource::new(dir.path());
        let mut out = Vec::new();
        src.open_range("res://sub/file.txt", 6, 5)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, b"bytes");
    }
}
