//! Entry lists for loose directory trees.

use std::fs;
use std::path::Path;
use std::sync::Arc;

use tracing::debug;
use walkdir::WalkDir;

use crate::entry::{MD5_EMPTY, PackedFileInfo};
use crate::error::Result;
use crate::source::FolderSource;
use crate::util::sanitize::RES_SCHEME;

/// Lists every regular file under `root` as an entry, sorted by virtual path.
///
/// Loose files carry no stored checksum, so verification skips them.
/// Symlinks are not followed.
pub fn scan_folder(root: &Path) -> Result<Vec<PackedFileInfo>> {
    let source = Arc::new(FolderSource::new(root));
    let pack = root.display().to_string();

    let mut entries = Vec::new();
    for e in WalkDir::new(root).follow_links(false).sort_by_file_name() {
        let e = e.map_err(std::io::Error::from)?;
        if !e.file_type().is_file() {
            continue;
        }
        let Ok(rel) = e.path().strip_prefix(root) else {
            continue;
        };
        let rel: Vec<String> = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy().into_owned())
            .collect();
        let raw_path = format!("{RES_SCHEME}{}", rel.join("/"));
        let size = fs::metadata(e.path())?.len();
        entries.push(PackedFileInfo::new(
            pack.clone(),
            raw_path,
            0,
            size,
            MD5_EMPTY,
            source.clone(),
            false,
        ));
    }
    entries.sort_by(|a, b| a.path().cmp(b.path()));
    debug!(root = %root.display(), files = entries.len(), "scanned folder");
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lists_nested_files_in_path_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("b/c")).unwrap();
        fs::write(dir.path().join("z.txt"), b"zz").unwrap();
        fs::write(dir.path().join("b/c/d.bin"), b"dddd").unwrap();
        fs::write(dir.path().join("a.txt"), b"a").unwrap();

        let entries = scan_folder(dir.path()).unwrap();
        let paths: Vec<&str> = entries.iter().map(|e| e.path()).collect();
        assert_eq!(paths, vec!["a.txt", "b/c/d.bin", "z.txt"]);
        assert_eq!(entries[1].raw_path(), "res://b/c/d.bin");
        assert_eq!(entries[1].size(), 4);
        assert!(!entries[1].has_md5());
        assert!(entries.iter().all(|e| !e.is_malformed()));
    }

    #[test]
    fn missing_root_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(scan_folder(&dir.path().join("nope")).is_err());
    }
}
