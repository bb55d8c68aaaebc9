use std::path::Path;

use crate::entry::PackedFileInfo;

/// Receives one notification per work item, right before it is processed.
///
/// Called from worker threads, in no particular order.
pub trait ProgressSink: Send + Sync {
    fn item_started(&self, index: usize, total: usize, description: &str);
}

/// Description of verification item `index`: the entry's virtual path.
pub fn file_description(index: usize, entries: &[PackedFileInfo]) -> String {
    entries
        .get(index)
        .map(|e| e.path().to_string())
        .unwrap_or_default()
}

/// Description of extraction item `index`: `"<virtual path> -> <output dir>"`.
pub fn extract_description(index: usize, entries: &[PackedFileInfo], output_dir: &Path) -> String {
    match entries.get(index) {
        Some(e) => format!("{} -> {}", e.path(), output_dir.display()),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entry::MD5_EMPTY;
    use crate::source::MemorySource;
    use std::sync::Arc;

    #[test]
    fn descriptions_follow_catalog_index() {
        let src = Arc::new(MemorySource::default());
        let entries: Vec<_> = ["res://a.txt", "res://dir/b.txt"]
            .iter()
            .map(|p| PackedFileInfo::new("p", *p, 0, 0, MD5_EMPTY, src.clone(), false))
            .collect();

        assert_eq!(file_description(1, &entries), "dir/b.txt");
        assert_eq!(
            extract_description(0, &entries, Path::new("out")),
            format!("a.txt -> {}", Path::new("out").display())
        );
        assert_eq!(file_description(9, &entries), "");
    }
}
