use std::fmt::Write as _;
use std::path::PathBuf;

use serde::Serialize;

use crate::error::ErrorCode;

const ENCRYPTION_HINT: &str =
    "Some entries could not be decrypted; the pack is encrypted and the key is missing or wrong.";

/// Per-entry outcome totals of one pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct RunCounts {
    pub completed: usize,
    pub skipped: usize,
    pub broken: usize,
}

impl RunCounts {
    pub fn total(&self) -> usize {
        self.completed + self.skipped + self.broken
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BrokenEntry {
    pub path: String,
    /// Path as stored in the pack; identifies the entry when several
    /// normalize to the same `path`.
    pub raw_path: String,
    pub code: ErrorCode,
    pub reason: String,
}

/// An entry left out of a pass for a reason attributable to the entry itself.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SkippedEntry {
    pub path: String,
    pub raw_path: String,
    pub code: ErrorCode,
}

fn push_entry_line(s: &mut String, path: &str, raw_path: &str, reason: &str) {
    if raw_path.strip_prefix(crate::util::sanitize::RES_SCHEME) == Some(path) {
        let _ = writeln!(s, "    {path}: {reason}");
    } else {
        let _ = writeln!(s, "    {path} ({raw_path}): {reason}");
    }
}

/// Result of a verification pass. Entries appear in catalog order.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CheckReport {
    pub broken_paths: Vec<String>,
    /// Entries whose content was actually read and compared.
    pub checked: usize,
    pub counts: RunCounts,
    pub encryption_error: bool,
    pub failures: Vec<BrokenEntry>,
    /// Entries not read, with the reason; aborted entries are not listed.
    pub skipped: Vec<SkippedEntry>,
}

impl CheckReport {
    pub fn summary(&self) -> String {
        let mut s = format!(
            "Verified {} files: {} passed, {} failed, {} skipped\n",
            self.checked, self.counts.completed, self.counts.broken, self.counts.skipped
        );
        if !self.failures.is_empty() {
            s.push_str("Files with checksum errors:\n");
            for f in &self.failures {
                push_entry_line(&mut s, &f.path, &f.raw_path, &f.reason);
            }
        }
        if self.encryption_error {
            s.push_str(ENCRYPTION_HINT);
            s.push('\n');
        }
        s
    }
}

/// Result of an extraction pass. Entries appear in catalog order.
#[derive(Clone, Debug, Serialize)]
pub struct DumpReport {
    pub output_dir: PathBuf,
    /// Entries picked by the filter, before skip rules.
    pub selected: usize,
    pub counts: RunCounts,
    pub bytes_written: u64,
    pub encryption_error: bool,
    /// Failed entries, including those whose checksum failed but were
    /// extracted anyway.
    pub broken: Vec<BrokenEntry>,
    /// Every checksum failure of the verification pass run before extraction,
    /// whether or not the entry was then extracted.
    pub verify_failures: Vec<BrokenEntry>,
}

impl DumpReport {
    /// Code of the first failed entry in catalog order.
    pub fn first_error(&self) -> Option<ErrorCode> {
        self.broken.first().map(|b| b.code)
    }

    pub fn summary(&self) -> String {
        let mut s = format!(
            "Extracted {} of {} files to {} ({} skipped, {} failed)\n",
            self.counts.completed,
            self.selected,
            self.output_dir.display(),
            self.counts.skipped,
            self.counts.broken
        );
        if !self.verify_failures.is_empty() {
            s.push_str("Files with checksum errors:\n");
            for f in &self.verify_failures {
                push_entry_line(&mut s, &f.path, &f.raw_path, &f.reason);
            }
        }
        if !self.broken.is_empty() {
            s.push_str("Failed files:\n");
            for b in &self.broken {
                push_entry_line(&mut s, &b.path, &b.raw_path, &b.reason);
            }
        }
        if self.encryption_error {
            s.push_str(ENCRYPTION_HINT);
            s.push('\n');
        }
        s
    }
}
