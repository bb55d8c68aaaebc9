//! Verification and extraction passes over a whole catalog.
//!
//! A pass hands every selected entry to exactly one worker. Workers touch
//! nothing shared except the outcome counters and the sticky encryption flag,
//! all atomics; the caller only reads them once every worker has joined.

use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::crypto::Decryptor;
use crate::entry::PackedFileInfo;
use crate::error::{ErrorCode, ExtractError, PckError, Result, chain_message};
use crate::options::DumpOptions;
use crate::progress::{ProgressSink, extract_description, file_description};
use crate::read::extract::{ExtractContext, extract};
use crate::read::verify::{FailReason, SkipReason, VerifyOutcome, verify};
use crate::report::{BrokenEntry, CheckReport, DumpReport, RunCounts, SkippedEntry};
use crate::util::sanitize::normalize;

/// Cancels a running pass. Entries not yet started when the request lands
/// are counted as skipped.
#[derive(Clone, Debug, Default)]
pub struct AbortHandle(Arc<AtomicBool>);

impl AbortHandle {
    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }

    fn clear(&self) {
        self.0.store(false, Ordering::Relaxed);
    }
}

enum Tally {
    Completed,
    Skipped,
    Broken,
}

enum ExtractStep {
    Written(u64),
    /// Written although its checksum failed beforehand.
    WrittenUnverified(u64, FailReason),
    Skipped,
    Failed(ExtractError),
}

pub struct PckDumper {
    options: DumpOptions,
    decryptor: Option<Arc<dyn Decryptor>>,
    progress: Option<Arc<dyn ProgressSink>>,
    abort: AbortHandle,
    encryption_error: AtomicBool,
    completed_cnt: AtomicUsize,
    skipped_cnt: AtomicUsize,
    broken_cnt: AtomicUsize,
}

impl Default for PckDumper {
    fn default() -> Self {
        Self::new(DumpOptions::default())
    }
}

impl PckDumper {
    pub fn new(options: DumpOptions) -> Self {
        Self {
            options,
            decryptor: None,
            progress: None,
            abort: AbortHandle::default(),
            encryption_error: AtomicBool::new(false),
            completed_cnt: AtomicUsize::new(0),
            skipped_cnt: AtomicUsize::new(0),
            broken_cnt: AtomicUsize::new(0),
        }
    }

    pub fn with_decryptor(mut self, decryptor: Arc<dyn Decryptor>) -> Self {
        self.decryptor = Some(decryptor);
        self
    }

    pub fn with_progress(mut self, sink: Arc<dyn ProgressSink>) -> Self {
        self.progress = Some(sink);
        self
    }

    pub fn options(&self) -> &DumpOptions {
        &self.options
    }

    pub fn options_mut(&mut self) -> &mut DumpOptions {
        &mut self.options
    }

    pub fn set_multi_thread(&mut self, multi_thread: bool) {
        self.options.multi_thread = multi_thread;
    }

    /// True once any entry of the current run failed to decrypt.
    pub fn had_encryption_error(&self) -> bool {
        self.encryption_error.load(Ordering::Relaxed)
    }

    pub fn counts(&self) -> RunCounts {
        RunCounts {
            completed: self.completed_cnt.load(Ordering::Relaxed),
            skipped: self.skipped_cnt.load(Ordering::Relaxed),
            broken: self.broken_cnt.load(Ordering::Relaxed),
        }
    }

    pub fn abort_handle(&self) -> AbortHandle {
        self.abort.clone()
    }

    /// Clears counters, the encryption flag and any pending abort request.
    /// Every pass entry point calls this first.
    pub fn reset(&self) {
        self.reset_counts();
        self.encryption_error.store(false, Ordering::Relaxed);
        self.abort.clear();
    }

    fn reset_counts(&self) {
        self.completed_cnt.store(0, Ordering::Relaxed);
        self.skipped_cnt.store(0, Ordering::Relaxed);
        self.broken_cnt.store(0, Ordering::Relaxed);
    }

    fn tally(&self, t: Tally) {
        let cnt = match t {
            Tally::Completed => &self.completed_cnt,
            Tally::Skipped => &self.skipped_cnt,
            Tally::Broken => &self.broken_cnt,
        };
        cnt.fetch_add(1, Ordering::Relaxed);
    }

    /// Verifies every entry against its stored checksum.
    #[tracing::instrument(skip_all, fields(entries = entries.len()))]
    pub fn check_all(&self, entries: &[PackedFileInfo]) -> Result<CheckReport> {
        self.reset();
        let selected: Vec<usize> = (0..entries.len()).collect();
        let outcomes = self.verify_pass(entries, &selected)?;

        let counts = self.counts();
        let mut failures = Vec::new();
        let mut skipped = Vec::new();
        for &(i, outcome) in &outcomes {
            let e = &entries[i];
            match outcome {
                VerifyOutcome::Failed(reason) => failures.push(broken_entry(
                    e,
                    reason.code(),
                    fail_reason_text(reason).to_string(),
                )),
                VerifyOutcome::Skipped(reason) => {
                    if let Some(code) = reason.code() {
                        skipped.push(SkippedEntry {
                            path: e.path().to_string(),
                            raw_path: e.raw_path().to_string(),
                            code,
                        });
                    }
                }
                VerifyOutcome::Passed => {}
            }
        }

        let report = CheckReport {
            broken_paths: failures.iter().map(|f| f.path.clone()).collect(),
            checked: counts.completed + counts.broken,
            counts,
            encryption_error: self.had_encryption_error(),
            failures,
            skipped,
        };
        info!(
            checked = report.checked,
            passed = counts.completed,
            broken = counts.broken,
            skipped = counts.skipped,
            "verification finished"
        );
        Ok(report)
    }

    /// Extracts every entry to `output_dir`.
    pub fn dump_all(&self, output_dir: &Path, entries: &[PackedFileInfo]) -> Result<DumpReport> {
        self.dump_to_dir::<&str>(output_dir, entries, &[])
    }

    /// Extracts the entries named in `files_to_extract` (all entries when it
    /// is empty) to `output_dir`.
    ///
    /// Filter paths are normalized like entry paths, so `res://a.txt` and
    /// `a.txt` name the same entry. A filter path that matches no entry fails
    /// the call before anything is written.
    ///
    /// With `should_check_md5`, every checksum failure is listed in the
    /// report. An entry that failed it and is extracted anyway counts as
    /// broken.
    ///
    /// Entries whose paths normalize to the same file are never written
    /// twice: the first one in catalog order owns the file and later ones
    /// fail with [`ExtractError::DuplicatePath`].
    ///
    /// If any entry fails, the error carries the code of the first failed
    /// entry in catalog order and a summary listing every failure.
    #[tracing::instrument(skip_all, fields(dir = %output_dir.display(), entries = entries.len()))]
    pub fn dump_to_dir<S: AsRef<str>>(
        &self,
        output_dir: &Path,
        entries: &[PackedFileInfo],
        files_to_extract: &[S],
    ) -> Result<DumpReport> {
        self.reset();
        let selected = select_entries(entries, files_to_extract)?;

        fs::create_dir_all(output_dir).map_err(|source| PckError::CreateOutputDir {
            path: output_dir.to_path_buf(),
            source,
        })?;

        let mut verify_failed: HashMap<usize, FailReason> = HashMap::new();
        if self.options.should_check_md5 {
            let outcomes = self.verify_pass(entries, &selected)?;
            let c = self.counts();
            debug!(
                passed = c.completed,
                broken = c.broken,
                skipped = c.skipped,
                "pre-extraction verification finished"
            );
            verify_failed = outcomes
                .into_iter()
                .filter_map(|(i, outcome)| match outcome {
                    VerifyOutcome::Failed(reason) => Some((i, reason)),
                    _ => None,
                })
                .collect();
            // the encryption flag belongs to the whole run and is kept
            self.reset_counts();
        }

        let owners = self.path_owners(entries, &selected);
        let total = selected.len();
        let steps = self.dispatch(&selected, |i| {
            let plan = EntryPlan {
                prior_failure: verify_failed.get(&i).copied(),
                owner: owners.get(&i).map(|&o| entries[o].raw_path()),
            };
            (i, self.extract_one(i, total, entries, output_dir, plan))
        })?;

        let mut bytes_written = 0u64;
        let mut broken = Vec::new();
        for (i, step) in steps {
            let e = &entries[i];
            match step {
                ExtractStep::Written(n) => bytes_written += n,
                ExtractStep::WrittenUnverified(n, reason) => {
                    bytes_written += n;
                    broken.push(broken_entry(
                        e,
                        reason.code(),
                        format!("{}, extracted anyway", fail_reason_text(reason)),
                    ));
                }
                ExtractStep::Skipped => {}
                ExtractStep::Failed(err) => {
                    broken.push(broken_entry(e, err.code(), chain_message(&err)))
                }
            }
        }
        let verify_failures: Vec<BrokenEntry> = selected
            .iter()
            .filter_map(|i| {
                let reason = *verify_failed.get(i)?;
                let text = fail_reason_text(reason).to_string();
                Some(broken_entry(&entries[*i], reason.code(), text))
            })
            .collect();

        let report = DumpReport {
            output_dir: output_dir.to_path_buf(),
            selected: total,
            counts: self.counts(),
            bytes_written,
            encryption_error: self.had_encryption_error(),
            broken,
            verify_failures,
        };
        info!(
            extracted = report.counts.completed,
            skipped = report.counts.skipped,
            broken = report.counts.broken,
            bytes = report.bytes_written,
            "extraction finished"
        );

        match report.first_error() {
            Some(code) => Err(PckError::Extraction {
                code,
                summary: report.summary(),
            }),
            None => Ok(report),
        }
    }

    fn verify_pass(
        &self,
        entries: &[PackedFileInfo],
        selected: &[usize],
    ) -> Result<Vec<(usize, VerifyOutcome)>> {
        let total = selected.len();
        self.dispatch(selected, |i| (i, self.verify_one(i, total, entries)))
    }

    fn verify_one(&self, index: usize, total: usize, entries: &[PackedFileInfo]) -> VerifyOutcome {
        let entry = &entries[index];
        if self.abort.is_aborted() {
            self.tally(Tally::Skipped);
            return VerifyOutcome::Skipped(SkipReason::Aborted);
        }
        if self.options.skip_malformed_paths && entry.is_malformed() {
            debug!(raw_path = entry.raw_path(), "skipping malformed path");
            self.tally(Tally::Skipped);
            return VerifyOutcome::Skipped(SkipReason::MalformedPath);
        }
        if let Some(sink) = &self.progress {
            sink.item_started(index, total, &file_description(index, entries));
        }

        let outcome = verify(entry, self.decryptor.as_deref());
        match outcome {
            VerifyOutcome::Passed => self.tally(Tally::Completed),
            VerifyOutcome::Skipped(_) => self.tally(Tally::Skipped),
            VerifyOutcome::Failed(reason) => {
                if reason == FailReason::DecryptionFailed {
                    self.encryption_error.store(true, Ordering::Relaxed);
                }
                warn!(path = entry.path(), reason = fail_reason_text(reason), "checksum verification failed");
                self.tally(Tally::Broken);
            }
        }
        outcome
    }

    /// Maps each selected entry that shares its target with an earlier one to
    /// that earlier entry. Entries the skip rules will drop own nothing.
    fn path_owners(
        &self,
        entries: &[PackedFileInfo],
        selected: &[usize],
    ) -> HashMap<usize, usize> {
        let mut first: HashMap<&str, usize> = HashMap::new();
        let mut owners = HashMap::new();
        for &i in selected {
            let e = &entries[i];
            if self.will_skip(e) {
                continue;
            }
            match first.get(e.path()) {
                Some(&o) => {
                    owners.insert(i, o);
                }
                None => {
                    first.insert(e.path(), i);
                }
            }
        }
        owners
    }

    fn will_skip(&self, entry: &PackedFileInfo) -> bool {
        (self.options.skip_malformed_paths && entry.is_malformed())
            || (self.options.skip_failed_md5 && !entry.is_checksum_validated())
    }

    fn extract_one(
        &self,
        index: usize,
        total: usize,
        entries: &[PackedFileInfo],
        output_dir: &Path,
        plan: EntryPlan<'_>,
    ) -> ExtractStep {
        let entry = &entries[index];
        if self.abort.is_aborted() {
            self.tally(Tally::Skipped);
            return ExtractStep::Skipped;
        }
        if self.options.skip_malformed_paths && entry.is_malformed() {
            debug!(raw_path = entry.raw_path(), "skipping malformed path");
            self.tally(Tally::Skipped);
            return ExtractStep::Skipped;
        }
        // never verified counts as failed
        if self.options.skip_failed_md5 && !entry.is_checksum_validated() {
            debug!(path = entry.path(), "skipping entry without a passed checksum");
            self.tally(Tally::Skipped);
            return ExtractStep::Skipped;
        }
        if let Some(first) = plan.owner {
            let e = ExtractError::DuplicatePath {
                path: entry.path().to_string(),
                first: first.to_string(),
            };
            warn!(raw_path = entry.raw_path(), error = %e, "extraction failed");
            self.tally(Tally::Broken);
            return ExtractStep::Failed(e);
        }
        if let Some(sink) = &self.progress {
            sink.item_started(index, total, &extract_description(index, entries, output_dir));
        }

        let ctx = ExtractContext {
            decryptor: self.decryptor.as_deref(),
            allow_malformed: !self.options.skip_malformed_paths,
        };
        match extract(entry, output_dir, ctx) {
            Ok(n) => match plan.prior_failure {
                Some(reason) => {
                    self.tally(Tally::Broken);
                    ExtractStep::WrittenUnverified(n, reason)
                }
                None => {
                    self.tally(Tally::Completed);
                    ExtractStep::Written(n)
                }
            },
            Err(e) => {
                if matches!(e, ExtractError::DecryptionFailed { .. }) {
                    self.encryption_error.store(true, Ordering::Relaxed);
                }
                warn!(path = entry.path(), error = %chain_message(&e), "extraction failed");
                self.tally(Tally::Broken);
                ExtractStep::Failed(e)
            }
        }
    }

    /// Runs `f` once per index and joins. Results come back in `items` order
    /// whatever order the workers finished in.
    fn dispatch<T, F>(&self, items: &[usize], f: F) -> Result<Vec<T>>
    where
        T: Send,
        F: Fn(usize) -> T + Sync,
    {
        if !self.options.multi_thread {
            return Ok(items.iter().map(|&i| f(i)).collect());
        }
        match self.options.threads {
            Some(n) if n > 0 => {
                let pool = rayon::ThreadPoolBuilder::new().num_threads(n).build()?;
                Ok(pool.install(|| items.par_iter().map(|&i| f(i)).collect()))
            }
            _ => Ok(items.par_iter().map(|&i| f(i)).collect()),
        }
    }
}

#[derive(Clone, Copy)]
struct EntryPlan<'a> {
    prior_failure: Option<FailReason>,
    /// Raw path of the earlier entry that owns this entry's target.
    owner: Option<&'a str>,
}

fn broken_entry(entry: &PackedFileInfo, code: ErrorCode, reason: String) -> BrokenEntry {
    BrokenEntry {
        path: entry.path().to_string(),
        raw_path: entry.raw_path().to_string(),
        code,
        reason,
    }
}

fn fail_reason_text(reason: FailReason) -> &'static str {
    match reason {
        FailReason::Mismatch => "checksum mismatch",
        FailReason::DecryptionFailed => "decryption failed",
        FailReason::Io => "read error",
    }
}

fn select_entries<S: AsRef<str>>(
    entries: &[PackedFileInfo],
    files_to_extract: &[S],
) -> Result<Vec<usize>> {
    if files_to_extract.is_empty() {
        return Ok((0..entries.len()).collect());
    }
    let wanted: HashSet<String> = files_to_extract
        .iter()
        .map(|f| normalize(f.as_ref()).path)
        .collect();

    let selected: Vec<usize> = entries
        .iter()
        .enumerate()
        .filter(|(_, e)| wanted.contains(e.path()))
        .map(|(i, _)| i)
        .collect();

    let found: HashSet<&str> = selected.iter().map(|&i| entries[i].path()).collect();
    let mut missing: Vec<String> = wanted
        .iter()
        .filter(|p| !found.contains(p.as_str()))
        .cloned()
        .collect();
    if !missing.is_empty() {
        missing.sort();
        return Err(PckError::UnknownFilterPaths { paths: missing });
    }
    Ok(selected)
}
