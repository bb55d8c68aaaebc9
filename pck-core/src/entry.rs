use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::source::PackSource;
use crate::util::sanitize::normalize;

pub const MD5_LEN: usize = 16;

/// A stored checksum of all zero bytes means the pack recorded none.
pub const MD5_EMPTY: [u8; MD5_LEN] = [0; MD5_LEN];

/// One member of a pack.
///
/// Everything but the checksum-validated flag is fixed at construction. The
/// flag is written by whichever worker verifies the entry, so it lives in an
/// atomic and the coordinator only needs a shared borrow of the entry list.
#[derive(Debug)]
pub struct PackedFileInfo {
    pack: String,
    path: String,
    raw_path: String,
    offset: u64,
    size: u64,
    md5: [u8; MD5_LEN],
    encrypted: bool,
    source: Arc<dyn PackSource>,
    malformed_path: bool,
    md5_passed: AtomicBool,
}

impl PackedFileInfo {
    /// `size` is the stored length of the range, which for encrypted entries
    /// includes the per-block authentication tags.
    pub fn new(
        pack: impl Into<String>,
        raw_path: impl Into<String>,
        offset: u64,
        size: u64,
        md5: [u8; MD5_LEN],
        source: Arc<dyn PackSource>,
        encrypted: bool,
    ) -> Self {
        let raw_path = raw_path.into();
        let fixed = normalize(&raw_path);
        Self {
            pack: pack.into(),
            path: fixed.path,
            raw_path,
            offset,
            size,
            md5,
            encrypted,
            source,
            malformed_path: fixed.malformed,
            md5_passed: AtomicBool::new(false),
        }
    }

    pub fn pack(&self) -> &str {
        &self.pack
    }

    /// Normalized virtual path, relative to the extraction root.
    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn raw_path(&self) -> &str {
        &self.raw_path
    }

    pub fn offset(&self) -> u64 {
        self.offset
    }

    pub fn size(&self) -> u64 {
        self.size
    }

    pub fn md5(&self) -> Option<[u8; MD5_LEN]> {
        self.has_md5().then_some(self.md5)
    }

    pub fn has_md5(&self) -> bool {
        self.md5 != MD5_EMPTY
    }

    pub fn is_malformed(&self) -> bool {
        self.malformed_path
    }

    pub fn is_encrypted(&self) -> bool {
        self.encrypted
    }

    pub fn is_checksum_validated(&self) -> bool {
        self.md5_passed.load(Ordering::Relaxed)
    }

    pub fn source(&self) -> &dyn PackSource {
        self.source.as_ref()
    }

    pub(crate) fn set_md5_match(&self, pass: bool) {
        self.md5_passed.store(pass && self.has_md5(), Ordering::Relaxed);
    }
}
