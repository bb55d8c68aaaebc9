#![forbid(unsafe_code)]

pub mod error;
pub mod options;

pub mod util {
    pub mod hash_forward;
    pub mod sanitize;
}

pub mod crypto;
pub mod source;

pub mod entry;

pub mod read {
    pub mod extract;
    pub mod stream;
    pub mod verify;
}

pub mod catalog;
pub mod dumper;
pub mod progress;
pub mod report;

// Re-exports: stable API surface
pub use catalog::scan_folder;
pub use crypto::Decryptor;
pub use crypto::aead::{AeadKey, XChaChaDecryptor};
pub use dumper::{AbortHandle, PckDumper};
pub use entry::PackedFileInfo;
pub use error::{DecryptError, ErrorCode, ExtractError, PckError, Result};
pub use options::DumpOptions;
pub use progress::ProgressSink;
pub use read::extract::extract;
pub use read::verify::{VerifyOutcome, verify};
pub use report::{BrokenEntry, CheckReport, DumpReport, RunCounts, SkippedEntry};
pub use source::{FolderSource, MemorySource, PackSource, PackedBlobSource};
pub use util::sanitize::normalize;
