use std::fmt;
use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

/// Failure of a whole verification or extraction call.
#[derive(Error, Debug)]
pub enum PckError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("cannot create output directory `{}`", path.display())]
    CreateOutputDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("requested files are not in the pack: {}", paths.join(", "))]
    UnknownFilterPaths { paths: Vec<String> },

    #[error("cannot start worker pool: {0}")]
    Dispatch(#[from] rayon::ThreadPoolBuildError),

    #[error("extraction finished with errors ({code})")]
    Extraction { code: ErrorCode, summary: String },

    #[error("crypto error: {0}")]
    Crypto(String),
}

// Convenient crate-wide result type
pub type Result<T> = std::result::Result<T, PckError>;

/// Classification of a per-entry failure, used for the aggregate result of a pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    MalformedPath,
    ChecksumAbsent,
    ChecksumMismatch,
    DecryptionFailed,
    ReadFailed,
    WriteFailed,
    PathCreationFailed,
    DuplicatePath,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::MalformedPath => "malformed path",
            ErrorCode::ChecksumAbsent => "checksum absent",
            ErrorCode::ChecksumMismatch => "checksum mismatch",
            ErrorCode::DecryptionFailed => "decryption failed",
            ErrorCode::ReadFailed => "read failed",
            ErrorCode::WriteFailed => "write failed",
            ErrorCode::PathCreationFailed => "path creation failed",
            ErrorCode::DuplicatePath => "duplicate path",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Raised by a [`Decryptor`](crate::crypto::Decryptor) when a sealed block cannot be opened.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecryptError {
    #[error("entry is encrypted and no key was supplied")]
    MissingKey,

    #[error("sealed block {block} is truncated")]
    Truncated { block: u64 },

    #[error("authentication failed for block {block}")]
    Authentication { block: u64 },

    #[error("decryptor reports a zero sealed block length")]
    ZeroBlockLength,
}

/// Failure to extract a single entry.
#[derive(Error, Debug)]
pub enum ExtractError {
    #[error("refusing to extract malformed path `{path}`")]
    MalformedPath { path: String },

    #[error("`{path}` is already written by `{first}`")]
    DuplicatePath { path: String, first: String },

    #[error("cannot create directory `{}`", path.display())]
    PathCreationFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot decrypt `{path}`")]
    DecryptionFailed {
        path: String,
        #[source]
        source: DecryptError,
    },

    #[error("cannot read `{path}`")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot write `{}`", path.display())]
    WriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl ExtractError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ExtractError::MalformedPath { .. } => ErrorCode::MalformedPath,
            ExtractError::DuplicatePath { .. } => ErrorCode::DuplicatePath,
            ExtractError::PathCreationFailed { .. } => ErrorCode::PathCreationFailed,
            ExtractError::DecryptionFailed { .. } => ErrorCode::DecryptionFailed,
            ExtractError::ReadFailed { .. } => ErrorCode::ReadFailed,
            ExtractError::WriteFailed { .. } => ErrorCode::WriteFailed,
        }
    }
}

/// Renders an error together with its whole `source()` chain on one line.
pub fn chain_message(err: &dyn std::error::Error) -> String {
    let mut msg = err.to_string();
    let mut cur = err.source();
    while let Some(e) = cur {
        msg.push_str(": ");
        msg.push_str(&e.to_string());
        cur = e.source();
    }
    msg
}
