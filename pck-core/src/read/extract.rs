use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

use super::stream::{IO_BUF_LEN, decrypt_error, open_entry};
use crate::crypto::Decryptor;
use crate::entry::PackedFileInfo;
use crate::error::ExtractError;
use crate::util::sanitize::join_virtual;

#[derive(Clone, Copy, Default)]
pub struct ExtractContext<'a> {
    pub decryptor: Option<&'a dyn Decryptor>,
    /// Write entries whose raw path had to be repaired to their repaired location.
    pub allow_malformed: bool,
}

/// Where `entry` lands under `output_dir`.
pub fn target_path(output_dir: &Path, entry: &PackedFileInfo) -> PathBuf {
    join_virtual(output_dir, entry.path())
}

/// Streams one entry to `output_dir/<virtual path>`, returning the bytes written.
///
/// An existing file is truncated and rewritten. On failure whatever was
/// already written stays on disk.
pub fn extract(
    entry: &PackedFileInfo,
    output_dir: &Path,
    ctx: ExtractContext<'_>,
) -> Result<u64, ExtractError> {
    if entry.path().is_empty() || (entry.is_malformed() && !ctx.allow_malformed) {
        return Err(ExtractError::MalformedPath {
            path: entry.raw_path().to_string(),
        });
    }

    let outp = target_path(output_dir, entry);
    if let Some(parent) = outp.parent() {
        fs::create_dir_all(parent).map_err(|source| ExtractError::PathCreationFailed {
            path: parent.to_path_buf(),
            source,
        })?;
    }

    let mut reader = open_entry(entry, ctx.decryptor).map_err(|e| read_error(entry, e))?;
    let mut out = File::create(&outp).map_err(|source| ExtractError::WriteFailed {
        path: outp.clone(),
        source,
    })?;

    let mut buf = vec![0u8; IO_BUF_LEN];
    let mut written = 0u64;
    loop {
        let k = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(k) => k,
            Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
            Err(e) => return Err(read_error(entry, e)),
        };
        out.write_all(&buf[..k])
            .map_err(|source| ExtractError::WriteFailed {
                path: outp.clone(),
                source,
            })?;
        written += k as u64;
    }
    out.flush().map_err(|source| ExtractError::WriteFailed {
        path: outp.clone(),
        source,
    })?;

    Ok(written)
}

fn read_error(entry: &PackedFileInfo, e: io::Error) -> ExtractError {
    match decrypt_error(&e) {
        Some(d) => ExtractError::DecryptionFailed {
            path: entry.path().to_string(),
            source: d.clone(),
        },
        None => ExtractError::ReadFailed {
            path: entry.path().to_string(),
            source: e,
        },
    }
}
