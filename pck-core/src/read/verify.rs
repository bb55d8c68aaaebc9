use std::io;

use md5::{Digest, Md5};
use tracing::debug;

use super::stream::{decrypt_error, open_entry};
use crate::crypto::Decryptor;
use crate::entry::{MD5_LEN, PackedFileInfo};
use crate::error::ErrorCode;
use crate::util::hash_forward::HashingForward;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VerifyOutcome {
    Passed,
    Failed(FailReason),
    Skipped(SkipReason),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailReason {
    Mismatch,
    DecryptionFailed,
    Io,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SkipReason {
    NoChecksum,
    MalformedPath,
    Aborted,
}

impl FailReason {
    pub fn code(self) -> ErrorCode {
        match self {
            FailReason::Mismatch => ErrorCode::ChecksumMismatch,
            FailReason::DecryptionFailed => ErrorCode::DecryptionFailed,
            FailReason::Io => ErrorCode::ReadFailed,
        }
    }
}

impl SkipReason {
    /// Code recorded for the skip; an abort is not attributed to the entry.
    pub fn code(self) -> Option<ErrorCode> {
        match self {
            SkipReason::NoChecksum => Some(ErrorCode::ChecksumAbsent),
            SkipReason::MalformedPath => Some(ErrorCode::MalformedPath),
            SkipReason::Aborted => None,
        }
    }
}

/// Checks one entry against its stored MD5 and records the result on it.
pub fn verify(entry: &PackedFileInfo, decryptor: Option<&dyn Decryptor>) -> VerifyOutcome {
    let Some(expected) = entry.md5() else {
        entry.set_md5_match(false);
        return VerifyOutcome::Skipped(SkipReason::NoChecksum);
    };

    let outcome = match digest_entry(entry, decryptor) {
        Ok((actual, _)) if actual == expected => VerifyOutcome::Passed,
        Ok((actual, len)) => {
            debug!(
                path = entry.path(),
                expected = %hex::encode(expected),
                actual = %hex::encode(actual),
                plain_len = len,
                "checksum mismatch"
            );
            VerifyOutcome::Failed(FailReason::Mismatch)
        }
        Err(e) => match decrypt_error(&e) {
            Some(d) => {
                debug!(path = entry.path(), error = %d, "cannot decrypt");
                VerifyOutcome::Failed(FailReason::DecryptionFailed)
            }
            None => {
                debug!(path = entry.path(), error = %e, "cannot read");
                VerifyOutcome::Failed(FailReason::Io)
            }
        },
    };

    entry.set_md5_match(outcome == VerifyOutcome::Passed);
    outcome
}

/// MD5 and length of the entry's plaintext, read in bounded chunks.
pub fn digest_entry(
    entry: &PackedFileInfo,
    decryptor: Option<&dyn Decryptor>,
) -> io::Result<([u8; MD5_LEN], u64)> {
    let mut reader = open_entry(entry, decryptor)?;
    let mut hasher = Md5::new();
    let len = {
        let mut fwd = HashingForward::new(io::sink(), &mut hasher);
        io::copy(&mut reader, &mut fwd)?;
        fwd.counted
    };
    Ok((hasher.finalize().into(), len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aead::{AeadKey, XChaChaDecryptor, seal_entry};
    use crate::entry::MD5_EMPTY;
    use crate::source::MemorySource;
    use std::sync::Arc;

    fn md5_of(data: &[u8]) -> [u8; MD5_LEN] {
        Md5::digest(data).into()
    }

    fn entry(data: &[u8], md5: [u8; MD5_LEN], encrypted: bool) -> PackedFileInfo {
        PackedFileInfo::new(
            "mem",
            "res://f.txt",
            0,
            data.len() as u64,
            md5,
            Arc::new(MemorySource::new(data.to_vec())),
            encrypted,
        )
    }

    #[test]
    fn matching_content_passes_and_marks_entry() {
        let e = entry(b"content", md5_of(b"content"), false);
        assert_eq!(verify(&e, None), VerifyOutcome::Passed);
        assert!(e.is_checksum_validated());
    }

    #[test]
    fn corrupt_content_fails() {
        let e = entry(b"c0ntent", md5_of(b"content"), false);
        assert_eq!(verify(&e, None), VerifyOutcome::Failed(FailReason::Mismatch));
        assert!(!e.is_checksum_validated());
    }

    #[test]
    fn absent_checksum_is_skipped() {
        let e = entry(b"content", MD5_EMPTY, false);
        assert_eq!(
            verify(&e, None),
            VerifyOutcome::Skipped(SkipReason::NoChecksum)
        );
        assert!(!e.is_checksum_validated());
        assert_eq!(SkipReason::NoChecksum.code(), Some(ErrorCode::ChecksumAbsent));
        assert_eq!(SkipReason::Aborted.code(), None);
    }

    #[test]
    fn short_source_is_io_failure() {
        let e = PackedFileInfo::new(
            "mem",
            "res://f.txt",
            0,
            100,
            md5_of(b"whatever"),
            Arc::new(MemorySource::new(b"tiny".to_vec())),
            false,
        );
        assert_eq!(verify(&e, None), VerifyOutcome::Failed(FailReason::Io));
    }

    #[test]
    fn encrypted_entry_checks_plaintext() {
        let key = AeadKey([5u8; 32]);
        let salt = [0u8; 32];
        let sealed = seal_entry(&key, &salt, 0, b"secret body").unwrap();
        let e = entry(&sealed, md5_of(b"secret body"), true);

        let dec = XChaChaDecryptor::new(&key, salt);
        assert_eq!(verify(&e, Some(&dec)), VerifyOutcome::Passed);
        let (_, plain_len) = digest_entry(&e, Some(&dec)).unwrap();
        assert_eq!(plain_len, 11);

        let wrong = XChaChaDecryptor::new(&AeadKey([6u8; 32]), salt);
        assert_eq!(
            verify(&e, Some(&wrong)),
            VerifyOutcome::Failed(FailReason::DecryptionFailed)
        );
        assert!(!e.is_checksum_validated());
        assert_eq!(
            verify(&e, None),
            VerifyOutcome::Failed(FailReason::DecryptionFailed)
        );
    }
}
