use std::io::{self, Cursor, Read};

use crate::crypto::Decryptor;
use crate::entry::PackedFileInfo;
use crate::error::DecryptError;

/// Copy buffer used when streaming entry content.
pub const IO_BUF_LEN: usize = 1 << 16;

/// Opens the plaintext content of `entry`.
///
/// Plain entries stream straight from their source. Encrypted entries are
/// opened block by block through `decryptor`; a missing decryptor or a block
/// that fails to open surfaces as an `io::Error` carrying a [`DecryptError`],
/// see [`decrypt_error`].
pub fn open_entry<'a>(
    entry: &'a PackedFileInfo,
    decryptor: Option<&'a dyn Decryptor>,
) -> io::Result<Box<dyn Read + Send + 'a>> {
    let raw = entry
        .source()
        .open_range(entry.raw_path(), entry.offset(), entry.size())?;
    let exact = ExactRange::new(raw, entry.size());
    if !entry.is_encrypted() {
        return Ok(Box::new(exact));
    }
    let dec = decryptor.ok_or_else(|| decrypt_io_error(DecryptError::MissingKey))?;
    Ok(Box::new(DecryptingReader::new(exact, dec, entry.offset())))
}

/// Returns the decryption failure wrapped in `err`, if that is what it is.
pub fn decrypt_error(err: &io::Error) -> Option<&DecryptError> {
    err.get_ref()
        .and_then(|inner| inner.downcast_ref::<DecryptError>())
}

pub(crate) fn decrypt_io_error(err: DecryptError) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, err)
}

/// Yields exactly `len` bytes from `inner`, failing if the source runs dry first.
pub struct ExactRange<R> {
    inner: R,
    remain: u64,
}

impl<R: Read> ExactRange<R> {
    pub fn new(inner: R, len: u64) -> Self {
        Self { inner, remain: len }
    }
}

impl<R: Read> Read for ExactRange<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.remain == 0 || buf.is_empty() {
            return Ok(0);
        }
        let cap = std::cmp::min(self.remain, buf.len() as u64) as usize;
        let n = self.inner.read(&mut buf[..cap])?;
        if n == 0 {
            return Err(io::Error::new(
                io::ErrorKind::UnexpectedEof,
                format!("source ended {} bytes early", self.remain),
            ));
        }
        self.remain -= n as u64;
        Ok(n)
    }
}

/// Opens sealed blocks one at a time; never buffers more than one block.
pub struct DecryptingReader<'a, R> {
    inner: R,
    decryptor: &'a dyn Decryptor,
    entry_offset: u64,
    block: u64,
    sealed: Vec<u8>,
    cur_buf: Option<Cursor<Vec<u8>>>,
}

impl<'a, R: Read> DecryptingReader<'a, R> {
    pub fn new(inner: R, decryptor: &'a dyn Decryptor, entry_offset: u64) -> Self {
        Self {
            inner,
            decryptor,
            entry_offset,
            block: 0,
            sealed: Vec::new(),
            cur_buf: None,
        }
    }

    fn load_next(&mut self) -> io::Result<bool> {
        let want = self.decryptor.sealed_block_len() as u64;
        if want == 0 {
            return Err(decrypt_io_error(DecryptError::ZeroBlockLength));
        }
        self.sealed.clear();
        let n = (&mut self.inner).take(want).read_to_end(&mut self.sealed)?;
        if n == 0 {
            return Ok(false);
        }
        let plain = self
            .decryptor
            .open_block(self.entry_offset, self.block, &self.sealed)
            .map_err(decrypt_io_error)?;
        self.block += 1;
        self.cur_buf = Some(Cursor::new(plain));
        Ok(true)
    }
}

impl<'a, R: Read> Read for DecryptingReader<'a, R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        loop {
            if let Some(ref mut cur) = self.cur_buf {
                let n = cur.read(buf)?;
                if n > 0 || buf.is_empty() {
                    return Ok(n);
                }
                self.cur_buf = None;
            }
            if !self.load_next()? {
                return Ok(0);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::aead::{AeadKey, XChaChaDecryptor, seal_entry};
    use crate::entry::MD5_EMPTY;
    use crate::source::MemorySource;
    use std::sync::Arc;

    const SALT: [u8; 32] = [3u8; 32];

    fn entry(data: Vec<u8>, offset: u64, size: u64, encrypted: bool) -> PackedFileInfo {
        PackedFileInfo::new(
            "mem",
            "res://x.bin",
            offset,
            size,
            MD5_EMPTY,
            Arc::new(MemorySource::new(data)),
            encrypted,
        )
    }

    #[test]
    fn plain_entry_reads_its_window() {
        let e = entry(b"..abc..".to_vec(), 2, 3, false);
        let mut out = Vec::new();
        open_entry(&e, None).unwrap().read_to_end(&mut out).unwrap();
        assert_eq!(out, b"abc");
    }

    #[test]
    fn short_source_is_unexpected_eof() {
        let e = entry(b"abc".to_vec(), 1, 10, false);
        let mut out = Vec::new();
        let err = open_entry(&e, None)
            .unwrap()
            .read_to_end(&mut out)
            .unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::UnexpectedEof);
        assert!(decrypt_error(&err).is_none());
    }

    #[test]
    fn encrypted_entry_spanning_blocks() {
        let key = AeadKey([9u8; 32]);
        let plain: Vec<u8> = (0..200_000u32).map(|i| (i % 241) as u8).collect();
        let mut blob = vec![0xAAu8; 16];
        blob.extend(seal_entry(&key, &SALT, 16, &plain).unwrap());
        let size = blob.len() as u64 - 16;
        let e = entry(blob, 16, size, true);

        let dec = XChaChaDecryptor::new(&key, SALT);
        let mut out = Vec::new();
        open_entry(&e, Some(&dec))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap();
        assert_eq!(out, plain);
    }

    #[test]
    fn missing_key_and_wrong_key_are_decrypt_errors() {
        let sealed = seal_entry(&AeadKey([1u8; 32]), &SALT, 0, b"classified").unwrap();
        let size = sealed.len() as u64;
        let e = entry(sealed, 0, size, true);

        let err = open_entry(&e, None).err().unwrap();
        assert_eq!(decrypt_error(&err), Some(&DecryptError::MissingKey));

        let wrong = XChaChaDecryptor::new(&AeadKey([2u8; 32]), SALT);
        let mut out = Vec::new();
        let err = open_entry(&e, Some(&wrong))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap_err();
        assert_eq!(
            decrypt_error(&err),
            Some(&DecryptError::Authentication { block: 0 })
        );
    }

    struct NoBlocks;

    impl Decryptor for NoBlocks {
        fn sealed_block_len(&self) -> usize {
            0
        }

        fn open_block(&self, _: u64, _: u64, _: &[u8]) -> Result<Vec<u8>, DecryptError> {
            Ok(Vec::new())
        }
    }

    #[test]
    fn zero_block_length_is_rejected() {
        let e = entry(b"sealed bytes".to_vec(), 0, 12, true);
        let mut out = Vec::new();
        let err = open_entry(&e, Some(&NoBlocks))
            .unwrap()
            .read_to_end(&mut out)
            .unwrap_err();
        assert_eq!(decrypt_error(&err), Some(&DecryptError::ZeroBlockLength));
        assert!(out.is_empty());
    }
}
