use md5::{Digest, Md5};
use std::io::{Result, Write};

/// Feeds everything written through it into an MD5 state before forwarding.
pub struct HashingForward<'a, W: Write> {
    inner: W,
    hasher: &'a mut Md5,
    /// Bytes hashed so far.
    pub counted: u64,
}

impl<'a, W: Write> HashingForward<'a, W> {
    pub fn new(inner: W, hasher: &'a mut Md5) -> Self {
        Self {
            inner,
            hasher,
            counted: 0,
        }
    }
}

impl<'a, W: Write> Write for HashingForward<'a, W> {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        let n = self.inner.write(buf)?;
        // only what the inner writer accepted, so a short write is not hashed twice
        self.hasher.update(&buf[..n]);
        self.counted += n as u64;
        Ok(n)
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forwards_and_hashes() {
        let mut hasher = Md5::new();
        let mut out = Vec::new();
        {
            let mut fwd = HashingForward::new(&mut out, &mut hasher);
            fwd.write_all(b"hello ").unwrap();
            fwd.write_all(b"world").unwrap();
            assert_eq!(fwd.counted, 11);
        }
        assert_eq!(out, b"hello world");
        let digest: [u8; 16] = hasher.finalize().into();
        assert_eq!(hex::encode(digest), "5eb63bbbe01eeed093cb22bb8f5acdc3");
    }
}
