use std::fmt;

use blake3::Hasher;
use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};

use super::Decryptor;
use super::hex::parse_hex_array;
use super::kdf::derive_key;
use crate::error::{DecryptError, PckError, Result};

pub const TAG_LEN: usize = 16;

/// Plaintext bytes per sealed block.
pub const BLOCK_LEN: usize = 64 * 1024;

pub const SEALED_BLOCK_LEN: usize = BLOCK_LEN + TAG_LEN;

const AD: &[u8] = b"pck-entry";

/// Raw 32-byte pack key.
#[derive(Clone)]
pub struct AeadKey(pub [u8; 32]);

impl AeadKey {
    pub fn from_hex(hex_str: &str) -> Result<Self> {
        Ok(Self(parse_hex_array::<32>(hex_str)?))
    }

    pub fn from_passphrase(passphrase: &[u8], salt: &[u8]) -> Result<Self> {
        Ok(Self(derive_key(passphrase, salt)?))
    }
}

impl fmt::Debug for AeadKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AeadKey(..)")
    }
}

/// Nonce derivation: XChaCha requires a 24-byte nonce.
/// nonce = blake3(salt || entry_offset || block).take(24)
///
/// Entry offsets are unique within a pack, so (offset, block) never repeats under one key.
pub fn derive_nonce(key_salt: &[u8; 32], entry_offset: u64, block: u64) -> XNonce {
    let mut h = Hasher::new();
    h.update(key_salt);
    h.update(&entry_offset.to_le_bytes());
    h.update(&block.to_le_bytes());
    let out = h.finalize();
    XNonce::from_slice(&out.as_bytes()[..24]).to_owned()
}

/// Stored length of an entry whose plaintext is `plain_len` bytes long.
pub fn sealed_len(plain_len: u64) -> u64 {
    let blocks = plain_len.div_ceil(BLOCK_LEN as u64);
    plain_len + blocks * TAG_LEN as u64
}

/// Seals `plaintext` into the block layout read back by [`XChaChaDecryptor`].
pub fn seal_entry(
    key: &AeadKey,
    key_salt: &[u8; 32],
    entry_offset: u64,
    plaintext: &[u8],
) -> Result<Vec<u8>> {
    let aead = XChaCha20Poly1305::new(Key::from_slice(&key.0));
    let mut out = Vec::with_capacity(sealed_len(plaintext.len() as u64) as usize);
    for (block, chunk) in plaintext.chunks(BLOCK_LEN).enumerate() {
        let nonce = derive_nonce(key_salt, entry_offset, block as u64);
        let sealed = aead
            .encrypt(&nonce, Payload { msg: chunk, aad: AD })
            .map_err(|_| PckError::Crypto(format!("cannot seal block {block}")))?;
        out.extend_from_slice(&sealed);
    }
    Ok(out)
}

/// XChaCha20-Poly1305 block decryptor keyed per pack.
pub struct XChaChaDecryptor {
    aead: XChaCha20Poly1305,
    key_salt: [u8; 32],
}

impl XChaChaDecryptor {
    pub fn new(key: &AeadKey, key_salt: [u8; 32]) -> Self {
        Self {
            aead: XChaCha20Poly1305::new(Key::from_slice(&key.0)),
            key_salt,
        }
    }
}

impl fmt::Debug for XChaChaDecryptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XChaChaDecryptor").finish_non_exhaustive()
    }
}

impl Decryptor for XChaChaDecryptor {
    fn sealed_block_len(&self) -> usize {
        SEALED_BLOCK_LEN
    }

    fn open_block(
        &self,
        entry_offset: u64,
        block: u64,
        sealed: &[u8],
    ) -> std::result::Result<Vec<u8>, DecryptError> {
        if sealed.len() < TAG_LEN {
            return Err(DecryptError::Truncated { block });
        }
        let nonce = derive_nonce(&self.key_salt, entry_offset, block);
        self.aead
            .decrypt(&nonce, Payload { msg: sealed, aad: AD })
            .map_err(|_| DecryptError::Authentication { block })
    }
}
