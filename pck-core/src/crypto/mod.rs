use crate::error::DecryptError;

pub mod aead;
pub mod hex;
pub mod kdf;

/// Decryption transform for encrypted entries.
///
/// Encrypted content is stored as a run of independently sealed blocks. Each
/// block is opened on its own so a reader never holds more than one block of
/// plaintext, and a failure is reported for the exact block that did not
/// authenticate.
pub trait Decryptor: Send + Sync {
    /// Length of one sealed block as stored in the pack. The last block of an
    /// entry may be shorter.
    fn sealed_block_len(&self) -> usize;

    /// Opens block number `block` of the entry stored at `entry_offset`.
    fn open_block(
        &self,
        entry_offset: u64,
        block: u64,
        sealed: &[u8],
    ) -> Result<Vec<u8>, DecryptError>;
}
