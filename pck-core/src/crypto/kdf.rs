use argon2::Argon2;

use crate::error::{PckError, Result};

pub const KEY_LEN: usize = 32;

/// Derives a raw 32-byte key from a passphrase with Argon2id default parameters.
pub fn derive_key(passphrase: &[u8], salt: &[u8]) -> Result<[u8; KEY_LEN]> {
    let mut out = [0u8; KEY_LEN];
    Argon2::default()
        .hash_password_into(passphrase, salt, &mut out)
        .map_err(|e| PckError::Crypto(format!("key derivation: {e}")))?;
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deterministic_per_salt() {
        let a = derive_key(b"hunter2", b"0123456789abcdef").unwrap();
        let b = derive_key(b"hunter2", b"0123456789abcdef").unwrap();
        let c = derive_key(b"hunter2", b"fedcba9876543210").unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn short_salt_is_rejected() {
        assert!(derive_key(b"pw", b"abc").is_err());
    }
}
