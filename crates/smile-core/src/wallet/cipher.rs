//! Sealing of wallet secrets at rest (ChaCha20-Poly1305).
//!
//! The key is SHA-256 over a domain prefix and the user's passphrase; each
//! secret gets a fresh random nonce stored in front of the ciphertext.

use base64::{engine::general_purpose::STANDARD, Engine};
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use sha2::{Digest, Sha256};

use crate::error::{Result, SmileError};
use crate::types::SealedSecret;

const KEY_DOMAIN: &[u8] = b"smile-wallet-secret-v1:";
const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct SecretCipher {
    cipher: ChaCha20Poly1305,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("SecretCipher(..)")
    }
}

impl SecretCipher {
    pub fn from_passphrase(passphrase: &str) -> Result<Self> {
        if passphrase.is_empty() {
            return Err(SmileError::invalid("wallet passphrase must not be empty"));
        }
        let mut hasher = Sha256::new();
        hasher.update(KEY_DOMAIN);
        hasher.update(passphrase.as_bytes());
        let key = hasher.finalize();

        Ok(Self {
            cipher: ChaCha20Poly1305::new(Key::from_slice(&key)),
        })
    }

    pub fn seal(&self, plaintext: &str) -> Result<SealedSecret> {
        let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
        let ciphertext = self
            .cipher
            .encrypt(&nonce, plaintext.as_bytes())
            .map_err(|e| SmileError::Crypto(format!("Failed to seal secret: {}", e)))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce);
        blob.extend_from_slice(&ciphertext);
        Ok(SealedSecret(STANDARD.encode(blob)))
    }

    pub fn open(&self, sealed: &SealedSecret) -> Result<String> {
        let blob = STANDARD
            .decode(&sealed.0)
            .map_err(|e| SmileError::Crypto(format!("Sealed secret is not base64: {}", e)))?;
        if blob.len() <= NONCE_LEN {
            return Err(SmileError::Crypto("Sealed secret is truncated".into()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| SmileError::Crypto("Wrong passphrase or corrupted secret".into()))?;

        String::from_utf8(plaintext)
            .map_err(|e| SmileError::Crypto(format!("Secret is not UTF-8: {}", e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seal_and_open() {
        let cipher = SecretCipher::from_passphrase("correct horse").unwrap();
        let sealed = cipher.seal("0xdeadbeef").unwrap();
        assert_ne!(sealed.0, "0xdeadbeef");
        assert_eq!(cipher.open(&sealed).unwrap(), "0xdeadbeef");
    }

    #[test]
    fn test_nonce_differs_per_seal() {
        let cipher = SecretCipher::from_passphrase("pw").unwrap();
        assert_ne!(cipher.seal("same").unwrap(), cipher.seal("same").unwrap());
    }

    #[test]
    fn test_wrong_passphrase_fails() {
        let sealed = SecretCipher::from_passphrase("a").unwrap().seal("secret").unwrap();
        let err = SecretCipher::from_passphrase("b").unwrap().open(&sealed).unwrap_err();
        assert!(matches!(err, SmileError::Crypto(_)));
    }

    #[test]
    fn test_empty_passphrase_rejected() {
        assert!(matches!(
            SecretCipher::from_passphrase(""),
            Err(SmileError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_truncated_blob_rejected() {
        let cipher = SecretCipher::from_passphrase("pw").unwrap();
        let short = SealedSecret(STANDARD.encode([0u8; 4]));
        assert!(cipher.open(&short).is_err());
        assert!(cipher.open(&SealedSecret("%%%".into())).is_err());
    }
}
