use aes_gcm::aead::{Aead, AeadCore, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use sha2::{Digest, Sha256};

use crate::error::{CryptoError, Result};

const NONCE_LEN: usize = 12;

/// Wraps credential payloads at rest with AES-256-GCM. Every `encrypt` call
/// draws a fresh random nonce, so two encryptions of the same plaintext
/// never produce the same ciphertext.
pub struct Cipher {
    key: [u8; 32],
}

impl Cipher {
    /// Derives the wrap key from a configured secret, or — if none is
    /// configured — from a machine-stable string. The fallback is weak by
    /// design: it exists so pre-existing databases created without an
    /// explicit key remain readable. Preserved intentionally; see DESIGN.md.
    pub fn new(configured_key: Option<&str>) -> Self {
        let key = match configured_key {
            Some(secret) => derive_key(secret.as_bytes()),
            None => {
                tracing::warn!(
                    "GOATWAY_ENCRYPTION_KEY is not set; falling back to a machine-derived key. \
                     Credentials encrypted under this key are only as safe as this host."
                );
                derive_key(&fallback_material())
            }
        };
        Self { key }
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> Result<String> {
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Aes256Gcm::generate_nonce(&mut OsRng);
        let ciphertext = cipher
            .encrypt(&nonce, plaintext)
            .map_err(|_| CryptoError::Encrypt)?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(nonce.as_slice());
        out.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(out))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<Vec<u8>> {
        let raw = BASE64
            .decode(encoded)
            .map_err(|e| CryptoError::Encoding(e.to_string()))?;
        if raw.len() < NONCE_LEN {
            return Err(CryptoError::Encoding("ciphertext shorter than nonce".into()));
        }
        let (nonce_bytes, ciphertext) = raw.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(&self.key));
        let nonce = Nonce::from_slice(nonce_bytes);
        cipher
            .decrypt(nonce, ciphertext)
            .map_err(|_| CryptoError::Decrypt)
    }
}

fn derive_key(material: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(material);
    hasher.finalize().into()
}

fn fallback_material() -> Vec<u8> {
    let hostname = hostname();
    let home = std::env::var("HOME").unwrap_or_default();
    format!("{hostname}{home}goatway-default-key").into_bytes()
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .ok()
        .or_else(|| {
            std::process::Command::new("hostname")
                .output()
                .ok()
                .and_then(|o| String::from_utf8(o.stdout).ok())
                .map(|s| s.trim().to_string())
        })
        .unwrap_or_else(|| "unknown-host".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn roundtrip() {
        let cipher = Cipher::new(Some("test-secret"));
        let plaintext = b"sk-upstream-key-material";
        let encoded = cipher.encrypt(plaintext).unwrap();
        assert_eq!(cipher.decrypt(&encoded).unwrap(), plaintext);
    }

    #[test]
    fn nonces_are_distinct() {
        let cipher = Cipher::new(Some("test-secret"));
        let a = cipher.encrypt(b"same plaintext").unwrap();
        let b = cipher.encrypt(b"same plaintext").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn wrong_key_fails_to_decrypt() {
        let a = Cipher::new(Some("key-a"));
        let b = Cipher::new(Some("key-b"));
        let encoded = a.encrypt(b"secret").unwrap();
        assert!(b.decrypt(&encoded).is_err());
    }

    #[test]
    fn corrupt_ciphertext_is_rejected() {
        let cipher = Cipher::new(Some("test-secret"));
        let mut encoded = cipher.encrypt(b"secret").unwrap();
        encoded.push('!');
        assert!(cipher.decrypt(&encoded).is_err());
    }

    #[test]
    fn fallback_key_is_deterministic() {
        let a = Cipher::new(None);
        let b = Cipher::new(None);
        let encoded = a.encrypt(b"x").unwrap();
        assert_eq!(b.decrypt(&encoded).unwrap(), b"x");
    }
}
