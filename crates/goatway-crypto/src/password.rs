use argon2::password_hash::rand_core::OsRng;
use argon2::password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString};
use argon2::{Algorithm, Argon2, Params, Version};
use rand::distributions::Alphanumeric;
use rand::Rng;

use crate::error::{CryptoError, Result};

const API_KEY_PREFIX: &str = "gw_";
const API_KEY_SUFFIX_LEN: usize = 64;
/// `gw_` plus the first 8 characters of the suffix.
pub const API_KEY_PREFIX_LEN: usize = 11;

fn argon2() -> Argon2<'static> {
    // 64 MiB memory, 1 iteration, 4 lanes, 32-byte output — matches the
    // parameters documented for every hash this gateway stores.
    let params = Params::new(65536, 1, 4, Some(32)).expect("static argon2 params are valid");
    Argon2::new(Algorithm::Argon2id, Version::V0x13, params)
}

/// Hashes a password or API key plaintext. Each call draws a fresh random
/// salt, so hashing the same input twice never produces the same string.
pub fn hash_password(plaintext: &str) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    argon2()
        .hash_password(plaintext.as_bytes(), &salt)
        .map(|h| h.to_string())
        .map_err(|e| CryptoError::InvalidHash(e.to_string()))
}

/// Verifies a plaintext against an encoded Argon2id hash. A malformed or
/// unrecognized hash string is a distinct error, never a silent `false`.
pub fn verify_password(plaintext: &str, encoded_hash: &str) -> Result<bool> {
    let parsed = PasswordHash::new(encoded_hash)
        .map_err(|e| CryptoError::InvalidHash(e.to_string()))?;
    Ok(argon2()
        .verify_password(plaintext.as_bytes(), &parsed)
        .is_ok())
}

/// Generates a new client API key: literal `gw_` plus 64 base62 characters
/// drawn from a CSPRNG. The first 11 characters (`gw_` + 8) are returned
/// alongside as the lookup prefix.
pub fn generate_api_key() -> (String, String) {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(API_KEY_SUFFIX_LEN)
        .map(char::from)
        .collect();
    let key = format!("{API_KEY_PREFIX}{suffix}");
    let prefix = key[..API_KEY_PREFIX_LEN].to_string();
    (key, prefix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_key_shape() {
        let (key, prefix) = generate_api_key();
        assert!(key.starts_with("gw_"));
        assert_eq!(key.len(), 67);
        assert_eq!(prefix.len(), 11);
        assert!(key[3..].chars().all(|c| c.is_ascii_alphanumeric()));
    }

    #[test]
    fn hashes_are_salted_distinct() {
        let a = hash_password("hunter2").unwrap();
        let b = hash_password("hunter2").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("hunter2", &a).unwrap());
        assert!(verify_password("hunter2", &b).unwrap());
    }

    #[test]
    fn wrong_password_fails() {
        let hash = hash_password("correct-horse").unwrap();
        assert!(!verify_password("wrong-password", &hash).unwrap());
    }

    #[test]
    fn malformed_hash_is_a_distinct_error() {
        let err = verify_password("anything", "not-a-real-hash").unwrap_err();
        assert!(matches!(err, CryptoError::InvalidHash(_)));
    }
}
