pub mod cipher;
pub mod error;
pub mod password;

pub use cipher::Cipher;
pub use error::CryptoError;
pub use password::{generate_api_key, hash_password, verify_password, API_KEY_PREFIX_LEN};
