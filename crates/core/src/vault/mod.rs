pub mod cipher;
pub mod key_vault;

pub use cipher::{decrypt, encrypt, generate_key, EncryptedPayload};
pub use key_vault::{KeyRecord, KeyVault};

use std::fmt;

/// Error set for at-rest encryption and the key lifecycle.
#[derive(Debug)]
pub enum VaultError {
    /// Key material is not 32 bytes of hex.
    Key(String),
    /// Ciphertext or IV invalid for the given key. Always surfaced
    /// explicitly; decryption never hands back silently wrong plaintext.
    Integrity(String),
    Read(String),
    Write(String),
    Parse(String),
    Serialize(String),
}

impl fmt::Display for VaultError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VaultError::Key(msg) => write!(f, "Invalid key material: {}", msg),
            VaultError::Integrity(msg) => write!(f, "Decryption integrity failure: {}", msg),
            VaultError::Read(msg) => write!(f, "Failed to read encrypted store: {}", msg),
            VaultError::Write(msg) => write!(f, "Failed to write encrypted store: {}", msg),
            VaultError::Parse(msg) => write!(f, "Failed to parse encrypted store: {}", msg),
            VaultError::Serialize(msg) => write!(f, "Failed to serialize payload: {}", msg),
        }
    }
}

impl std::error::Error for VaultError {}
