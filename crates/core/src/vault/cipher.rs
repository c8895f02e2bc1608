use aes::Aes256;
use cbc::cipher::block_padding::Pkcs7;
use cbc::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};

use super::VaultError;

type Aes256CbcEnc = cbc::Encryptor<Aes256>;
type Aes256CbcDec = cbc::Decryptor<Aes256>;

const KEY_LEN: usize = 32;
const IV_LEN: usize = 16;

/// Hex-encoded AES-256-CBC ciphertext with its per-call IV. This is the
/// persisted shape of every encrypted store file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    pub iv: String,
    pub data: String,
}

/// Fresh 256-bit key as 64 hex characters.
pub fn generate_key() -> String {
    let mut key = [0u8; KEY_LEN];
    OsRng.fill_bytes(&mut key);
    hex::encode(key)
}

fn decode_key(key_hex: &str) -> Result<[u8; KEY_LEN], VaultError> {
    let bytes = hex::decode(key_hex).map_err(|e| VaultError::Key(e.to_string()))?;
    bytes
        .try_into()
        .map_err(|_| VaultError::Key(format!("expected {} bytes", KEY_LEN)))
}

/// Encrypt under a freshly drawn random IV; an IV is never reused
/// across payloads.
pub fn encrypt(key_hex: &str, plaintext: &[u8]) -> Result<EncryptedPayload, VaultError> {
    let key = decode_key(key_hex)?;
    let mut iv = [0u8; IV_LEN];
    OsRng.fill_bytes(&mut iv);

    let ciphertext =
        Aes256CbcEnc::new(&key.into(), &iv.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext);

    Ok(EncryptedPayload {
        iv: hex::encode(iv),
        data: hex::encode(ciphertext),
    })
}

/// Exact inverse of [`encrypt`]. Fails with [`VaultError::Integrity`]
/// when the ciphertext or IV is invalid for the given key.
pub fn decrypt(key_hex: &str, payload: &EncryptedPayload) -> Result<Vec<u8>, VaultError> {
    let key = decode_key(key_hex)?;
    let iv: [u8; IV_LEN] = hex::decode(&payload.iv)
        .map_err(|e| VaultError::Integrity(format!("bad iv encoding: {}", e)))?
        .try_into()
        .map_err(|_| VaultError::Integrity(format!("iv is not {} bytes", IV_LEN)))?;
    let ciphertext = hex::decode(&payload.data)
        .map_err(|e| VaultError::Integrity(format!("bad ciphertext encoding: {}", e)))?;

    Aes256CbcDec::new(&key.into(), &iv.into())
        .decrypt_padded_vec_mut::<Pkcs7>(&ciphertext)
        .map_err(|_| VaultError::Integrity("padding check failed for this key".to_string()))
}
