use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::cipher::{self, EncryptedPayload};
use super::VaultError;

pub const KEY_FILE: &str = "key.json";

/// The persisted key record: current key material plus the timestamp of
/// the last rotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeyRecord {
    pub key: String,
    pub last_rotated: DateTime<Utc>,
}

/// Manages the symmetric key's lifecycle over a directory of encrypted
/// store files: generation on first use, age-based rotation with bulk
/// re-encryption of everything persisted under it.
///
/// Rotation requires exclusive access to the store for its duration;
/// the tracker owns the vault for the whole of a batch run.
pub struct KeyVault {
    store_dir: PathBuf,
    rotation_interval_days: i64,
    record: KeyRecord,
}

impl KeyVault {
    /// Open the vault rooted at `store_dir`. A missing key record is
    /// expected on first run and produces a fresh one.
    pub fn open(
        store_dir: impl Into<PathBuf>,
        rotation_interval_days: i64,
        now: DateTime<Utc>,
    ) -> Result<Self, VaultError> {
        let store_dir = store_dir.into();
        fs::create_dir_all(&store_dir).map_err(|e| VaultError::Write(e.to_string()))?;

        let key_path = store_dir.join(KEY_FILE);
        let record = if key_path.exists() {
            let content =
                fs::read_to_string(&key_path).map_err(|e| VaultError::Read(e.to_string()))?;
            serde_json::from_str(&content).map_err(|e| VaultError::Parse(e.to_string()))?
        } else {
            log::info!("No key record found; generating a new one");
            let record = KeyRecord {
                key: cipher::generate_key(),
                last_rotated: now,
            };
            persist_record(&key_path, &record)?;
            record
        };

        Ok(Self {
            store_dir,
            rotation_interval_days,
            record,
        })
    }

    pub fn record(&self) -> &KeyRecord {
        &self.record
    }

    pub fn key(&self) -> &str {
        &self.record.key
    }

    pub fn store_dir(&self) -> &Path {
        &self.store_dir
    }

    /// Encrypt `plaintext` under the active key and commit it to `path`
    /// atomically (temp file in the same directory, then rename), so a
    /// crash can never leave a half-rewritten file behind.
    pub fn encrypt_to_file(&self, path: &Path, plaintext: &[u8]) -> Result<(), VaultError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|e| VaultError::Write(e.to_string()))?;
        }
        let payload = cipher::encrypt(&self.record.key, plaintext)?;
        write_payload_atomic(path, &payload)
    }

    /// Read and decrypt one store file under the active key.
    pub fn decrypt_file(&self, path: &Path) -> Result<Vec<u8>, VaultError> {
        let content = fs::read_to_string(path).map_err(|e| VaultError::Read(e.to_string()))?;
        let payload: EncryptedPayload =
            serde_json::from_str(&content).map_err(|e| VaultError::Parse(e.to_string()))?;
        cipher::decrypt(&self.record.key, &payload)
    }

    /// Rotate the key if it is at least the configured number of days
    /// old, re-encrypting every store file under the new key. Returns
    /// whether a rotation ran.
    ///
    /// The pass is two-phase: every file is decrypted and verified
    /// first, so a single undecryptable file aborts the whole rotation
    /// before anything on disk changes and the old key stays active.
    pub fn rotate_if_due(&mut self, now: DateTime<Utc>) -> Result<bool, VaultError> {
        let age = now - self.record.last_rotated;
        if age < Duration::days(self.rotation_interval_days) {
            log::debug!(
                "Key not due for rotation; last rotated {} days ago",
                age.num_days()
            );
            return Ok(false);
        }

        log::info!("Rotating key after {} days", age.num_days());
        let files = collect_store_files(&self.store_dir)?;

        let mut plaintexts = Vec::with_capacity(files.len());
        for path in &files {
            let plaintext = self.decrypt_file(path).map_err(|e| {
                log::error!("Aborting rotation: {} failed to decrypt: {}", path.display(), e);
                e
            })?;
            plaintexts.push(plaintext);
        }

        let new_record = KeyRecord {
            key: cipher::generate_key(),
            last_rotated: now,
        };
        for (path, plaintext) in files.iter().zip(&plaintexts) {
            let payload = cipher::encrypt(&new_record.key, plaintext)?;
            write_payload_atomic(path, &payload)?;
            log::debug!("Re-encrypted {}", path.display());
        }

        persist_record(&self.store_dir.join(KEY_FILE), &new_record)?;
        self.record = new_record;
        log::info!("Key rotation complete ({} files)", files.len());
        Ok(true)
    }
}

fn persist_record(path: &Path, record: &KeyRecord) -> Result<(), VaultError> {
    let content =
        serde_json::to_string_pretty(record).map_err(|e| VaultError::Serialize(e.to_string()))?;
    fs::write(path, content).map_err(|e| VaultError::Write(e.to_string()))
}

fn write_payload_atomic(path: &Path, payload: &EncryptedPayload) -> Result<(), VaultError> {
    let content =
        serde_json::to_string_pretty(payload).map_err(|e| VaultError::Serialize(e.to_string()))?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, content).map_err(|e| VaultError::Write(e.to_string()))?;
    fs::rename(&tmp, path).map_err(|e| VaultError::Write(e.to_string()))
}

/// Every `.json` file under the store directory (dated subdirectories
/// included), excluding the key record itself.
fn collect_store_files(dir: &Path) -> Result<Vec<PathBuf>, VaultError> {
    let mut files = Vec::new();
    let mut stack = vec![dir.to_path_buf()];

    while let Some(current) = stack.pop() {
        let entries = fs::read_dir(&current).map_err(|e| VaultError::Read(e.to_string()))?;
        for entry in entries {
            let entry = entry.map_err(|e| VaultError::Read(e.to_string()))?;
            let path = entry.path();
            if path.is_dir() {
                stack.push(path);
            } else if path.extension().map_or(false, |ext| ext == "json")
                && path.file_name().map_or(false, |name| name != KEY_FILE)
            {
                files.push(path);
            }
        }
    }

    files.sort();
    Ok(files)
}
