// Key management: generation, on-disk storage, and loading of the ECDSA keypair that backs
// a peer's P2PKH ownership scripts. Adapted from the teacher's ECIES key manager, swapping
// its key type for `libsecp256k1` and dropping its interactive/backup extras.

use crate::crypto::{Secp256k1Signer, Signer};
use crate::error::{DfsError, DfsResult};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeyInfo {
    pub name: String,
    pub created: DateTime<Local>,
    pub public_key_hex: String,
}

pub struct KeyManager {
    pub signer: Secp256k1Signer,
    pub key_info: KeyInfo,
}

impl KeyManager {
    pub fn generate(name: impl Into<String>) -> Self {
        let signer = Secp256k1Signer::generate();
        let key_info = KeyInfo {
            name: name.into(),
            created: Local::now(),
            public_key_hex: hex::encode(signer.public_key()),
        };
        KeyManager { signer, key_info }
    }

    pub fn save_to_file(&self, keys_dir: &Path) -> DfsResult<()> {
        fs::create_dir_all(keys_dir)?;

        let key_file = keys_dir.join(format!("{}.key", self.key_info.name));
        let info_file = keys_dir.join(format!("{}.info", self.key_info.name));

        fs::write(&key_file, self.signer.secret_bytes())?;
        let info_json = serde_json::to_string_pretty(&self.key_info)?;
        fs::write(&info_file, info_json)?;

        tracing::info!("key saved: {}", key_file.display());
        Ok(())
    }

    pub fn load_from_file(keys_dir: &Path, name: &str) -> DfsResult<Self> {
        let key_file = keys_dir.join(format!("{}.key", name));
        let info_file = keys_dir.join(format!("{}.info", name));

        let key_bytes = fs::read(&key_file)?;
        if key_bytes.len() != 32 {
            return Err(DfsError::Crypto("secret key file is not 32 bytes".into()));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&key_bytes);
        let signer = Secp256k1Signer::from_secret_bytes(&bytes)?;

        let info_json = fs::read_to_string(&info_file)?;
        let key_info: KeyInfo = serde_json::from_str(&info_json)?;

        Ok(KeyManager { signer, key_info })
    }

    pub fn list_keys(keys_dir: &Path) -> DfsResult<Vec<String>> {
        if !keys_dir.exists() {
            return Ok(Vec::new());
        }
        let mut names = Vec::new();
        for entry in fs::read_dir(keys_dir)? {
            let entry = entry?;
            let path = entry.path();
            if path.extension().is_some_and(|ext| ext == "key") {
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    if keys_dir.join(format!("{}.info", stem)).exists() {
                        names.push(stem.to_string());
                    }
                }
            }
        }
        names.sort();
        Ok(names)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_then_load_round_trips_signer() {
        let dir = tempfile::tempdir().unwrap();
        let manager = KeyManager::generate("alice");
        manager.save_to_file(dir.path()).unwrap();

        let loaded = KeyManager::load_from_file(dir.path(), "alice").unwrap();
        assert_eq!(loaded.signer.secret_bytes(), manager.signer.secret_bytes());
        assert_eq!(loaded.key_info.name, "alice");
    }

    #[test]
    fn list_keys_finds_saved_key() {
        let dir = tempfile::tempdir().unwrap();
        KeyManager::generate("bob").save_to_file(dir.path()).unwrap();
        assert_eq!(KeyManager::list_keys(dir.path()).unwrap(), vec!["bob".to_string()]);
    }
}
