//! ED25519 key management for session tokens.
//!
//! - Generates a keypair on first run
//! - Stores the private key (base64) in the data directory
//! - Writes the public key beside it for external verifiers

use base64::Engine;
use ed25519_dalek::{SigningKey, VerifyingKey, SECRET_KEY_LENGTH};
use rand::rngs::OsRng;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

const PRIVATE_KEY_FILE: &str = "session_key";
const PUBLIC_KEY_FILE: &str = "session_key.pub";

/// Key manager for ED25519 signing operations.
pub struct KeyManager {
    signing_key: SigningKey,
    verifying_key: VerifyingKey,
}

impl KeyManager {
    /// Loads existing keys from `dir` or generates new ones.
    pub fn load_or_generate(dir: &Path) -> Result<Self, KeyError> {
        match Self::load_private_key(dir) {
            Ok(signing_key) => {
                tracing::info!("Loaded existing ED25519 keypair");
                Ok(Self::from_signing_key(signing_key))
            }
            Err(KeyError::NotFound) => {
                tracing::info!("No existing keypair found, generating new one");
                Self::generate_new(dir)
            }
            Err(e) => Err(e),
        }
    }

    /// Wraps an existing key (used by tests and tools).
    pub fn from_signing_key(signing_key: SigningKey) -> Self {
        let verifying_key = signing_key.verifying_key();
        Self {
            signing_key,
            verifying_key,
        }
    }

    /// Generates an ephemeral key that is never written to disk.
    pub fn ephemeral() -> Self {
        Self::from_signing_key(SigningKey::generate(&mut OsRng))
    }

    /// Generate new keypair and store it.
    fn generate_new(dir: &Path) -> Result<Self, KeyError> {
        let keys = Self::ephemeral();

        std::fs::create_dir_all(dir).map_err(|e| KeyError::FileSystem(e.to_string()))?;
        Self::store_private_key(dir, &keys.signing_key)?;
        Self::store_public_key(dir, &keys.verifying_key)?;

        tracing::info!("Generated and stored new ED25519 keypair");
        Ok(keys)
    }

    /// Get reference to signing key for signing operations.
    pub fn signing_key(&self) -> &SigningKey {
        &self.signing_key
    }

    /// Get reference to verifying key for verification.
    pub fn verifying_key(&self) -> &VerifyingKey {
        &self.verifying_key
    }

    /// Get public key as base64 string.
    pub fn public_key_base64(&self) -> String {
        base64::engine::general_purpose::STANDARD.encode(self.verifying_key.as_bytes())
    }

    pub fn private_key_path(dir: &Path) -> PathBuf {
        dir.join(PRIVATE_KEY_FILE)
    }

    pub fn public_key_path(dir: &Path) -> PathBuf {
        dir.join(PUBLIC_KEY_FILE)
    }

    fn load_private_key(dir: &Path) -> Result<SigningKey, KeyError> {
        let path = Self::private_key_path(dir);
        let encoded = match std::fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(KeyError::NotFound),
            Err(e) => return Err(KeyError::FileSystem(e.to_string())),
        };

        let bytes = base64::engine::general_purpose::STANDARD
            .decode(encoded.trim())
            .map_err(|e| KeyError::InvalidKey(e.to_string()))?;

        let key_bytes: [u8; SECRET_KEY_LENGTH] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| KeyError::InvalidKey("Invalid key size".into()))?;

        Ok(SigningKey::from_bytes(&key_bytes))
    }

    fn store_private_key(dir: &Path, key: &SigningKey) -> Result<(), KeyError> {
        let path = Self::private_key_path(dir);
        let encoded = base64::engine::general_purpose::STANDARD.encode(key.to_bytes());
        let mut file = open_private(&path).map_err(|e| KeyError::FileSystem(e.to_string()))?;
        file.write_all(encoded.as_bytes())
            .map_err(|e| KeyError::FileSystem(e.to_string()))?;
        Ok(())
    }

    /// Store public key to file for sharing.
    fn store_public_key(dir: &Path, key: &VerifyingKey) -> Result<(), KeyError> {
        let path = Self::public_key_path(dir);
        let public_key_base64 = base64::engine::general_purpose::STANDARD.encode(key.as_bytes());

        std::fs::write(&path, &public_key_base64)
            .map_err(|e| KeyError::FileSystem(e.to_string()))?;

        tracing::info!("Public key stored at: {}", path.display());
        Ok(())
    }
}

/// Opens `path` for writing, owner-only before any byte is written.
#[cfg(unix)]
fn open_private(path: &Path) -> std::io::Result<File> {
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};
    let file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)?;
    // `mode` only applies to new files
    file.set_permissions(std::fs::Permissions::from_mode(0o600))?;
    Ok(file)
}

#[cfg(not(unix))]
fn open_private(path: &Path) -> std::io::Result<File> {
    OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
}

/// Errors that can occur during key operations.
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key not found")]
    NotFound,
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("File system error: {0}")]
    FileSystem(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_generation() {
        let dir = tempfile::tempdir().unwrap();

        // Generate new keys
        let km = KeyManager::load_or_generate(dir.path()).expect("Failed to init key manager");

        // Verify key files exist
        assert!(KeyManager::private_key_path(dir.path()).exists());
        assert!(KeyManager::public_key_path(dir.path()).exists());

        // Verify we can load the same key
        let km2 = KeyManager::load_or_generate(dir.path()).expect("Failed to reload key manager");
        assert_eq!(km.public_key_base64(), km2.public_key_base64());
    }

    #[cfg(unix)]
    #[test]
    fn test_private_key_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let mode = |path: &Path| std::fs::metadata(path).unwrap().permissions().mode() & 0o777;

        KeyManager::load_or_generate(dir.path()).unwrap();
        assert_eq!(mode(&KeyManager::private_key_path(dir.path())), 0o600);

        // A pre-existing loose file is tightened before it is rewritten
        let loose = dir.path().join("loose");
        std::fs::write(&loose, "old").unwrap();
        std::fs::set_permissions(&loose, std::fs::Permissions::from_mode(0o644)).unwrap();
        open_private(&loose).unwrap();
        assert_eq!(mode(&loose), 0o600);
    }

    #[test]
    fn test_corrupt_key_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(KeyManager::private_key_path(dir.path()), "AAAA").unwrap();

        assert!(matches!(
            KeyManager::load_or_generate(dir.path()),
            Err(KeyError::InvalidKey(_))
        ));
    }
}
