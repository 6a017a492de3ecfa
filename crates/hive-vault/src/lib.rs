//! Credential vault (spec §4.10, C11): AES-256-GCM encryption at rest with a
//! 32-byte master key persisted as hex in `<dataDir>/encryption.key` (0600),
//! auto-generated on first use. Encrypted blob layout (base64):
//! `iv(12) || authTag(16) || ciphertext`.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use hive_core::{HiveError, Result};
use hive_store::types::{CredentialMetadata, UserCredential};
use hive_store::Store;
use rand::RngCore;

const KEY_FILE_NAME: &str = "encryption.key";
const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

/// Loads (or creates) the master key once and holds it immutably for the
/// process lifetime (spec §5: "read once at vault construction and
/// thereafter immutable").
pub struct Vault {
    key: [u8; 32],
    store: Arc<Store>,
}

impl Vault {
    /// Loads the key from `<data_dir>/encryption.key`, generating one with
    /// mode 0600 if it doesn't exist yet.
    pub fn open(data_dir: &str, store: Arc<Store>) -> Result<Self> {
        let path = Path::new(data_dir).join(KEY_FILE_NAME);
        let key = load_or_create_key(&path)?;
        Ok(Self { key, store })
    }

    pub fn encrypt(&self, plaintext: &str) -> String {
        encrypt(plaintext, &self.key)
    }

    pub fn decrypt(&self, blob: &str) -> Result<String> {
        decrypt(blob, &self.key)
    }

    pub fn store_credential(
        &self,
        owner_id: &str,
        name: &str,
        service: &str,
        plaintext: &str,
    ) -> Result<UserCredential> {
        let blob = self.encrypt(plaintext);
        self.store.store_credential(owner_id, name, service, &blob)
    }

    /// Resolves, decrypts, and returns the plaintext secret. Fails with
    /// `Unauthorized` on ownership mismatch and `IntegrityMismatch` if the
    /// stored blob fails AES-GCM verification.
    pub fn retrieve(&self, requester_id: &str, owner_id: &str, name: &str) -> Result<String> {
        let cred = self.store.resolve_credential(requester_id, owner_id, name)?;
        self.decrypt(&cred.encrypted_value)
    }

    /// `resolveByName` (spec §4.10): same-owner convenience over `retrieve`.
    pub fn resolve_by_name(&self, owner_id: &str, name: &str) -> Result<String> {
        self.retrieve(owner_id, owner_id, name)
    }

    pub fn list(&self, owner_id: &str) -> Result<Vec<CredentialMetadata>> {
        self.store.list_credentials(owner_id)
    }

    pub fn delete(&self, owner_id: &str, name: &str) -> Result<()> {
        self.store.delete_credential(owner_id, name)
    }
}

fn load_or_create_key(path: &PathBuf) -> Result<[u8; 32]> {
    if path.exists() {
        let hex_str = std::fs::read_to_string(path)?;
        let bytes = decode_hex(hex_str.trim())
            .map_err(|e| HiveError::NotConfigured(format!("malformed encryption key file: {e}")))?;
        let key: [u8; 32] = bytes
            .try_into()
            .map_err(|_| HiveError::NotConfigured("encryption key file is not 32 bytes".into()))?;
        return Ok(key);
    }

    let mut key = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut key);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(path, encode_hex(&key))?;
    set_owner_only_permissions(path)?;
    tracing::info!(path = %path.display(), "generated new vault master key");
    Ok(key)
}

#[cfg(unix)]
fn set_owner_only_permissions(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    let perms = std::fs::Permissions::from_mode(0o600);
    std::fs::set_permissions(path, perms)?;
    Ok(())
}

#[cfg(not(unix))]
fn set_owner_only_permissions(_path: &Path) -> Result<()> {
    Ok(())
}

fn encode_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn decode_hex(s: &str) -> std::result::Result<Vec<u8>, String> {
    if s.len() % 2 != 0 {
        return Err("odd-length hex string".into());
    }
    (0..s.len())
        .step_by(2)
        .map(|i| u8::from_str_radix(&s[i..i + 2], 16).map_err(|e| e.to_string()))
        .collect()
}

/// Encrypts `plaintext`, returning `base64(iv[12] || authTag[16] || ciphertext)`.
pub fn encrypt(plaintext: &str, key: &[u8; 32]) -> String {
    let cipher = Aes256Gcm::new_from_slice(key).expect("key is exactly 32 bytes");
    let mut nonce_bytes = [0u8; NONCE_LEN];
    rand::thread_rng().fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    // aes-gcm appends the 16-byte tag to the ciphertext.
    let ciphertext_and_tag = cipher
        .encrypt(nonce, plaintext.as_bytes())
        .expect("AES-256-GCM encryption does not fail for valid keys");

    let mut packed = Vec::with_capacity(NONCE_LEN + ciphertext_and_tag.len());
    packed.extend_from_slice(&nonce_bytes);
    packed.extend_from_slice(&ciphertext_and_tag);
    base64::engine::general_purpose::STANDARD.encode(packed)
}

/// Decrypts a `base64(iv[12] || authTag[16] || ciphertext)` blob.
pub fn decrypt(blob: &str, key: &[u8; 32]) -> Result<String> {
    let packed = base64::engine::general_purpose::STANDARD
        .decode(blob)
        .map_err(|e| HiveError::IntegrityMismatch(format!("invalid base64: {e}")))?;

    if packed.len() < NONCE_LEN + TAG_LEN {
        return Err(HiveError::IntegrityMismatch("ciphertext too short".into()));
    }

    let (nonce_bytes, ciphertext_and_tag) = packed.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);
    let cipher = Aes256Gcm::new_from_slice(key).expect("key is exactly 32 bytes");

    let plaintext = cipher
        .decrypt(nonce, ciphertext_and_tag)
        .map_err(|_| HiveError::IntegrityMismatch("decryption failed: wrong key or corrupted data".into()))?;

    String::from_utf8(plaintext)
        .map_err(|e| HiveError::IntegrityMismatch(format!("decrypted payload is not valid utf-8: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_key() -> [u8; 32] {
        [0xAB; 32]
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_key();
        let plaintext = "sk-live-abc123_secret_token";
        let blob = encrypt(plaintext, &key);
        assert_eq!(decrypt(&blob, &key).unwrap(), plaintext);
    }

    #[test]
    fn empty_string_roundtrip() {
        let key = test_key();
        let blob = encrypt("", &key);
        assert_eq!(decrypt(&blob, &key).unwrap(), "");
    }

    #[test]
    fn wrong_key_fails() {
        let key1 = [0xAB; 32];
        let key2 = [0xCD; 32];
        let blob = encrypt("my-secret-api-key", &key1);
        assert!(decrypt(&blob, &key2).is_err());
    }

    #[test]
    fn each_encryption_differs() {
        let key = test_key();
        let plaintext = "same-input-every-time";
        let a = encrypt(plaintext, &key);
        let b = encrypt(plaintext, &key);
        assert_ne!(a, b);
        assert_eq!(decrypt(&a, &key).unwrap(), plaintext);
        assert_eq!(decrypt(&b, &key).unwrap(), plaintext);
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let key = test_key();
        let blob = encrypt("sensitive-data", &key);
        let mut raw = base64::engine::general_purpose::STANDARD.decode(&blob).unwrap();
        *raw.last_mut().unwrap() ^= 0xFF;
        let tampered = base64::engine::general_purpose::STANDARD.encode(raw);
        assert!(decrypt(&tampered, &key).is_err());
    }

    #[test]
    fn truncated_ciphertext_fails() {
        let key = test_key();
        let short = base64::engine::general_purpose::STANDARD.encode([0u8; 10]);
        assert!(decrypt(&short, &key).is_err());
    }

    #[test]
    fn invalid_base64_fails() {
        let key = test_key();
        assert!(decrypt("not!valid!base64!!!", &key).is_err());
    }

    #[test]
    fn hex_roundtrip() {
        let key = [0x42u8; 32];
        let hex = encode_hex(&key);
        assert_eq!(decode_hex(&hex).unwrap(), key.to_vec());
    }

    #[test]
    fn key_file_generated_on_first_open() {
        let dir = std::env::temp_dir().join(format!("hive-vault-test-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let store = Arc::new(Store::open_in_memory().unwrap());
        let vault = Vault::open(dir.to_str().unwrap(), store.clone()).unwrap();
        let path = dir.join(KEY_FILE_NAME);
        assert!(path.exists());

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        store.ensure_user("alice").unwrap();
        vault
            .store_credential("alice", "stripe_key", "stripe", "sk_live_abc")
            .unwrap();
        assert_eq!(
            vault.resolve_by_name("alice", "stripe_key").unwrap(),
            "sk_live_abc"
        );

        let _ = std::fs::remove_dir_all(&dir);
    }
}
