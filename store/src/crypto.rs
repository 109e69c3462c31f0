//! Cryptography module for the shell file and the license side file
//!
//! Provides AES-256-GCM encryption with Argon2id key derivation, the
//! self-describing container layout written to disk, and the salted
//! one-way hashes used for category passwords.

use crate::error::{AppError, Result};
use aes_gcm::{
    aead::{Aead, KeyInit, OsRng},
    Aes256Gcm, Nonce,
};
use argon2::password_hash::SaltString;
use argon2::{Algorithm, Argon2, Params, PasswordHash, PasswordHasher, PasswordVerifier, Version};
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_SIZE: usize = 12; // 96 bits for GCM
const SALT_SIZE: usize = 16; // 128 bits
const KEY_SIZE: usize = 32; // AES-256

/// Leading bytes of every encrypted container
pub const MAGIC: &[u8; 16] = b"RAPIDNOTES-SHELL";

/// Header of a plain SQLite database (legacy unencrypted shells)
pub const SQLITE_HEADER: &[u8; 16] = b"SQLite format 3\0";

const FORMAT_VERSION: u8 = 1;
const HEADER_SIZE: usize = MAGIC.len() + 1 + 3 * 4 + SALT_SIZE + NONCE_SIZE;

/// Argon2id cost parameters, stored in the container header so a file
/// stays readable after the defaults change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    pub memory_kib: u32,
    pub iterations: u32,
    pub parallelism: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            memory_kib: Params::DEFAULT_M_COST,
            iterations: Params::DEFAULT_T_COST,
            parallelism: Params::DEFAULT_P_COST,
        }
    }
}

/// Encrypted data container
#[derive(Debug, Clone)]
pub struct EncryptedData {
    pub kdf: KdfParams,
    pub salt: Vec<u8>,
    pub nonce: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

impl EncryptedData {
    /// Serialize as `MAGIC | version | m t p (u32 LE) | salt | nonce | ciphertext`
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        out.extend_from_slice(MAGIC);
        out.push(FORMAT_VERSION);
        out.extend_from_slice(&self.kdf.memory_kib.to_le_bytes());
        out.extend_from_slice(&self.kdf.iterations.to_le_bytes());
        out.extend_from_slice(&self.kdf.parallelism.to_le_bytes());
        out.extend_from_slice(&self.salt);
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_SIZE || !is_encrypted_container(bytes) {
            return Err(AppError::Crypto("Not an encrypted container".to_string()));
        }

        let version = bytes[MAGIC.len()];
        if version != FORMAT_VERSION {
            return Err(AppError::Crypto(format!(
                "Unsupported container version {}",
                version
            )));
        }

        let word = |at: usize| u32::from_le_bytes([bytes[at], bytes[at + 1], bytes[at + 2], bytes[at + 3]]);
        let base = MAGIC.len() + 1;
        let kdf = KdfParams {
            memory_kib: word(base),
            iterations: word(base + 4),
            parallelism: word(base + 8),
        };

        let salt_start = base + 12;
        let nonce_start = salt_start + SALT_SIZE;
        let body_start = nonce_start + NONCE_SIZE;

        Ok(Self {
            kdf,
            salt: bytes[salt_start..nonce_start].to_vec(),
            nonce: bytes[nonce_start..body_start].to_vec(),
            ciphertext: bytes[body_start..].to_vec(),
        })
    }
}

/// True when `bytes` starts with the container magic
pub fn is_encrypted_container(bytes: &[u8]) -> bool {
    bytes.starts_with(MAGIC)
}

/// True when `bytes` is an unencrypted SQLite database
pub fn is_plain_sqlite(bytes: &[u8]) -> bool {
    bytes.starts_with(SQLITE_HEADER)
}

/// Encrypt data with AES-256-GCM
pub fn encrypt(plaintext: &[u8], password: &str, kdf: KdfParams) -> Result<EncryptedData> {
    // Generate random salt
    let mut salt = vec![0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let key = derive_key(password, &salt, &kdf)?;

    let mut nonce_bytes = vec![0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| AppError::Crypto(format!("Cipher initialization failed: {}", e)))?;

    let ciphertext = cipher
        .encrypt(nonce, plaintext)
        .map_err(|e| AppError::Crypto(format!("Encryption failed: {}", e)))?;

    Ok(EncryptedData {
        kdf,
        salt,
        nonce: nonce_bytes,
        ciphertext,
    })
}

/// Decrypt data with AES-256-GCM
pub fn decrypt(encrypted: &EncryptedData, password: &str) -> Result<Vec<u8>> {
    if encrypted.nonce.len() != NONCE_SIZE {
        return Err(AppError::Crypto("Invalid nonce length".to_string()));
    }

    let key = derive_key(password, &encrypted.salt, &encrypted.kdf)?;
    let nonce = Nonce::from_slice(&encrypted.nonce);

    let cipher = Aes256Gcm::new_from_slice(&key)
        .map_err(|e| AppError::Crypto(format!("Cipher initialization failed: {}", e)))?;

    // Authentication failure covers both a wrong key and a damaged file
    cipher
        .decrypt(nonce, encrypted.ciphertext.as_ref())
        .map_err(|e| AppError::Crypto(format!("Decryption failed: {}", e)))
}

/// Derive a 256-bit key from password using Argon2id
fn derive_key(password: &str, salt: &[u8], kdf: &KdfParams) -> Result<[u8; KEY_SIZE]> {
    let params = Params::new(kdf.memory_kib, kdf.iterations, kdf.parallelism, Some(KEY_SIZE))
        .map_err(|e| AppError::Crypto(format!("Invalid KDF parameters: {}", e)))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut key = [0u8; KEY_SIZE];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| AppError::Crypto(format!("Key derivation failed: {}", e)))?;

    Ok(key)
}

/// Salted Argon2id hash in PHC string form
pub fn hash_password(password: &str) -> Result<String> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);

    let salt_string = SaltString::encode_b64(&salt)
        .map_err(|e| AppError::Crypto(format!("Salt encoding failed: {}", e)))?;

    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt_string)
        .map_err(|e| AppError::Crypto(format!("Password hashing failed: {}", e)))?;

    Ok(hash.to_string())
}

/// Check `password` against a PHC string produced by [`hash_password`].
/// A malformed stored hash never verifies.
pub fn verify_password(password: &str, phc: &str) -> bool {
    match PasswordHash::new(phc) {
        Ok(parsed) => Argon2::default()
            .verify_password(password.as_bytes(), &parsed)
            .is_ok(),
        Err(e) => {
            tracing::warn!("Stored password hash is malformed: {}", e);
            false
        }
    }
}

/// Lowercase hex SHA-256
pub fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
