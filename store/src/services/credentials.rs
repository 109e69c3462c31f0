/// Credential Manager Service
/// Shell key storage in the OS credential store
use crate::error::{AppError, Result};
use keyring::Entry;
use rand::RngCore;

const SERVICE_NAME: &str = "RapidNotes";
const SHELL_KEY: &str = "shell_key";

/// Credential manager for the shell encryption key
pub struct CredentialManager;

impl CredentialManager {
    /// Return the stored shell key, creating and storing a random one on
    /// first use
    pub fn get_or_create_shell_key() -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, SHELL_KEY)
            .map_err(|e| AppError::Credential(format!("Failed to create keyring entry: {}", e)))?;

        match entry.get_password() {
            Ok(key) => Ok(key),
            Err(keyring::Error::NoEntry) => {
                let key = generate_key();
                entry
                    .set_password(&key)
                    .map_err(|e| AppError::Credential(format!("Failed to store shell key: {}", e)))?;
                tracing::info!("Shell key created in credential manager");
                Ok(key)
            }
            Err(e) => Err(AppError::Credential(format!("Failed to retrieve shell key: {}", e))),
        }
    }

    /// Remove the stored shell key. The shell becomes unreadable.
    pub fn delete_shell_key() -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, SHELL_KEY)
            .map_err(|e| AppError::Credential(format!("Failed to create keyring entry: {}", e)))?;

        entry
            .delete_credential()
            .map_err(|e| AppError::Credential(format!("Failed to delete shell key: {}", e)))?;

        tracing::info!("Shell key deleted from credential manager");
        Ok(())
    }

    pub fn has_shell_key() -> bool {
        Entry::new(SERVICE_NAME, SHELL_KEY)
            .and_then(|entry| entry.get_password())
            .is_ok()
    }
}

/// 256 random bits, hex encoded
fn generate_key() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}
