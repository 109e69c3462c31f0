//! Shell/kernel file swap
//!
//! The live database runs from the *kernel* file. Between sessions the
//! data lives only in the encrypted *shell* file. `unpack` turns the shell
//! into a kernel at startup and `pack` turns the kernel back into a shell
//! at shutdown. The shell is only ever replaced by rename, so a failed pack
//! leaves the previous shell intact.

use crate::crypto::{self, EncryptedData, KdfParams};
use crate::error::{AppError, Result};
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Locations of the at-rest shell and the live kernel
#[derive(Debug, Clone)]
pub struct ShellPaths {
    pub shell: PathBuf,
    pub kernel: PathBuf,
}

/// How the kernel came to exist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnpackOutcome {
    /// Shell decrypted into a new kernel
    Decrypted,
    /// Shell was an unencrypted database and was copied as-is
    LegacyPlain,
    /// No shell yet; the kernel will be created empty
    Fresh,
    /// A kernel from an interrupted session was found and reused
    RecoveredKernel,
}

/// Materialize the kernel from the shell.
///
/// Any shell that exists but cannot be read back is a fatal
/// [`AppError::Shell`]; an empty database is never substituted for it.
pub async fn unpack(paths: &ShellPaths, key: &str) -> Result<UnpackOutcome> {
    if let Some(parent) = paths.kernel.parent() {
        fs::create_dir_all(parent).await?;
    }

    if fs::try_exists(&paths.kernel).await? {
        tracing::warn!(
            "Kernel file {:?} left over from a previous session, reusing it",
            paths.kernel
        );
        return Ok(UnpackOutcome::RecoveredKernel);
    }

    if !fs::try_exists(&paths.shell).await? {
        tracing::info!("No shell file at {:?}, starting fresh", paths.shell);
        return Ok(UnpackOutcome::Fresh);
    }

    let bytes = fs::read(&paths.shell).await?;

    if bytes.is_empty() {
        tracing::warn!("Shell file {:?} is empty, starting fresh", paths.shell);
        return Ok(UnpackOutcome::Fresh);
    }

    if crypto::is_plain_sqlite(&bytes) {
        tracing::info!("Shell file is an unencrypted database, copying");
        write_atomic(&paths.kernel, &bytes).await?;
        return Ok(UnpackOutcome::LegacyPlain);
    }

    if !crypto::is_encrypted_container(&bytes) {
        return Err(AppError::Shell(format!(
            "Unrecognized shell format: {}",
            paths.shell.display()
        )));
    }

    let key = key.to_string();
    let plaintext = tokio::task::spawn_blocking(move || {
        let encrypted = EncryptedData::from_bytes(&bytes)?;
        crypto::decrypt(&encrypted, &key)
    })
    .await
    .map_err(|e| AppError::Shell(format!("Decrypt task failed: {}", e)))?
    .map_err(|e| AppError::Shell(format!("Cannot open shell file: {}", e)))?;

    write_atomic(&paths.kernel, &plaintext).await?;
    tracing::info!("Shell unpacked ({} bytes)", plaintext.len());

    Ok(UnpackOutcome::Decrypted)
}

/// Encrypt a closed kernel into the shell and remove the kernel.
///
/// On failure the shell is untouched and the kernel is kept for recovery.
pub async fn pack(paths: &ShellPaths, key: &str, kdf: KdfParams) -> Result<()> {
    seal_file(&paths.kernel, &paths.shell, key, kdf).await?;

    for path in kernel_files(&paths.kernel) {
        match fs::remove_file(&path).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove {:?}: {}", path, e),
        }
    }

    tracing::info!("Kernel packed into {:?}", paths.shell);
    Ok(())
}

/// Encrypt `source` and atomically replace `shell` with the result
pub async fn seal_file(source: &Path, shell: &Path, key: &str, kdf: KdfParams) -> Result<()> {
    let plaintext = fs::read(source).await?;

    let key = key.to_string();
    let sealed = tokio::task::spawn_blocking(move || {
        crypto::encrypt(&plaintext, &key, kdf).map(|encrypted| encrypted.to_bytes())
    })
    .await
    .map_err(|e| AppError::Crypto(format!("Encrypt task failed: {}", e)))??;

    write_atomic(shell, &sealed).await
}

/// Write to a sibling temp file, fsync, then rename over `path`.
/// The temp file is removed if any step fails.
pub async fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "shell".to_string());
    let temp_path = path.with_file_name(format!(".{}.{}.tmp", file_name, Uuid::new_v4()));

    let result = async {
        let mut file = fs::File::create(&temp_path).await?;
        file.write_all(data).await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&temp_path, path).await
    }
    .await;

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&temp_path).await {
            if cleanup.kind() != std::io::ErrorKind::NotFound {
                tracing::warn!("Failed to remove temp file {:?}: {}", temp_path, cleanup);
            }
        }
        return Err(e.into());
    }

    tracing::debug!("Wrote {:?} ({} bytes)", path, data.len());
    Ok(())
}

/// The kernel plus the SQLite WAL companions that may sit next to it
fn kernel_files(kernel: &Path) -> Vec<PathBuf> {
    let mut files = vec![kernel.to_path_buf()];
    for suffix in ["-wal", "-shm"] {
        let mut name = kernel.as_os_str().to_os_string();
        name.push(suffix);
        files.push(PathBuf::from(name));
    }
    files
}
