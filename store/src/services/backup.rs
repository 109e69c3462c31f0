//! Shell backups
//!
//! After a successful pack the (already encrypted) shell is copied into a
//! backup folder as `<stem>_backup_<timestamp>.db`. Only the newest
//! `retention` copies of a shell are kept.

use crate::error::{AppError, Result};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Debug, Clone)]
pub struct ShellBackups {
    dir: PathBuf,
    retention: usize,
}

fn shell_stem(shell: &Path) -> Result<String> {
    shell
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .ok_or_else(|| AppError::Generic(format!("Shell path has no file name: {:?}", shell)))
}

impl ShellBackups {
    pub fn new(dir: impl Into<PathBuf>, retention: usize) -> Self {
        Self {
            dir: dir.into(),
            retention,
        }
    }

    /// Copy `shell` into the backup folder and apply retention
    pub async fn snapshot(&self, shell: &Path) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir).await?;

        let stem = shell_stem(shell)?;
        let timestamp = Utc::now().format("%Y%m%d_%H%M%S_%3f");
        let target = self.dir.join(format!("{}_backup_{}.db", stem, timestamp));

        let size = fs::copy(shell, &target).await?;
        tracing::info!("Backup created: {:?} ({} bytes)", target, size);

        self.prune(shell).await?;
        Ok(target)
    }

    /// Backups of `shell`, newest first
    pub async fn list(&self, shell: &Path) -> Result<Vec<PathBuf>> {
        let prefix = format!("{}_backup_", shell_stem(shell)?);

        let mut backups = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(backups),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name.starts_with(&prefix) && name.ends_with(".db") {
                backups.push(entry.path());
            }
        }

        // Timestamps sort lexically
        backups.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(backups)
    }

    /// Delete all but the newest `retention` backups. Returns how many
    /// were removed.
    pub async fn prune(&self, shell: &Path) -> Result<usize> {
        let backups = self.list(shell).await?;
        let mut removed = 0;

        for old in backups.iter().skip(self.retention) {
            tracing::info!("Deleting old backup: {:?}", old);
            match fs::remove_file(old).await {
                Ok(()) => removed += 1,
                Err(e) => tracing::warn!("Failed to delete backup file {:?}: {}", old, e),
            }
        }

        Ok(removed)
    }
}
