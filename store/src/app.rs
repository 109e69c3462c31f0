//! Application state and lifecycle
//!
//! `AppState::init` resolves the shell key, unpacks the shell into the
//! kernel, opens the single-writer pool and loads the trial gate.
//! `AppState::close_and_pack` is the only way back: it consumes the state,
//! so nothing can touch the kernel after it has been sealed.

use crate::config::{KeySource, StoreConfig};
use crate::database::{self, Repository};
use crate::error::{AppError, Result};
use crate::services::{CredentialManager, NotesService, RemindersService, ShellBackups, TrialGate};
use crate::storage::{self, ShellPaths, UnpackOutcome};
use std::sync::Arc;
use uuid::Uuid;

/// Central application state holding all services
pub struct AppState {
    config: StoreConfig,
    key: String,
    paths: ShellPaths,
    repo: Repository,
    trial: Arc<TrialGate>,
    backups: ShellBackups,
    outcome: UnpackOutcome,
}

async fn resolve_key(source: &KeySource) -> Result<String> {
    match source {
        KeySource::Explicit(key) => Ok(key.clone()),
        KeySource::Keyring => tokio::task::spawn_blocking(CredentialManager::get_or_create_shell_key)
            .await
            .map_err(|e| AppError::Credential(format!("Keyring task failed: {}", e)))?,
    }
}

impl AppState {
    /// Open the store. Any error here is fatal for the session.
    pub async fn init(config: StoreConfig) -> Result<Self> {
        tracing::info!("Initializing store: {:?}", config);

        let key = resolve_key(&config.key_source).await?;
        if key.is_empty() {
            return Err(AppError::Credential("Shell key must not be empty".to_string()));
        }

        let paths = ShellPaths {
            shell: config.shell_path.clone(),
            kernel: config.kernel_path(),
        };

        let outcome = storage::unpack(&paths, &key).await?;
        tracing::info!("Kernel ready ({:?})", outcome);

        let pool = database::create_pool(&paths.kernel).await?;
        let repo = Repository::new(pool).with_clock(config.clock.clone());
        let trial = Arc::new(TrialGate::load(&config, &key).await?);
        let backups = ShellBackups::new(config.backup_dir(), config.backup_retention);

        tracing::info!("Store initialized successfully");

        Ok(Self {
            config,
            key,
            paths,
            repo,
            trial,
            backups,
            outcome,
        })
    }

    pub fn repo(&self) -> &Repository {
        &self.repo
    }

    pub fn trial(&self) -> Arc<TrialGate> {
        self.trial.clone()
    }

    pub fn notes(&self) -> NotesService {
        NotesService::new(self.repo.clone(), self.trial.clone())
    }

    /// Reminder poller bound to this store. Abort its scheduler handle
    /// before `close_and_pack`.
    pub fn reminders(&self) -> RemindersService {
        RemindersService::new(self.repo.clone(), self.config.clock.clone())
    }

    pub fn unpack_outcome(&self) -> UnpackOutcome {
        self.outcome
    }

    pub fn backups(&self) -> &ShellBackups {
        &self.backups
    }

    /// Seal the current kernel contents into the shell without closing.
    /// A consistent snapshot is encrypted, so writers keep running.
    pub async fn save_kernel_to_shell(&self) -> Result<()> {
        self.repo.checkpoint().await?;

        let snapshot = self
            .paths
            .kernel
            .with_file_name(format!(".snapshot.{}.db", Uuid::new_v4()));
        self.repo.snapshot_to(&snapshot).await?;

        let sealed = storage::seal_file(&snapshot, &self.paths.shell, &self.key, self.config.kdf).await;

        if let Err(e) = tokio::fs::remove_file(&snapshot).await {
            tracing::warn!("Failed to remove snapshot {:?}: {}", snapshot, e);
        }

        sealed?;
        tracing::info!("Kernel saved to shell");
        Ok(())
    }

    /// Checkpoint, close the pool, seal the kernel into the shell and
    /// delete the kernel. A backup copy of the new shell is taken last;
    /// failing to take it is logged, not returned.
    pub async fn close_and_pack(self) -> Result<()> {
        tracing::info!("Closing store");

        if let Err(e) = self.repo.checkpoint().await {
            tracing::warn!("Checkpoint before close failed: {}", e);
        }
        self.repo.close().await;

        storage::pack(&self.paths, &self.key, self.config.kdf).await?;

        if let Err(e) = self.backups.snapshot(&self.paths.shell).await {
            tracing::error!("Shell backup failed: {}", e);
        }

        tracing::info!("Store closed and packed");
        Ok(())
    }
}
