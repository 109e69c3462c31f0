//! Store configuration
//!
//! Central location for constants, resource limits and the runtime
//! configuration handed to [`crate::app::AppState::init`].

use crate::crypto::KdfParams;
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

// ===== Trial / Licensing =====

/// Length of the trial period in days
pub const TRIAL_DAYS: i64 = 30;

/// Number of privileged actions allowed during the trial
pub const USAGE_LIMIT: i64 = 100;

/// Failed activation attempts allowed per local day before verification locks
pub const MAX_FAILED_ACTIVATION_ATTEMPTS: i64 = 4;

// ===== Files =====

/// Working database file inside the data directory
pub const KERNEL_FILE_NAME: &str = "kernel.db";

/// Encrypted trial state side file inside the data directory
pub const LICENSE_FILE_NAME: &str = "license.dat";

/// Folder next to the shell file that holds rotated shell snapshots
pub const BACKUP_DIR_NAME: &str = "backups";

/// Shell snapshots kept after each pack
pub const BACKUP_RETENTION_COUNT: usize = 10;

// ===== Notes =====

/// Title used when neither a title nor usable content is given
pub const DEFAULT_NOTE_TITLE: &str = "Untitled";

/// Maximum characters of content used for a derived title
pub const DERIVED_TITLE_MAX_CHARS: usize = 50;

/// Note color when neither the caller nor the category provides one
pub const DEFAULT_NOTE_COLOR: &str = "#0A362F";

/// Random palette for new categories created without a color
pub const CATEGORY_PALETTE: &[&str] = &[
    "#FF6B6B", "#4ECDC4", "#45B7D1", "#96CEB4", "#FFEEAD", "#D4A5A5", "#9B59B6", "#3498DB",
    "#E67E22", "#2ECC71", "#E74C3C", "#F1C40F", "#1ABC9C", "#34495E", "#95A5A6",
];

// ===== Reminders =====

/// Poll interval of the reminder scheduler
pub const REMINDER_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// A reminder older than this window is considered missed and never fires
pub const REMINDER_FIRE_WINDOW_SECS: i64 = 600;

// ===== Runtime configuration =====

/// Source of wall-clock time. Injectable so trial expiry and tamper
/// detection can be exercised without touching the system clock.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Clock backed by the operating system
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Where the shell encryption key comes from
#[derive(Clone)]
pub enum KeySource {
    /// Key supplied by the caller
    Explicit(String),
    /// Key kept in the OS credential store; created on first use
    Keyring,
}

/// Runtime configuration for a store instance
#[derive(Clone)]
pub struct StoreConfig {
    /// Encrypted at-rest database file
    pub shell_path: PathBuf,
    /// Directory for the kernel file and the license side file
    pub data_dir: PathBuf,
    pub key_source: KeySource,
    pub kdf: KdfParams,
    /// Hex SHA-256 of the normalized activation code; `None` disables activation
    pub activation_digest: Option<String>,
    pub backup_retention: usize,
    pub clock: Arc<dyn Clock>,
}

impl StoreConfig {
    pub fn new(shell_path: impl Into<PathBuf>, data_dir: impl Into<PathBuf>, key_source: KeySource) -> Self {
        Self {
            shell_path: shell_path.into(),
            data_dir: data_dir.into(),
            key_source,
            kdf: KdfParams::default(),
            activation_digest: None,
            backup_retention: BACKUP_RETENTION_COUNT,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    pub fn with_activation_digest(mut self, digest: impl Into<String>) -> Self {
        self.activation_digest = Some(digest.into());
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_backup_retention(mut self, count: usize) -> Self {
        self.backup_retention = count;
        self
    }

    pub fn kernel_path(&self) -> PathBuf {
        self.data_dir.join(KERNEL_FILE_NAME)
    }

    pub fn license_path(&self) -> PathBuf {
        self.data_dir.join(LICENSE_FILE_NAME)
    }

    pub fn backup_dir(&self) -> PathBuf {
        self.shell_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(BACKUP_DIR_NAME)
    }
}

impl std::fmt::Debug for StoreConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StoreConfig")
            .field("shell_path", &self.shell_path)
            .field("data_dir", &self.data_dir)
            .field("kdf", &self.kdf)
            .field("backup_retention", &self.backup_retention)
            .finish_non_exhaustive()
    }
}
