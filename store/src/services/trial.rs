//! Trial and activation gate
//!
//! Trial state lives in an encrypted side file next to the kernel. Every
//! mutation is written through immediately. An unreadable file fails
//! closed: the trial reads as expired until a valid code is entered.

use crate::config::{Clock, StoreConfig, MAX_FAILED_ACTIVATION_ATTEMPTS, TRIAL_DAYS, USAGE_LIMIT};
use crate::crypto::{self, EncryptedData, KdfParams};
use crate::error::{AppError, Result};
use crate::storage::shell::write_atomic;
use chrono::{DateTime, Local, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex;

/// Persisted trial counters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialState {
    pub install_date: DateTime<Utc>,
    pub days_left: i64,
    pub usage_count: i64,
    pub failed_attempts: i64,
    pub is_locked: bool,
    pub last_attempt_date: Option<NaiveDate>,
    /// Latest clock reading accepted; an earlier reading means the clock
    /// was moved back
    pub last_check: DateTime<Utc>,
    pub is_activated: bool,
}

impl TrialState {
    fn fresh(now: DateTime<Utc>) -> Self {
        Self {
            install_date: now,
            days_left: TRIAL_DAYS,
            usage_count: 0,
            failed_attempts: 0,
            is_locked: false,
            last_attempt_date: None,
            last_check: now,
            is_activated: false,
        }
    }

    fn expired(now: DateTime<Utc>) -> Self {
        Self {
            days_left: 0,
            usage_count: USAGE_LIMIT,
            ..Self::fresh(now)
        }
    }

    fn is_expired(&self) -> bool {
        !self.is_activated && (self.days_left <= 0 || self.usage_count >= USAGE_LIMIT)
    }
}

/// Trial summary for the UI
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TrialStatus {
    pub days_left: i64,
    pub usage_count: i64,
    pub usage_limit: i64,
    pub is_activated: bool,
    pub is_expired: bool,
    pub is_locked: bool,
    pub failed_attempts: i64,
}

impl From<&TrialState> for TrialStatus {
    fn from(state: &TrialState) -> Self {
        Self {
            days_left: state.days_left,
            usage_count: state.usage_count,
            usage_limit: USAGE_LIMIT,
            is_activated: state.is_activated,
            is_expired: state.is_expired(),
            is_locked: state.is_locked,
            failed_attempts: state.failed_attempts,
        }
    }
}

pub struct TrialGate {
    path: PathBuf,
    key: String,
    kdf: KdfParams,
    clock: Arc<dyn Clock>,
    activation_digest: Option<String>,
    state: Mutex<TrialState>,
}

async fn read_state(path: &Path, key: &str) -> Result<TrialState> {
    let bytes = tokio::fs::read(path).await?;
    let key = key.to_string();
    let plaintext = tokio::task::spawn_blocking(move || {
        EncryptedData::from_bytes(&bytes).and_then(|encrypted| crypto::decrypt(&encrypted, &key))
    })
    .await
    .map_err(|e| AppError::Crypto(format!("Decrypt task failed: {}", e)))??;

    Ok(serde_json::from_slice(&plaintext)?)
}

impl TrialGate {
    /// Load the side file, creating it on first run
    pub async fn load(config: &StoreConfig, key: &str) -> Result<Self> {
        let path = config.license_path();
        let now = config.clock.now();

        let (state, write_back) = if !path.exists() {
            tracing::info!("No license file, starting a {} day trial", TRIAL_DAYS);
            (TrialState::fresh(now), true)
        } else {
            match read_state(&path, key).await {
                Ok(state) => (state, false),
                Err(e) => {
                    tracing::warn!("License file unreadable, treating trial as expired: {}", e);
                    (TrialState::expired(now), false)
                }
            }
        };

        let gate = Self {
            path,
            key: key.to_string(),
            kdf: config.kdf,
            clock: config.clock.clone(),
            activation_digest: config.activation_digest.clone(),
            state: Mutex::new(state),
        };

        if write_back {
            let state = gate.state.lock().await;
            gate.save(&state).await?;
        }

        Ok(gate)
    }

    async fn save(&self, state: &TrialState) -> Result<()> {
        let json = serde_json::to_vec(state)?;
        let key = self.key.clone();
        let kdf = self.kdf;
        let sealed = tokio::task::spawn_blocking(move || {
            crypto::encrypt(&json, &key, kdf).map(|encrypted| encrypted.to_bytes())
        })
        .await
        .map_err(|e| AppError::Crypto(format!("Encrypt task failed: {}", e)))??;

        write_atomic(&self.path, &sealed).await
    }

    /// Current status. With `validate`, days left are recomputed from the
    /// install date; a clock reading earlier than the last accepted one
    /// leaves the stored values untouched.
    pub async fn get_trial_status(&self, validate: bool) -> Result<TrialStatus> {
        let mut state = self.state.lock().await;

        if validate && !state.is_activated {
            let now = self.clock.now();
            if now < state.last_check {
                tracing::warn!(
                    "Clock moved back ({} < {}), keeping stored trial values",
                    now,
                    state.last_check
                );
            } else {
                let elapsed = (now - state.install_date).num_days();
                let computed = (TRIAL_DAYS - elapsed).max(0);
                state.days_left = state.days_left.min(computed);
                state.last_check = now;
                self.save(&state).await?;
            }
        }

        Ok(TrialStatus::from(&*state))
    }

    pub async fn increment_usage_count(&self) -> Result<i64> {
        let mut state = self.state.lock().await;
        state.usage_count += 1;
        self.save(&state).await?;
        Ok(state.usage_count)
    }

    pub async fn reset_usage_count(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.usage_count = 0;
        self.save(&state).await
    }

    /// Check an activation code. Activation is permanent. After
    /// `MAX_FAILED_ACTIVATION_ATTEMPTS` misses in one local day, every
    /// code is refused until the next day.
    pub async fn verify_activation_code(&self, code: &str) -> Result<bool> {
        let mut state = self.state.lock().await;
        let today = self.clock.now().with_timezone(&Local).date_naive();

        if state.last_attempt_date != Some(today) {
            state.failed_attempts = 0;
            state.is_locked = false;
        }
        state.last_attempt_date = Some(today);

        if state.is_locked {
            tracing::warn!("Activation locked until tomorrow");
            self.save(&state).await?;
            return Ok(false);
        }

        let normalized = code.trim().to_uppercase();
        let digest = crypto::sha256_hex(normalized.as_bytes());
        let ok = !normalized.is_empty()
            && self
                .activation_digest
                .as_deref()
                .is_some_and(|expected| expected.eq_ignore_ascii_case(&digest));

        if ok {
            state.is_activated = true;
            state.failed_attempts = 0;
            tracing::info!("Product activated");
        } else {
            state.failed_attempts += 1;
            if state.failed_attempts >= MAX_FAILED_ACTIVATION_ATTEMPTS {
                state.is_locked = true;
                tracing::warn!("Too many failed activation attempts, locking for today");
            }
        }

        self.save(&state).await?;
        Ok(ok)
    }

    pub async fn reset_failed_attempts(&self) -> Result<()> {
        let mut state = self.state.lock().await;
        state.failed_attempts = 0;
        state.is_locked = false;
        self.save(&state).await
    }

    pub async fn is_activated(&self) -> bool {
        self.state.lock().await.is_activated
    }

    /// `Err(TrialExpired)` unless the product may still be used
    pub async fn ensure_active(&self) -> Result<()> {
        if self.get_trial_status(true).await?.is_expired {
            return Err(AppError::TrialExpired);
        }
        Ok(())
    }
}
