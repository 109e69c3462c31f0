//! Notes service
//!
//! Capture entry point: gates new notes on the trial, files them under the
//! active category when auto-categorize is on, and counts usage.

use crate::database::{NewNote, Repository, StoreEvent};
use crate::error::Result;
use crate::services::trial::TrialGate;
use std::sync::Arc;
use tokio::task::JoinHandle;

/// Service for capturing notes
#[derive(Clone)]
pub struct NotesService {
    repo: Repository,
    trial: Arc<TrialGate>,
}

impl NotesService {
    pub fn new(repo: Repository, trial: Arc<TrialGate>) -> Self {
        Self { repo, trial }
    }

    /// Add a note on behalf of a capture collaborator
    pub async fn add_note(&self, mut note: NewNote) -> Result<i64> {
        self.trial.ensure_active().await?;

        if note.category_id.is_none() && self.repo.auto_categorize().await {
            note.category_id = self.repo.active_category().await;
        }

        let id = self.repo.add_note(note).await?;
        self.trial.increment_usage_count().await?;

        tracing::info!("Note captured: {}", id);
        Ok(id)
    }

    /// Fire-and-forget capture. The outcome is reported as
    /// `NoteAdded` or `NoteAddFailed` on the event channel.
    pub fn add_note_async(&self, note: NewNote) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            if let Err(e) = service.add_note(note).await {
                tracing::error!("Failed to add note: {}", e);
                service.repo.emit(StoreEvent::NoteAddFailed {
                    reason: e.to_string(),
                });
            }
        })
    }
}
