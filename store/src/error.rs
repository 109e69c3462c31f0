//! Error types for the RapidNotes store
//!
//! All errors use thiserror for structured error handling.
//! These errors can be serialized to the UI layer.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Note not found: {0}")]
    NoteNotFound(i64),

    #[error("Category not found: {0}")]
    CategoryNotFound(i64),

    #[error("Todo not found: {0}")]
    TodoNotFound(i64),

    /// Column name outside the state-patch allow-list.
    #[error("Column not allowed: {0}")]
    InvalidColumn(String),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Category {child} cannot be placed under {parent}: would create a cycle")]
    CategoryCycle { child: i64, parent: i64 },

    #[error("Crypto error: {0}")]
    Crypto(String),

    /// The shell file could not be unpacked. Always fatal at startup.
    #[error("Shell file error: {0}")]
    Shell(String),

    #[error("Schema error: {0}")]
    Schema(String),

    #[error("Trial expired")]
    TrialExpired,

    #[error("Credential store error: {0}")]
    Credential(String),

    #[error("{0}")]
    Generic(String),
}

impl AppError {
    /// Errors that must abort startup instead of being reported per call.
    pub fn is_fatal(&self) -> bool {
        matches!(self, AppError::Shell(_) | AppError::Schema(_))
    }
}

impl serde::Serialize for AppError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AppError>;
