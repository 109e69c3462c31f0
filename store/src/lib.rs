//! RapidNotes store library
//!
//! Encrypted single-writer persistence for the RapidNotes clipboard/notes
//! manager: notes, a password-lockable category tree, tags, full-text
//! search, trash, todos and the trial gate.

pub mod app;
pub mod config;
pub mod crypto;
pub mod database;
pub mod error;
pub mod logging;
pub mod services;
pub mod storage;

pub use app::AppState;
pub use config::{Clock, KeySource, StoreConfig, SystemClock};
pub use error::{AppError, Result};
