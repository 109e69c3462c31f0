//! Services module
//!
//! Components that coordinate between the repository, the side files and
//! the OS: trial gating, capture, reminders, backups and the key store.

pub mod backup;
pub mod credentials;
pub mod notes;
pub mod reminders;
pub mod trial;

pub use backup::ShellBackups;
pub use credentials::CredentialManager;
pub use notes::NotesService;
pub use reminders::RemindersService;
pub use trial::{TrialGate, TrialState, TrialStatus};
