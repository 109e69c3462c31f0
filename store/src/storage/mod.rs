//! Storage module
//!
//! Provides the encrypted shell file that holds the database at rest.

pub mod shell;

pub use shell::{pack, seal_file, unpack, ShellPaths, UnpackOutcome};
