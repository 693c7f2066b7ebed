//! File-backed persistence
//!
//! Sole authority for durable project state. Writes are atomic
//! (temp-file-then-rename), destructive operations are gated on a successful
//! backup, and deleted projects move to a trash area instead of being
//! unlinked.

pub mod backups;
pub mod fileio;
pub mod projects;

pub use projects::ProjectStore;
