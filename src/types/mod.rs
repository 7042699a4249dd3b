//! Shared types for hearing-sync

pub mod error;

pub use error::{Result, SyncError};
