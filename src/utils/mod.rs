//! Utility modules for the synchronizer.

pub mod errors;
pub mod logger;

pub use errors::{Result, SyncError};
