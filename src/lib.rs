//! Treesync Library
//!
//! Synchronizes a tree of files between two locations by diffing their
//! inventories and replaying the ordered change set onto the target.

pub mod config;
pub mod diff;
pub mod executor;
pub mod filter;
pub mod hash;
pub mod inventory;
pub mod location;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use config::Config;
pub use sync::{synchronize, SyncOptions, SyncSummary};
pub use utils::errors::{Result, SyncError};
