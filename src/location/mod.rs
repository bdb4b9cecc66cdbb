//! Location backends — uniform capability contract over file trees.
//!
//! A location is an abstract endpoint (local directory, in-memory store)
//! exposing read/write/list/remove operations. The sync core only ever
//! talks to `dyn Location`; backend I/O mechanics live behind it.

pub mod local;
pub mod memory;

pub use local::LocalLocation;
pub use memory::MemoryLocation;

use crate::filter::ExcludeFilter;
use crate::inventory::Inventory;
use crate::utils::Result;

/// Capability contract every backend implements.
///
/// Mutating operations return `Err` on backend failure; the executor records
/// those errors as per-op data rather than aborting the run. `remove` and
/// `create_dir` are idempotent: a missing path or an existing directory is
/// success.
pub trait Location: Send + Sync {
    /// Read full file content. `NotFound` if the path is absent.
    fn read(&self, path: &str) -> Result<Vec<u8>>;

    /// Write full content, creating intermediate directories. Either the
    /// whole content lands or the operation reports failure.
    fn write(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()>;

    /// Set permission bits on an existing path.
    fn set_mode(&self, path: &str, mode: u32) -> Result<()>;

    /// Remove a file. Removing a non-existent path is not an error.
    fn remove(&self, path: &str) -> Result<()>;

    /// Create a directory, parents included. Idempotent.
    fn create_dir(&self, path: &str, mode: Option<u32>) -> Result<()>;

    /// Remove a directory recursively. A missing path is not an error.
    fn remove_dir(&self, path: &str) -> Result<()>;

    /// Walk the full tree into an inventory. Only file entries are filtered
    /// by the exclude patterns; directories always admit recursion.
    fn list_tree(&self, filter: &ExcludeFilter) -> Result<Inventory>;

    /// Permission bits of a path, None if absent or unsupported.
    fn stat_mode(&self, path: &str) -> Option<u32>;

    /// Content digest of a file, None if missing or unreadable.
    fn stat_hash(&self, path: &str) -> Option<String>;
}

/// Directory mode used when the source reports none.
pub const DEFAULT_DIR_MODE: u32 = 0o777;

/// File mode used when the source reports none.
pub const DEFAULT_FILE_MODE: u32 = 0o644;
