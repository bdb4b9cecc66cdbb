//! Local filesystem location.
//!
//! Rooted at a configured directory. Writes are atomic: content lands in a
//! temp file next to the destination and is renamed into place, so a failed
//! write never leaves a partial file.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::config::LocationSettings;
use crate::filter::ExcludeFilter;
use crate::hash;
use crate::inventory::{EntryKind, FileEntry, Inventory};
use crate::location::{Location, DEFAULT_FILE_MODE};
use crate::utils::{Result, SyncError};

pub struct LocalLocation {
    root: PathBuf,
}

impl LocalLocation {
    /// Validate settings and resolve the root directory.
    ///
    /// An absolute root must already exist; a relative root is resolved
    /// against the current working directory.
    pub fn new(settings: &LocationSettings) -> Result<Self> {
        let dir = settings
            .dir
            .as_deref()
            .filter(|d| !d.is_empty())
            .ok_or_else(|| {
                SyncError::Config("location does not define a \"dir\" setting".to_string())
            })?;

        let candidate = Path::new(dir);
        let root = if candidate.is_absolute() {
            if !candidate.is_dir() {
                return Err(SyncError::InvalidPath(format!(
                    "the path \"{}\" does not exist",
                    dir
                )));
            }
            candidate.to_path_buf()
        } else {
            candidate.canonicalize().map_err(|_| {
                SyncError::PathResolution(format!(
                    "the absolute path for \"{}\" could not be determined",
                    dir
                ))
            })?
        };

        Ok(Self { root })
    }

    /// Root this location reads and writes under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map a root-relative POSIX path onto the filesystem.
    fn real_path(&self, path: &str) -> PathBuf {
        let mut real = self.root.clone();
        for component in path.split('/').filter(|c| !c.is_empty()) {
            real.push(component);
        }
        real
    }

    #[cfg(unix)]
    fn apply_mode(path: &Path, mode: u32) -> std::io::Result<()> {
        use std::os::unix::fs::PermissionsExt;
        fs::set_permissions(path, fs::Permissions::from_mode(mode))
    }

    #[cfg(not(unix))]
    fn apply_mode(_path: &Path, _mode: u32) -> std::io::Result<()> {
        Ok(())
    }

    #[cfg(unix)]
    fn read_mode(metadata: &fs::Metadata) -> Option<u32> {
        use std::os::unix::fs::PermissionsExt;
        Some(metadata.permissions().mode() & 0o777)
    }

    #[cfg(not(unix))]
    fn read_mode(_metadata: &fs::Metadata) -> Option<u32> {
        None
    }
}

impl Location for LocalLocation {
    fn read(&self, path: &str) -> Result<Vec<u8>> {
        let real = self.real_path(path);
        fs::read(&real).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => SyncError::NotFound(path.to_string()),
            _ => SyncError::Io(e),
        })
    }

    fn write(&self, path: &str, content: &[u8], mode: Option<u32>) -> Result<()> {
        let real = self.real_path(path);
        let parent = real
            .parent()
            .ok_or_else(|| SyncError::InvalidPath(path.to_string()))?;
        fs::create_dir_all(parent)?;

        let mut temp = tempfile::NamedTempFile::new_in(parent)?;
        temp.write_all(content)?;
        temp.flush()?;
        temp.persist(&real).map_err(|e| SyncError::Io(e.error))?;

        // The temp file is created 0o600; always normalize so a mode-less
        // write does not land with temp-file permissions.
        Self::apply_mode(&real, mode.unwrap_or(DEFAULT_FILE_MODE))?;

        Ok(())
    }

    fn set_mode(&self, path: &str, mode: u32) -> Result<()> {
        Self::apply_mode(&self.real_path(path), mode)?;
        Ok(())
    }

    fn remove(&self, path: &str) -> Result<()> {
        match fs::remove_file(self.real_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Io(e)),
        }
    }

    fn create_dir(&self, path: &str, mode: Option<u32>) -> Result<()> {
        let real = self.real_path(path);
        fs::create_dir_all(&real)?;
        if let Some(mode) = mode {
            Self::apply_mode(&real, mode)?;
        }
        Ok(())
    }

    fn remove_dir(&self, path: &str) -> Result<()> {
        match fs::remove_dir_all(self.real_path(path)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(SyncError::Io(e)),
        }
    }

    fn list_tree(&self, filter: &ExcludeFilter) -> Result<Inventory> {
        let mut inventory = Inventory::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            // A single unreadable entry must not abort the whole walk; the
            // run completes and the gap surfaces in the diff.
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry: {}", e);
                    continue;
                }
            };
            if entry.depth() == 0 {
                continue;
            }

            let relative = entry
                .path()
                .strip_prefix(&self.root)
                .unwrap_or(entry.path());
            let path = relative
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            // Resolve symlinks to their targets; skip broken links and
            // links to directories, as the walker does not recurse them.
            let metadata = if entry.file_type().is_symlink() {
                match fs::metadata(entry.path()) {
                    Ok(m) if m.is_dir() => continue,
                    Ok(m) => m,
                    Err(_) => continue,
                }
            } else {
                match entry.metadata() {
                    Ok(m) => m,
                    Err(e) => {
                        warn!("Skipping {}: metadata unavailable ({})", path, e);
                        continue;
                    }
                }
            };

            if metadata.is_dir() {
                inventory.insert(FileEntry::directory(path, Self::read_mode(&metadata)));
            } else {
                if filter.is_excluded(&path) {
                    debug!("Excluded from inventory: {}", path);
                    continue;
                }
                // An unreadable file is listed with an absent hash; the
                // differ then attempts it and records the read failure as
                // a pre-failed result.
                let digest = match hash::hash_file(entry.path()) {
                    Ok(digest) => Some(digest),
                    Err(e) => {
                        warn!("Could not hash {}: {}", path, e);
                        None
                    }
                };
                inventory.insert(FileEntry {
                    path,
                    kind: EntryKind::File,
                    hash: digest,
                    mode: Self::read_mode(&metadata),
                });
            }
        }

        Ok(inventory)
    }

    fn stat_mode(&self, path: &str) -> Option<u32> {
        let metadata = fs::metadata(self.real_path(path)).ok()?;
        Self::read_mode(&metadata)
    }

    fn stat_hash(&self, path: &str) -> Option<String> {
        hash::hash_file(&self.real_path(path)).ok()
    }
}
