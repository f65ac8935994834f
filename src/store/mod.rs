//! Bounded local picture store.
//!
//! A plain directory of saved pictures, addressable by date-derived file
//! name. Only files carrying the managed prefix are visible to any store
//! operation; anything else in the directory is ignored and never
//! deleted. Recency comes purely from filesystem modification time, with
//! no sidecar index, and the retention policy (`trim`) keeps the store
//! from growing without bound.

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use thiserror::Error;
use tracing::{debug, warn};

/// File-name prefix marking an entry as managed by the store.
pub const MANAGED_PREFIX: &str = "apod-";

/// Storage errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Store root {0} points to an existing file")]
    InvalidStore(PathBuf),

    #[error("Refusing to touch unmanaged entry: {0}")]
    NotManaged(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// One managed file in the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreEntry {
    /// Name within the store directory.
    pub file_name: String,

    /// Modification time, used purely for recency ordering.
    pub modified: SystemTime,
}

/// Build the conventional managed name for a day's picture.
pub fn managed_name(day: &str, extension: &str) -> String {
    format!("{MANAGED_PREFIX}{day}.{extension}")
}

/// Directory-backed collection of saved pictures.
#[derive(Debug)]
pub struct LocalStore {
    root: PathBuf,
}

impl LocalStore {
    /// Open (creating if necessary) the store at `root`.
    ///
    /// Fails if `root` already exists as a plain file. An existing
    /// directory is fine; creation is idempotent.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let root = root.into();
        if root.is_file() {
            return Err(StoreError::InvalidStore(root));
        }
        fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Whether a name carries the managed prefix.
    pub fn is_managed(name: &str) -> bool {
        name.starts_with(MANAGED_PREFIX)
    }

    /// Absolute path of an entry within the store.
    pub fn path(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// List managed entries, most recently modified first. Ties on
    /// modification time are broken by name, descending, so the order
    /// is deterministic.
    pub fn list(&self) -> Result<Vec<StoreEntry>, StoreError> {
        let mut entries = Vec::new();

        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !Self::is_managed(&name) || !entry.file_type()?.is_file() {
                continue;
            }
            let modified = entry.metadata()?.modified()?;
            entries.push(StoreEntry {
                file_name: name,
                modified,
            });
        }

        entries.sort_by(|a, b| {
            b.modified
                .cmp(&a.modified)
                .then_with(|| b.file_name.cmp(&a.file_name))
        });

        Ok(entries)
    }

    /// Absolute paths of all managed entries, most recent first.
    pub fn files(&self) -> Result<Vec<PathBuf>, StoreError> {
        Ok(self
            .list()?
            .into_iter()
            .map(|e| self.path(&e.file_name))
            .collect())
    }

    /// Write a managed entry. An explicit modification time may be given
    /// to pin recency ordering (otherwise the filesystem clock decides).
    pub fn write(
        &self,
        name: &str,
        bytes: &[u8],
        modified: Option<SystemTime>,
    ) -> Result<PathBuf, StoreError> {
        if !Self::is_managed(name) {
            return Err(StoreError::NotManaged(name.to_string()));
        }

        let path = self.path(name);
        fs::write(&path, bytes)?;

        if let Some(time) = modified {
            let file = File::options().write(true).open(&path)?;
            file.set_modified(time)?;
        }

        debug!("Wrote {} ({} bytes)", path.display(), bytes.len());
        Ok(path)
    }

    /// Retention policy: keep the `max_count` most recent managed
    /// entries, delete the rest. Returns the number deleted.
    ///
    /// An entry that vanished between listing and deletion (another
    /// process got there first) is tolerated.
    pub fn trim(&self, max_count: usize) -> Result<usize, StoreError> {
        let entries = self.list()?;
        let mut deleted = 0;

        for entry in entries.iter().skip(max_count) {
            let path = self.path(&entry.file_name);
            match fs::remove_file(&path) {
                Ok(()) => {
                    debug!("Trimmed {}", path.display());
                    deleted += 1;
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {
                    warn!("Entry {} already gone", path.display());
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(deleted)
    }

    /// Delete one managed entry. Unmanaged names are refused without
    /// touching the filesystem.
    pub fn delete(&self, name: &str) -> Result<(), StoreError> {
        if !Self::is_managed(name) {
            return Err(StoreError::NotManaged(name.to_string()));
        }

        match fs::remove_file(self.path(name)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                warn!("Entry {} already gone", name);
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}
