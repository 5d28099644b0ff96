//! The persisted-snapshot boundary.
//!
//! A snapshot is the whole dataset flattened to plain JSON: table name →
//! (stable id key → record). The engine loads it once at startup, rebuilds
//! every secondary index from the records, and — when auto-persist is on —
//! writes the full dataset back after every mutation. There is no delta or
//! incremental persistence.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::error::PersistError;

/// The full dataset, keyed by table then by the record's stable id key.
pub type Snapshot = BTreeMap<String, BTreeMap<String, Value>>;

/// External persistence collaborator.
///
/// Absence of a snapshot (or an empty one) is valid and yields empty tables.
pub trait Persistence: Send + Sync {
    fn load(&self) -> Result<Snapshot, PersistError>;
    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError>;
}

/// Snapshot persistence as a single pretty-printed JSON file.
///
/// Writes go to a sibling temp file first and are renamed into place, so a
/// torn write never clobbers the previous snapshot.
pub struct JsonFilePersistence {
    path: PathBuf,
}

impl JsonFilePersistence {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }
}

impl Persistence for JsonFilePersistence {
    fn load(&self) -> Result<Snapshot, PersistError> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "no snapshot file, starting empty");
            return Ok(Snapshot::new());
        }
        let raw = fs::read_to_string(&self.path)?;
        if raw.trim().is_empty() {
            return Ok(Snapshot::new());
        }
        Ok(serde_json::from_str(&raw)?)
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        let encoded = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.path.with_extension("tmp");
        fs::write(&tmp, encoded)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), tables = snapshot.len(), "snapshot written");
        Ok(())
    }
}

/// In-memory persistence for tests and throwaway instances.
#[derive(Default)]
pub struct MemoryPersistence {
    snapshot: parking_lot::Mutex<Snapshot>,
}

impl MemoryPersistence {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Persistence for MemoryPersistence {
    fn load(&self) -> Result<Snapshot, PersistError> {
        Ok(self.snapshot.lock().clone())
    }

    fn save(&self, snapshot: &Snapshot) -> Result<(), PersistError> {
        *self.snapshot.lock() = snapshot.clone();
        Ok(())
    }
}
