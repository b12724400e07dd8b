//! Snapshot store
//!
//! Persists the last-synchronized IR under a hidden `.relq/` directory at
//! the project root so subsequent syncs diff incrementally: a serialized
//! snapshot, a HEAD marker, and the content hash of the most recently
//! generated source file. A project is initialized when the directory
//! exists; initialization is idempotent.

use std::fs;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::ir::Schema;

/// Hidden directory name at the project root.
pub const STORE_DIR: &str = ".relq";
const SNAPSHOT_FILE: &str = "snapshot.json";
const HEAD_FILE: &str = "HEAD";
const HASH_FILE: &str = "source.hash";

/// HEAD contents; versioned so a future layout change can migrate.
const HEAD_MARKER: &str = "ref: snapshot.json v1\n";

#[derive(Debug, Error)]
pub enum SnapshotError {
    #[error("IO error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("snapshot is not valid JSON: {0}")]
    Corrupt(#[from] serde_json::Error),
}

pub struct SnapshotStore {
    root: PathBuf,
}

impl SnapshotStore {
    /// A store rooted at the given project directory. Nothing is touched
    /// until [`init_repository`](Self::init_repository).
    pub fn new(project_root: impl Into<PathBuf>) -> Self {
        Self {
            root: project_root.into(),
        }
    }

    pub fn dir(&self) -> PathBuf {
        self.root.join(STORE_DIR)
    }

    fn snapshot_path(&self) -> PathBuf {
        self.dir().join(SNAPSHOT_FILE)
    }

    fn head_path(&self) -> PathBuf {
        self.dir().join(HEAD_FILE)
    }

    fn hash_path(&self) -> PathBuf {
        self.dir().join(HASH_FILE)
    }

    pub fn is_initialized(&self) -> bool {
        self.dir().is_dir()
    }

    /// Create the store directory and HEAD marker. Safe to call on an
    /// already-initialized project.
    pub fn init_repository(&self) -> Result<(), SnapshotError> {
        let dir = self.dir();
        fs::create_dir_all(&dir).map_err(|e| io_err(&dir, e))?;
        let head = self.head_path();
        if !head.exists() {
            fs::write(&head, HEAD_MARKER).map_err(|e| io_err(&head, e))?;
        }
        Ok(())
    }

    /// Serialize and persist the IR. The write goes through a temp file
    /// plus rename so the snapshot is never observed torn.
    pub fn save_snapshot(&self, schema: &Schema) -> Result<(), SnapshotError> {
        self.init_repository()?;
        let json = serde_json::to_string_pretty(schema)?;

        let target = self.snapshot_path();
        let tmp = self.dir().join(format!("{SNAPSHOT_FILE}.tmp"));
        fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
        fs::rename(&tmp, &target).map_err(|e| io_err(&target, e))?;

        let head = self.head_path();
        fs::write(&head, HEAD_MARKER).map_err(|e| io_err(&head, e))?;
        Ok(())
    }

    /// Load the persisted IR; `None` when no snapshot has been saved yet.
    pub fn load_snapshot(&self) -> Result<Option<Schema>, SnapshotError> {
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok(None);
        }
        let json = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(Some(serde_json::from_str(&json)?))
    }

    /// The HEAD marker, when the store is initialized.
    pub fn head(&self) -> Result<Option<String>, SnapshotError> {
        let path = self.head_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(Some(text.trim().to_string()))
    }

    /// Content hash of generated source text: SHA-256 hex digest.
    pub fn hash_file_content(text: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(text.as_bytes());
        format!("{:x}", hasher.finalize())
    }

    pub fn save_file_hash(&self, digest: &str) -> Result<(), SnapshotError> {
        self.init_repository()?;
        let path = self.hash_path();
        fs::write(&path, format!("{digest}\n")).map_err(|e| io_err(&path, e))
    }

    pub fn load_file_hash(&self) -> Result<Option<String>, SnapshotError> {
        let path = self.hash_path();
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        Ok(Some(text.trim().to_string()))
    }
}

fn io_err(path: &Path, source: std::io::Error) -> SnapshotError {
    SnapshotError::Io {
        path: path.to_path_buf(),
        source,
    }
}

/// Copy tracking tokens from a parsed schema onto a freshly introspected
/// IR, matching objects by name. Runs before every snapshot save so
/// identity survives across sync rounds.
pub fn copy_tokens(source: &Schema, target: &mut Schema) {
    for (name, table) in &mut target.tables {
        let Some(old) = source.get_table(name) else { continue };
        if table.token.is_none() {
            table.token = old.token.clone();
        }
        for column in &mut table.columns {
            if column.token.is_none()
                && let Some(old_col) = old.get_column(&column.name)
            {
                column.token = old_col.token.clone();
            }
        }
        for index in &mut table.indexes {
            if index.token.is_none()
                && let Some(old_idx) = old.get_index(&index.name)
            {
                index.token = old_idx.token.clone();
            }
        }
    }
    for e in &mut target.enums {
        if e.token.is_none()
            && let Some(old) = source.enums.iter().find(|o| o.name == e.name)
        {
            e.token = old.token.clone();
        }
    }
    for d in &mut target.domains {
        if d.token.is_none()
            && let Some(old) = source.domains.iter().find(|o| o.name == d.name)
        {
            d.token = old.token.clone();
        }
    }
    for s in &mut target.sequences {
        if s.token.is_none()
            && let Some(old) = source.sequences.iter().find(|o| o.name == s.name)
        {
            s.token = old.token.clone();
        }
    }
    for v in &mut target.views {
        if v.token.is_none()
            && let Some(old) = source.views.iter().find(|o| o.name == v.name)
        {
            v.token = old.token.clone();
        }
    }
    for f in &mut target.functions {
        if f.token.is_none()
            && let Some(old) = source.functions.iter().find(|o| o.name == f.name)
        {
            f.token = old.token.clone();
        }
    }
    for t in &mut target.triggers {
        if t.token.is_none()
            && let Some(old) = source
                .triggers
                .iter()
                .find(|o| o.table == t.table && o.name == t.name)
        {
            t.token = old.token.clone();
        }
    }
}
