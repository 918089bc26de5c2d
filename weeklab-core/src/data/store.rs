//! JSON snapshots of assembled histories.
//!
//! Layout: `{data_dir}/history/{SYMBOL}.json` with a `{SYMBOL}.meta.json`
//! sidecar holding the schema version and a blake3 hash of the snapshot
//! bytes. Loading re-checks the hash and every `History` invariant.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::provider::DataError;
use crate::domain::History;

/// Bumped whenever the snapshot layout changes incompatibly.
pub const SNAPSHOT_SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotMeta {
    pub schema_version: u32,
    pub symbol: String,
    pub weeks: usize,
    pub first_week: Option<NaiveDate>,
    pub last_week: Option<NaiveDate>,
    pub content_hash: String,
    pub saved_at: chrono::NaiveDateTime,
}

/// Snapshot directory for histories.
#[derive(Debug, Clone)]
pub struct HistoryStore {
    dir: PathBuf,
}

impl HistoryStore {
    /// Store rooted at `{data_dir}/history`.
    pub fn new(data_dir: impl AsRef<Path>) -> Self {
        Self {
            dir: data_dir.as_ref().join("history"),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn snapshot_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.json"))
    }

    fn meta_path(&self, symbol: &str) -> PathBuf {
        self.dir.join(format!("{symbol}.meta.json"))
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.snapshot_path(symbol).exists()
    }

    /// Write `history`, replacing any earlier snapshot of its symbol.
    pub fn save(&self, history: &History) -> Result<PathBuf, DataError> {
        fs::create_dir_all(&self.dir)
            .map_err(|e| DataError::SnapshotError(format!("failed to create dir: {e}")))?;

        let symbol = history.symbol();
        let bytes = serde_json::to_vec(history)
            .map_err(|e| DataError::SnapshotError(format!("serialize {symbol}: {e}")))?;
        let summary = history.summary();
        let meta = SnapshotMeta {
            schema_version: SNAPSHOT_SCHEMA_VERSION,
            symbol: symbol.to_string(),
            weeks: summary.weeks,
            first_week: summary.first_week,
            last_week: summary.last_week,
            content_hash: blake3::hash(&bytes).to_hex().to_string(),
            saved_at: chrono::Local::now().naive_local(),
        };
        let meta_bytes = serde_json::to_vec_pretty(&meta)
            .map_err(|e| DataError::SnapshotError(format!("meta serialization: {e}")))?;

        let path = self.snapshot_path(symbol);
        write_atomic(&path, &bytes)?;
        write_atomic(&self.meta_path(symbol), &meta_bytes)?;

        tracing::info!(symbol, path = %path.display(), weeks = meta.weeks, "saved history");
        Ok(path)
    }

    /// Load and verify the snapshot of `symbol`.
    pub fn load(&self, symbol: &str) -> Result<History, DataError> {
        if !self.contains(symbol) {
            return Err(DataError::NoStoredHistory {
                symbol: symbol.to_string(),
            });
        }
        let path = self.snapshot_path(symbol);
        let bytes = fs::read(&path)
            .map_err(|e| DataError::SnapshotError(format!("read {}: {e}", path.display())))?;

        match self.meta(symbol) {
            Some(meta) => {
                if meta.schema_version != SNAPSHOT_SCHEMA_VERSION {
                    return Err(DataError::SnapshotError(format!(
                        "{symbol}: schema version {} (expected {SNAPSHOT_SCHEMA_VERSION})",
                        meta.schema_version
                    )));
                }
                let hash = blake3::hash(&bytes).to_hex().to_string();
                if hash != meta.content_hash {
                    return Err(DataError::SnapshotError(format!(
                        "{symbol}: content hash mismatch, snapshot modified or truncated"
                    )));
                }
            }
            None => tracing::warn!(symbol, "snapshot has no metadata sidecar, hash not checked"),
        }

        let history: History = serde_json::from_slice(&bytes)
            .map_err(|e| DataError::SnapshotError(format!("{symbol}: {e}")))?;
        if history.symbol() != symbol {
            return Err(DataError::SnapshotError(format!(
                "{} holds history of '{}'",
                path.display(),
                history.symbol()
            )));
        }
        Ok(history)
    }

    pub fn meta(&self, symbol: &str) -> Option<SnapshotMeta> {
        let content = fs::read_to_string(self.meta_path(symbol)).ok()?;
        serde_json::from_str(&content).ok()
    }

    /// Symbols with a stored snapshot, sorted.
    pub fn list(&self) -> Result<Vec<String>, DataError> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir)
            .map_err(|e| DataError::SnapshotError(format!("read dir: {e}")))?;

        let mut symbols = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| DataError::SnapshotError(format!("dir entry: {e}")))?
                .path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if let Some(symbol) = name.strip_suffix(".json") {
                if !symbol.ends_with(".meta") {
                    symbols.push(symbol.to_string());
                }
            }
        }
        symbols.sort();
        Ok(symbols)
    }
}

fn write_atomic(path: &Path, bytes: &[u8]) -> Result<(), DataError> {
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, bytes)
        .map_err(|e| DataError::SnapshotError(format!("write {}: {e}", tmp.display())))?;
    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        DataError::SnapshotError(format!("atomic rename failed: {e}"))
    })
}
