//! Persistent per-generation history.
//!
//! The full history is rewritten after every generation, so the file on
//! disk always holds every completed generation even if the run dies.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use log::debug;

use crate::schema::GenerationSnapshot;

/// History persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("History I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("History serialization error: {0}")]
    Serde(#[from] serde_json::Error),
}

/// Ordered generation snapshots plus the file they persist to.
#[derive(Debug)]
pub struct HistoryStore {
    path: PathBuf,
    snapshots: Vec<GenerationSnapshot>,
}

impl HistoryStore {
    /// Create an empty store persisting to `path`. Nothing is written yet.
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            snapshots: Vec::new(),
        }
    }

    /// Create a store at `dir/ga_history_<unix-seconds>.json`.
    pub fn in_dir<P: AsRef<Path>>(dir: P) -> Self {
        let secs = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or_default();
        Self::new(dir.as_ref().join(format!("ga_history_{secs}.json")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn snapshots(&self) -> &[GenerationSnapshot] {
        &self.snapshots
    }

    pub fn last(&self) -> Option<&GenerationSnapshot> {
        self.snapshots.last()
    }

    pub fn len(&self) -> usize {
        self.snapshots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshots.is_empty()
    }

    /// Append a snapshot and persist the whole history.
    ///
    /// On failure the snapshot is dropped again, so memory never runs ahead
    /// of the file.
    pub fn append(&mut self, snapshot: GenerationSnapshot) -> Result<(), HistoryError> {
        self.snapshots.push(snapshot);
        if let Err(e) = self.persist() {
            self.snapshots.pop();
            return Err(e);
        }
        Ok(())
    }

    /// Write to a sibling temp file, then rename over the target.
    fn persist(&self) -> Result<(), HistoryError> {
        let json = serde_json::to_string_pretty(&self.snapshots)?;
        let io_err = |source| HistoryError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            fs::create_dir_all(parent).map_err(io_err)?;
        }

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);

        fs::write(&tmp, json).map_err(io_err)?;
        fs::rename(&tmp, &self.path).map_err(io_err)?;
        debug!(
            "History saved to {} ({} generations)",
            self.path.display(),
            self.snapshots.len()
        );
        Ok(())
    }

    /// Load a persisted history file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Vec<GenerationSnapshot>, HistoryError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| HistoryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(serde_json::from_str(&content)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{Candidate, CandidateId, FitnessRecord, Origin, ScoreVector};

    fn snapshot(generation: usize, fitness: &[f64]) -> GenerationSnapshot {
        let records = fitness
            .iter()
            .enumerate()
            .map(|(i, &f)| FitnessRecord {
                candidate: Candidate::new(
                    CandidateId::new(generation, i),
                    format!("prompt {generation}-{i}"),
                    Origin::Crossover,
                    Vec::new(),
                ),
                fitness: f,
                mean_metrics: ScoreVector::WORST,
                samples: Vec::new(),
            })
            .collect();
        GenerationSnapshot::from_records(generation, records).unwrap()
    }

    #[test]
    fn test_append_persists_full_history() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = HistoryStore::new(dir.path().join("nested/history.json"));
        assert!(!store.path().exists());

        store.append(snapshot(0, &[0.2, 0.4])).unwrap();
        assert_eq!(HistoryStore::load(store.path()).unwrap().len(), 1);

        store.append(snapshot(1, &[0.5, 0.3])).unwrap();
        let loaded = HistoryStore::load(store.path()).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[1].best_candidate, store.snapshots()[1].best_candidate);
        assert_eq!(loaded[1].best_fitness, 0.5);

        let tmp = dir.path().join("nested/history.json.tmp");
        assert!(!tmp.exists());
    }

    #[test]
    fn test_failed_persist_rolls_back() {
        let dir = tempfile::tempdir().unwrap();
        // A directory in place of the file makes the rename fail.
        let path = dir.path().join("history.json");
        fs::create_dir(&path).unwrap();
        fs::write(path.join("keep"), b"x").unwrap();

        let mut store = HistoryStore::new(&path);
        assert!(store.append(snapshot(0, &[0.1])).is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_in_dir_name() {
        let store = HistoryStore::in_dir("runs");
        let name = store.path().file_name().unwrap().to_str().unwrap();
        assert!(name.starts_with("ga_history_") && name.ends_with(".json"));
        assert_eq!(store.path().parent(), Some(Path::new("runs")));
    }

    #[test]
    fn test_load_missing() {
        let dir = tempfile::tempdir().unwrap();
        let result = HistoryStore::load(dir.path().join("nope.json"));
        assert!(matches!(result, Err(HistoryError::Io { .. })));
    }
}
