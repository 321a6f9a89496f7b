//! Dataset records: images the generator reacts to.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Label of records the search evaluates against.
pub const POSITIVE_LABEL: i64 = 1;

/// Image extensions picked up when building a dataset from a directory.
const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "bmp", "gif"];

/// One dataset entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatasetRecord {
    /// Sample identifier (image file stem).
    #[serde(default = "default_sid")]
    pub sid: String,
    /// Path to the image, relative to the working directory.
    pub image_path: PathBuf,
    /// Class label; only [`POSITIVE_LABEL`] records are evaluated.
    /// Unlabeled records default to 0 and are skipped.
    #[serde(default)]
    pub label: i64,
}

fn default_sid() -> String {
    "unknown".to_string()
}

/// Dataset loading errors.
#[derive(Debug, thiserror::Error)]
pub enum DatasetError {
    #[error("Failed to read dataset {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("Failed to parse dataset {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("Dataset {0} contains no positive-label records")]
    Empty(PathBuf),
}

/// Load a dataset JSON file, keeping only positive-label records.
///
/// An empty result is an error: the search has nothing to evaluate against.
pub fn load_positive<P: AsRef<Path>>(path: P) -> Result<Vec<DatasetRecord>, DatasetError> {
    let path = path.as_ref();
    let content = fs::read_to_string(path).map_err(|source| DatasetError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let records: Vec<DatasetRecord> =
        serde_json::from_str(&content).map_err(|source| DatasetError::Parse {
            path: path.to_path_buf(),
            source,
        })?;

    let positive: Vec<DatasetRecord> = records
        .into_iter()
        .filter(|r| r.label == POSITIVE_LABEL)
        .collect();

    if positive.is_empty() {
        return Err(DatasetError::Empty(path.to_path_buf()));
    }
    Ok(positive)
}

/// Build dataset records for every image in a directory, sorted by sid.
pub fn scan_image_dir<P: AsRef<Path>>(dir: P, label: i64) -> io::Result<Vec<DatasetRecord>> {
    let mut records = Vec::new();

    for entry in fs::read_dir(dir.as_ref())? {
        let path = entry?.path();
        let is_image = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()));
        if !is_image {
            continue;
        }
        let Some(sid) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };

        records.push(DatasetRecord {
            sid: sid.to_string(),
            image_path: path.clone(),
            label,
        });
    }

    records.sort_by(|a, b| a.sid.cmp(&b.sid));
    Ok(records)
}

/// Write dataset records as pretty JSON.
pub fn save<P: AsRef<Path>>(path: P, records: &[DatasetRecord]) -> io::Result<()> {
    let json = serde_json::to_string_pretty(records)?;
    fs::write(path, json)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_filters_positive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(
            &path,
            r#"[
                {"sid": "a", "image_path": "images/a.jpg", "label": 1},
                {"sid": "b", "image_path": "images/b.jpg", "label": 0},
                {"image_path": "images/c.png", "label": 1},
                {"sid": "d", "image_path": "images/d.jpg"}
            ]"#,
        )
        .unwrap();

        let records = load_positive(&path).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].sid, "a");
        assert_eq!(records[1].sid, "unknown");
    }

    #[test]
    fn test_load_rejects_no_positive() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.json");
        fs::write(&path, r#"[{"sid": "b", "image_path": "b.jpg", "label": 0}]"#).unwrap();

        assert!(matches!(load_positive(&path), Err(DatasetError::Empty(_))));
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_positive(dir.path().join("missing.json"));
        assert!(matches!(result, Err(DatasetError::Read { .. })));
    }

    #[test]
    fn test_scan_image_dir() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.PNG", "a.jpg", "notes.txt", "c.webp"] {
            fs::write(dir.path().join(name), b"x").unwrap();
        }

        let records = scan_image_dir(dir.path(), POSITIVE_LABEL).unwrap();
        let sids: Vec<&str> = records.iter().map(|r| r.sid.as_str()).collect();
        assert_eq!(sids, vec!["a", "b", "c"]);
        assert!(records.iter().all(|r| r.label == POSITIVE_LABEL));

        let out = dir.path().join("dataset.json");
        save(&out, &records).unwrap();
        assert_eq!(load_positive(&out).unwrap(), records);
    }
}
