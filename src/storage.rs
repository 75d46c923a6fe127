//! Result store: every processed frame's category counts, rewritten in full
//! after each frame.
//!
//! Writes go to a sibling temp file that is synced and renamed over the
//! store, so readers see either the previous or the new document, never a
//! truncated one.

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::categories::CategoryCounts;

/// Counts for one retained frame.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleResult {
    /// Frame file name (`YYYYMMDDHHMMSS.jpg`).
    pub image: String,
    pub categories: CategoryCounts,
}

pub struct ResultStore {
    path: PathBuf,
    records: Vec<VehicleResult>,
}

impl ResultStore {
    /// Empty store that will write to `path`. Existing content is replaced on
    /// the first persist.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            records: Vec::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn records(&self) -> &[VehicleResult] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Append `record` and rewrite the whole store.
    ///
    /// The record stays in memory even when the write fails; the next
    /// successful persist carries it.
    pub fn append(&mut self, record: VehicleResult) -> Result<()> {
        self.records.push(record);
        self.persist()
    }

    pub fn persist(&self) -> Result<()> {
        let encoded = serde_json::to_vec_pretty(&self.records)?;
        write_atomic(&self.path, &encoded)
            .with_context(|| format!("failed to write results to {}", self.path.display()))
    }
}

/// Read every record from a store file, oldest first.
pub fn load_records(path: &Path) -> Result<Vec<VehicleResult>> {
    let raw = fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    serde_json::from_slice(&raw).map_err(|e| anyhow!("invalid results file {}: {}", path.display(), e))
}

/// Most recent record of a store file, `None` when the store is empty.
pub fn latest_record(path: &Path) -> Result<Option<VehicleResult>> {
    Ok(load_records(path)?.pop())
}

pub(crate) fn write_atomic(path: &Path, data: &[u8]) -> Result<()> {
    let tmp_path = path.with_extension("tmp");
    let written = File::create(&tmp_path)
        .and_then(|mut file| {
            file.write_all(data)?;
            file.sync_all()
        })
        .and_then(|_| fs::rename(&tmp_path, path));
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(image: &str, category: &str, count: u32) -> VehicleResult {
        VehicleResult {
            image: image.to_string(),
            categories: CategoryCounts::from([(category.to_string(), count)]),
        }
    }

    #[test]
    fn every_append_leaves_a_parseable_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vehicle_results.json");
        let mut store = ResultStore::new(&path);

        for (i, stamp) in ["20240517090000", "20240517090100", "20240517090200"]
            .iter()
            .enumerate()
        {
            store.append(record(&format!("{stamp}.jpg"), "Car", i as u32))?;
            let on_disk = load_records(&path)?;
            assert_eq!(on_disk.len(), i + 1);
            assert_eq!(on_disk, store.records());
        }
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn file_shape_matches_dashboard_contract() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vehicle_results.json");
        let mut store = ResultStore::new(&path);
        store.append(VehicleResult {
            image: "20240517090000.jpg".to_string(),
            categories: CategoryCounts::from([
                ("Truck".to_string(), 1),
                ("Car".to_string(), 3),
            ]),
        })?;

        let value: serde_json::Value = serde_json::from_slice(&fs::read(&path)?)?;
        assert_eq!(
            value,
            serde_json::json!([{"image": "20240517090000.jpg", "categories": {"Car": 3, "Truck": 1}}])
        );
        let text = fs::read_to_string(&path)?;
        assert!(text.find("\"Car\"") < text.find("\"Truck\""));
        Ok(())
    }

    #[test]
    fn latest_is_last_element() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vehicle_results.json");
        let mut store = ResultStore::new(&path);
        store.append(record("20240517090000.jpg", "nothing", 0))?;
        store.append(record("20240517090500.jpg", "Bus", 2))?;

        assert_eq!(
            latest_record(&path)?,
            Some(record("20240517090500.jpg", "Bus", 2))
        );
        Ok(())
    }

    #[test]
    fn failed_rewrite_leaves_no_temp_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vehicle_results.json");
        fs::create_dir(&path)?;

        let mut store = ResultStore::new(&path);
        assert!(store.append(record("20240517090000.jpg", "Car", 1)).is_err());
        assert_eq!(store.len(), 1);
        assert!(!path.with_extension("tmp").exists());
        Ok(())
    }

    #[test]
    fn missing_or_corrupt_store_is_an_error() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("vehicle_results.json");
        assert!(load_records(&path).is_err());
        fs::write(&path, b"[{\"image\": ")?;
        assert!(load_records(&path).is_err());
        Ok(())
    }
}
