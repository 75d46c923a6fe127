//! Frame naming and the on-disk frame directory.
//!
//! Frames are named after their capture second (`YYYYMMDDHHMMSS.jpg`), so
//! lexicographic order of file names is capture order. The last retained frame
//! of a previous run is recovered once, at startup, by `last_retained_frame`.

use anyhow::{anyhow, Context, Result};
use chrono::{Local, NaiveDateTime};
use std::path::{Path, PathBuf};

/// Extension of every captured frame.
pub const FRAME_EXTENSION: &str = "jpg";

const STAMP_FORMAT: &str = "%Y%m%d%H%M%S";
const STAMP_LEN: usize = 14;

/// Timestamp-derived frame identifier.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct FrameName {
    stamp: String,
}

impl FrameName {
    pub fn from_datetime(at: NaiveDateTime) -> Self {
        Self {
            stamp: at.format(STAMP_FORMAT).to_string(),
        }
    }

    /// Parse a `YYYYMMDDHHMMSS.jpg` file name.
    pub fn parse(file_name: &str) -> Result<Self> {
        let stamp = file_name
            .strip_suffix(&format!(".{}", FRAME_EXTENSION))
            .ok_or_else(|| anyhow!("frame name '{}' is not a .jpg file", file_name))?;
        if stamp.len() != STAMP_LEN || !stamp.bytes().all(|b| b.is_ascii_digit()) {
            return Err(anyhow!(
                "frame name '{}' is not a 14-digit timestamp",
                file_name
            ));
        }
        NaiveDateTime::parse_from_str(stamp, STAMP_FORMAT)
            .with_context(|| format!("frame name '{}' is not a valid timestamp", file_name))?;
        Ok(Self {
            stamp: stamp.to_string(),
        })
    }

    pub fn stamp(&self) -> &str {
        &self.stamp
    }

    pub fn file_name(&self) -> String {
        format!("{}.{}", self.stamp, FRAME_EXTENSION)
    }

    pub fn path_in(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }
}

impl std::fmt::Display for FrameName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.file_name())
    }
}

/// Source of capture timestamps.
pub trait Clock {
    fn now(&mut self) -> NaiveDateTime;
}

/// Wall clock in local time, as the camera operators read it.
#[derive(Clone, Copy, Debug, Default)]
pub struct LocalClock;

impl Clock for LocalClock {
    fn now(&mut self) -> NaiveDateTime {
        Local::now().naive_local()
    }
}

/// Most recent frame left in `dir` by an earlier run, if any.
///
/// Only `.jpg` files are considered; the pick is the lexicographically last
/// file name. A missing directory yields `None`.
pub fn last_retained_frame(dir: &Path) -> Result<Option<PathBuf>> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to list frames in {}", dir.display()))
        }
    };

    let mut last: Option<String> = None;
    for entry in entries {
        let entry = entry.with_context(|| format!("failed to list frames in {}", dir.display()))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(&format!(".{}", FRAME_EXTENSION)) {
            continue;
        }
        if last.as_deref().map_or(true, |current| name.as_str() > current) {
            last = Some(name);
        }
    }
    Ok(last.map(|name| dir.join(name)))
}
