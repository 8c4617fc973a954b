//! Append-only JSON Lines cycle log.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

#[cfg(test)]
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{CoreError, CoreResult};

/// Appends one JSON object per line. Never read back into live state.
#[derive(Debug, Clone, Default)]
pub struct CycleLog {
    path: Option<PathBuf>,
}

impl CycleLog {
    /// A log that discards records.
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
        }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Append `record` as one line.
    pub fn append<T: Serialize>(&self, record: &T) -> CoreResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }

        let mut line = serde_json::to_string(record)?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .map_err(|e| CoreError::io(path, e))?;
        file.write_all(line.as_bytes())
            .map_err(|e| CoreError::io(path, e))
    }

    /// Read every well-formed line, skipping lines that do not parse.
    #[cfg(test)]
    pub(crate) fn read_all<T: DeserializeOwned>(&self) -> CoreResult<Vec<T>> {
        let Some(path) = &self.path else {
            return Ok(Vec::new());
        };
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(CoreError::io(path, e)),
        };
        Ok(raw
            .lines()
            .filter(|line| !line.trim().is_empty())
            .filter_map(|line| match serde_json::from_str(line) {
                Ok(record) => Some(record),
                Err(e) => {
                    log::warn!("[persistence] Skipping bad log line in {}: {}", path.display(), e);
                    None
                }
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};
    use tempfile::TempDir;

    #[test]
    fn test_append_writes_one_line_per_record() {
        let dir = TempDir::new().unwrap();
        let log = CycleLog::open(dir.path().join("logs").join("cycles.jsonl"));

        log.append(&json!({"input": "Music causes joy"})).unwrap();
        log.append(&json!({"input": "Joy leads to music"})).unwrap();

        let raw = fs::read_to_string(log.path().unwrap()).unwrap();
        assert_eq!(raw.lines().count(), 2);

        let records: Vec<Value> = log.read_all().unwrap();
        assert_eq!(records[1]["input"], "Joy leads to music");
    }

    #[test]
    fn test_bad_lines_are_skipped() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cycles.jsonl");
        fs::write(&path, "{\"n\": 1}\nnot json\n{\"n\": 2}\n").unwrap();

        let records: Vec<Value> = CycleLog::open(&path).read_all().unwrap();
        assert_eq!(records.len(), 2);
    }

    #[test]
    fn test_disabled_log() {
        let log = CycleLog::disabled();
        assert!(log.append(&json!({"n": 1})).is_ok());
        assert!(log.read_all::<Value>().unwrap().is_empty());
    }
}
