//! Scalar state files.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{CoreError, CoreResult};

/// One text value mirrored to a file.
///
/// The value is read once on open; a missing or unreadable file reads as
/// empty. Writes go straight to disk.
#[derive(Debug, Clone, Default)]
pub struct ScalarFile {
    path: Option<PathBuf>,
    value: String,
}

impl ScalarFile {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let value = match fs::read_to_string(&path) {
            Ok(raw) => raw.trim().to_string(),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => {
                log::warn!("[persistence] Cannot read {}: {}", path.display(), e);
                String::new()
            }
        };
        Self {
            path: Some(path),
            value,
        }
    }

    pub fn get(&self) -> &str {
        &self.value
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Replace the value and write it out.
    ///
    /// The in-memory value is updated even if the write fails.
    pub fn set(&mut self, value: &str) -> CoreResult<()> {
        self.value = value.trim().to_string();
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| CoreError::io(parent, e))?;
        }
        fs::write(path, &self.value).map_err(|e| CoreError::io(path, e))
    }
}

/// The engine's scalar state besides the goal: last reflection and last entropy.
#[derive(Debug, Clone, Default)]
pub struct ScalarStore {
    reflection: ScalarFile,
    last_entropy: ScalarFile,
}

impl ScalarStore {
    pub fn in_memory() -> Self {
        Self::default()
    }

    pub fn open(reflection_path: impl Into<PathBuf>, entropy_path: impl Into<PathBuf>) -> Self {
        Self {
            reflection: ScalarFile::open(reflection_path),
            last_entropy: ScalarFile::open(entropy_path),
        }
    }

    /// The last reflection, empty if none.
    pub fn reflection(&self) -> &str {
        self.reflection.get()
    }

    pub fn set_reflection(&mut self, reflection: &str) -> CoreResult<()> {
        self.reflection.set(reflection)
    }

    /// The last stored entropy; 0.0 when missing or unparsable.
    pub fn last_entropy(&self) -> f64 {
        let raw = self.last_entropy.get();
        if raw.is_empty() {
            return 0.0;
        }
        match raw.parse::<f64>() {
            Ok(value) if value.is_finite() => value,
            _ => {
                log::warn!("[persistence] Unparsable last entropy '{}', using 0.0", raw);
                0.0
            }
        }
    }

    pub fn set_last_entropy(&mut self, entropy: f64) -> CoreResult<()> {
        self.last_entropy.set(&entropy.to_string())
    }
}
