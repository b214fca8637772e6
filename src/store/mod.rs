//! Dataset and leaderboard persistence.
//!
//! Files are versioned JSON. Writes go through a temporary file in the
//! target directory and are renamed into place, so readers never see a
//! half-written file. Reads check `schema_version` before decoding the rest.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::analysis::{Leaderboard, LEADERBOARD_VERSION};
use crate::error::{FetchError, Result};
use crate::models::{Dataset, Repository};

/// Version of the dataset file format.
pub const SCHEMA_VERSION: u32 = 1;

#[derive(Deserialize)]
struct VersionProbe {
    schema_version: Option<u32>,
}

/// Exclusive claim on an output path for the duration of a fetch run.
///
/// Held as `<target>.lock`; the file is removed when the guard drops.
#[derive(Debug)]
pub struct RunLock {
    path: PathBuf,
}

impl RunLock {
    pub fn acquire(target: &Path) -> Result<Self> {
        let path = lock_path(target);
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| FetchError::io(parent.display().to_string(), e))?;
        }

        match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(mut file) => {
                // Best effort: the pid only helps a human clean up stale locks.
                let _ = writeln!(file, "{}", std::process::id());
                debug!("Acquired {}", path.display());
                Ok(Self { path })
            }
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(FetchError::StoreLocked {
                path: target.display().to_string(),
                lock: path.display().to_string(),
            }),
            Err(e) => Err(FetchError::io(path.display().to_string(), e)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for RunLock {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!("Failed to remove lock {}: {}", self.path.display(), e);
        }
    }
}

fn lock_path(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}

/// Serialize `value` as pretty JSON and atomically replace `path`.
fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    let display = path.display().to_string();
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };
    fs::create_dir_all(&dir).map_err(|e| FetchError::io(dir.display().to_string(), e))?;

    let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| FetchError::io(&display, e))?;
    serde_json::to_writer_pretty(&mut tmp, value).map_err(|e| FetchError::Decode {
        url: display.clone(),
        message: e.to_string(),
    })?;
    tmp.write_all(b"\n")
        .and_then(|_| tmp.as_file().sync_all())
        .map_err(|e| FetchError::io(&display, e))?;
    tmp.persist(path)
        .map_err(|e| FetchError::io(&display, e.error))?;
    Ok(())
}

/// Read a versioned JSON file, refusing versions other than `expected`.
fn read_versioned<T: DeserializeOwned>(path: &Path, expected: u32) -> Result<T> {
    let display = path.display().to_string();
    let bytes = fs::read(path).map_err(|e| FetchError::io(&display, e))?;

    let probe: VersionProbe = serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
        url: display.clone(),
        message: e.to_string(),
    })?;
    let found = probe.schema_version.unwrap_or(0);
    if found != expected {
        return Err(FetchError::SchemaVersionMismatch {
            path: display,
            found,
            expected,
        });
    }

    serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
        url: display,
        message: e.to_string(),
    })
}

pub fn write_dataset(path: &Path, dataset: &Dataset) -> Result<()> {
    write_json_atomic(path, dataset)?;
    info!(
        "Wrote {} records for {} repositories to {}",
        dataset.records.len(),
        dataset.repositories.len(),
        path.display()
    );
    Ok(())
}

pub fn read_dataset(path: &Path) -> Result<Dataset> {
    read_versioned(path, SCHEMA_VERSION)
}

pub fn write_leaderboard(path: &Path, leaderboard: &Leaderboard) -> Result<()> {
    write_json_atomic(path, leaderboard)
}

pub fn read_leaderboard(path: &Path) -> Result<Leaderboard> {
    read_versioned(path, LEADERBOARD_VERSION)
}

/// Repository metadata written by `fetch --output-repos`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RepositoryListing {
    pub schema_version: u32,
    pub generated_at: DateTime<Utc>,
    pub repositories: Vec<Repository>,
}

pub fn write_repositories(path: &Path, repositories: &[Repository]) -> Result<()> {
    let listing = RepositoryListing {
        schema_version: SCHEMA_VERSION,
        generated_at: Utc::now(),
        repositories: repositories.to_vec(),
    };
    write_json_atomic(path, &listing)?;
    info!(
        "Wrote metadata for {} repositories to {}",
        repositories.len(),
        path.display()
    );
    Ok(())
}
