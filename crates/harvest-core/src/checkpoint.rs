//! Per-asset checkpoint files.
//!
//! One CSV per asset under the subsystem's checkpoint directory
//! (`{data_dir}/raw/tmp/{subsystem}/{asset}.csv`). A file is only ever written
//! by the worker that owns the asset, and every write replaces it atomically
//! (temp file in the same directory, fsync, rename), so a crash leaves either
//! the previous contents or the new ones.
//!
//! A file that fails to parse is moved aside to `{asset}.csv.corrupt` and the
//! asset starts fresh. Read-only passes (merge, status) use [`CheckpointStore::read`]
//! and leave such files alone.

use anyhow::{Context, Result};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::source::Record;

const EXT: &str = "csv";
const CORRUPT_SUFFIX: &str = "corrupt";

/// Records already harvested for one asset, in fetch order.
#[derive(Debug, Clone, PartialEq)]
pub struct Checkpoint<R> {
    pub records: Vec<R>,
}

impl<R> Checkpoint<R> {
    /// Last record in fetch order; the resume position is derived from it.
    pub fn last(&self) -> Option<&R> {
        self.records.last()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Checkpoint directory for one subsystem.
#[derive(Debug, Clone)]
pub struct CheckpointStore {
    dir: PathBuf,
}

impl CheckpointStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path(&self, asset: &str) -> PathBuf {
        self.dir.join(format!("{asset}.{EXT}"))
    }

    /// Load the checkpoint for `asset`. `Ok(None)` when there is none yet or the
    /// file was corrupt (and has been quarantined).
    pub fn load<R: Record>(&self, asset: &str) -> Result<Option<Checkpoint<R>>> {
        let path = self.path(asset);
        if !path.exists() {
            return Ok(None);
        }
        match read_records::<R>(&path) {
            Ok(records) => {
                tracing::debug!(asset, records = records.len(), "checkpoint loaded");
                Ok(Some(Checkpoint { records }))
            }
            Err(e) if e.is_io_error() => {
                Err(e).with_context(|| format!("read checkpoint: {}", path.display()))
            }
            Err(e) => {
                let quarantine = path.with_extension(format!("{EXT}.{CORRUPT_SUFFIX}"));
                tracing::warn!(
                    asset,
                    path = %path.display(),
                    error = %e,
                    "quarantining corrupt checkpoint"
                );
                fs::rename(&path, &quarantine).with_context(|| {
                    format!("quarantine checkpoint: {}", quarantine.display())
                })?;
                Ok(None)
            }
        }
    }

    /// Read the checkpoint for `asset` without touching the file system. A corrupt
    /// file is logged and reported as `Ok(None)` but stays where it is; only the
    /// worker that owns the asset quarantines it.
    pub fn read<R: Record>(&self, asset: &str) -> Result<Option<Checkpoint<R>>> {
        let path = self.path(asset);
        if !path.exists() {
            return Ok(None);
        }
        match read_records::<R>(&path) {
            Ok(records) => Ok(Some(Checkpoint { records })),
            Err(e) if e.is_io_error() => {
                Err(e).with_context(|| format!("read checkpoint: {}", path.display()))
            }
            Err(e) => {
                tracing::warn!(
                    asset,
                    path = %path.display(),
                    error = %e,
                    "ignoring corrupt checkpoint"
                );
                Ok(None)
            }
        }
    }

    /// Replace the checkpoint for `asset` with `records`.
    pub fn flush<R: Record>(&self, asset: &str, records: &[R]) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("create checkpoint dir: {}", self.dir.display()))?;
        let path = self.path(asset);
        write_atomic(&path, records)?;
        tracing::debug!(asset, records = records.len(), "checkpoint flushed");
        Ok(())
    }

    /// Assets that currently have a checkpoint on disk, sorted.
    pub fn assets(&self) -> Result<Vec<String>> {
        let entries = match fs::read_dir(&self.dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(e)
                    .with_context(|| format!("list checkpoints: {}", self.dir.display()))
            }
        };
        let mut assets = Vec::new();
        for entry in entries {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXT) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                assets.push(stem.to_string());
            }
        }
        assets.sort();
        Ok(assets)
    }
}

fn read_records<R: Record>(path: &Path) -> csv::Result<Vec<R>> {
    let mut reader = csv::Reader::from_path(path)?;
    reader.deserialize::<R>().collect()
}

/// Serialize `rows` as CSV into `path` via a same-directory temp file and rename.
pub(crate) fn write_atomic<T: serde::Serialize>(path: &Path, rows: &[T]) -> Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    let mut tmp = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("create temp file in {}", dir.display()))?;
    {
        let mut writer = csv::Writer::from_writer(&mut tmp);
        for row in rows {
            writer
                .serialize(row)
                .with_context(|| format!("serialize row for {}", path.display()))?;
        }
        writer.flush()?;
    }
    tmp.flush()?;
    tmp.as_file().sync_all()?;
    tmp.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("persist {}", path.display()))?;
    Ok(())
}
