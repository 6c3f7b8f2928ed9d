//! Run-scoped output layout and sequence files.
//!
//! ```text
//! <root>/<app_package>_<suite_creation_time>/
//!     sequences/seq001_12.json
//!     logs/log001.txt
//!     coverage/coverage001.ec
//! ```

use std::fs;
use std::path::{Path, PathBuf};

use roamer_ir::parse::SequenceFile;
use roamer_ir::Event;

#[derive(Debug, thiserror::Error)]
pub enum OutputError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Directories for one suite run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputPaths {
    pub root: PathBuf,
    pub sequences: PathBuf,
    pub logs: PathBuf,
    pub coverage: PathBuf,
}

impl OutputPaths {
    /// Create (if missing) the run directory and its three subdirectories.
    pub fn create(
        output_root: &Path,
        app_package: &str,
        suite_creation_time: i64,
    ) -> Result<Self, OutputError> {
        let root = output_root.join(format!("{app_package}_{suite_creation_time}"));
        let paths = Self {
            sequences: root.join("sequences"),
            logs: root.join("logs"),
            coverage: root.join("coverage"),
            root,
        };
        for dir in [&paths.sequences, &paths.logs, &paths.coverage] {
            create_dir(dir)?;
        }
        tracing::debug!(root = %paths.root.display(), "output directories ready");
        Ok(paths)
    }
}

fn create_dir(dir: &Path) -> Result<(), OutputError> {
    fs::create_dir_all(dir).map_err(|source| OutputError::Io {
        path: dir.to_path_buf(),
        source,
    })
}

/// 1-based, zero-padded artifact number for sequence `index`.
pub fn artifact_number(index: u32) -> String {
    format!("{:03}", index + 1)
}

pub fn sequence_file_name(index: u32, duration_secs: i64) -> String {
    format!("seq{}_{}.json", artifact_number(index), duration_secs)
}

pub fn coverage_file_name(index: u32) -> String {
    format!("coverage{}.ec", artifact_number(index))
}

pub fn log_file_name(index: u32) -> String {
    format!("log{}.txt", artifact_number(index))
}

/// Write a finished sequence as `{"events": [...], "length": n}`.
pub fn write_sequence(
    dir: &Path,
    events: &[Event],
    index: u32,
    duration_secs: i64,
) -> Result<PathBuf, OutputError> {
    create_dir(dir)?;
    let path = dir.join(sequence_file_name(index, duration_secs));
    let body = serde_json::to_string_pretty(&SequenceFile::new(events.to_vec()))?;
    fs::write(&path, body).map_err(|source| OutputError::Io {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}
