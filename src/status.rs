//! Durable job status records and the progress-reporting seam.
//!
//! Every long-running job (one ingestion per source, one build per project)
//! persists a small status record after each progress update, so an
//! interrupted job can be inspected or resumed and external pollers can watch
//! it without touching the job itself. This file is the only durable state the
//! orchestrator owns directly.

use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};

use crate::artifacts::{read_json, write_json};
use crate::error::Result;

/// Lifecycle of one job run. `Ready` and `Failed` are terminal for the run; a
/// later run of the same job starts over at `Processing`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    Pending,
    Processing,
    Ready,
    Failed,
}

/// The persisted record, as written after every update.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    /// Sources the job was started with; only present for build jobs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<String>>,

    pub status: JobState,
    pub percent: u8,
    pub progress_text: String,

    /// Seconds since the Unix epoch at write time.
    pub last_updated: f64,
}

/// Receives `(percent, text)` updates from a running job.
///
/// Any `FnMut(u8, &str)` closure is a sink, so callers can pass `|_, _| ()` or
/// wire updates into whatever observer they have.
pub trait ProgressSink {
    fn report(&mut self, percent: u8, text: &str);
}

impl<F: FnMut(u8, &str)> ProgressSink for F {
    fn report(&mut self, percent: u8, text: &str) {
        self(percent, text)
    }
}

/// Writes status records for one job to a fixed path.
pub struct StatusFile {
    path: PathBuf,
    sources: Option<Vec<String>>,
}

impl StatusFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            sources: None,
        }
    }

    /// A status file that also records the build's source list.
    pub fn with_sources(path: impl Into<PathBuf>, sources: Vec<String>) -> Self {
        Self {
            path: path.into(),
            sources: Some(sources),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persist the latest state. Each write replaces the whole record.
    pub fn write(&self, status: JobState, percent: u8, progress_text: &str) -> Result<()> {
        let record = JobStatus {
            sources: self.sources.clone(),
            status,
            percent,
            progress_text: progress_text.to_string(),
            last_updated: epoch_seconds(),
        };
        write_json(&self.path, &record)
    }

    pub fn read(&self) -> Result<JobStatus> {
        read_json(&self.path)
    }
}

fn epoch_seconds() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or(0.0)
}
