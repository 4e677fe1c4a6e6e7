//! Workspace layout: the library of ingested sources and the project folders.
//!
//! Everything a job produces lives under one root:
//!
//! ```text
//! <root>/library/<alias>/        one directory per ingested source
//! <root>/projects/<name>/input/      narration audio
//! <root>/projects/<name>/artifacts/  transcript.json, script.json, edl.json
//! <root>/projects/<name>/output/     exported timelines
//! ```
//!
//! Directories are namespaced by alias/project name; concurrent jobs over
//! different names never share a path.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::error::{Error, Result};
use crate::status::{JobState, JobStatus, StatusFile};

/// Status file name inside a source directory.
pub const INGEST_STATUS_FILE: &str = ".ingest_status.json";

/// Status/metadata file name inside a project directory.
pub const PROJECT_META_FILE: &str = "project_meta.json";

/// Audio containers we accept as narration input.
pub const AUDIO_EXTENSIONS: [&str; 3] = ["mp3", "wav", "m4a"];

/// A workspace root holding the source library and all projects.
#[derive(Debug, Clone)]
pub struct Workspace {
    root: PathBuf,
}

/// Summary of a project as external observers see it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectDetails {
    pub name: String,
    pub path: PathBuf,
    pub audio_ready: bool,
    pub sources: Vec<String>,
    pub status: Option<JobStatus>,
}

impl Workspace {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn library_root(&self) -> PathBuf {
        self.root.join("library")
    }

    pub fn projects_root(&self) -> PathBuf {
        self.root.join("projects")
    }

    pub fn source_dir(&self, alias: &str) -> PathBuf {
        self.library_root().join(alias)
    }

    pub fn project_dir(&self, name: &str) -> PathBuf {
        self.projects_root().join(name)
    }

    /// Create the library and projects roots if they are missing.
    pub fn ensure(&self) -> Result<()> {
        std::fs::create_dir_all(self.library_root())?;
        std::fs::create_dir_all(self.projects_root())?;
        Ok(())
    }

    /// Create a project's folder structure. Creating an existing project is a
    /// no-op so repeat calls stay safe.
    pub fn create_project(&self, name: &str) -> Result<PathBuf> {
        let project_dir = self.project_dir(name);
        for subdir in ["input", "artifacts", "output"] {
            std::fs::create_dir_all(project_dir.join(subdir))?;
        }
        info!(project = name, "project workspace ready");
        Ok(project_dir)
    }

    /// Delete a source from the library. Returns whether anything was removed.
    pub fn delete_source(&self, alias: &str) -> Result<bool> {
        remove_dir(&self.source_dir(alias))
    }

    /// Delete a project. Returns whether anything was removed.
    pub fn delete_project(&self, name: &str) -> Result<bool> {
        remove_dir(&self.project_dir(name))
    }

    /// List the aliases present in the library, sorted.
    pub fn list_sources(&self) -> Result<Vec<String>> {
        let root = self.library_root();
        if !root.exists() {
            return Ok(Vec::new());
        }

        let mut aliases: Vec<String> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_dir())
            .map(|entry| entry.file_name().to_string_lossy().into_owned())
            .collect();
        aliases.sort();
        Ok(aliases)
    }

    /// Read the persisted ingest status of a source, if any.
    pub fn source_status(&self, alias: &str) -> Result<JobStatus> {
        StatusFile::new(self.source_dir(alias).join(INGEST_STATUS_FILE)).read()
    }

    /// Summarize a project: whether narration audio is present, which sources
    /// the last build used, and the last persisted build status.
    pub fn project_details(&self, name: &str) -> Result<Option<ProjectDetails>> {
        let project_dir = self.project_dir(name);
        if !project_dir.exists() {
            return Ok(None);
        }

        let audio_ready = find_audio(&project_dir.join("input"))?.is_some();

        let status = match StatusFile::new(project_dir.join(PROJECT_META_FILE)).read() {
            Ok(status) => Some(status),
            Err(Error::MissingInput(_)) => None,
            Err(err) => return Err(err),
        };

        let sources = status
            .as_ref()
            .and_then(|s| s.sources.clone())
            .unwrap_or_default();

        Ok(Some(ProjectDetails {
            name: name.to_string(),
            path: project_dir,
            audio_ready,
            sources,
            status,
        }))
    }
}

/// Find the first narration audio file in a directory (sorted by name).
pub fn find_audio(input_dir: &Path) -> Result<Option<PathBuf>> {
    if !input_dir.exists() {
        return Ok(None);
    }

    let mut candidates: Vec<PathBuf> = std::fs::read_dir(input_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| {
                    AUDIO_EXTENSIONS
                        .iter()
                        .any(|known| known.eq_ignore_ascii_case(ext))
                })
        })
        .collect();

    candidates.sort();
    Ok(candidates.into_iter().next())
}

fn remove_dir(dir: &Path) -> Result<bool> {
    if !dir.exists() {
        return Ok(false);
    }
    std::fs::remove_dir_all(dir)?;
    info!(path = %dir.display(), "deleted");
    Ok(true)
}

/// The persisted state a fresh run should refuse to race against.
///
/// Rejecting a second job for an alias/project already `processing` is the
/// caller's responsibility; this helper gives callers the check.
pub fn is_processing(status: &Result<JobStatus>) -> bool {
    matches!(
        status,
        Ok(JobStatus {
            status: JobState::Processing,
            ..
        })
    )
}
