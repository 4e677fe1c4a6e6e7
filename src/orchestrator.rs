//! Job orchestration: the ingestion and build pipelines.
//!
//! Both jobs follow the same shape:
//! - validate preconditions up front and fail the whole job on a miss
//! - run stages strictly in order, skipping any stage whose output artifact
//!   already exists on disk
//! - persist `(status, percent, text, timestamp)` after every progress report
//! - catch a stage failure at the job boundary, record `failed` with the
//!   reason, and leave earlier artifacts untouched
//!
//! The orchestrator is synchronous; callers that want a background job spawn
//! a thread and poll the persisted status.

use std::collections::BTreeSet;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::artifacts::{read_json, write_json};
use crate::batcher::{Batch, batch_segments};
use crate::error::{Error, Result};
use crate::export::TimelineExporter;
use crate::ingest::index::CHARACTER_MAP_FILE;
use crate::ingest::{
    CharacterIdentifier, FaceScanner, SceneDetector, VisualEncoder, detect, faces, flicker, index,
    visual,
};
use crate::library::SourceCatalog;
use crate::matcher::{EditEntry, QueryEncoder, assign_scenes};
use crate::opts::PipelineOpts;
use crate::planner::{NarrativePlanner, plan_script};
use crate::project::{INGEST_STATUS_FILE, PROJECT_META_FILE, Workspace, find_audio, is_processing};
use crate::segmenter::segment_words;
use crate::shots::PlannedShot;
use crate::status::{JobState, JobStatus, ProgressSink, StatusFile};
use crate::transcribe::Transcriber;

/// Everything an ingestion job delegates to.
pub struct IngestCollaborators<'a> {
    pub detector: &'a mut dyn SceneDetector,
    pub faces: &'a mut dyn FaceScanner,
    pub visual: &'a mut dyn VisualEncoder,
    pub characters: &'a mut dyn CharacterIdentifier,
}

/// Everything a build job delegates to.
pub struct BuildCollaborators<'a> {
    pub transcriber: &'a mut dyn Transcriber,
    pub planner: &'a mut dyn NarrativePlanner,
    pub queries: &'a mut dyn QueryEncoder,
    pub exporter: &'a mut dyn TimelineExporter,
}

/// What a finished build leaves behind.
#[derive(Debug, Clone, PartialEq)]
pub struct BuildOutcome {
    pub entries: Vec<EditEntry>,
    pub timeline_path: PathBuf,
}

/// Ingest one source video into the library under `alias`.
///
/// Stage order: detect scenes → flicker fix-up (best effort) → face
/// clustering → visual embedding → master index. Every stage skips itself
/// when its artifacts already exist, so re-running after an interruption
/// resumes at the first incomplete stage.
pub fn ingest_source(
    workspace: &Workspace,
    video: &Path,
    alias: &str,
    movie_name: Option<&str>,
    opts: &PipelineOpts,
    collaborators: IngestCollaborators<'_>,
    progress: &mut dyn ProgressSink,
) -> Result<()> {
    if !video.exists() {
        return Err(Error::missing_input(format!(
            "source file not found: {}",
            video.display()
        )));
    }
    if is_processing(&workspace.source_status(alias)) {
        return Err(Error::stage(
            "ingestion",
            format!("source '{alias}' is already processing"),
        ));
    }

    let source_dir = workspace.source_dir(alias);
    std::fs::create_dir_all(&source_dir)?;

    let movie_name = movie_name.unwrap_or(alias);
    let status = StatusFile::new(source_dir.join(INGEST_STATUS_FILE));

    info!(alias, movie_name, "starting ingestion");

    run_with_status(&status, progress, "Ready", |report| {
        run_ingest_stages(&source_dir, video, movie_name, opts, collaborators, report)
    })
}

fn run_ingest_stages(
    source_dir: &Path,
    video: &Path,
    movie_name: &str,
    opts: &PipelineOpts,
    collaborators: IngestCollaborators<'_>,
    report: &mut dyn FnMut(u8, &str) -> Result<()>,
) -> Result<()> {
    report(0, "Initializing...")?;

    report(10, "Detecting Scenes...")?;
    let scenes = detect::run(source_dir, video, collaborators.detector)?;

    report(25, "Fixing Flickers...")?;
    let scenes = match flicker::run(source_dir, opts.flicker_offset_seconds) {
        Ok(fixed) => fixed,
        // Best effort: a failed fix-up never sinks the ingestion.
        Err(err) => {
            warn!(error = %err, "flicker fix skipped");
            scenes
        }
    };

    report(30, "Scanning Faces (this takes time)...")?;
    let clusters = faces::run(source_dir, &scenes, collaborators.faces)?;

    report(80, "Building Index...")?;
    let visual_index = visual::run(source_dir, &scenes, collaborators.visual)?;

    report(90, "Building Index...")?;
    let character_map = index::identify_characters(
        source_dir,
        movie_name,
        &clusters,
        opts.character_limit,
        collaborators.characters,
    );
    index::build_master_index(
        source_dir,
        movie_name,
        video,
        &scenes,
        &visual_index,
        &clusters,
        &character_map,
    )?;

    Ok(())
}

/// Build a project: narration audio in, editor-importable timeline out.
///
/// Stage order: verify audio → verify sources → transcribe → segment and
/// batch → plan shots → assign scenes → export. The transcript and script
/// artifacts are reused when present; matching and export always run.
pub fn build_project(
    workspace: &Workspace,
    project: &str,
    sources: &[String],
    audio: Option<&Path>,
    opts: &PipelineOpts,
    collaborators: BuildCollaborators<'_>,
    progress: &mut dyn ProgressSink,
) -> Result<BuildOutcome> {
    let project_dir = workspace.project_dir(project);
    if !project_dir.exists() {
        return Err(Error::missing_input(format!(
            "project '{project}' not found; create it first"
        )));
    }

    let meta_path = project_dir.join(PROJECT_META_FILE);
    let last_build: Result<JobStatus> = read_json(&meta_path);
    if is_processing(&last_build) {
        return Err(Error::stage(
            "build",
            format!("project '{project}' is already processing"),
        ));
    }

    let status = StatusFile::with_sources(meta_path, sources.to_vec());

    info!(project, ?sources, "starting build");

    run_with_status(&status, progress, "Build complete", |report| {
        run_build_stages(
            workspace,
            &project_dir,
            project,
            sources,
            audio,
            opts,
            collaborators,
            report,
        )
    })
}

#[allow(clippy::too_many_arguments)]
fn run_build_stages(
    workspace: &Workspace,
    project_dir: &Path,
    project: &str,
    sources: &[String],
    audio: Option<&Path>,
    opts: &PipelineOpts,
    collaborators: BuildCollaborators<'_>,
    report: &mut dyn FnMut(u8, &str) -> Result<()>,
) -> Result<BuildOutcome> {
    let input_dir = project_dir.join("input");
    let artifacts_dir = project_dir.join("artifacts");
    let output_dir = project_dir.join("output");
    for dir in [&input_dir, &artifacts_dir, &output_dir] {
        std::fs::create_dir_all(dir)?;
    }

    report(0, "Initializing workspace...")?;

    // Optionally pull the narration into the project first.
    if let Some(audio) = audio {
        copy_reference_audio(audio, &input_dir)?;
    }

    let audio_path = find_audio(&input_dir)?.ok_or_else(|| {
        Error::missing_input(format!("no audio file found in {}", input_dir.display()))
    })?;
    info!(audio = %audio_path.display(), "audio verified");
    report(10, "Audio verified")?;

    if sources.is_empty() {
        return Err(Error::missing_input("no sources provided"));
    }
    for alias in sources {
        if !workspace.source_dir(alias).exists() {
            return Err(Error::missing_input(format!(
                "source '{alias}' not found in library"
            )));
        }
    }
    report(20, "Sources verified")?;

    // Transcription + segmentation + batching, reused when already on disk.
    let transcript_path = artifacts_dir.join("transcript.json");
    let batches: Vec<Batch> = match read_artifact(&transcript_path)? {
        Some(batches) => {
            info!("transcript exists; skipping transcription");
            batches
        }
        None => {
            let words = collaborators
                .transcriber
                .transcribe(&audio_path)
                .map_err(|err| Error::stage("transcription", err))?;
            let segments = segment_words(&words);
            let batches = batch_segments(segments, opts.target_context_words);
            write_json(&transcript_path, &batches)?;
            batches
        }
    };
    report(40, "Transcript ready")?;

    // Shot planning, reused when already on disk.
    let script_path = artifacts_dir.join("script.json");
    let script: Vec<PlannedShot> = match read_artifact(&script_path)? {
        Some(script) => {
            info!("script exists; skipping shot planning");
            script
        }
        None => {
            let cast = collect_cast(workspace, sources)?;
            info!(?cast, "planning shots");
            let script = plan_script(collaborators.planner, &batches, &cast, &opts.planner_retry);
            write_json(&script_path, &script)?;
            script
        }
    };
    report(60, "Visual script generated")?;

    // Matching always runs against the current library state.
    let mut catalog = SourceCatalog::new(workspace.library_root());
    let mut active = Vec::new();
    for alias in sources {
        match catalog.load(alias) {
            Ok(source) => active.push(source),
            Err(err @ (Error::MissingIndex { .. } | Error::FormatMismatch { .. })) => {
                warn!(alias = %alias, error = %err, "source excluded from matching");
            }
            Err(err) => return Err(err),
        }
    }
    if active.is_empty() {
        return Err(Error::stage("scene matching", "no usable sources loaded"));
    }

    let entries = assign_scenes(&script, &active, collaborators.queries)
        .map_err(|err| Error::stage("scene matching", err))?;
    write_json(&artifacts_dir.join("edl.json"), &entries)?;
    report(80, "Scenes matched")?;

    // Export.
    let timeline_path = output_dir.join(format!("{project}.xml"));
    let file = File::create(&timeline_path)?;
    let mut writer = BufWriter::new(file);
    collaborators
        .exporter
        .export(&entries, &audio_path, &mut writer)
        .map_err(|err| Error::stage("timeline export", err))?;

    info!(timeline = %timeline_path.display(), cuts = entries.len(), "build complete");
    Ok(BuildOutcome {
        entries,
        timeline_path,
    })
}

/// Run a job body with status persistence and failure containment.
///
/// Every progress report is persisted as `processing`; success persists
/// `ready` at 100%, failure persists `failed` with the reason and re-raises.
fn run_with_status<T>(
    status: &StatusFile,
    progress: &mut dyn ProgressSink,
    done_text: &str,
    run: impl FnOnce(&mut dyn FnMut(u8, &str) -> Result<()>) -> Result<T>,
) -> Result<T> {
    let outcome = {
        let mut report = |percent: u8, text: &str| -> Result<()> {
            progress.report(percent, text);
            status.write(JobState::Processing, percent, text)
        };
        run(&mut report)
    };

    match outcome {
        Ok(value) => {
            status.write(JobState::Ready, 100, done_text)?;
            progress.report(100, done_text);
            Ok(value)
        }
        Err(err) => {
            let reason = format!("Error: {err}");
            // The failure itself is what we surface; a status write error on
            // top of it only gets logged.
            if let Err(write_err) = status.write(JobState::Failed, 0, &reason) {
                warn!(error = %write_err, "failed to persist job failure");
            }
            progress.report(0, &reason);
            Err(err)
        }
    }
}

/// Read an optional artifact: absent or corrupt means "recompute".
fn read_artifact<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match read_json(path) {
        Ok(value) => Ok(Some(value)),
        Err(Error::MissingInput(_)) => Ok(None),
        Err(Error::FormatMismatch { reason, .. }) => {
            warn!(path = %path.display(), %reason, "artifact unreadable; recomputing");
            Ok(None)
        }
        Err(err) => Err(err),
    }
}

/// Union of named characters across the selected sources.
fn collect_cast(workspace: &Workspace, sources: &[String]) -> Result<Vec<String>> {
    let mut cast: BTreeSet<String> = BTreeSet::new();

    for alias in sources {
        let map_path = workspace.source_dir(alias).join(CHARACTER_MAP_FILE);
        let Some(map) = read_artifact::<std::collections::BTreeMap<String, String>>(&map_path)?
        else {
            continue;
        };
        cast.extend(map.into_values().filter(|name| name != "Unknown"));
    }

    Ok(cast.into_iter().collect())
}

fn copy_reference_audio(audio: &Path, input_dir: &Path) -> Result<()> {
    if !audio.exists() {
        return Err(Error::missing_input(format!(
            "audio file not found: {}",
            audio.display()
        )));
    }

    let extension = audio
        .extension()
        .and_then(|ext| ext.to_str())
        .unwrap_or("wav")
        .to_ascii_lowercase();
    let dest = input_dir.join(format!("reference.{extension}"));
    std::fs::copy(audio, &dest)?;
    info!(dest = %dest.display(), "narration audio copied");
    Ok(())
}
