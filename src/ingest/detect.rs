//! Scene detection stage: artifact persistence and skip logic.

use std::path::Path;

use tracing::{info, warn};
use walkdir::WalkDir;

use crate::artifacts::{read_json, write_json};
use crate::error::{Error, Result};
use crate::ingest::{DetectedScene, KEYFRAMES_DIR, SceneDetector};

/// Raw scene list artifact inside a source directory.
pub const SCENE_DATA_FILE: &str = "scene_data.json";

/// Detect scenes for a source, or read back a previous detection.
///
/// Skip rule: the artifact counts as produced when `scene_data.json` parses
/// AND at least one keyframe image exists next to it. A parseable file with no
/// keyframes (or a corrupt file) is treated as incomplete and recomputed.
pub fn run(
    source_dir: &Path,
    video: &Path,
    detector: &mut dyn SceneDetector,
) -> Result<Vec<DetectedScene>> {
    let artifact = source_dir.join(SCENE_DATA_FILE);
    let keyframes_dir = source_dir.join(KEYFRAMES_DIR);

    if artifact.exists() {
        if count_keyframes(&keyframes_dir) == 0 {
            warn!(
                source = %source_dir.display(),
                "scene data exists but keyframes are missing; re-detecting"
            );
        } else {
            match read_json::<Vec<DetectedScene>>(&artifact) {
                Ok(scenes) => {
                    info!(
                        scenes = scenes.len(),
                        "scene data already exists; skipping detection"
                    );
                    return Ok(scenes);
                }
                Err(Error::FormatMismatch { reason, .. }) => {
                    warn!(%reason, "existing scene data is corrupt; re-detecting");
                }
                Err(err) => return Err(err),
            }
        }
    }

    std::fs::create_dir_all(&keyframes_dir)?;

    let scenes = detector
        .detect_scenes(video, &keyframes_dir)
        .map_err(|err| Error::stage("scene detection", err))?;

    write_json(&artifact, &scenes)?;
    info!(scenes = scenes.len(), "scene detection complete");
    Ok(scenes)
}

/// Count keyframe images under a directory.
pub(crate) fn count_keyframes(dir: &Path) -> usize {
    WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .path()
                .extension()
                .and_then(|ext| ext.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("jpg"))
        })
        .count()
}

#[cfg(test)]
mod tests {
    use super::*;

    struct CountingDetector {
        calls: usize,
    }

    impl SceneDetector for CountingDetector {
        fn detect_scenes(
            &mut self,
            _video: &Path,
            keyframes_dir: &Path,
        ) -> Result<Vec<DetectedScene>> {
            self.calls += 1;
            std::fs::write(keyframes_dir.join("scene_0000_1.jpg"), b"jpg")?;
            Ok(vec![DetectedScene {
                scene_id: "scene_0000".to_string(),
                start_seconds: 0.0,
                end_seconds: 3.0,
                keyframes: vec!["keyframes/scene_0000_1.jpg".to_string()],
            }])
        }
    }

    #[test]
    fn second_run_reads_back_instead_of_redetecting() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut detector = CountingDetector { calls: 0 };

        let first = run(dir.path(), Path::new("movie.mkv"), &mut detector)?;
        let second = run(dir.path(), Path::new("movie.mkv"), &mut detector)?;

        assert_eq!(detector.calls, 1);
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn missing_keyframes_force_redetection() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut detector = CountingDetector { calls: 0 };

        run(dir.path(), Path::new("movie.mkv"), &mut detector)?;
        std::fs::remove_file(dir.path().join(KEYFRAMES_DIR).join("scene_0000_1.jpg"))?;

        run(dir.path(), Path::new("movie.mkv"), &mut detector)?;
        assert_eq!(detector.calls, 2);
        Ok(())
    }

    #[test]
    fn corrupt_scene_data_forces_redetection() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut detector = CountingDetector { calls: 0 };

        run(dir.path(), Path::new("movie.mkv"), &mut detector)?;
        std::fs::write(dir.path().join(SCENE_DATA_FILE), b"{broken")?;

        let scenes = run(dir.path(), Path::new("movie.mkv"), &mut detector)?;
        assert_eq!(detector.calls, 2);
        assert_eq!(scenes.len(), 1);
        Ok(())
    }

    #[test]
    fn detector_errors_become_stage_failures() {
        struct FailingDetector;
        impl SceneDetector for FailingDetector {
            fn detect_scenes(
                &mut self,
                _video: &Path,
                _keyframes_dir: &Path,
            ) -> Result<Vec<DetectedScene>> {
                Err(Error::missing_input("video unreadable"))
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let err = run(dir.path(), Path::new("movie.mkv"), &mut FailingDetector).unwrap_err();
        assert!(matches!(err, Error::StageFailure { .. }));
    }
}
