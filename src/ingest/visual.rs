//! Visual embedding stage: artifact persistence and skip logic.

use std::path::Path;

use tracing::info;

use crate::artifacts::{read_json, write_json};
use crate::error::{Error, Result};
use crate::ingest::{DetectedScene, KEYFRAMES_DIR, VisualEncoder, VisualIndex};
use crate::library::EMBEDDINGS_FILE;

/// Scene id → framing label artifact.
pub const VISUAL_TAGS_FILE: &str = "visual_tags.json";

/// Encode keyframes for a source, or read back a previous run.
///
/// Skip rule: both the embedding map and the framing labels must exist.
pub fn run(
    source_dir: &Path,
    scenes: &[DetectedScene],
    encoder: &mut dyn VisualEncoder,
) -> Result<VisualIndex> {
    let embeddings_path = source_dir.join(EMBEDDINGS_FILE);
    let tags_path = source_dir.join(VISUAL_TAGS_FILE);

    if embeddings_path.exists() && tags_path.exists() {
        info!("visual index already exists; skipping encoding");
        return Ok(VisualIndex {
            embeddings: read_json(&embeddings_path)?,
            shot_types: read_json(&tags_path)?,
        });
    }

    let index = encoder
        .encode_keyframes(&source_dir.join(KEYFRAMES_DIR), scenes)
        .map_err(|err| Error::stage("visual embedding", err))?;

    write_json(&embeddings_path, &index.embeddings)?;
    write_json(&tags_path, &index.shot_types)?;

    info!(scenes = index.embeddings.len(), "visual embedding complete");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shots::ShotType;

    struct CountingEncoder {
        calls: usize,
    }

    impl VisualEncoder for CountingEncoder {
        fn encode_keyframes(
            &mut self,
            _keyframes_dir: &Path,
            scenes: &[DetectedScene],
        ) -> Result<VisualIndex> {
            self.calls += 1;
            let mut index = VisualIndex::default();
            for scene in scenes {
                index
                    .embeddings
                    .insert(scene.scene_id.clone(), vec![1.0, 0.0]);
                index
                    .shot_types
                    .insert(scene.scene_id.clone(), ShotType::MediumShot);
            }
            Ok(index)
        }
    }

    fn scene(id: &str) -> DetectedScene {
        DetectedScene {
            scene_id: id.to_string(),
            start_seconds: 0.0,
            end_seconds: 2.0,
            keyframes: Vec::new(),
        }
    }

    #[test]
    fn second_run_reads_back_instead_of_reencoding() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut encoder = CountingEncoder { calls: 0 };
        let scenes = vec![scene("scene_0000"), scene("scene_0001")];

        let first = run(dir.path(), &scenes, &mut encoder)?;
        let second = run(dir.path(), &scenes, &mut encoder)?;

        assert_eq!(encoder.calls, 1);
        assert_eq!(first, second);
        assert_eq!(
            second.shot_types.get("scene_0001"),
            Some(&ShotType::MediumShot)
        );
        Ok(())
    }
}
