//! Face clustering stage: artifact persistence and skip logic.

use std::path::Path;

use tracing::info;

use crate::artifacts::{read_json, write_json};
use crate::error::{Error, Result};
use crate::ingest::{DetectedScene, FaceClusters, FaceScanner, KEYFRAMES_DIR};

/// Scene id → person ids artifact.
pub const FACE_CLUSTERS_FILE: &str = "face_clusters.json";

/// Person id → representative image artifact.
pub const FACE_REPRESENTATIVES_FILE: &str = "face_representatives.json";

/// Cluster faces for a source, or read back a previous run.
///
/// Skip rule: both artifacts must exist. A source with no detectable faces
/// still writes both files (empty), so the stage stays skippable.
pub fn run(
    source_dir: &Path,
    scenes: &[DetectedScene],
    scanner: &mut dyn FaceScanner,
) -> Result<FaceClusters> {
    let clusters_path = source_dir.join(FACE_CLUSTERS_FILE);
    let representatives_path = source_dir.join(FACE_REPRESENTATIVES_FILE);

    if clusters_path.exists() && representatives_path.exists() {
        info!("face data already exists; skipping scan");
        return Ok(FaceClusters {
            scene_persons: read_json(&clusters_path)?,
            representatives: read_json(&representatives_path)?,
        });
    }

    let clusters = scanner
        .scan_faces(&source_dir.join(KEYFRAMES_DIR), scenes)
        .map_err(|err| Error::stage("face clustering", err))?;

    write_json(&clusters_path, &clusters.scene_persons)?;
    write_json(&representatives_path, &clusters.representatives)?;

    info!(
        persons = clusters.representatives.len(),
        scenes_with_faces = clusters.scene_persons.len(),
        "face clustering complete"
    );
    Ok(clusters)
}
