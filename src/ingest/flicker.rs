//! Temporal offset fix-up on detected scene boundaries.
//!
//! Scene cuts often land a frame or two early, catching the tail of the
//! previous shot as a visible flicker. Nudging every scene start forward by a
//! small offset hides it. The untouched scene data is backed up first, and the
//! backup's existence marks the fix as already applied.

use std::path::Path;

use tracing::{info, warn};

use crate::artifacts::{read_json, write_json};
use crate::error::Result;
use crate::ingest::DetectedScene;
use crate::ingest::detect::SCENE_DATA_FILE;

/// Backup of the unmodified scene data; doubles as the applied marker.
pub const SCENE_DATA_BACKUP_FILE: &str = "scene_data_backup.json";

/// Shift every scene start by `offset_seconds`, dropping scenes the shift
/// would empty out. Applied at most once per source.
pub fn run(source_dir: &Path, offset_seconds: f32) -> Result<Vec<DetectedScene>> {
    let data_path = source_dir.join(SCENE_DATA_FILE);
    let backup_path = source_dir.join(SCENE_DATA_BACKUP_FILE);

    if backup_path.exists() {
        info!("scene data backup found; flicker fix already applied");
        return read_json(&data_path);
    }

    let scenes: Vec<DetectedScene> = read_json(&data_path)?;
    std::fs::copy(&data_path, &backup_path)?;

    let original = scenes.len();
    let fixed: Vec<DetectedScene> = scenes
        .into_iter()
        .filter_map(|mut scene| {
            let new_start = scene.start_seconds + offset_seconds;
            if new_start >= scene.end_seconds {
                // Micro-scenes shorter than the offset are noise anyway.
                return None;
            }
            scene.start_seconds = (new_start * 1000.0).round() / 1000.0;
            Some(scene)
        })
        .collect();

    write_json(&data_path, &fixed)?;

    info!(offset_seconds, "flicker fix applied");
    if fixed.len() < original {
        warn!(
            removed = original - fixed.len(),
            "dropped micro-scenes shorter than the offset"
        );
    }

    Ok(fixed)
}
