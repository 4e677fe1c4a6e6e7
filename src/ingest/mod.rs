//! Ingesting one source video into the library.
//!
//! The expensive work (scene-cut detection, face embedding, CLIP-style image
//! encoding, character naming) belongs to external collaborators behind the
//! traits below. What lives here is the part worth owning: artifact layout,
//! skip logic so re-runs resume instead of recomputing, and the assembly of
//! the per-source master index the matcher consumes.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::shots::ShotType;

pub mod detect;
pub mod faces;
pub mod flicker;
pub mod index;
pub mod visual;

/// Subdirectory of a source dir holding extracted keyframes.
pub const KEYFRAMES_DIR: &str = "keyframes";

/// One detected scene with its extracted keyframes.
///
/// Keyframe paths are relative to the source directory so the library stays
/// portable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectedScene {
    pub scene_id: String,
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub keyframes: Vec<String>,
}

/// Scene-cut detection plus keyframe extraction.
///
/// Implementations detect shot boundaries in `video` and write up to three
/// representative keyframes per scene (sampled near 10%, 50% and 90% of the
/// scene) under `keyframes_dir`, returning the detected scenes in time order.
pub trait SceneDetector {
    fn detect_scenes(&mut self, video: &Path, keyframes_dir: &Path) -> Result<Vec<DetectedScene>>;
}

/// Output of the face pipeline for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FaceClusters {
    /// Scene id → anonymous person ids seen in that scene.
    pub scene_persons: BTreeMap<String, Vec<String>>,

    /// Person id → best representative image.
    pub representatives: BTreeMap<String, FaceRepresentative>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FaceRepresentative {
    /// Image path relative to the keyframes directory.
    pub path: String,

    /// Detection quality of that image.
    pub score: f32,
}

/// Face detection, embedding and clustering into anonymous persons.
pub trait FaceScanner {
    fn scan_faces(
        &mut self,
        keyframes_dir: &Path,
        scenes: &[DetectedScene],
    ) -> Result<FaceClusters>;
}

/// Output of the visual embedding pipeline for one source.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VisualIndex {
    /// Scene id → averaged embedding over that scene's keyframes.
    pub embeddings: BTreeMap<String, Vec<f32>>,

    /// Scene id → majority-voted framing label.
    pub shot_types: BTreeMap<String, ShotType>,
}

/// Image embedding plus shot-type classification.
pub trait VisualEncoder {
    fn encode_keyframes(
        &mut self,
        keyframes_dir: &Path,
        scenes: &[DetectedScene],
    ) -> Result<VisualIndex>;
}

/// One anonymous person offered to the character identifier.
#[derive(Debug, Clone, PartialEq)]
pub struct CharacterCandidate {
    pub person_id: String,
    pub image_path: PathBuf,
    pub appearances: usize,
}

/// Names anonymous persons from representative images and the movie title.
///
/// Implementations return person id → display name; unidentifiable persons
/// should map to `"Unknown"`.
pub trait CharacterIdentifier {
    fn identify(
        &mut self,
        movie_name: &str,
        candidates: &[CharacterCandidate],
    ) -> Result<BTreeMap<String, String>>;
}
