//! On-disk data model for a source's master scene index.
//!
//! Two index shapes exist in the wild and both must load:
//! - current: an object carrying the movie name, the source video path, and
//!   the scene list
//! - legacy: a bare list of scenes, with no video path
//!
//! The shape decision is made once, here, as an untagged parse; nothing
//! downstream of [`IndexShape::normalize`] ever branches on it again.

use serde::{Deserialize, Serialize};

use crate::shots::ShotType;

/// Name of the master index file inside a source directory.
pub const MASTER_INDEX_FILE: &str = "master_index.json";

/// One indexed scene as stored on disk.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneRecord {
    pub id: String,
    pub time: SceneTime,
    pub visual: SceneVisual,
    pub content: SceneContent,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneTime {
    pub start: f32,
    pub end: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneVisual {
    pub shot_type: ShotType,

    /// Representative keyframe, relative to the source directory.
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneContent {
    /// Named characters recognized in the scene.
    #[serde(default)]
    pub characters: Vec<String>,

    /// The anonymous person ids the names were derived from.
    #[serde(default)]
    pub raw_ids: Vec<String>,
}

/// The current master index shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MasterIndex {
    #[serde(default)]
    pub movie_name: Option<String>,

    #[serde(default)]
    pub source_video_path: Option<String>,

    pub scenes: Vec<SceneRecord>,
}

/// Either supported on-disk shape of `master_index.json`.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum IndexShape {
    Current(MasterIndex),
    Legacy(Vec<SceneRecord>),
}

impl IndexShape {
    /// Collapse both shapes into the current in-memory representation.
    ///
    /// Legacy indexes have no movie name and no source video path.
    pub fn normalize(self) -> MasterIndex {
        match self {
            IndexShape::Current(index) => index,
            IndexShape::Legacy(scenes) => MasterIndex {
                movie_name: None,
                source_video_path: None,
                scenes,
            },
        }
    }
}
