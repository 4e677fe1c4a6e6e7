//! Shot descriptors: the narrative planner's output, bound back onto segments.

use serde::{Deserialize, Serialize};

use crate::segmenter::Segment;

/// Camera framing vocabulary shared by planning and scene indexing.
///
/// Serialized with the human-readable labels stored in source indexes, so a
/// planner answer and an ingested scene tag compare directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShotType {
    #[serde(rename = "Extreme Close-Up")]
    ExtremeCloseUp,
    #[serde(rename = "Close-Up")]
    CloseUp,
    #[serde(rename = "Medium Shot")]
    MediumShot,
    #[serde(rename = "Two Shot")]
    TwoShot,
    #[serde(rename = "Wide Angle")]
    WideAngle,
    #[serde(rename = "Scenery / Landscape")]
    Scenery,
    #[serde(other)]
    Unknown,
}

/// One planned visual for one narration segment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShotDescriptor {
    pub segment_id: usize,

    /// Free-text description of the visual content, used for embedding search.
    pub visual_query: String,

    pub shot_type: ShotType,

    /// Character the shot should feature; `None` requests B-roll.
    #[serde(default)]
    pub character: Option<String>,

    #[serde(default)]
    pub mood: String,

    /// Pacing override; when absent the segment's own duration is the target.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target_duration_seconds: Option<f32>,
}

impl ShotDescriptor {
    /// The descriptor used when the planner cannot produce one.
    ///
    /// A generic query and a medium framing let the matcher still find
    /// something reasonable instead of dropping the segment.
    pub fn fallback(segment_id: usize) -> Self {
        Self {
            segment_id,
            visual_query: "scene from the movie".to_string(),
            shot_type: ShotType::MediumShot,
            character: None,
            mood: "Neutral".to_string(),
            target_duration_seconds: None,
        }
    }
}

/// A segment paired with the shot planned for it; the matcher's input unit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlannedShot {
    pub segment: Segment,
    pub shot: ShotDescriptor,
}

/// Bind planner output onto the segments it was produced for.
///
/// The join is positional up to the shorter length; segments the planner did
/// not cover fall back to [`ShotDescriptor::fallback`]. Surplus descriptors
/// are dropped. Each bound descriptor is stamped with the owning segment's id
/// so a count mismatch cannot misattribute visuals.
pub fn bind_shots(segments: &[Segment], descriptors: Vec<ShotDescriptor>) -> Vec<PlannedShot> {
    let mut descriptors = descriptors.into_iter();

    segments
        .iter()
        .map(|segment| {
            let mut shot = descriptors
                .next()
                .unwrap_or_else(|| ShotDescriptor::fallback(segment.segment_id));
            shot.segment_id = segment.segment_id;
            PlannedShot {
                segment: segment.clone(),
                shot,
            }
        })
        .collect()
}
