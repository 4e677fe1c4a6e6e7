//! The scene assignment engine.
//!
//! For each planned shot, in narration order, we score every queryable scene
//! across every loaded source and take the global maximum. Scoring is purely
//! additive: constraints adjust a scene's score instead of filtering it out,
//! so the engine keeps a total order over candidates and degrades gracefully
//! when nothing fits well. The recorded `match_score` makes every decision
//! auditable after the fact.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::library::{Scene, Source, l2_normalize};
use crate::shots::{PlannedShot, ShotType};

/// Pluggable text-embedding collaborator for visual queries.
///
/// The returned vector must live in the same space as the scene embeddings;
/// the engine normalizes it before use.
pub trait QueryEncoder {
    fn encode(&mut self, text: &str) -> Result<Vec<f32>>;
}

/// Added when the requested character appears in a scene.
pub const CHARACTER_MATCH_BONUS: f32 = 500.0;

/// Subtracted when the requested character is absent from a scene.
pub const CHARACTER_MISS_PENALTY: f32 = 500.0;

/// Subtracted when B-roll was requested but the scene shows recognized characters.
pub const BROLL_CAST_PENALTY: f32 = 50.0;

/// Added when the requested framing matches the scene's shot type.
pub const SHOT_TYPE_BONUS: f32 = 50.0;

/// Subtracted once a scene id has already been assigned in this run.
///
/// Large enough to always lose against any unused scene, but not a hard
/// filter: if every candidate has been used, a reused scene can still win.
pub const REUSE_PENALTY: f32 = 10_000.0;

/// One cut of the final edit decision list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EditEntry {
    pub segment_id: usize,
    pub text: String,
    pub scene_id: String,
    pub source_alias: String,
    pub source_video_path: Option<PathBuf>,

    /// Representative keyframe of the chosen scene, for review tooling.
    pub keyframe: String,

    pub in_seconds: f32,
    pub out_seconds: f32,
    pub duration_seconds: f32,
    pub target_duration_seconds: f32,
    pub match_score: f32,
    pub shot_type: ShotType,
    pub characters: Vec<String>,
}

/// Assign one scene to every planned shot, in narration order.
///
/// Sources are enumerated in the order given and scenes in index order, so
/// ties break deterministically toward the first candidate encountered.
/// Shots with no candidate scene at all are skipped with a warning; the run
/// itself only fails if the query encoder does.
pub fn assign_scenes(
    shots: &[PlannedShot],
    sources: &[Arc<Source>],
    encoder: &mut dyn QueryEncoder,
) -> Result<Vec<EditEntry>> {
    let mut edl: Vec<EditEntry> = Vec::new();
    let mut used_scene_ids: HashSet<String> = HashSet::new();

    debug!(shots = shots.len(), sources = sources.len(), "matching started");

    for planned in shots {
        let mut query = encoder.encode(&planned.shot.visual_query)?;
        l2_normalize(&mut query);

        let Some((score, source, scene_index)) = best_candidate(sources, &query, planned, &used_scene_ids)
        else {
            warn!(
                segment_id = planned.segment.segment_id,
                text = %truncate(&planned.segment.text, 20),
                "no scene available for segment; dropping it"
            );
            continue;
        };

        let scene = &source.scenes()[scene_index];
        used_scene_ids.insert(scene.id.clone());

        edl.push(EditEntry {
            segment_id: planned.segment.segment_id,
            text: planned.segment.text.clone(),
            scene_id: scene.id.clone(),
            source_alias: source.alias.clone(),
            source_video_path: source.video_path.clone(),
            keyframe: scene.keyframe.clone(),
            in_seconds: scene.start_seconds,
            out_seconds: scene.end_seconds,
            duration_seconds: scene.end_seconds - scene.start_seconds,
            target_duration_seconds: planned
                .shot
                .target_duration_seconds
                .unwrap_or(planned.segment.duration_seconds),
            match_score: score,
            shot_type: scene.shot_type,
            characters: scene.characters.clone(),
        });
    }

    debug!(cuts = edl.len(), "matching finished");
    Ok(edl)
}

/// Find the highest-scoring (source, scene) pair across all sources.
///
/// Strict `>` keeps the first-encountered candidate on ties.
fn best_candidate<'a>(
    sources: &'a [Arc<Source>],
    query: &[f32],
    planned: &PlannedShot,
    used_scene_ids: &HashSet<String>,
) -> Option<(f32, &'a Arc<Source>, usize)> {
    let mut best: Option<(f32, &Arc<Source>, usize)> = None;

    for source in sources {
        let similarities = source.similarities(query);

        for (scene_index, scene) in source.scenes().iter().enumerate() {
            let base = similarities[scene_index] * 100.0;
            let score = base + adjustments(planned, scene, used_scene_ids);

            if best.is_none_or(|(best_score, _, _)| score > best_score) {
                best = Some((score, source, scene_index));
            }
        }
    }

    best
}

fn adjustments(planned: &PlannedShot, scene: &Scene, used_scene_ids: &HashSet<String>) -> f32 {
    let mut adjustment = 0.0;

    match planned.shot.character.as_deref() {
        Some(character) => {
            if scene.characters.iter().any(|c| c == character) {
                adjustment += CHARACTER_MATCH_BONUS;
            } else {
                adjustment -= CHARACTER_MISS_PENALTY;
            }
        }
        // B-roll request: a populated frame is a worse fit than an empty one.
        None => {
            if !scene.characters.is_empty() {
                adjustment -= BROLL_CAST_PENALTY;
            }
        }
    }

    if planned.shot.shot_type != ShotType::Unknown && planned.shot.shot_type == scene.shot_type {
        adjustment += SHOT_TYPE_BONUS;
    }

    if used_scene_ids.contains(&scene.id) {
        adjustment -= REUSE_PENALTY;
    }

    adjustment
}

fn truncate(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifacts::write_json;
    use crate::library::SourceCatalog;
    use crate::scenes::{MasterIndex, SceneContent, SceneRecord, SceneTime, SceneVisual};
    use crate::segmenter::Segment;
    use crate::shots::ShotDescriptor;
    use std::collections::BTreeMap;
    use std::path::Path;

    /// Encodes a handful of fixed query strings into axis-aligned vectors.
    struct AxisEncoder;

    impl QueryEncoder for AxisEncoder {
        fn encode(&mut self, text: &str) -> Result<Vec<f32>> {
            Ok(match text {
                "north" => vec![1.0, 0.0],
                "east" => vec![0.0, 1.0],
                _ => vec![0.5, 0.5],
            })
        }
    }

    fn record(
        id: &str,
        vector_axis: usize,
        shot_type: ShotType,
        characters: &[&str],
    ) -> (SceneRecord, Vec<f32>) {
        let mut vector = vec![0.0, 0.0];
        vector[vector_axis] = 1.0;

        let record = SceneRecord {
            id: id.to_string(),
            time: SceneTime {
                start: 5.0,
                end: 9.0,
            },
            visual: SceneVisual {
                shot_type,
                path: format!("keyframes/{id}_1.jpg"),
            },
            content: SceneContent {
                characters: characters.iter().map(|c| c.to_string()).collect(),
                raw_ids: Vec::new(),
            },
        };

        (record, vector)
    }

    fn write_source(root: &Path, alias: &str, records: Vec<(SceneRecord, Vec<f32>)>) {
        let mut scenes = Vec::new();
        let mut vectors: BTreeMap<String, Vec<f32>> = BTreeMap::new();
        for (record, vector) in records {
            vectors.insert(record.id.clone(), vector);
            scenes.push(record);
        }

        let index = MasterIndex {
            movie_name: Some(alias.to_string()),
            source_video_path: Some(format!("/media/{alias}.mkv")),
            scenes,
        };

        let dir = root.join(alias);
        write_json(&dir.join(crate::scenes::MASTER_INDEX_FILE), &index).expect("index");
        write_json(&dir.join(crate::library::EMBEDDINGS_FILE), &vectors).expect("vectors");
    }

    fn planned(segment_id: usize, query: &str, character: Option<&str>, shot_type: ShotType) -> PlannedShot {
        PlannedShot {
            segment: Segment {
                segment_id,
                start_seconds: segment_id as f32,
                end_seconds: segment_id as f32 + 2.0,
                duration_seconds: 2.0,
                text: format!("narration {segment_id}"),
            },
            shot: ShotDescriptor {
                segment_id,
                visual_query: query.to_string(),
                shot_type,
                character: character.map(|c| c.to_string()),
                mood: String::new(),
                target_duration_seconds: None,
            },
        }
    }

    fn load(root: &Path, aliases: &[&str]) -> Vec<Arc<Source>> {
        let mut catalog = SourceCatalog::new(root);
        aliases
            .iter()
            .map(|alias| catalog.load(alias).expect("source loads"))
            .collect()
    }

    #[test]
    fn picks_the_most_similar_scene_across_sources() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "first",
            vec![record("scene_0000", 0, ShotType::WideAngle, &[])],
        );
        write_source(
            dir.path(),
            "second",
            vec![record("scene_0100", 1, ShotType::WideAngle, &[])],
        );

        let sources = load(dir.path(), &["first", "second"]);
        let shots = vec![planned(0, "east", None, ShotType::Unknown)];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        assert_eq!(edl.len(), 1);
        assert_eq!(edl[0].scene_id, "scene_0100");
        assert_eq!(edl[0].source_alias, "second");
        assert_eq!(
            edl[0].source_video_path.as_deref(),
            Some(Path::new("/media/second.mkv"))
        );
        Ok(())
    }

    #[test]
    fn character_match_beats_similarity() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![
                // Perfect visual match, wrong cast.
                record("scene_0000", 0, ShotType::WideAngle, &[]),
                // Poor visual match, right cast.
                record("scene_0001", 1, ShotType::WideAngle, &["Mikael"]),
            ],
        );

        let sources = load(dir.path(), &["movie"]);
        let shots = vec![planned(0, "north", Some("Mikael"), ShotType::Unknown)];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        assert_eq!(edl[0].scene_id, "scene_0001");
        // base 0 + 500 character bonus
        assert!((edl[0].match_score - 500.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn missing_character_costs_exactly_the_penalty() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![record("scene_0000", 0, ShotType::WideAngle, &[])],
        );

        let sources = load(dir.path(), &["movie"]);
        let shots = vec![planned(0, "north", Some("Lisbeth"), ShotType::Unknown)];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        // base 100 - 500 character miss
        assert!((edl[0].match_score - (100.0 - 500.0)).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn broll_prefers_scenes_without_recognized_characters() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![
                record("scene_0000", 0, ShotType::WideAngle, &["Mikael"]),
                record("scene_0001", 0, ShotType::WideAngle, &[]),
            ],
        );

        let sources = load(dir.path(), &["movie"]);
        let shots = vec![planned(0, "north", None, ShotType::Unknown)];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        assert_eq!(edl[0].scene_id, "scene_0001");
        Ok(())
    }

    #[test]
    fn matching_shot_type_adds_its_bonus() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![
                record("scene_0000", 0, ShotType::WideAngle, &[]),
                record("scene_0001", 0, ShotType::CloseUp, &[]),
            ],
        );

        let sources = load(dir.path(), &["movie"]);
        let shots = vec![planned(0, "north", None, ShotType::CloseUp)];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        assert_eq!(edl[0].scene_id, "scene_0001");
        assert!((edl[0].match_score - 150.0).abs() < 1e-3);
        Ok(())
    }

    #[test]
    fn used_scenes_are_not_repeated_while_alternatives_exist() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![
                record("scene_0000", 0, ShotType::WideAngle, &[]),
                record("scene_0001", 1, ShotType::WideAngle, &[]),
            ],
        );

        let sources = load(dir.path(), &["movie"]);
        let shots = vec![
            planned(0, "north", None, ShotType::Unknown),
            planned(1, "north", None, ShotType::Unknown),
        ];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        assert_eq!(edl[0].scene_id, "scene_0000");
        // Same query again, but scene_0000 now carries the reuse penalty.
        assert_eq!(edl[1].scene_id, "scene_0001");
        Ok(())
    }

    #[test]
    fn reuse_is_soft_exclusion_when_everything_is_used() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![record("scene_0000", 0, ShotType::WideAngle, &[])],
        );

        let sources = load(dir.path(), &["movie"]);
        let shots = vec![
            planned(0, "north", None, ShotType::Unknown),
            planned(1, "north", None, ShotType::Unknown),
        ];

        let edl = assign_scenes(&shots, &sources, &mut AxisEncoder)?;
        assert_eq!(edl.len(), 2);
        assert_eq!(edl[1].scene_id, "scene_0000");
        // Lowered by exactly the reuse penalty relative to the first pick.
        assert!((edl[0].match_score - edl[1].match_score - REUSE_PENALTY).abs() < 1e-2);
        Ok(())
    }

    #[test]
    fn runs_are_deterministic_including_scores() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "a",
            vec![
                record("scene_0000", 0, ShotType::CloseUp, &["Mikael"]),
                record("scene_0001", 1, ShotType::WideAngle, &[]),
            ],
        );
        write_source(
            dir.path(),
            "b",
            vec![
                record("scene_0100", 1, ShotType::MediumShot, &[]),
                record("scene_0101", 0, ShotType::CloseUp, &[]),
            ],
        );

        let shots = vec![
            planned(0, "north", Some("Mikael"), ShotType::CloseUp),
            planned(1, "east", None, ShotType::MediumShot),
            planned(2, "elsewhere", None, ShotType::Unknown),
        ];

        let first = assign_scenes(&shots, &load(dir.path(), &["a", "b"]), &mut AxisEncoder)?;
        let second = assign_scenes(&shots, &load(dir.path(), &["a", "b"]), &mut AxisEncoder)?;
        assert_eq!(first, second);
        Ok(())
    }

    #[test]
    fn no_sources_drops_every_unit_without_failing() -> anyhow::Result<()> {
        let shots = vec![planned(0, "north", None, ShotType::Unknown)];
        let edl = assign_scenes(&shots, &[], &mut AxisEncoder)?;
        assert!(edl.is_empty());
        Ok(())
    }

    #[test]
    fn target_duration_prefers_the_planner_override() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        write_source(
            dir.path(),
            "movie",
            vec![record("scene_0000", 0, ShotType::WideAngle, &[])],
        );
        let sources = load(dir.path(), &["movie"]);

        let mut with_override = planned(0, "north", None, ShotType::Unknown);
        with_override.shot.target_duration_seconds = Some(3.5);

        let edl = assign_scenes(
            &[with_override, planned(1, "north", None, ShotType::Unknown)],
            &sources,
            &mut AxisEncoder,
        )?;

        assert_eq!(edl[0].target_duration_seconds, 3.5);
        // No override: the segment's own duration is the target.
        assert_eq!(edl[1].target_duration_seconds, 2.0);
        Ok(())
    }
}
