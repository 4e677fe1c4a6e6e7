//! Master index assembly: the last ingestion stage.
//!
//! Joins the detected scenes with their framing labels, face clusters and
//! identified character names into the single `master_index.json` the matcher
//! loads. Character identification is the one external call here and its
//! result is cached to disk, so it runs once per source ever.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::{info, warn};

use crate::artifacts::{read_json, write_json};
use crate::error::{Error, Result};
use crate::ingest::{
    CharacterCandidate, CharacterIdentifier, DetectedScene, FaceClusters, KEYFRAMES_DIR,
    VisualIndex,
};
use crate::scenes::{
    MASTER_INDEX_FILE, MasterIndex, SceneContent, SceneRecord, SceneTime, SceneVisual,
};
use crate::shots::ShotType;

/// Cached person id → character name map.
pub const CHARACTER_MAP_FILE: &str = "character_map.json";

/// Rank anonymous persons by how many scenes they appear in.
///
/// Ties order by person id so the candidate list is stable across runs.
pub fn top_characters(
    source_dir: &Path,
    clusters: &FaceClusters,
    limit: usize,
) -> Vec<CharacterCandidate> {
    let mut appearances: BTreeMap<&str, usize> = BTreeMap::new();
    for persons in clusters.scene_persons.values() {
        for person_id in persons {
            *appearances.entry(person_id.as_str()).or_default() += 1;
        }
    }

    let mut ranked: Vec<(&str, usize)> = appearances.into_iter().collect();
    ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    ranked
        .into_iter()
        .take(limit)
        .filter_map(|(person_id, appearances)| {
            let representative = clusters.representatives.get(person_id)?;
            Some(CharacterCandidate {
                person_id: person_id.to_string(),
                image_path: source_dir.join(KEYFRAMES_DIR).join(&representative.path),
                appearances,
            })
        })
        .collect()
}

/// Name the most frequent persons, caching the result on disk.
///
/// Identification failure is not fatal: the index is still built, just with
/// nobody named. Nothing is cached in that case, so a later run retries.
pub fn identify_characters(
    source_dir: &Path,
    movie_name: &str,
    clusters: &FaceClusters,
    limit: usize,
    identifier: &mut dyn CharacterIdentifier,
) -> BTreeMap<String, String> {
    let cache_path = source_dir.join(CHARACTER_MAP_FILE);
    if let Ok(cached) = read_json::<BTreeMap<String, String>>(&cache_path) {
        info!("character map already exists; skipping identification");
        return cached;
    }

    let candidates = top_characters(source_dir, clusters, limit);
    if candidates.is_empty() {
        return BTreeMap::new();
    }

    match identifier.identify(movie_name, &candidates) {
        Ok(map) => {
            if let Err(err) = write_json(&cache_path, &map) {
                warn!(error = %err, "failed to cache character map");
            }
            info!(named = map.len(), "characters identified");
            map
        }
        Err(err) => {
            warn!(error = %err, "character identification failed; continuing unnamed");
            BTreeMap::new()
        }
    }
}

/// Assemble and persist the master index for a source.
pub fn build_master_index(
    source_dir: &Path,
    movie_name: &str,
    video_path: &Path,
    scenes: &[DetectedScene],
    visual: &VisualIndex,
    clusters: &FaceClusters,
    character_map: &BTreeMap<String, String>,
) -> Result<MasterIndex> {
    if scenes.is_empty() {
        return Err(Error::missing_input(format!(
            "no scene data for {}",
            source_dir.display()
        )));
    }

    let records: Vec<SceneRecord> = scenes
        .iter()
        .map(|scene| {
            let raw_ids = clusters
                .scene_persons
                .get(&scene.scene_id)
                .cloned()
                .unwrap_or_default();

            // Names the identifier could not resolve stay anonymous.
            let characters: Vec<String> = raw_ids
                .iter()
                .filter_map(|person_id| character_map.get(person_id))
                .filter(|name| *name != "Unknown")
                .cloned()
                .collect();

            SceneRecord {
                id: scene.scene_id.clone(),
                time: SceneTime {
                    start: scene.start_seconds,
                    end: scene.end_seconds,
                },
                visual: SceneVisual {
                    shot_type: visual
                        .shot_types
                        .get(&scene.scene_id)
                        .copied()
                        .unwrap_or(ShotType::Unknown),
                    // The middle keyframe is the most representative sample.
                    path: scene.keyframes.get(1).cloned().unwrap_or_default(),
                },
                content: SceneContent {
                    characters,
                    raw_ids,
                },
            }
        })
        .collect();

    let index = MasterIndex {
        movie_name: Some(movie_name.to_string()),
        source_video_path: Some(video_path.to_string_lossy().into_owned()),
        scenes: records,
    };

    write_json(&source_dir.join(MASTER_INDEX_FILE), &index)?;
    info!(scenes = index.scenes.len(), "master index saved");
    Ok(index)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ingest::FaceRepresentative;

    fn clusters() -> FaceClusters {
        let mut clusters = FaceClusters::default();
        clusters.scene_persons.insert(
            "scene_0000".to_string(),
            vec!["person_0".to_string(), "person_1".to_string()],
        );
        clusters
            .scene_persons
            .insert("scene_0001".to_string(), vec!["person_0".to_string()]);
        for person in ["person_0", "person_1"] {
            clusters.representatives.insert(
                person.to_string(),
                FaceRepresentative {
                    path: format!("{person}.jpg"),
                    score: 0.9,
                },
            );
        }
        clusters
    }

    fn scene(id: &str, keyframes: &[&str]) -> DetectedScene {
        DetectedScene {
            scene_id: id.to_string(),
            start_seconds: 0.0,
            end_seconds: 4.0,
            keyframes: keyframes.iter().map(|k| k.to_string()).collect(),
        }
    }

    struct MapIdentifier {
        calls: usize,
        map: BTreeMap<String, String>,
    }

    impl CharacterIdentifier for MapIdentifier {
        fn identify(
            &mut self,
            _movie_name: &str,
            _candidates: &[CharacterCandidate],
        ) -> Result<BTreeMap<String, String>> {
            self.calls += 1;
            Ok(self.map.clone())
        }
    }

    #[test]
    fn top_characters_rank_by_appearances() {
        let dir = tempfile::tempdir().expect("tempdir");
        let ranked = top_characters(dir.path(), &clusters(), 10);

        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].person_id, "person_0");
        assert_eq!(ranked[0].appearances, 2);
        assert_eq!(ranked[1].person_id, "person_1");
    }

    #[test]
    fn identification_result_is_cached_to_disk() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let mut identifier = MapIdentifier {
            calls: 0,
            map: [("person_0".to_string(), "Mikael".to_string())].into(),
        };

        let first = identify_characters(dir.path(), "Dragon Tattoo", &clusters(), 15, &mut identifier);
        let second = identify_characters(dir.path(), "Dragon Tattoo", &clusters(), 15, &mut identifier);

        assert_eq!(identifier.calls, 1);
        assert_eq!(first, second);
        assert_eq!(first.get("person_0").map(String::as_str), Some("Mikael"));
        Ok(())
    }

    #[test]
    fn identification_failure_leaves_scenes_unnamed() {
        struct FailingIdentifier;
        impl CharacterIdentifier for FailingIdentifier {
            fn identify(
                &mut self,
                _movie_name: &str,
                _candidates: &[CharacterCandidate],
            ) -> Result<BTreeMap<String, String>> {
                Err(Error::ExternalService("quota exhausted".to_string()))
            }
        }

        let dir = tempfile::tempdir().expect("tempdir");
        let map = identify_characters(dir.path(), "Heat", &clusters(), 15, &mut FailingIdentifier);
        assert!(map.is_empty());
        assert!(!dir.path().join(CHARACTER_MAP_FILE).exists());
    }

    #[test]
    fn master_index_joins_names_and_filters_unknowns() -> anyhow::Result<()> {
        let dir = tempfile::tempdir()?;
        let character_map: BTreeMap<String, String> = [
            ("person_0".to_string(), "Mikael".to_string()),
            ("person_1".to_string(), "Unknown".to_string()),
        ]
        .into();

        let scenes = vec![
            scene("scene_0000", &["a.jpg", "b.jpg", "c.jpg"]),
            scene("scene_0001", &[]),
        ];
        let mut visual = VisualIndex::default();
        visual
            .shot_types
            .insert("scene_0000".to_string(), ShotType::CloseUp);

        let index = build_master_index(
            dir.path(),
            "Dragon Tattoo",
            Path::new("/media/tattoo.mkv"),
            &scenes,
            &visual,
            &clusters(),
            &character_map,
        )?;

        assert_eq!(index.scenes[0].content.characters, vec!["Mikael"]);
        assert_eq!(index.scenes[0].visual.path, "b.jpg");
        assert_eq!(index.scenes[0].visual.shot_type, ShotType::CloseUp);
        // No label recorded for scene_0001.
        assert_eq!(index.scenes[1].visual.shot_type, ShotType::Unknown);
        assert_eq!(index.scenes[1].visual.path, "");

        // The index is on disk in the current shape.
        let reread: crate::scenes::IndexShape =
            read_json(&dir.path().join(MASTER_INDEX_FILE))?;
        assert_eq!(reread.normalize().scenes.len(), 2);
        Ok(())
    }

    #[test]
    fn empty_scene_list_is_a_missing_input() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = build_master_index(
            dir.path(),
            "Heat",
            Path::new("/media/heat.mkv"),
            &[],
            &VisualIndex::default(),
            &FaceClusters::default(),
            &BTreeMap::new(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::MissingInput(_)));
    }
}
