//! Loading an indexed source into a query-ready, in-memory form.
//!
//! Responsibilities:
//! - Read a source's master index (either on-disk shape) and its per-scene
//!   embedding map.
//! - L2-normalize every vector and lay them out as one row-per-scene matrix
//!   so a query reduces to dot products.
//! - Serve repeated loads of the same alias from a per-catalog cache.
//!
//! A `SourceCatalog` is constructed at the start of a matching run and dropped
//! with it; the cache never outlives the run.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::artifacts::read_json;
use crate::error::{Error, Result};
use crate::scenes::{IndexShape, MASTER_INDEX_FILE, SceneRecord};
use crate::shots::ShotType;

/// Name of the per-scene embedding map inside a source directory.
pub const EMBEDDINGS_FILE: &str = "embeddings.json";

/// Added to vector norms before dividing, so a zero vector stays finite.
const NORM_EPSILON: f32 = 1e-8;

/// One queryable scene of a loaded source.
#[derive(Debug, Clone, PartialEq)]
pub struct Scene {
    pub id: String,
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub shot_type: ShotType,
    pub characters: Vec<String>,

    /// Representative keyframe, relative to the source directory.
    pub keyframe: String,
}

impl Scene {
    fn from_record(record: SceneRecord) -> Self {
        Self {
            id: record.id,
            start_seconds: record.time.start,
            end_seconds: record.time.end,
            shot_type: record.visual.shot_type,
            characters: record.content.characters,
            keyframe: record.visual.path,
        }
    }
}

/// One ingested source, loaded and ready to query.
///
/// `scenes` holds only scenes with a stored vector; `matrix` row `i` is the
/// L2-normalized embedding of `scenes[i]`. A source with zero queryable scenes
/// is valid; it simply contributes no candidates.
#[derive(Debug, Clone)]
pub struct Source {
    pub alias: String,
    pub movie_name: Option<String>,
    pub video_path: Option<PathBuf>,
    scenes: Vec<Scene>,
    matrix: Vec<Vec<f32>>,
}

impl Source {
    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn is_empty(&self) -> bool {
        self.scenes.is_empty()
    }

    /// Dot product of a (normalized) query against every scene row.
    ///
    /// Rows are normalized at load time, so with a normalized query this is
    /// cosine similarity.
    pub fn similarities(&self, query: &[f32]) -> Vec<f32> {
        self.matrix
            .iter()
            .map(|row| {
                row.iter()
                    .zip(query)
                    .map(|(a, b)| a * b)
                    .sum()
            })
            .collect()
    }

    fn from_parts(
        alias: &str,
        movie_name: Option<String>,
        video_path: Option<String>,
        records: Vec<SceneRecord>,
        mut vectors: BTreeMap<String, Vec<f32>>,
    ) -> Self {
        let mut scenes = Vec::with_capacity(records.len());
        let mut matrix = Vec::with_capacity(records.len());

        // Keep the index's scene order; the matrix rows stay in lockstep.
        for record in records {
            match vectors.remove(&record.id) {
                Some(mut vector) => {
                    l2_normalize(&mut vector);
                    matrix.push(vector);
                    scenes.push(Scene::from_record(record));
                }
                None => {
                    warn!(
                        alias,
                        scene_id = %record.id,
                        "scene has no stored vector; dropping it from the queryable set"
                    );
                }
            }
        }

        Self {
            alias: alias.to_string(),
            movie_name,
            video_path: video_path.map(PathBuf::from),
            scenes,
            matrix,
        }
    }
}

/// Scale a vector to unit length (plus epsilon, so zero vectors stay finite).
pub fn l2_normalize(vector: &mut [f32]) {
    let norm = vector.iter().map(|v| v * v).sum::<f32>().sqrt() + NORM_EPSILON;
    for v in vector.iter_mut() {
        *v /= norm;
    }
}

/// Loads sources from a library directory, once per alias.
///
/// The cache is scoped to the catalog: construct a fresh catalog per matching
/// run to pick up re-ingested sources.
pub struct SourceCatalog {
    library_root: PathBuf,
    cache: HashMap<String, Arc<Source>>,
}

impl SourceCatalog {
    pub fn new(library_root: impl Into<PathBuf>) -> Self {
        Self {
            library_root: library_root.into(),
            cache: HashMap::new(),
        }
    }

    /// Load a source by alias, reusing the in-memory copy on repeat calls.
    ///
    /// Fails with [`Error::MissingIndex`] when the source directory lacks a
    /// master index or an embedding map.
    pub fn load(&mut self, alias: &str) -> Result<Arc<Source>> {
        if let Some(source) = self.cache.get(alias) {
            return Ok(Arc::clone(source));
        }

        let source = Arc::new(self.load_from_disk(alias)?);
        self.cache.insert(alias.to_string(), Arc::clone(&source));
        Ok(source)
    }

    fn load_from_disk(&self, alias: &str) -> Result<Source> {
        let source_dir = self.library_root.join(alias);

        let index = read_index(alias, &source_dir.join(MASTER_INDEX_FILE))?;
        let vectors: BTreeMap<String, Vec<f32>> =
            read_vectors(alias, &source_dir.join(EMBEDDINGS_FILE))?;

        let source = Source::from_parts(
            alias,
            index.movie_name,
            index.source_video_path,
            index.scenes,
            vectors,
        );

        debug!(
            alias,
            queryable_scenes = source.scenes.len(),
            "source loaded"
        );
        Ok(source)
    }
}

fn read_index(alias: &str, path: &Path) -> Result<crate::scenes::MasterIndex> {
    match read_json::<IndexShape>(path) {
        Ok(shape) => Ok(shape.normalize()),
        Err(Error::MissingInput(_)) => Err(Error::MissingIndex {
            alias: alias.to_string(),
            reason: format!("{} not found", path.display()),
        }),
        Err(err) => Err(err),
    }
}

fn read_vectors(alias: &str, path: &Path) -> Result<BTreeMap<String, Vec<f32>>> {
    match read_json(path) {
        Ok(vectors) => Ok(vectors),
        Err(Error::MissingInput(_)) => Err(Error::MissingIndex {
            alias: alias.to_string(),
            reason: format!("{} not found", path.display()),
        }),
        Err(err) => Err(err),
    }
}
