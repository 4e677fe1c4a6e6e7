//! `montage` — a narration-to-scene assignment pipeline for cut video timelines.
//!
//! This crate provides:
//! - Punctuation-aware segmentation and sentence-bounded batching of
//!   time-aligned narration
//! - A constrained greedy engine that assigns each narration unit to the
//!   best-fitting scene across indexed footage libraries
//! - Resumable ingestion and build jobs with per-stage skip logic, progress
//!   reporting and durable status records
//!
//! The expensive inference (speech-to-text, scene detection, face clustering,
//! image embedding, shot planning) lives behind collaborator traits, so the
//! library is driven the same way by production backends and test doubles.

// Crate-wide error type.
pub mod error;

// Job orchestration (most consumers should start here).
pub mod orchestrator;

// Narration processing: words → segments → batches → planned shots.
pub mod batcher;
pub mod planner;
pub mod segmenter;
pub mod shots;
pub mod transcribe;

// Footage libraries and scene assignment.
pub mod library;
pub mod matcher;
pub mod scenes;

// Source ingestion stages and their collaborator seams.
pub mod ingest;

// Workspace layout, durable job status, and artifact persistence.
pub mod artifacts;
pub mod project;
pub mod status;

// Timeline export.
pub mod export;

// Pipeline configuration.
pub mod opts;

// Logging configuration and control.
#[cfg(feature = "logging")]
pub mod logging;

pub use error::{Error, Result};
