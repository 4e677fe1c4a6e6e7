//! The speech-to-text seam.
//!
//! Montage never runs ASR inference itself; a `Transcriber` implementation
//! (Whisper, a hosted API, a test double) hands us time-aligned words and the
//! segmenter takes it from there.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single word with the timestamps reported by the transcriber.
///
/// Words are immutable once ingested; the segmenter reads them but never
/// rewrites their times.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start_seconds: f32,
    pub end_seconds: f32,
}

impl Word {
    pub fn new(text: impl Into<String>, start_seconds: f32, end_seconds: f32) -> Self {
        Self {
            text: text.into(),
            start_seconds,
            end_seconds,
        }
    }
}

/// Pluggable speech-to-text collaborator.
///
/// Implementations may group words into sentences however they like; the
/// segmenter re-segments from the flat word sequence regardless.
pub trait Transcriber {
    fn transcribe(&mut self, audio_path: &Path) -> Result<Vec<Word>>;
}
