//! Sentence-bounded grouping of segments into context batches.
//!
//! Batches exist so the narrative planner sees enough surrounding text to
//! reason about each segment. A batch may only close at a true sentence end:
//! the word-count target decides when a batch is *allowed* to close, never
//! that it *must*.

use serde::{Deserialize, Serialize};

use crate::segmenter::Segment;

/// A contiguous group of segments sent together for shot planning.
///
/// Batches partition the segment sequence exactly: every segment belongs to
/// exactly one batch, in order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Batch {
    pub batch_id: usize,
    pub context_text: String,
    pub segments: Vec<Segment>,
}

/// Group segments into sentence-bounded batches.
///
/// A batch closes when BOTH hold:
/// - the running whitespace-split word count has reached `target_words`
/// - the segment just appended ends a sentence (`.`, `!` or `?`, optionally
///   followed by a closing quote)
///
/// Segments left over when the input runs out form a final batch regardless of
/// how they end, so the partition is always exact.
pub fn batch_segments(segments: Vec<Segment>, target_words: usize) -> Vec<Batch> {
    let mut batches: Vec<Batch> = Vec::new();
    let mut open: Vec<Segment> = Vec::new();
    let mut word_count = 0usize;

    for segment in segments {
        word_count += segment.text.split_whitespace().count();
        let closes_sentence = ends_sentence(&segment.text);
        open.push(segment);

        if word_count >= target_words && closes_sentence {
            batches.push(close_batch(batches.len(), std::mem::take(&mut open)));
            word_count = 0;
        }
    }

    // Tail policy: whatever remains becomes the final batch.
    if !open.is_empty() {
        batches.push(close_batch(batches.len(), open));
    }

    batches
}

fn close_batch(batch_id: usize, segments: Vec<Segment>) -> Batch {
    let context_text = segments
        .iter()
        .map(|s| s.text.as_str())
        .collect::<Vec<_>>()
        .join(" ");

    Batch {
        batch_id,
        context_text,
        segments,
    }
}

/// Whether text ends a sentence: `.`, `!` or `?`, optionally followed by a
/// closing quote.
fn ends_sentence(text: &str) -> bool {
    let trimmed = text.trim_end();
    let trimmed = trimmed
        .strip_suffix(['"', '\''])
        .unwrap_or(trimmed);
    trimmed.ends_with(['.', '!', '?'])
}
