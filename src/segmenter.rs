//! Punctuation-aware segmentation of timestamped narration words.
//!
//! Responsibilities:
//! - Fold the transcriber's flat word sequence into clause-sized segments.
//! - Guarantee the segment chain is gapless: every segment starts exactly
//!   where the previous one ended, and the chain spans the full narration.
//!
//! The close rule is deliberately literal: a buffer closes when the word just
//! appended ends in a clause mark AND the buffer already holds at least three
//! words, or when the word is the last one overall. Word-count alone never
//! closes a buffer, and neither does punctuation on a too-short buffer.

use serde::{Deserialize, Serialize};

use crate::transcribe::Word;

/// Punctuation that may end a clause-sized segment.
const CLAUSE_MARKS: [char; 7] = ['.', ',', '!', '?', ';', ':', '-'];

/// Minimum words a buffer must hold before punctuation may close it.
const MIN_WORDS_PER_SEGMENT: usize = 3;

/// A gapless span of narration text.
///
/// Invariants across the output of [`segment_words`]:
/// - `segments[i].end_seconds == segments[i + 1].start_seconds`
/// - the first segment starts at 0.0 (the narration's start)
/// - `segment_id` is sequential and globally unique across the narration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub segment_id: usize,
    pub start_seconds: f32,
    pub end_seconds: f32,
    pub duration_seconds: f32,
    pub text: String,
}

/// Convert a flat sequence of timestamped words into gapless segments.
///
/// Gapless rule: a closed segment ends at the *next* word's start time, not at
/// its own last word's end time, so silence between words is attributed to the
/// segment that precedes it. Only the final segment of the narration ends at
/// its own last word's end time.
pub fn segment_words(words: &[Word]) -> Vec<Segment> {
    let Some(last_index) = words.len().checked_sub(1) else {
        return Vec::new();
    };

    let mut segments: Vec<Segment> = Vec::new();
    let mut buffer: Vec<&Word> = Vec::new();
    let mut segment_start = 0.0f32;

    for (i, word) in words.iter().enumerate() {
        buffer.push(word);

        let closes_clause = ends_with_clause_mark(&word.text);
        let enough_words = buffer.len() >= MIN_WORDS_PER_SEGMENT;
        let is_last = i == last_index;

        if (closes_clause && enough_words) || is_last {
            let segment_end = if is_last {
                word.end_seconds
            } else {
                words[i + 1].start_seconds
            };

            segments.push(close_buffer(segments.len(), segment_start, segment_end, &buffer));
            segment_start = segment_end;
            buffer.clear();
        }
    }

    // Leftover words can only appear if the close rule above regresses; flush
    // them with the last buffered word's own end time.
    if let Some(last_word) = buffer.last() {
        let segment_end = last_word.end_seconds;
        segments.push(close_buffer(segments.len(), segment_start, segment_end, &buffer));
    }

    segments
}

fn close_buffer(segment_id: usize, start: f32, end: f32, buffer: &[&Word]) -> Segment {
    let text = buffer
        .iter()
        .map(|w| w.text.trim())
        .collect::<Vec<_>>()
        .join(" ");

    Segment {
        segment_id,
        start_seconds: start,
        end_seconds: end,
        duration_seconds: end - start,
        text,
    }
}

fn ends_with_clause_mark(text: &str) -> bool {
    text.trim()
        .chars()
        .next_back()
        .is_some_and(|c| CLAUSE_MARKS.contains(&c))
}
