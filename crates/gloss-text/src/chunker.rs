//! Boundary-seeking document chunker.
//!
//! Splits noise-filtered text into overlapping windows, preferring to cut
//! at a paragraph break, then a sentence end, then clause punctuation, and
//! records each window's offsets in the *original* (pre-filter) text by
//! translating positions back through the removed-section list.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;
use uuid::Uuid;

use gloss_core::defaults;
use gloss_core::models::{Chunk, Span};

use crate::noise::{clean_to_original_end, clean_to_original_start};

/// Chunker tuning parameters.
#[derive(Debug, Clone)]
pub struct ChunkerConfig {
    /// Window size in bytes.
    pub size: usize,
    /// Bytes of shared context between consecutive chunks.
    pub overlap: usize,
    /// Search radius around a raw boundary for a natural break.
    pub boundary_radius: usize,
}

impl Default for ChunkerConfig {
    fn default() -> Self {
        Self {
            size: defaults::CHUNK_SIZE,
            overlap: defaults::CHUNK_OVERLAP,
            boundary_radius: defaults::CHUNK_BOUNDARY_RADIUS,
        }
    }
}

static HEADING_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(#{1,6}\s+\S|\d+(\.\d+)*\.?\s+[A-Z]|[A-Z][A-Z0-9 \-]{3,60}$)").unwrap());

/// Split cleaned text into overlapping chunks with original-text offsets.
///
/// Documents shorter than one window produce exactly one chunk spanning the
/// whole filtered text. Empty (or whitespace-only) documents produce none.
pub fn chunk_document(
    clean_text: &str,
    removed_sections: &[Span],
    config: &ChunkerConfig,
) -> Vec<Chunk> {
    if clean_text.trim().is_empty() {
        return Vec::new();
    }

    let len = clean_text.len();
    let mut chunks = Vec::new();
    let mut pos = 0usize;

    while pos < len {
        let raw_end = (pos + config.size).min(len);
        let end = if raw_end >= len {
            len
        } else {
            let sought = seek_boundary(clean_text, raw_end, config.boundary_radius);
            // A retracted boundary must still make progress past this
            // window's start.
            if sought <= pos {
                snap_to_char_boundary(clean_text, raw_end)
            } else {
                sought
            }
        };

        let text = clean_text[pos..end].to_string();
        chunks.push(Chunk {
            id: Uuid::new_v4(),
            text,
            start_offset: clean_to_original_start(pos, removed_sections),
            end_offset: clean_to_original_end(end, removed_sections),
            section_title: section_title_before(clean_text, pos),
            embedding: None,
        });

        if end >= len {
            break;
        }
        let mut next = end.saturating_sub(config.overlap);
        if next <= pos {
            next = end;
        }
        let next = snap_to_char_boundary(clean_text, next);
        // `end` is always a valid boundary past `pos`, so progress is
        // guaranteed even when snapping retreats.
        pos = if next > pos { next } else { end };
    }

    debug!(
        subsystem = "text",
        component = "chunker",
        chunk_count = chunks.len(),
        "Chunked document"
    );
    chunks
}

fn snap_to_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Find the best cut point near `target`, searching `radius` bytes either
/// side. Priority: paragraph break, sentence end, clause punctuation; raw
/// position when none is found within radius.
fn seek_boundary(text: &str, target: usize, radius: usize) -> usize {
    let lo = snap_to_char_boundary(text, target.saturating_sub(radius));
    let hi = snap_to_char_boundary(text, (target + radius).min(text.len()));
    let window = &text[lo..hi];

    if let Some(cut) = closest_match(window, lo, target, |w| paragraph_breaks(w)) {
        return cut;
    }
    if let Some(cut) = closest_match(window, lo, target, |w| sentence_breaks(w)) {
        return cut;
    }
    if let Some(cut) = closest_match(window, lo, target, |w| clause_breaks(w)) {
        return cut;
    }
    snap_to_char_boundary(text, target)
}

/// Offsets (relative to the window) just after each paragraph break.
fn paragraph_breaks(window: &str) -> Vec<usize> {
    window
        .match_indices("\n\n")
        .map(|(i, sep)| i + sep.len())
        .collect()
}

/// Offsets just after sentence-ending punctuation followed by whitespace.
fn sentence_breaks(window: &str) -> Vec<usize> {
    let bytes = window.as_bytes();
    let mut breaks = Vec::new();
    for i in 0..bytes.len().saturating_sub(1) {
        if matches!(bytes[i], b'.' | b'!' | b'?') && bytes[i + 1].is_ascii_whitespace() {
            breaks.push(i + 2);
        }
    }
    breaks
}

/// Offsets just after clause punctuation followed by whitespace.
fn clause_breaks(window: &str) -> Vec<usize> {
    let bytes = window.as_bytes();
    let mut breaks = Vec::new();
    for i in 0..bytes.len().saturating_sub(1) {
        if matches!(bytes[i], b',' | b';' | b':') && bytes[i + 1].is_ascii_whitespace() {
            breaks.push(i + 2);
        }
    }
    breaks
}

fn closest_match<F>(window: &str, window_start: usize, target: usize, finder: F) -> Option<usize>
where
    F: Fn(&str) -> Vec<usize>,
{
    finder(window)
        .into_iter()
        .map(|rel| window_start + rel)
        .min_by_key(|abs| abs.abs_diff(target))
}

/// The nearest heading-like line starting at or before `pos`, if any.
fn section_title_before(text: &str, pos: usize) -> Option<String> {
    let mut title = None;
    let mut line_start = 0;
    for line in text.split_inclusive('\n') {
        if line_start > pos {
            break;
        }
        let trimmed = line.trim();
        if !trimmed.is_empty() && trimmed.len() <= 80 && HEADING_LINE.is_match(trimmed) {
            title = Some(trimmed.trim_start_matches('#').trim().to_string());
        }
        line_start += line.len();
    }
    title
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(size: usize, overlap: usize) -> ChunkerConfig {
        ChunkerConfig {
            size,
            overlap,
            boundary_radius: 30,
        }
    }

    #[test]
    fn test_short_document_single_chunk() {
        let text = "The sky is blue.";
        let chunks = chunk_document(text, &[], &ChunkerConfig::default());
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, text);
        assert_eq!(chunks[0].start_offset, 0);
        assert_eq!(chunks[0].end_offset, text.len());
    }

    #[test]
    fn test_empty_document_no_chunks() {
        assert!(chunk_document("", &[], &ChunkerConfig::default()).is_empty());
        assert!(chunk_document("   \n\n ", &[], &ChunkerConfig::default()).is_empty());
    }

    #[test]
    fn test_chunks_overlap_and_cover() {
        let text = "word ".repeat(200); // 1000 bytes
        let cfg = config(300, 50);
        let chunks = chunk_document(&text, &[], &cfg);
        assert!(chunks.len() > 1);

        // Full coverage: first starts at 0, last ends at len.
        assert_eq!(chunks.first().unwrap().start_offset, 0);
        assert_eq!(chunks.last().unwrap().end_offset, text.len());

        // Consecutive chunks share context.
        for pair in chunks.windows(2) {
            assert!(pair[1].start_offset < pair[0].end_offset);
            assert!(pair[1].start_offset > pair[0].start_offset);
        }
    }

    #[test]
    fn test_prefers_paragraph_break() {
        let first = "a".repeat(280);
        let text = format!("{}\n\nSecond paragraph starts here and runs on for a while.", first);
        let cfg = config(300, 20);
        let chunks = chunk_document(&text, &[], &cfg);

        // The first cut lands just after the paragraph break (byte 282).
        assert_eq!(chunks[0].end_offset, 282);
        assert!(chunks[1].text.contains("Second paragraph"));
    }

    #[test]
    fn test_prefers_sentence_over_clause() {
        let text = format!(
            "{}. Then, after a pause, the argument resumes with more detail than before.",
            "b".repeat(290)
        );
        let cfg = config(300, 20);
        let chunks = chunk_document(&text, &[], &cfg);
        // Cut after ". " at byte 292, not at the comma further along.
        assert_eq!(chunks[0].end_offset, 292);
    }

    #[test]
    fn test_raw_fallback_without_punctuation() {
        let text = "c".repeat(700);
        let cfg = config(300, 50);
        let chunks = chunk_document(&text, &[], &cfg);
        assert_eq!(chunks[0].end_offset, 300);
    }

    #[test]
    fn test_offsets_translate_through_removed_sections() {
        // Original: [prose 0..100][noise 100..150][prose 150..250]
        // Clean text is 200 bytes of prose.
        let clean = "p".repeat(200);
        let removed = vec![Span::new(100, 150)];
        let cfg = config(120, 20);
        let chunks = chunk_document(&clean, &removed, &cfg);

        assert_eq!(chunks[0].start_offset, 0);
        // Clean position 120 → original 170 (after the 50-byte removal).
        assert_eq!(chunks[0].end_offset, 170);
        assert_eq!(chunks[1].start_offset, 150);
    }

    #[test]
    fn test_section_title_detection() {
        let intro = "x".repeat(260);
        let text = format!("## Methods\n{}\n\nMore prose follows the methods heading.", intro);
        let cfg = config(280, 20);
        let chunks = chunk_document(&text, &[], &cfg);
        assert_eq!(chunks[0].section_title.as_deref(), Some("Methods"));
    }

    #[test]
    fn test_chunk_text_matches_clean_slice() {
        let text = "The quick brown fox jumps over the lazy dog. ".repeat(30);
        let chunks = chunk_document(&text, &[], &config(200, 40));
        // Without removed sections, offsets index the clean text directly.
        for chunk in &chunks {
            assert_eq!(&text[chunk.start_offset..chunk.end_offset], chunk.text);
        }
    }

    #[test]
    fn test_multibyte_safety() {
        let text = "é".repeat(400); // 800 bytes, 2-byte chars
        let chunks = chunk_document(&text, &[], &config(301, 50));
        for chunk in &chunks {
            // Slicing produced valid UTF-8 strings without panicking.
            assert!(!chunk.text.is_empty());
        }
    }
}
