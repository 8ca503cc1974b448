//! Noise filtering for raw document text.
//!
//! Strips reference lists, footnote clusters, DOIs, and copyright/page
//! furniture before chunking, recording every removed byte range in
//! original coordinates so downstream offsets can be translated back.
//!
//! Detection is line-oriented and only ever removes whole, well-bounded
//! blocks. When detection is ambiguous the filter under-removes: leaving
//! noise in is recoverable (the generator and hard gate both screen for
//! it), while over-removal silently destroys the ground-truth text the
//! hard verifier depends on.

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::debug;

use gloss_core::defaults;
use gloss_core::models::Span;

/// Result of noise filtering.
#[derive(Debug, Clone)]
pub struct NoiseFilterResult {
    /// Original text with removed sections spliced out.
    pub clean_text: String,
    /// Removed byte ranges in original coordinates, sorted and disjoint.
    pub removed_sections: Vec<Span>,
}

static DOI_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)^\s*(doi\s*:|https?://(dx\.)?doi\.org/|10\.\d{4,9}/\S+)").unwrap()
});

static COPYRIGHT_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(©|\(c\)\s|copyright\b|all rights reserved)").unwrap());

static PAGE_NUMBER_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(page\s+)?\d{1,4}(\s+of\s+\d{1,4})?\s*$").unwrap());

static FOOTNOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(\[?\d{1,3}\]?[.):]\s|\d{1,3}\s+\S|[*†‡§¶]\s*)").unwrap());

static REFERENCES_HEADING: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)^\s*#{0,4}\s*(\d+(\.\d+)*\.?\s+)?(references|bibliography|works cited|literature cited)\s*[:.]?\s*$",
    )
    .unwrap()
});

static CITATION_LIKE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)(^\s*\[\d{1,3}\]|^\s*\d{1,3}\.\s|\((19|20)\d{2}\)|,\s*(19|20)\d{2}\b|et al\.|\bvol\.\s*\d|\bpp?\.\s*\d|10\.\d{4,9}/)").unwrap()
});

/// One line of the original text with its byte range.
struct Line<'a> {
    text: &'a str,
    /// Range including the trailing newline, when present.
    start: usize,
    end: usize,
}

fn split_lines(text: &str) -> Vec<Line<'_>> {
    let mut lines = Vec::new();
    let mut start = 0;
    let bytes = text.as_bytes();
    for (i, b) in bytes.iter().enumerate() {
        if *b == b'\n' {
            lines.push(Line {
                text: text[start..i].trim_end_matches('\r'),
                start,
                end: i + 1,
            });
            start = i + 1;
        }
    }
    if start < text.len() {
        lines.push(Line {
            text: &text[start..],
            start,
            end: text.len(),
        });
    }
    lines
}

/// Strip boilerplate noise from raw document text.
///
/// Removal passes, in order of specificity:
/// 1. single DOI / copyright / page-number lines,
/// 2. footnote clusters (runs of short marker-prefixed lines),
/// 3. a trailing references/bibliography section.
///
/// All passes detect on the original text; overlapping ranges are merged
/// before the clean text is assembled.
pub fn filter_noise(text: &str) -> NoiseFilterResult {
    let lines = split_lines(text);
    let mut removed: Vec<Span> = Vec::new();

    // Pass 1: single boilerplate lines.
    for line in &lines {
        let trimmed = line.text.trim();
        if trimmed.is_empty() {
            continue;
        }
        if DOI_LINE.is_match(trimmed)
            || COPYRIGHT_LINE.is_match(trimmed)
            || PAGE_NUMBER_LINE.is_match(trimmed)
        {
            removed.push(Span::new(line.start, line.end));
        }
    }

    // Pass 2: footnote clusters.
    let mut run_start: Option<usize> = None;
    let mut run_len = 0usize;
    let mut flush = |run_start: &mut Option<usize>, run_len: &mut usize, end_idx: usize,
                     removed: &mut Vec<Span>, lines: &[Line<'_>]| {
        if let Some(first) = run_start.take() {
            if *run_len >= defaults::FOOTNOTE_CLUSTER_MIN_LINES {
                removed.push(Span::new(lines[first].start, lines[end_idx - 1].end));
            }
        }
        *run_len = 0;
    };
    for (idx, line) in lines.iter().enumerate() {
        let trimmed = line.text.trim_end();
        let is_footnote = !trimmed.trim().is_empty()
            && trimmed.len() <= defaults::FOOTNOTE_LINE_MAX_LEN
            && FOOTNOTE_MARKER.is_match(trimmed);
        if is_footnote {
            if run_start.is_none() {
                run_start = Some(idx);
            }
            run_len += 1;
        } else {
            flush(&mut run_start, &mut run_len, idx, &mut removed, &lines);
        }
    }
    flush(&mut run_start, &mut run_len, lines.len(), &mut removed, &lines);

    // Pass 3: trailing references section. The heading must be followed by
    // citation-dense lines all the way to the end; a heading followed by
    // running prose fails the density check and the section survives.
    if let Some(heading_idx) = lines
        .iter()
        .rposition(|l| REFERENCES_HEADING.is_match(l.text))
    {
        let heading_start = lines[heading_idx].start;
        let after: Vec<&Line<'_>> = lines[heading_idx + 1..]
            .iter()
            .filter(|l| !l.text.trim().is_empty())
            .collect();
        if !after.is_empty() {
            let citation_like = after
                .iter()
                .filter(|l| CITATION_LIKE.is_match(l.text))
                .count();
            let density = citation_like as f32 / after.len() as f32;
            if density >= defaults::REFERENCES_DENSITY_THRESHOLD {
                debug!(
                    subsystem = "text",
                    component = "noise_filter",
                    removed_bytes = text.len() - heading_start,
                    density,
                    "Removing trailing references section"
                );
                removed.push(Span::new(heading_start, text.len()));
            }
        }
    }

    let removed = merge_spans(removed);
    let clean_text = splice_out(text, &removed);

    NoiseFilterResult {
        clean_text,
        removed_sections: removed,
    }
}

/// Sort and merge overlapping/adjacent removal ranges.
fn merge_spans(mut spans: Vec<Span>) -> Vec<Span> {
    spans.sort_by_key(|s| (s.start, s.end));
    let mut merged: Vec<Span> = Vec::with_capacity(spans.len());
    for span in spans {
        if span.is_empty() {
            continue;
        }
        match merged.last_mut() {
            Some(last) if span.start <= last.end => {
                last.end = last.end.max(span.end);
            }
            _ => merged.push(span),
        }
    }
    merged
}

fn splice_out(text: &str, removed: &[Span]) -> String {
    let mut clean = String::with_capacity(text.len());
    let mut pos = 0;
    for span in removed {
        clean.push_str(&text[pos..span.start]);
        pos = span.end;
    }
    clean.push_str(&text[pos..]);
    clean
}

/// Translate a clean-text position to original coordinates, for a span
/// **start**: a removed block sitting exactly at the position pushes the
/// start past itself.
pub fn clean_to_original_start(pos: usize, removed: &[Span]) -> usize {
    let mut orig = pos;
    for span in removed {
        if span.start <= orig {
            orig += span.len();
        } else {
            break;
        }
    }
    orig
}

/// Translate a clean-text position to original coordinates, for an
/// **exclusive end**: a removed block starting exactly at the position
/// stays outside the span.
pub fn clean_to_original_end(pos: usize, removed: &[Span]) -> usize {
    let mut orig = pos;
    for span in removed {
        if span.start < orig {
            orig += span.len();
        } else {
            break;
        }
    }
    orig
}
