//! Two-gate candidate verification.
//!
//! The **hard gate** is deterministic and model-free: it grounds each
//! candidate's text in its source chunk (correcting offsets before ever
//! rejecting), enforces length bounds, and rejects noise patterns. It is
//! the only thing standing between a model hallucination and a persisted
//! "exact quote" annotation.
//!
//! The **soft gate** is one batched model call per chunk that scores each
//! surviving candidate for relevance and substantiveness. A soft verdict
//! may only tighten a candidate — adjust its category or note, or reject
//! it. Offset authority belongs solely to the hard gate, so any spans or
//! offsets in the judge's response are ignored by construction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use similar::TextDiff;
use tracing::{debug, trace};

use gloss_core::models::{AnnotationCategory, Candidate, VerifiedCandidate};
use gloss_core::{defaults, CompletionRequest, Result};
use gloss_inference::schema::parse_json_array;

use crate::gate::ModelGate;
use crate::prompts;

/// Hard- and soft-gate tuning parameters.
#[derive(Debug, Clone)]
pub struct VerifierConfig {
    /// Minimum grounded text length in bytes.
    pub min_len: usize,
    /// Maximum grounded text length in bytes.
    pub max_len: usize,
    /// Minimum similarity ratio for fuzzy offset correction.
    pub fuzzy_match_threshold: f32,
    /// Soft-gate acceptance threshold on the quality score.
    pub quality_threshold: f32,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            min_len: defaults::ANNOTATION_MIN_LEN,
            max_len: defaults::ANNOTATION_MAX_LEN,
            fuzzy_match_threshold: defaults::FUZZY_MATCH_THRESHOLD,
            quality_threshold: defaults::VERIFIER_THRESHOLD,
        }
    }
}

/// Why the hard gate rejected a candidate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RejectionReason {
    /// Text not found in the chunk, even after correction attempts.
    NotGrounded,
    TooShort { len: usize },
    TooLong { len: usize },
    NoisePattern,
}

impl std::fmt::Display for RejectionReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotGrounded => write!(f, "not grounded in chunk"),
            Self::TooShort { len } => write!(f, "too short ({} bytes)", len),
            Self::TooLong { len } => write!(f, "too long ({} bytes)", len),
            Self::NoisePattern => write!(f, "matches noise pattern"),
        }
    }
}

/// Hard-gate outcome for one candidate.
#[derive(Debug, Clone)]
pub enum HardVerdict {
    /// Grounded, with corrected offsets and chunk-authoritative text.
    Pass(Candidate),
    Reject(RejectionReason),
}

static NOISE_PATTERNS: Lazy<Vec<Regex>> = Lazy::new(|| {
    vec![
        // Reference-list entry
        Regex::new(r"^\s*\[\d{1,3}\]").unwrap(),
        // DOI anywhere in the span
        Regex::new(r"10\.\d{4,9}/\S+").unwrap(),
        // Figure/table caption marker
        Regex::new(r"(?i)^\s*(figure|fig\.|table)\s+\d").unwrap(),
        // Copyright furniture
        Regex::new(r"(?i)^\s*(©|copyright\b|all rights reserved)").unwrap(),
        // Bare page number
        Regex::new(r"(?i)^\s*page\s+\d+(\s+of\s+\d+)?\s*$").unwrap(),
    ]
});

/// Deterministic grounding gate.
///
/// Always attempts to locate the candidate text in the chunk before giving
/// up: claimed offsets, exact search, whitespace-normalized search, then a
/// fuzzy window scan. A located span is snapped outward to word boundaries
/// and the text is re-sliced from the chunk — the chunk is the authority.
pub fn hard_verify(config: &VerifierConfig, candidate: &Candidate, chunk_text: &str) -> HardVerdict {
    let Some((start, end)) = locate(chunk_text, candidate, config.fuzzy_match_threshold) else {
        return HardVerdict::Reject(RejectionReason::NotGrounded);
    };

    let (start, end) = snap_to_word_boundaries(chunk_text, start, end);
    let text = chunk_text[start..end].to_string();

    let len = text.len();
    if len < config.min_len {
        return HardVerdict::Reject(RejectionReason::TooShort { len });
    }
    if len > config.max_len {
        return HardVerdict::Reject(RejectionReason::TooLong { len });
    }
    if NOISE_PATTERNS.iter().any(|p| p.is_match(&text)) {
        return HardVerdict::Reject(RejectionReason::NoisePattern);
    }

    HardVerdict::Pass(Candidate {
        rel_start: start,
        rel_end: end,
        text,
        category: candidate.category,
        note: candidate.note.clone(),
        confidence: candidate.confidence.clamp(0.0, 1.0),
    })
}

/// Find the candidate text in the chunk, correcting offsets when the claim
/// is wrong. Returns byte offsets into `chunk`.
fn locate(chunk: &str, candidate: &Candidate, fuzzy_threshold: f32) -> Option<(usize, usize)> {
    let needle = candidate.text.trim();
    if needle.is_empty() {
        return None;
    }

    // Claimed offsets, when they slice to exactly the claimed text.
    let (cs, ce) = (candidate.rel_start, candidate.rel_end);
    if cs < ce
        && ce <= chunk.len()
        && chunk.is_char_boundary(cs)
        && chunk.is_char_boundary(ce)
        && &chunk[cs..ce] == needle
    {
        return Some((cs, ce));
    }

    // Exact occurrences; pick the one closest to the claimed start so a
    // repeated phrase resolves deterministically.
    let occurrences: Vec<usize> = chunk.match_indices(needle).map(|(i, _)| i).collect();
    if let Some(best) = occurrences.into_iter().min_by_key(|i| i.abs_diff(cs)) {
        return Some((best, best + needle.len()));
    }

    if let Some(span) = normalized_find(chunk, needle) {
        return Some(span);
    }

    fuzzy_find(chunk, needle, fuzzy_threshold)
}

/// Whitespace-normalized search: collapse whitespace runs on both sides and
/// map the match back to original chunk offsets.
fn normalized_find(chunk: &str, needle: &str) -> Option<(usize, usize)> {
    let normalized_needle = needle.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalized_needle.is_empty() {
        return None;
    }

    let (normalized_chunk, map) = normalize_with_map(chunk);
    let pos = normalized_chunk.find(&normalized_needle)?;
    let norm_end = pos + normalized_needle.len();

    let start = map[pos];
    // Last mapped byte belongs to the final character; step past it.
    let last = map[norm_end - 1];
    let end = chunk[last..]
        .chars()
        .next()
        .map(|c| last + c.len_utf8())
        .unwrap_or(chunk.len());
    Some((snap_to_char_boundary(chunk, start), end))
}

/// Collapse whitespace runs to single spaces, recording for every output
/// byte the originating byte offset in the input.
fn normalize_with_map(s: &str) -> (String, Vec<usize>) {
    let mut out = String::with_capacity(s.len());
    let mut map = Vec::with_capacity(s.len());
    let mut pending_ws: Option<usize> = None;

    for (i, ch) in s.char_indices() {
        if ch.is_whitespace() {
            if pending_ws.is_none() {
                pending_ws = Some(i);
            }
        } else {
            if let Some(ws_start) = pending_ws.take() {
                if !out.is_empty() {
                    out.push(' ');
                    map.push(ws_start);
                }
            }
            out.push(ch);
            for b in 0..ch.len_utf8() {
                map.push(i + b);
            }
        }
    }
    (out, map)
}

/// Fuzzy window scan: slide a needle-sized window over the chunk and keep
/// the best similarity ratio at or above the threshold. Unrelated text
/// never reaches the threshold, so a hallucinated candidate is rejected
/// rather than corrected into an unrelated span.
fn fuzzy_find(chunk: &str, needle: &str, threshold: f32) -> Option<(usize, usize)> {
    let width = needle.len();
    if width == 0 {
        return None;
    }
    if chunk.len() <= width {
        let ratio = TextDiff::from_chars(chunk, needle).ratio();
        return (ratio >= threshold).then_some((0, chunk.len()));
    }

    let step = (width / 4).max(1);
    let mut best: Option<(f32, usize, usize)> = None;
    let mut pos = 0;
    while pos + width <= chunk.len() {
        let start = snap_to_char_boundary(chunk, pos);
        let end = snap_to_char_boundary(chunk, start + width);
        if end > start {
            let ratio = TextDiff::from_chars(&chunk[start..end], needle).ratio();
            if best.map_or(true, |(b, _, _)| ratio > b) {
                best = Some((ratio, start, end));
            }
        }
        pos += step;
    }

    best.filter(|(ratio, _, _)| *ratio >= threshold)
        .map(|(_, start, end)| (start, end))
}

fn snap_to_char_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

/// Extend a span outward so it never cuts a word in half.
fn snap_to_word_boundaries(chunk: &str, mut start: usize, mut end: usize) -> (usize, usize) {
    start = snap_to_char_boundary(chunk, start);
    end = snap_to_char_boundary(chunk, end);

    while start > 0 {
        let prev = chunk[..start].chars().next_back();
        let cur = chunk[start..].chars().next();
        match (prev, cur) {
            (Some(p), Some(c)) if p.is_alphanumeric() && c.is_alphanumeric() => {
                start -= p.len_utf8();
            }
            _ => break,
        }
    }
    while end < chunk.len() {
        let prev = chunk[..end].chars().next_back();
        let next = chunk[end..].chars().next();
        match (prev, next) {
            (Some(p), Some(n)) if p.is_alphanumeric() && n.is_alphanumeric() => {
                end += n.len_utf8();
            }
            _ => break,
        }
    }
    (start, end)
}

/// Wire shape of one soft-gate verdict element.
#[derive(Debug, Deserialize)]
struct VerdictWire {
    index: usize,
    score: f32,
    #[serde(default)]
    category: Option<String>,
    #[serde(default)]
    note: Option<String>,
}

/// Model-judged quality gate over a chunk's hard-verified candidates.
///
/// One batched request covers all candidates. A candidate omitted from a
/// parseable response is rejected — the gate is a filter, and silence is
/// not approval. An unparseable response is a schema error the caller
/// records as a chunk failure.
pub(crate) async fn soft_verify(
    gate: &ModelGate,
    config: &VerifierConfig,
    temperature: f32,
    intent: &str,
    candidates: Vec<Candidate>,
) -> Result<Vec<VerifiedCandidate>> {
    if candidates.is_empty() {
        return Ok(Vec::new());
    }

    let request = CompletionRequest::new(
        prompts::verifier_system(),
        prompts::verifier_prompt(intent, &candidates),
    )
    .with_temperature(temperature)
    .json();

    let response = gate.complete(&request).await?;
    let (verdicts, _dropped): (Vec<VerdictWire>, usize) = parse_json_array(&response)?;

    let mut by_index: std::collections::HashMap<usize, VerdictWire> = std::collections::HashMap::new();
    for verdict in verdicts {
        by_index.entry(verdict.index).or_insert(verdict);
    }

    let total = candidates.len();
    let mut accepted = Vec::new();
    for (index, mut candidate) in candidates.into_iter().enumerate() {
        let Some(verdict) = by_index.get(&index) else {
            trace!(index, "Candidate missing from verifier response, rejected");
            continue;
        };
        let score = verdict.score.clamp(0.0, 1.0);
        if score < config.quality_threshold {
            trace!(index, score, "Candidate below quality threshold");
            continue;
        }

        // Tighten-only adjustments: category and note, never offsets.
        if let Some(category) = verdict
            .category
            .as_deref()
            .and_then(|c| c.parse::<AnnotationCategory>().ok())
        {
            candidate.category = category;
        }
        if let Some(note) = verdict.note.as_deref().filter(|n| !n.trim().is_empty()) {
            candidate.note = note.to_string();
        }

        accepted.push(VerifiedCandidate {
            candidate,
            quality_score: score,
        });
    }

    debug!(
        subsystem = "pipeline",
        component = "soft_gate",
        candidate_count = total,
        accepted = accepted.len(),
        "Soft verification complete"
    );
    Ok(accepted)
}
