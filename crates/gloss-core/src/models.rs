//! Data model for the gloss annotation pipeline.
//!
//! Offsets throughout this crate are **byte offsets into UTF-8 text**. Spans
//! are half-open (`start..end`). Candidate offsets are relative to their
//! chunk; annotation offsets are absolute positions in the original document
//! text, before any noise filtering.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::defaults;

/// Embedding vector.
///
/// Thin newtype over `Vec<f32>` so backends and the ranker share one type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Vector(Vec<f32>);

impl Vector {
    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<Vec<f32>> for Vector {
    fn from(v: Vec<f32>) -> Self {
        Self(v)
    }
}

/// A half-open byte range `start..end`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> usize {
        self.end.saturating_sub(self.start)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Length of the overlap between two spans (0 when disjoint).
    pub fn intersect_len(&self, other: &Span) -> usize {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        end.saturating_sub(start)
    }
}

/// Document-level context produced by an external summarizer.
///
/// The pipeline only consumes this when present; every stage must function
/// (less precisely) without it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentContext {
    pub summary: Option<String>,
    #[serde(default)]
    pub key_concepts: Vec<String>,
}

/// A document under analysis.
///
/// The full text is immutable; derived fields (summary, key concepts) are
/// owned by the storage collaborator and arrive as [`DocumentContext`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub id: Uuid,
    pub full_text: String,
}

impl Document {
    pub fn new(full_text: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            full_text: full_text.into(),
        }
    }
}

/// A window of document text produced by the chunker.
///
/// `start_offset`/`end_offset` are positions in the *original* document
/// text, not the noise-filtered text. Chunks are immutable once created
/// except for the lazily computed embedding cache.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Chunk {
    pub id: Uuid,
    pub text: String,
    pub start_offset: usize,
    pub end_offset: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub section_title: Option<String>,
    /// Cached embedding, computed on demand by the ranker.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub embedding: Option<Vector>,
}

/// Closed category set for annotations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationCategory {
    KeyQuote,
    Argument,
    Evidence,
    Methodology,
    UserAdded,
}

impl std::fmt::Display for AnnotationCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::KeyQuote => write!(f, "key_quote"),
            Self::Argument => write!(f, "argument"),
            Self::Evidence => write!(f, "evidence"),
            Self::Methodology => write!(f, "methodology"),
            Self::UserAdded => write!(f, "user_added"),
        }
    }
}

impl std::str::FromStr for AnnotationCategory {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "key_quote" => Ok(Self::KeyQuote),
            "argument" => Ok(Self::Argument),
            "evidence" => Ok(Self::Evidence),
            "methodology" => Ok(Self::Methodology),
            "user_added" => Ok(Self::UserAdded),
            _ => Err(format!("Invalid annotation category: {}", s)),
        }
    }
}

/// An unverified span proposed by the generator.
///
/// Offsets are relative to the source chunk. Ephemeral — lives only within
/// one pipeline invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Candidate {
    pub rel_start: usize,
    pub rel_end: usize,
    pub text: String,
    pub category: AnnotationCategory,
    pub note: String,
    pub confidence: f32,
}

impl Candidate {
    pub fn span(&self) -> Span {
        Span::new(self.rel_start, self.rel_end)
    }
}

/// A candidate that has passed both verification gates.
#[derive(Debug, Clone)]
pub struct VerifiedCandidate {
    pub candidate: Candidate,
    /// Soft-gate quality score in [0, 1].
    pub quality_score: f32,
}

/// A verified candidate after note/category refinement.
///
/// Still chunk-relative; the orchestrator converts to absolute offsets.
#[derive(Debug, Clone)]
pub struct RefinedAnnotation {
    pub rel_start: usize,
    pub rel_end: usize,
    pub text: String,
    pub category: AnnotationCategory,
    pub note: String,
    pub confidence: f32,
}

impl From<VerifiedCandidate> for RefinedAnnotation {
    fn from(v: VerifiedCandidate) -> Self {
        Self {
            rel_start: v.candidate.rel_start,
            rel_end: v.candidate.rel_end,
            text: v.candidate.text,
            category: v.candidate.category,
            note: v.candidate.note,
            confidence: v.candidate.confidence,
        }
    }
}

/// A persisted, position-anchored annotation.
///
/// Created by the orchestrator and owned thereafter by the storage
/// collaborator; the pipeline never mutates one after emitting it, only
/// compares new candidates against the existing set for deduplication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub id: Uuid,
    pub absolute_start: usize,
    pub absolute_end: usize,
    pub highlighted_text: String,
    pub category: AnnotationCategory,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
    /// Only meaningful for AI-generated annotations; `None` for manual ones.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f32>,
    pub is_ai_generated: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_index: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_color: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub analysis_run_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
}

impl Annotation {
    pub fn span(&self) -> Span {
        Span::new(self.absolute_start, self.absolute_end)
    }
}

/// How many ranked chunks to analyze.
///
/// There is deliberately no `Default`: the caller supplies a level per
/// invocation and an absent value fails validation upstream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Thoroughness {
    Quick,
    Standard,
    Thorough,
    Exhaustive,
}

impl Thoroughness {
    /// Maximum number of ranked chunks admitted at this level.
    pub fn max_chunks(&self) -> usize {
        match self {
            Self::Quick => defaults::THOROUGHNESS_QUICK_MAX_CHUNKS,
            Self::Standard => defaults::THOROUGHNESS_STANDARD_MAX_CHUNKS,
            Self::Thorough => defaults::THOROUGHNESS_THOROUGH_MAX_CHUNKS,
            Self::Exhaustive => defaults::THOROUGHNESS_EXHAUSTIVE_MAX_CHUNKS,
        }
    }

    /// Minimum cosine similarity for a chunk to be admitted.
    ///
    /// Exhaustive relaxes the floor to admit low-similarity chunks and
    /// approximate full coverage.
    pub fn similarity_floor(&self) -> f32 {
        match self {
            Self::Quick => defaults::THOROUGHNESS_QUICK_FLOOR,
            Self::Standard => defaults::THOROUGHNESS_STANDARD_FLOOR,
            Self::Thorough => defaults::THOROUGHNESS_THOROUGH_FLOOR,
            Self::Exhaustive => defaults::THOROUGHNESS_EXHAUSTIVE_FLOOR,
        }
    }
}

impl std::fmt::Display for Thoroughness {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Quick => write!(f, "quick"),
            Self::Standard => write!(f, "standard"),
            Self::Thorough => write!(f, "thorough"),
            Self::Exhaustive => write!(f, "exhaustive"),
        }
    }
}

impl std::str::FromStr for Thoroughness {
    type Err = String;
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "quick" => Ok(Self::Quick),
            "standard" => Ok(Self::Standard),
            "thorough" => Ok(Self::Thorough),
            "exhaustive" => Ok(Self::Exhaustive),
            _ => Err(format!("Invalid thoroughness level: {}", s)),
        }
    }
}

/// One research prompt in a multi-prompt run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchPrompt {
    /// Free-form research intent.
    pub text: String,
    /// Highlight color identifying this prompt's annotations in the UI.
    pub color: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vector_from_vec() {
        let v = Vector::from(vec![1.0, 2.0, 3.0]);
        assert_eq!(v.len(), 3);
        assert_eq!(v.as_slice(), &[1.0, 2.0, 3.0]);
        assert!(!v.is_empty());
    }

    #[test]
    fn test_span_len_and_empty() {
        assert_eq!(Span::new(4, 15).len(), 11);
        assert!(Span::new(5, 5).is_empty());
        assert_eq!(Span::new(10, 5).len(), 0);
    }

    #[test]
    fn test_span_intersect_len() {
        let a = Span::new(0, 10);
        let b = Span::new(5, 15);
        assert_eq!(a.intersect_len(&b), 5);
        assert_eq!(b.intersect_len(&a), 5);

        let disjoint = Span::new(20, 30);
        assert_eq!(a.intersect_len(&disjoint), 0);

        // Containment
        let inner = Span::new(2, 6);
        assert_eq!(a.intersect_len(&inner), 4);
    }

    #[test]
    fn test_category_display_roundtrip() {
        let categories = [
            AnnotationCategory::KeyQuote,
            AnnotationCategory::Argument,
            AnnotationCategory::Evidence,
            AnnotationCategory::Methodology,
            AnnotationCategory::UserAdded,
        ];
        for cat in categories {
            let parsed: AnnotationCategory = cat.to_string().parse().unwrap();
            assert_eq!(parsed, cat);
        }
    }

    #[test]
    fn test_category_from_str_invalid() {
        let result = "citation".parse::<AnnotationCategory>();
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid annotation category"));
    }

    #[test]
    fn test_category_serde_snake_case() {
        let json = serde_json::to_string(&AnnotationCategory::KeyQuote).unwrap();
        assert_eq!(json, "\"key_quote\"");
        let parsed: AnnotationCategory = serde_json::from_str("\"evidence\"").unwrap();
        assert_eq!(parsed, AnnotationCategory::Evidence);
    }

    #[test]
    fn test_thoroughness_from_str() {
        assert_eq!(
            "quick".parse::<Thoroughness>().unwrap(),
            Thoroughness::Quick
        );
        assert_eq!(
            "EXHAUSTIVE".parse::<Thoroughness>().unwrap(),
            Thoroughness::Exhaustive
        );
        assert!("".parse::<Thoroughness>().is_err());
        assert!("medium".parse::<Thoroughness>().is_err());
    }

    #[test]
    fn test_thoroughness_policy_ordering() {
        // Higher thoroughness admits more chunks with a lower floor.
        let levels = [
            Thoroughness::Quick,
            Thoroughness::Standard,
            Thoroughness::Thorough,
            Thoroughness::Exhaustive,
        ];
        for pair in levels.windows(2) {
            assert!(pair[0].max_chunks() < pair[1].max_chunks());
            assert!(pair[0].similarity_floor() >= pair[1].similarity_floor());
        }
    }

    #[test]
    fn test_candidate_span() {
        let candidate = Candidate {
            rel_start: 4,
            rel_end: 15,
            text: "sky is blue".to_string(),
            category: AnnotationCategory::Evidence,
            note: "color claim".to_string(),
            confidence: 0.9,
        };
        assert_eq!(candidate.span(), Span::new(4, 15));
    }

    #[test]
    fn test_refined_from_verified() {
        let verified = VerifiedCandidate {
            candidate: Candidate {
                rel_start: 0,
                rel_end: 20,
                text: "verified span of text".to_string(),
                category: AnnotationCategory::Argument,
                note: "n".to_string(),
                confidence: 0.7,
            },
            quality_score: 0.85,
        };
        let refined = RefinedAnnotation::from(verified);
        assert_eq!(refined.rel_start, 0);
        assert_eq!(refined.rel_end, 20);
        assert_eq!(refined.category, AnnotationCategory::Argument);
    }

    #[test]
    fn test_annotation_serialization_skips_none() {
        let ann = Annotation {
            id: Uuid::new_v4(),
            absolute_start: 0,
            absolute_end: 11,
            highlighted_text: "sky is blue".to_string(),
            category: AnnotationCategory::Evidence,
            note: None,
            confidence: None,
            is_ai_generated: false,
            prompt_index: None,
            prompt_color: None,
            analysis_run_id: None,
            created_at: Utc::now(),
        };
        let json = serde_json::to_string(&ann).unwrap();
        assert!(!json.contains("confidence"));
        assert!(!json.contains("prompt_index"));
        assert!(!json.contains("analysis_run_id"));
    }
}
