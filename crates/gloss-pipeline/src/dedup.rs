//! Span deduplication against accepted and pre-existing annotations.
//!
//! Overlap ratio is **overlapping length divided by the shorter of the two
//! spans**: a short span fully inside an accepted long span is the same
//! highlight for a reader, which intersection-over-union would under-count.
//! The ratio is applied uniformly in both dedup scopes.
//!
//! Two scopes exist per prompt branch:
//! - the **accepted set**, growing as the run folds in chunk results, where
//!   a strictly higher-confidence candidate supersedes what it overlaps;
//! - the **pre-existing snapshot** (prior manual + AI annotations), taken
//!   before the run starts and never mutated — overlap here always rejects
//!   the candidate.

use gloss_core::defaults;
use gloss_core::models::{Annotation, Span};

/// Dedup tuning.
#[derive(Debug, Clone)]
pub struct DedupPolicy {
    /// Overlap ratio above which two spans are the same annotation.
    pub overlap_threshold: f32,
}

impl Default for DedupPolicy {
    fn default() -> Self {
        Self {
            overlap_threshold: defaults::DEDUP_OVERLAP_THRESHOLD,
        }
    }
}

/// Outcome of judging a candidate span against the accepted set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    /// No conflicting overlap; accept the candidate.
    Insert,
    /// Candidate wins every overlap on confidence; remove these accepted
    /// indices and insert the candidate.
    Supersede(Vec<usize>),
    /// An overlapping annotation survives (higher or equal confidence —
    /// ties keep the earliest insertion).
    RejectCandidate,
}

/// Overlapping length divided by the shorter span (0.0 when disjoint or
/// either span is empty).
pub fn overlap_ratio(a: &Span, b: &Span) -> f32 {
    let shorter = a.len().min(b.len());
    if shorter == 0 {
        return 0.0;
    }
    a.intersect_len(b) as f32 / shorter as f32
}

impl DedupPolicy {
    /// Does the candidate duplicate anything in the read-only pre-existing
    /// snapshot? Pre-existing annotations are never superseded.
    pub fn duplicates_snapshot(&self, span: &Span, snapshot: &[Annotation]) -> bool {
        snapshot
            .iter()
            .any(|existing| overlap_ratio(span, &existing.span()) > self.overlap_threshold)
    }

    /// Judge a candidate against the growing accepted set.
    ///
    /// Deterministic: the candidate supersedes only when its confidence is
    /// strictly higher than every overlapping annotation's; otherwise the
    /// earliest accepted annotation survives.
    pub fn against_accepted(
        &self,
        span: &Span,
        confidence: f32,
        accepted: &[Annotation],
    ) -> DedupDecision {
        let overlapping: Vec<usize> = accepted
            .iter()
            .enumerate()
            .filter(|(_, a)| overlap_ratio(span, &a.span()) > self.overlap_threshold)
            .map(|(i, _)| i)
            .collect();

        if overlapping.is_empty() {
            return DedupDecision::Insert;
        }

        let beats_all = overlapping.iter().all(|&i| {
            // A missing confidence marks a manual annotation; it always wins.
            let existing = accepted[i].confidence.unwrap_or(f32::INFINITY);
            confidence > existing
        });

        if beats_all {
            DedupDecision::Supersede(overlapping)
        } else {
            DedupDecision::RejectCandidate
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use gloss_core::models::AnnotationCategory;
    use uuid::Uuid;

    fn annotation(start: usize, end: usize, confidence: Option<f32>) -> Annotation {
        Annotation {
            id: Uuid::new_v4(),
            absolute_start: start,
            absolute_end: end,
            highlighted_text: "x".repeat(end - start),
            category: AnnotationCategory::Evidence,
            note: None,
            confidence,
            is_ai_generated: confidence.is_some(),
            prompt_index: None,
            prompt_color: None,
            analysis_run_id: None,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_overlap_ratio_disjoint() {
        assert_eq!(overlap_ratio(&Span::new(0, 10), &Span::new(20, 30)), 0.0);
    }

    #[test]
    fn test_overlap_ratio_contained_span_is_full() {
        // A short span fully inside a longer one has ratio 1.0.
        let inner = Span::new(10, 20);
        let outer = Span::new(0, 100);
        assert!((overlap_ratio(&inner, &outer) - 1.0).abs() < f32::EPSILON);
        assert!((overlap_ratio(&outer, &inner) - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn test_overlap_ratio_partial() {
        // 5 bytes shared, shorter span 10 bytes → 0.5.
        let a = Span::new(0, 10);
        let b = Span::new(5, 20);
        assert!((overlap_ratio(&a, &b) - 0.5).abs() < f32::EPSILON);
    }

    #[test]
    fn test_overlap_ratio_empty_span() {
        assert_eq!(overlap_ratio(&Span::new(5, 5), &Span::new(0, 10)), 0.0);
    }

    #[test]
    fn test_snapshot_overlap_rejects() {
        let policy = DedupPolicy::default();
        let snapshot = vec![annotation(100, 200, None)];

        assert!(policy.duplicates_snapshot(&Span::new(120, 180), &snapshot));
        assert!(!policy.duplicates_snapshot(&Span::new(300, 400), &snapshot));
    }

    #[test]
    fn test_threshold_boundary_is_exclusive() {
        let policy = DedupPolicy::default();
        let snapshot = vec![annotation(0, 100, None)];

        // Exactly 0.5 overlap of the shorter span does not trip the (>)
        // threshold.
        assert!(!policy.duplicates_snapshot(&Span::new(50, 150), &snapshot));
        assert!(policy.duplicates_snapshot(&Span::new(40, 140), &snapshot));
    }

    #[test]
    fn test_accepted_insert_when_disjoint() {
        let policy = DedupPolicy::default();
        let accepted = vec![annotation(0, 50, Some(0.9))];
        assert_eq!(
            policy.against_accepted(&Span::new(100, 150), 0.5, &accepted),
            DedupDecision::Insert
        );
    }

    #[test]
    fn test_higher_confidence_supersedes() {
        let policy = DedupPolicy::default();
        let accepted = vec![annotation(0, 50, Some(0.6))];
        assert_eq!(
            policy.against_accepted(&Span::new(10, 45), 0.9, &accepted),
            DedupDecision::Supersede(vec![0])
        );
    }

    #[test]
    fn test_lower_confidence_rejected() {
        let policy = DedupPolicy::default();
        let accepted = vec![annotation(0, 50, Some(0.9))];
        assert_eq!(
            policy.against_accepted(&Span::new(10, 45), 0.6, &accepted),
            DedupDecision::RejectCandidate
        );
    }

    #[test]
    fn test_equal_confidence_keeps_earliest() {
        let policy = DedupPolicy::default();
        let accepted = vec![annotation(0, 50, Some(0.8))];
        assert_eq!(
            policy.against_accepted(&Span::new(10, 45), 0.8, &accepted),
            DedupDecision::RejectCandidate
        );
    }

    #[test]
    fn test_manual_annotation_never_superseded() {
        let policy = DedupPolicy::default();
        let accepted = vec![annotation(0, 50, None)];
        assert_eq!(
            policy.against_accepted(&Span::new(10, 45), 1.0, &accepted),
            DedupDecision::RejectCandidate
        );
    }

    #[test]
    fn test_supersede_requires_beating_every_overlap() {
        let policy = DedupPolicy::default();
        let accepted = vec![
            annotation(0, 40, Some(0.5)),
            annotation(40, 80, Some(0.95)),
        ];
        // Candidate overlaps both; beats the first but not the second.
        assert_eq!(
            policy.against_accepted(&Span::new(10, 70), 0.8, &accepted),
            DedupDecision::RejectCandidate
        );

        // Beating both supersedes both.
        assert_eq!(
            policy.against_accepted(&Span::new(10, 70), 0.99, &accepted),
            DedupDecision::Supersede(vec![0, 1])
        );
    }
}
