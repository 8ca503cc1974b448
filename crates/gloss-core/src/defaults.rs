//! Centralized default constants for the gloss pipeline.
//!
//! **This module is the single source of truth** for all shared default
//! values. Crates reference these constants instead of defining their own
//! magic numbers.
//!
//! Organized by domain area. When adding new constants, place them in the
//! appropriate section and document the rationale for the chosen value.

// =============================================================================
// CHUNKING
// =============================================================================

/// Maximum characters per chunk for text splitting.
pub const CHUNK_SIZE: usize = 1000;

/// Overlap characters between adjacent chunks for context preservation.
pub const CHUNK_OVERLAP: usize = 100;

/// How far (in bytes) the chunker searches around a raw window boundary for
/// a paragraph/sentence/clause break before falling back to the raw cut.
pub const CHUNK_BOUNDARY_RADIUS: usize = 120;

// =============================================================================
// EMBEDDING
// =============================================================================

/// Default embedding model name (Ollama).
pub const EMBED_MODEL: &str = "nomic-embed-text";

/// Default embedding vector dimension for nomic-embed-text.
pub const EMBED_DIMENSION: usize = 768;

// =============================================================================
// INFERENCE
// =============================================================================

/// Default Ollama base URL.
pub const OLLAMA_URL: &str = "http://127.0.0.1:11434";

/// Default generation model name (Ollama).
pub const GEN_MODEL: &str = "gpt-oss:20b";

/// Timeout for embedding requests in seconds.
pub const EMBED_TIMEOUT_SECS: u64 = 30;

/// Timeout for generation requests in seconds.
pub const GEN_TIMEOUT_SECS: u64 = 120;

/// Generator temperature. High — the generator is a noisy proposer and
/// correctness is enforced downstream.
pub const GENERATOR_TEMPERATURE: f32 = 0.8;

/// Soft-verifier temperature. Near-zero for reproducible judgments.
pub const VERIFIER_TEMPERATURE: f32 = 0.0;

/// Refiner temperature.
pub const REFINER_TEMPERATURE: f32 = 0.4;

// =============================================================================
// ANNOTATION PIPELINE
// =============================================================================

/// Maximum candidates the generator may propose per chunk.
pub const MAX_CANDIDATES_PER_CHUNK: usize = 3;

/// Minimum annotation text length in bytes.
pub const ANNOTATION_MIN_LEN: usize = 15;

/// Maximum annotation text length in bytes.
pub const ANNOTATION_MAX_LEN: usize = 600;

/// Soft-gate acceptance threshold on the model-judged quality score.
pub const VERIFIER_THRESHOLD: f32 = 0.7;

/// Minimum similarity ratio for fuzzy grounding correction in the hard gate.
pub const FUZZY_MATCH_THRESHOLD: f32 = 0.85;

/// Overlap ratio (intersection over shorter span) above which two spans are
/// the same annotation.
pub const DEDUP_OVERLAP_THRESHOLD: f32 = 0.5;

/// Batches this small skip refinement — the extra model call is not worth it.
pub const REFINE_MIN_BATCH: usize = 3;

/// Chunks processed concurrently within one orchestrator batch. Batches are
/// sequential so deduplication outcomes are reproducible.
pub const PIPELINE_CONCURRENCY: usize = 5;

/// Global cap on simultaneous outbound model calls, enforced across the
/// whole run (all prompts), not per prompt.
pub const MODEL_CALL_CAP: usize = 5;

/// Maximum prompts per multi-prompt run. Requests above this are rejected,
/// never silently truncated.
pub const MAX_CONCURRENT_PROMPTS: usize = 8;

// =============================================================================
// THOROUGHNESS POLICY
// =============================================================================

/// Quick: a handful of the best chunks.
pub const THOROUGHNESS_QUICK_MAX_CHUNKS: usize = 8;
pub const THOROUGHNESS_QUICK_FLOOR: f32 = 0.35;

/// Standard: the default working set.
pub const THOROUGHNESS_STANDARD_MAX_CHUNKS: usize = 20;
pub const THOROUGHNESS_STANDARD_FLOOR: f32 = 0.30;

/// Thorough: wide coverage of the ranked list.
pub const THOROUGHNESS_THOROUGH_MAX_CHUNKS: usize = 50;
pub const THOROUGHNESS_THOROUGH_FLOOR: f32 = 0.20;

/// Exhaustive: near-full coverage; the floor is relaxed to admit
/// low-similarity chunks while still bounding cost.
pub const THOROUGHNESS_EXHAUSTIVE_MAX_CHUNKS: usize = 200;
pub const THOROUGHNESS_EXHAUSTIVE_FLOOR: f32 = 0.05;

// =============================================================================
// NOISE FILTER
// =============================================================================

/// Minimum consecutive short marker lines to qualify as a footnote cluster.
pub const FOOTNOTE_CLUSTER_MIN_LINES: usize = 3;

/// Maximum length of a line that can participate in a footnote cluster.
pub const FOOTNOTE_LINE_MAX_LEN: usize = 120;

/// Fraction of lines after a references heading that must look like
/// citations for the tail to be removed.
pub const REFERENCES_DENSITY_THRESHOLD: f32 = 0.5;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chunking_defaults_are_consistent() {
        const {
            assert!(CHUNK_OVERLAP < CHUNK_SIZE);
            assert!(CHUNK_BOUNDARY_RADIUS < CHUNK_SIZE / 2);
        }
    }

    #[test]
    fn annotation_length_bounds_ordered() {
        const {
            assert!(ANNOTATION_MIN_LEN < ANNOTATION_MAX_LEN);
        }
    }

    #[test]
    fn thresholds_in_unit_range() {
        let values = [
            VERIFIER_THRESHOLD,
            FUZZY_MATCH_THRESHOLD,
            DEDUP_OVERLAP_THRESHOLD,
            REFERENCES_DENSITY_THRESHOLD,
        ];
        for v in values {
            assert!((0.0..=1.0).contains(&v), "{} out of range", v);
        }
    }

    #[test]
    fn thoroughness_levels_widen() {
        assert!(THOROUGHNESS_QUICK_MAX_CHUNKS < THOROUGHNESS_STANDARD_MAX_CHUNKS);
        assert!(THOROUGHNESS_STANDARD_MAX_CHUNKS < THOROUGHNESS_THOROUGH_MAX_CHUNKS);
        assert!(THOROUGHNESS_THOROUGH_MAX_CHUNKS < THOROUGHNESS_EXHAUSTIVE_MAX_CHUNKS);

        assert!(THOROUGHNESS_QUICK_FLOOR >= THOROUGHNESS_STANDARD_FLOOR);
        assert!(THOROUGHNESS_STANDARD_FLOOR > THOROUGHNESS_THOROUGH_FLOOR);
        assert!(THOROUGHNESS_THOROUGH_FLOOR > THOROUGHNESS_EXHAUSTIVE_FLOOR);
    }

    #[test]
    fn temperatures_ordered_by_stage() {
        // Generator explores, verifier judges, refiner polishes.
        assert!(GENERATOR_TEMPERATURE > REFINER_TEMPERATURE);
        assert!(REFINER_TEMPERATURE > VERIFIER_TEMPERATURE);
    }

    #[test]
    fn concurrency_caps_positive() {
        const {
            assert!(PIPELINE_CONCURRENCY > 0);
            assert!(MODEL_CALL_CAP > 0);
            assert!(MAX_CONCURRENT_PROMPTS > 0);
        }
    }
}
