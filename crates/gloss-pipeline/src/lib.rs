//! # gloss-pipeline
//!
//! The three-phase annotation pipeline: Generate → Verify → Refine, with
//! confidence-based deduplication, batch-sequenced concurrency, and
//! multi-prompt fan-out.
//!
//! The load-bearing invariant of the whole crate: every accepted
//! annotation's `highlighted_text` equals the document's full text at
//! `absolute_start..absolute_end`, exactly. The deterministic hard gate and
//! the fold-time grounding check enforce it; no model output crosses into
//! the accepted set unchecked.

pub mod coordinator;
pub mod dedup;
mod gate;
mod generator;
pub mod orchestrator;
pub mod prompts;
mod refiner;
pub mod verifier;

pub use coordinator::{
    AnalysisRun, MultiPromptCoordinator, PromptRunResult, MAX_CONCURRENT_PROMPTS,
};
pub use dedup::{overlap_ratio, DedupDecision, DedupPolicy};
pub use orchestrator::{
    AnnotationPipeline, ChunkFailure, PipelineConfig, PipelineRun, PipelineStage,
};
pub use verifier::{hard_verify, HardVerdict, RejectionReason, VerifierConfig};
