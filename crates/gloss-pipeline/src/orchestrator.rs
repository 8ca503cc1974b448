//! Pipeline orchestration: Generate → Hard Verify → Soft Verify → Dedup →
//! Refine over ranked chunks, with bounded concurrency and per-chunk error
//! isolation.
//!
//! Chunks run in fixed-size concurrent batches. Batches are strictly
//! sequential: batch *B* fully completes (including dedup folding) before
//! batch *B+1*'s candidates are judged against the accepted set. That is a
//! correctness requirement — it makes dedup outcomes reproducible — not a
//! performance choice. Within a batch, chunk tasks judge against the frozen
//! pre-batch accepted set; fold re-checks in chunk order against the live
//! set, so same-batch overlaps (chunk windows share text) cannot race.
//!
//! A chunk either folds completely or contributes nothing: failures are
//! recorded per chunk and never abort siblings or the run.

use std::sync::Arc;

use chrono::Utc;
use tokio::sync::Semaphore;
use tracing::{debug, info, instrument, trace};
use uuid::Uuid;

use gloss_core::models::{
    Annotation, Chunk, Document, DocumentContext, RefinedAnnotation, Span, Thoroughness,
    VerifiedCandidate,
};
use gloss_core::{defaults, CompletionBackend, EmbeddingBackend, Error, Result};
use gloss_rank::{rank_chunks, RankedChunk};

use crate::dedup::{DedupDecision, DedupPolicy};
use crate::gate::ModelGate;
use crate::verifier::{HardVerdict, VerifierConfig};
use crate::{generator, refiner, verifier};

/// Orchestrator tuning parameters.
///
/// Validated up front — configuration errors fail fast, before any model
/// call is made.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Chunks processed concurrently within one batch.
    pub concurrency: usize,
    /// Global cap on simultaneous outbound model calls across the run.
    pub model_call_cap: usize,
    /// Maximum candidates the generator may propose per chunk.
    pub max_candidates_per_chunk: usize,
    pub verifier: VerifierConfig,
    pub dedup: DedupPolicy,
    /// Batches smaller than this skip refinement.
    pub refine_min_batch: usize,
    pub generator_temperature: f32,
    pub verifier_temperature: f32,
    pub refiner_temperature: f32,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            concurrency: defaults::PIPELINE_CONCURRENCY,
            model_call_cap: defaults::MODEL_CALL_CAP,
            max_candidates_per_chunk: defaults::MAX_CANDIDATES_PER_CHUNK,
            verifier: VerifierConfig::default(),
            dedup: DedupPolicy::default(),
            refine_min_batch: defaults::REFINE_MIN_BATCH,
            generator_temperature: defaults::GENERATOR_TEMPERATURE,
            verifier_temperature: defaults::VERIFIER_TEMPERATURE,
            refiner_temperature: defaults::REFINER_TEMPERATURE,
        }
    }
}

impl PipelineConfig {
    /// Cheap validation, run before any model call.
    pub fn validate(&self) -> Result<()> {
        if self.concurrency == 0 {
            return Err(Error::Config("concurrency must be at least 1".to_string()));
        }
        if self.model_call_cap == 0 {
            return Err(Error::Config(
                "model_call_cap must be at least 1".to_string(),
            ));
        }
        if self.max_candidates_per_chunk == 0 {
            return Err(Error::Config(
                "max_candidates_per_chunk must be at least 1".to_string(),
            ));
        }
        if self.verifier.min_len >= self.verifier.max_len {
            return Err(Error::Config(format!(
                "annotation length bounds inverted: {} >= {}",
                self.verifier.min_len, self.verifier.max_len
            )));
        }
        for (name, value) in [
            ("quality_threshold", self.verifier.quality_threshold),
            ("fuzzy_match_threshold", self.verifier.fuzzy_match_threshold),
            ("dedup overlap_threshold", self.dedup.overlap_threshold),
        ] {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::Config(format!("{} out of [0,1]: {}", name, value)));
            }
        }
        for (name, value) in [
            ("generator_temperature", self.generator_temperature),
            ("verifier_temperature", self.verifier_temperature),
            ("refiner_temperature", self.refiner_temperature),
        ] {
            if !(0.0..=2.0).contains(&value) {
                return Err(Error::Config(format!("{} out of [0,2]: {}", name, value)));
            }
        }
        Ok(())
    }
}

/// Pipeline stage at which a chunk failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Generate,
    SoftVerify,
    Ground,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Generate => write!(f, "generate"),
            Self::SoftVerify => write!(f, "soft_verify"),
            Self::Ground => write!(f, "ground"),
        }
    }
}

/// One recorded chunk-level failure. Partial completion is a valid,
/// reportable outcome — the caller decides whether to retry.
#[derive(Debug, Clone)]
pub struct ChunkFailure {
    pub chunk_id: Uuid,
    pub stage: PipelineStage,
    pub error: String,
}

/// Result of one pipeline run.
#[derive(Debug, Clone, Default)]
pub struct PipelineRun {
    pub annotations: Vec<Annotation>,
    pub failures: Vec<ChunkFailure>,
}

/// Identity of a prompt branch in a multi-prompt run.
#[derive(Debug, Clone)]
pub(crate) struct PromptTag {
    pub index: u32,
    pub color: String,
    pub run_id: Uuid,
}

/// The annotation pipeline.
pub struct AnnotationPipeline {
    embedding: Arc<dyn EmbeddingBackend>,
    completion: Arc<dyn CompletionBackend>,
    config: PipelineConfig,
    permits: Arc<Semaphore>,
}

impl AnnotationPipeline {
    /// Build a pipeline, validating the configuration up front.
    pub fn new(
        embedding: Arc<dyn EmbeddingBackend>,
        completion: Arc<dyn CompletionBackend>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        let permits = Arc::new(Semaphore::new(config.model_call_cap));
        Ok(Self {
            embedding,
            completion,
            config,
            permits,
        })
    }

    /// Build a pipeline sharing an existing model-call semaphore, so a
    /// multi-prompt fan-out stays under one global cap.
    pub(crate) fn with_shared_permits(
        embedding: Arc<dyn EmbeddingBackend>,
        completion: Arc<dyn CompletionBackend>,
        config: PipelineConfig,
        permits: Arc<Semaphore>,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embedding,
            completion,
            config,
            permits,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Analyze a document for one research intent.
    ///
    /// Ranks the chunk set against the intent embedding (caching chunk
    /// embeddings), then drives the selected chunks through the pipeline,
    /// deduplicating against `existing` (prior manual + AI annotations)
    /// throughout.
    #[instrument(skip_all, fields(subsystem = "pipeline", component = "orchestrator", op = "analyze", document_id = %document.id, chunk_count = chunks.len(), level = %thoroughness))]
    pub async fn analyze(
        &self,
        document: &Document,
        chunks: &mut [Chunk],
        intent: &str,
        thoroughness: Thoroughness,
        existing: &[Annotation],
        context: Option<&DocumentContext>,
    ) -> Result<PipelineRun> {
        if intent.trim().is_empty() {
            return Err(Error::InvalidInput(
                "research intent must not be empty".to_string(),
            ));
        }

        let intent_embedding = self
            .embedding
            .embed_texts(&[intent.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Embedding("empty embedding response for intent".to_string()))?;

        let ranked = rank_chunks(
            self.embedding.as_ref(),
            chunks,
            &intent_embedding,
            thoroughness,
        )
        .await?;

        Ok(self
            .run_ranked(document, chunks, &ranked, intent, existing, context, None)
            .await)
    }

    /// Drive ranked chunks through the pipeline in sequential batches of
    /// concurrent chunk tasks.
    pub(crate) async fn run_ranked(
        &self,
        document: &Document,
        chunks: &[Chunk],
        ranked: &[RankedChunk],
        intent: &str,
        existing: &[Annotation],
        context: Option<&DocumentContext>,
        tag: Option<&PromptTag>,
    ) -> PipelineRun {
        let gate = ModelGate::new(self.completion.clone(), self.permits.clone());
        let mut accepted: Vec<Annotation> = Vec::new();
        let mut failures: Vec<ChunkFailure> = Vec::new();

        for batch in ranked.chunks(self.config.concurrency) {
            // Snapshot for in-batch dedup checks; the live set only moves
            // at fold time, in chunk order.
            let frozen = accepted.clone();

            let tasks = batch.iter().map(|ranked_chunk| {
                let chunk = &chunks[ranked_chunk.chunk_index];
                self.process_chunk(&gate, chunk, intent, context, existing, &frozen)
            });
            let results = futures::future::join_all(tasks).await;

            for (ranked_chunk, result) in batch.iter().zip(results) {
                let chunk = &chunks[ranked_chunk.chunk_index];
                match result {
                    Ok(refined) => {
                        for item in refined {
                            self.fold(
                                item,
                                chunk,
                                document,
                                existing,
                                &mut accepted,
                                tag,
                                &mut failures,
                            );
                        }
                    }
                    Err(failure) => failures.push(failure),
                }
            }
        }

        info!(
            subsystem = "pipeline",
            component = "orchestrator",
            annotation_count = accepted.len(),
            failed_chunks = failures.len(),
            "Pipeline run complete"
        );
        PipelineRun {
            annotations: accepted,
            failures,
        }
    }

    /// One chunk's journey through the gates. Either the whole chunk
    /// completes or it reports a single failure.
    async fn process_chunk(
        &self,
        gate: &ModelGate,
        chunk: &Chunk,
        intent: &str,
        context: Option<&DocumentContext>,
        existing: &[Annotation],
        frozen_accepted: &[Annotation],
    ) -> std::result::Result<Vec<RefinedAnnotation>, ChunkFailure> {
        let candidates = generator::generate(gate, &self.config, &chunk.text, intent, context)
            .await
            .map_err(|e| ChunkFailure {
                chunk_id: chunk.id,
                stage: PipelineStage::Generate,
                error: e.to_string(),
            })?;

        let mut hard_passed = Vec::new();
        for candidate in &candidates {
            match verifier::hard_verify(&self.config.verifier, candidate, &chunk.text) {
                HardVerdict::Pass(corrected) => hard_passed.push(corrected),
                HardVerdict::Reject(reason) => {
                    debug!(
                        subsystem = "pipeline",
                        component = "hard_gate",
                        chunk_id = %chunk.id,
                        rejection = %reason,
                        "Hard gate rejected candidate"
                    );
                }
            }
        }
        if hard_passed.is_empty() {
            return Ok(Vec::new());
        }

        let verified = verifier::soft_verify(
            gate,
            &self.config.verifier,
            self.config.verifier_temperature,
            intent,
            hard_passed,
        )
        .await
        .map_err(|e| ChunkFailure {
            chunk_id: chunk.id,
            stage: PipelineStage::SoftVerify,
            error: e.to_string(),
        })?;

        // Early dedup: clear rejects against the pre-existing snapshot and
        // the frozen pre-batch accepted set skip the refinement call. The
        // authoritative check re-runs at fold time.
        let survivors: Vec<VerifiedCandidate> = verified
            .into_iter()
            .filter(|v| {
                let span = absolute_span(chunk, v.candidate.rel_start, v.candidate.rel_end);
                if self.config.dedup.duplicates_snapshot(&span, existing) {
                    trace!(chunk_id = %chunk.id, "Candidate duplicates pre-existing annotation");
                    return false;
                }
                !matches!(
                    self.config.dedup.against_accepted(
                        &span,
                        v.candidate.confidence,
                        frozen_accepted
                    ),
                    DedupDecision::RejectCandidate
                )
            })
            .collect();
        if survivors.is_empty() {
            return Ok(Vec::new());
        }

        Ok(refiner::refine(
            gate,
            self.config.refine_min_batch,
            self.config.refiner_temperature,
            intent,
            context,
            survivors,
        )
        .await)
    }

    /// Fold one refined annotation into the accepted set: convert to
    /// absolute offsets, enforce verbatim grounding against the full text,
    /// and apply the authoritative dedup decision.
    #[allow(clippy::too_many_arguments)]
    fn fold(
        &self,
        refined: RefinedAnnotation,
        chunk: &Chunk,
        document: &Document,
        existing: &[Annotation],
        accepted: &mut Vec<Annotation>,
        tag: Option<&PromptTag>,
        failures: &mut Vec<ChunkFailure>,
    ) {
        let claimed_start = chunk.start_offset + refined.rel_start;
        let claimed_end = chunk.start_offset + refined.rel_end;

        let Some((absolute_start, absolute_end)) = ground_span(
            &document.full_text,
            claimed_start,
            claimed_end,
            &refined.text,
            chunk,
        ) else {
            failures.push(ChunkFailure {
                chunk_id: chunk.id,
                stage: PipelineStage::Ground,
                error: format!(
                    "span not grounded in document text at {}..{}",
                    claimed_start, claimed_end
                ),
            });
            return;
        };

        let span = Span::new(absolute_start, absolute_end);
        if self.config.dedup.duplicates_snapshot(&span, existing) {
            trace!(chunk_id = %chunk.id, "Folded candidate duplicates pre-existing annotation");
            return;
        }
        match self
            .config
            .dedup
            .against_accepted(&span, refined.confidence, accepted)
        {
            DedupDecision::Insert => {}
            DedupDecision::Supersede(indices) => {
                for index in indices.into_iter().rev() {
                    let removed = accepted.remove(index);
                    trace!(
                        superseded = %removed.id,
                        "Higher-confidence candidate supersedes accepted annotation"
                    );
                }
            }
            DedupDecision::RejectCandidate => {
                trace!(chunk_id = %chunk.id, "Folded candidate rejected as duplicate");
                return;
            }
        }

        accepted.push(Annotation {
            id: Uuid::new_v4(),
            absolute_start,
            absolute_end,
            highlighted_text: document.full_text[absolute_start..absolute_end].to_string(),
            category: refined.category,
            note: Some(refined.note),
            confidence: Some(refined.confidence),
            is_ai_generated: true,
            prompt_index: tag.map(|t| t.index),
            prompt_color: tag.map(|t| t.color.clone()),
            analysis_run_id: tag.map(|t| t.run_id),
            created_at: Utc::now(),
        });
    }
}

fn absolute_span(chunk: &Chunk, rel_start: usize, rel_end: usize) -> Span {
    Span::new(chunk.start_offset + rel_start, chunk.start_offset + rel_end)
}

/// Enforce the verbatim invariant: the absolute span must slice the full
/// text to exactly the annotation text. When the naive conversion misses
/// (a removed noise section inside the chunk shifts later positions), the
/// text is re-searched within the chunk's original window; spans straddling
/// removed content stay ungrounded and are dropped.
fn ground_span(
    full_text: &str,
    start: usize,
    end: usize,
    text: &str,
    chunk: &Chunk,
) -> Option<(usize, usize)> {
    if start < end
        && end <= full_text.len()
        && full_text.is_char_boundary(start)
        && full_text.is_char_boundary(end)
        && &full_text[start..end] == text
    {
        return Some((start, end));
    }

    let window_start = snap_boundary(full_text, chunk.start_offset);
    let window_end = snap_boundary(full_text, chunk.end_offset.min(full_text.len()));
    if window_start >= window_end {
        return None;
    }
    full_text[window_start..window_end]
        .find(text)
        .map(|i| (window_start + i, window_start + i + text.len()))
}

fn snap_boundary(text: &str, mut pos: usize) -> usize {
    pos = pos.min(text.len());
    while pos > 0 && !text.is_char_boundary(pos) {
        pos -= 1;
    }
    pos
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        assert!(PipelineConfig::default().validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = PipelineConfig {
            concurrency: 0,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_out_of_range_threshold() {
        let mut config = PipelineConfig::default();
        config.verifier.quality_threshold = 1.4;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_inverted_length_bounds() {
        let mut config = PipelineConfig::default();
        config.verifier.min_len = 700;
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_validate_rejects_wild_temperature() {
        let config = PipelineConfig {
            generator_temperature: 3.5,
            ..PipelineConfig::default()
        };
        assert!(matches!(config.validate(), Err(Error::Config(_))));
    }

    #[test]
    fn test_ground_span_exact() {
        let chunk = Chunk {
            id: Uuid::new_v4(),
            text: "sky is blue".to_string(),
            start_offset: 4,
            end_offset: 15,
            section_title: None,
            embedding: None,
        };
        let full = "The sky is blue.";
        assert_eq!(ground_span(full, 4, 15, "sky is blue", &chunk), Some((4, 15)));
    }

    #[test]
    fn test_ground_span_researches_window() {
        // Offsets off by two; the text still lives inside the chunk window.
        let full = "xxThe sky is blue today, as expected.";
        let chunk = Chunk {
            id: Uuid::new_v4(),
            text: full.to_string(),
            start_offset: 0,
            end_offset: full.len(),
            section_title: None,
            embedding: None,
        };
        assert_eq!(
            ground_span(full, 0, 11, "sky is blue", &chunk),
            Some((6, 17))
        );
    }

    #[test]
    fn test_ground_span_rejects_absent_text() {
        let full = "The sky is blue.";
        let chunk = Chunk {
            id: Uuid::new_v4(),
            text: full.to_string(),
            start_offset: 0,
            end_offset: full.len(),
            section_title: None,
            embedding: None,
        };
        assert_eq!(ground_span(full, 0, 10, "fabricated span", &chunk), None);
    }
}
