//! Multi-prompt fan-out over one shared ranked chunk set.
//!
//! N independent prompt pipelines run concurrently over the same selected
//! chunks. Each prompt keeps its own accepted set (two prompts may both
//! highlight the same passage), but every branch deduplicates against the
//! pre-existing annotation snapshot, taken once before any prompt starts
//! and read-only for the whole run. All branches share one model-call
//! semaphore so the fan-out cannot exceed the global cap.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tracing::{info, instrument};
use uuid::Uuid;

use gloss_core::models::{
    Annotation, Chunk, Document, DocumentContext, ResearchPrompt, Thoroughness, Vector,
};
use gloss_core::{
    defaults, AnnotationStore, CompletionBackend, EmbeddingBackend, Error, Result,
};
use gloss_rank::rank_chunks;

use crate::orchestrator::{AnnotationPipeline, ChunkFailure, PipelineConfig, PromptTag};

/// Maximum prompts per run. Oversize requests are rejected, never
/// truncated.
pub const MAX_CONCURRENT_PROMPTS: usize = defaults::MAX_CONCURRENT_PROMPTS;

/// One prompt branch's output.
#[derive(Debug, Clone)]
pub struct PromptRunResult {
    pub prompt_index: u32,
    pub color: String,
    pub annotations: Vec<Annotation>,
    pub failures: Vec<ChunkFailure>,
}

/// Result of a whole multi-prompt invocation. `analysis_run_id` groups all
/// annotations from the batch so a caller can filter or delete the run
/// atomically.
#[derive(Debug, Clone)]
pub struct AnalysisRun {
    pub analysis_run_id: Uuid,
    pub prompts: Vec<PromptRunResult>,
}

/// Runs N research prompts concurrently over one document.
pub struct MultiPromptCoordinator {
    embedding: Arc<dyn EmbeddingBackend>,
    completion: Arc<dyn CompletionBackend>,
    config: PipelineConfig,
}

impl MultiPromptCoordinator {
    pub fn new(
        embedding: Arc<dyn EmbeddingBackend>,
        completion: Arc<dyn CompletionBackend>,
        config: PipelineConfig,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            embedding,
            completion,
            config,
        })
    }

    /// Run all prompts over the shared chunk set.
    ///
    /// The chunk set is ranked once against the centroid of the prompt
    /// embeddings, then every prompt branch analyzes the same selection.
    #[instrument(skip_all, fields(subsystem = "pipeline", component = "coordinator", op = "run", document_id = %document.id, prompt_count = prompts.len(), level = %thoroughness))]
    pub async fn run(
        &self,
        document: &Document,
        chunks: &mut [Chunk],
        prompts: &[ResearchPrompt],
        thoroughness: Thoroughness,
        store: &dyn AnnotationStore,
        context: Option<&DocumentContext>,
    ) -> Result<AnalysisRun> {
        if prompts.is_empty() {
            return Err(Error::InvalidInput(
                "at least one research prompt is required".to_string(),
            ));
        }
        if prompts.len() > MAX_CONCURRENT_PROMPTS {
            return Err(Error::InvalidInput(format!(
                "{} prompts exceed the maximum of {}",
                prompts.len(),
                MAX_CONCURRENT_PROMPTS
            )));
        }
        if let Some(blank) = prompts.iter().position(|p| p.text.trim().is_empty()) {
            return Err(Error::InvalidInput(format!(
                "prompt {} has empty text",
                blank
            )));
        }

        // Snapshot the pre-existing annotations once, before any prompt
        // starts; the shared dedup scope is read-only for the whole run.
        let existing = store.existing_annotations(document.id).await?;

        let texts: Vec<String> = prompts.iter().map(|p| p.text.clone()).collect();
        let prompt_embeddings = self.embedding.embed_texts(&texts).await?;
        if prompt_embeddings.len() != prompts.len() {
            return Err(Error::Embedding(format!(
                "Expected {} prompt embeddings, got {}",
                prompts.len(),
                prompt_embeddings.len()
            )));
        }

        let centroid = centroid(&prompt_embeddings)
            .ok_or_else(|| Error::Embedding("empty prompt embeddings".to_string()))?;
        let ranked = rank_chunks(self.embedding.as_ref(), chunks, &centroid, thoroughness).await?;

        let analysis_run_id = Uuid::new_v4();
        let permits = Arc::new(Semaphore::new(self.config.model_call_cap));

        let branches = prompts.iter().enumerate().map(|(index, prompt)| {
            let tag = PromptTag {
                index: index as u32,
                color: prompt.color.clone(),
                run_id: analysis_run_id,
            };
            let pipeline = AnnotationPipeline::with_shared_permits(
                self.embedding.clone(),
                self.completion.clone(),
                self.config.clone(),
                permits.clone(),
            );
            let existing = &existing;
            let ranked = &ranked;
            let chunks: &[Chunk] = chunks;
            async move {
                // Config was validated in `new`; re-validation cannot fail.
                let pipeline = pipeline?;
                let run = pipeline
                    .run_ranked(
                        document,
                        chunks,
                        ranked,
                        &prompt.text,
                        existing,
                        context,
                        Some(&tag),
                    )
                    .await;
                Ok::<PromptRunResult, Error>(PromptRunResult {
                    prompt_index: tag.index,
                    color: tag.color,
                    annotations: run.annotations,
                    failures: run.failures,
                })
            }
        });

        let results = futures::future::join_all(branches).await;
        let mut prompt_results = Vec::with_capacity(results.len());
        for result in results {
            prompt_results.push(result?);
        }

        info!(
            subsystem = "pipeline",
            component = "coordinator",
            analysis_run_id = %analysis_run_id,
            annotation_count = prompt_results
                .iter()
                .map(|p| p.annotations.len())
                .sum::<usize>(),
            "Multi-prompt run complete"
        );
        Ok(AnalysisRun {
            analysis_run_id,
            prompts: prompt_results,
        })
    }
}

/// Mean of the prompt embeddings; ranking happens once for the shared
/// chunk set.
fn centroid(vectors: &[Vector]) -> Option<Vector> {
    let first = vectors.first()?;
    let dim = first.len();
    if dim == 0 {
        return None;
    }
    let mut sum = vec![0.0f32; dim];
    for vector in vectors {
        if vector.len() != dim {
            return None;
        }
        for (acc, v) in sum.iter_mut().zip(vector.as_slice()) {
            *acc += v;
        }
    }
    let n = vectors.len() as f32;
    for value in sum.iter_mut() {
        *value /= n;
    }
    Some(Vector::from(sum))
}
