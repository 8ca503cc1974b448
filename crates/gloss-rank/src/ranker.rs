//! Relevance ranking of document chunks against a research intent.
//!
//! Chunks lacking an embedding are embedded on demand in one batch and the
//! result is cached on the chunk, so a multi-prompt run reusing the same
//! chunk set pays the embedding cost once.

use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use gloss_core::models::{Chunk, Thoroughness, Vector};
use gloss_core::traits::EmbeddingBackend;
use gloss_core::{Error, Result};

use crate::similarity::cosine_similarity;

/// One selected chunk with its relevance score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedChunk {
    /// Index into the caller's chunk slice.
    pub chunk_index: usize,
    /// Cosine similarity to the intent embedding.
    pub score: f32,
}

/// Embed any chunks that are missing an embedding, caching results.
///
/// Embedding failures surface as errors; a zero-vector stand-in would
/// silently corrupt every downstream ranking.
async fn embed_missing(backend: &dyn EmbeddingBackend, chunks: &mut [Chunk]) -> Result<()> {
    let missing: Vec<usize> = chunks
        .iter()
        .enumerate()
        .filter(|(_, c)| c.embedding.is_none())
        .map(|(i, _)| i)
        .collect();
    if missing.is_empty() {
        return Ok(());
    }

    let texts: Vec<String> = missing.iter().map(|&i| chunks[i].text.clone()).collect();
    let vectors = backend.embed_texts(&texts).await?;
    if vectors.len() != missing.len() {
        return Err(Error::Embedding(format!(
            "Expected {} embeddings, got {}",
            missing.len(),
            vectors.len()
        )));
    }

    for (idx, vector) in missing.into_iter().zip(vectors) {
        chunks[idx].embedding = Some(vector);
    }
    Ok(())
}

/// Rank chunks by similarity to the intent embedding and select a bounded
/// subset per the thoroughness policy.
///
/// The sort is descending by score with ties broken by original document
/// order (stable sort), so repeated runs are deterministic given identical
/// embeddings.
#[instrument(skip(backend, chunks, intent), fields(subsystem = "rank", component = "ranker", op = "rank", chunk_count = chunks.len(), level = %thoroughness))]
pub async fn rank_chunks(
    backend: &dyn EmbeddingBackend,
    chunks: &mut [Chunk],
    intent: &Vector,
    thoroughness: Thoroughness,
) -> Result<Vec<RankedChunk>> {
    embed_missing(backend, chunks).await?;

    let mut ranked: Vec<RankedChunk> = chunks
        .iter()
        .enumerate()
        .map(|(chunk_index, chunk)| {
            let score = chunk
                .embedding
                .as_ref()
                .map(|e| cosine_similarity(e, intent))
                .unwrap_or(0.0);
            RankedChunk { chunk_index, score }
        })
        .collect();

    // Stable: equal scores keep document order.
    ranked.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));

    let floor = thoroughness.similarity_floor();
    let max_chunks = thoroughness.max_chunks();
    let before = ranked.len();
    ranked.retain(|r| r.score >= floor);
    ranked.truncate(max_chunks);

    debug!(
        selected = ranked.len(),
        dropped = before - ranked.len(),
        floor,
        max_chunks,
        "Selected ranked chunks"
    );
    Ok(ranked)
}
