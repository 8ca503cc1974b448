//! Core traits for gloss abstractions.
//!
//! These traits define the interfaces that concrete implementations must
//! satisfy, enabling pluggable backends and testability.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{Annotation, Vector};

// =============================================================================
// INFERENCE TRAITS
// =============================================================================

/// Backend for generating text embeddings.
///
/// Failures must be surfaced as errors — never silently return zero
/// vectors, which would corrupt ranking downstream.
#[async_trait]
pub trait EmbeddingBackend: Send + Sync {
    /// Generate embeddings for the given texts.
    ///
    /// Returns a vector of embedding vectors, one per input text.
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>>;

    /// Get the expected dimension of embedding vectors.
    fn dimension(&self) -> usize;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

/// One chat-completion request.
///
/// Each pipeline stage runs at its own temperature (the generator explores,
/// the soft verifier judges near-deterministically, the refiner polishes),
/// so temperature travels with the request rather than the backend.
#[derive(Debug, Clone)]
pub struct CompletionRequest {
    pub system: String,
    pub prompt: String,
    pub temperature: f32,
    /// Request strict JSON output from the backend when supported.
    pub json: bool,
}

impl CompletionRequest {
    pub fn new(system: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            prompt: prompt.into(),
            temperature: 0.0,
            json: false,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn json(mut self) -> Self {
        self.json = true;
        self
    }
}

/// Backend for chat completions (LLM).
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    /// Run one completion request and return the raw response text.
    async fn complete(&self, request: &CompletionRequest) -> Result<String>;

    /// Get the model name being used.
    fn model_name(&self) -> &str;
}

// =============================================================================
// STORAGE COLLABORATOR
// =============================================================================

/// Read-side storage collaborator.
///
/// Supplies the annotations that existed before a run starts (prior manual
/// and AI annotations) which every prompt branch deduplicates against. The
/// pipeline never writes through this trait — it returns results for the
/// caller to persist.
#[async_trait]
pub trait AnnotationStore: Send + Sync {
    /// All existing annotations for a document.
    async fn existing_annotations(&self, document_id: Uuid) -> Result<Vec<Annotation>>;
}

/// In-memory store for tests and callers that assemble the snapshot
/// themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticAnnotationStore {
    annotations: Vec<Annotation>,
}

impl StaticAnnotationStore {
    pub fn new(annotations: Vec<Annotation>) -> Self {
        Self { annotations }
    }
}

#[async_trait]
impl AnnotationStore for StaticAnnotationStore {
    async fn existing_annotations(&self, _document_id: Uuid) -> Result<Vec<Annotation>> {
        Ok(self.annotations.clone())
    }
}
