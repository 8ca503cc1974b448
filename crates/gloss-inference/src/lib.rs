//! # gloss-inference
//!
//! LLM inference backend abstraction for the gloss annotation pipeline.
//!
//! This crate provides:
//! - Ollama implementation of the embedding and completion backend traits
//! - Schema validation for dynamic model output at the provider boundary
//! - Mock backend for deterministic tests
//!
//! # Feature Flags
//!
//! - `ollama` (default): Enable the Ollama backend
//! - `mock`: Enable the mock backend outside of this crate's own tests

pub mod schema;

#[cfg(feature = "ollama")]
pub mod ollama;

// Mock inference backend for testing
#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export core types
pub use gloss_core::*;

#[cfg(feature = "ollama")]
pub use ollama::OllamaBackend;

pub use schema::{extract_json_payload, parse_json_array};
