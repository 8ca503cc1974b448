//! # gloss-core
//!
//! Core types, traits, and abstractions for the gloss annotation pipeline.
//!
//! This crate provides the foundational data structures and trait
//! definitions that other gloss crates depend on.

pub mod context;
pub mod defaults;
pub mod error;
pub mod logging;
pub mod models;
pub mod traits;

// Re-export commonly used types at crate root
pub use context::DocumentContextCache;
pub use error::{Error, Result};
pub use models::*;
pub use traits::*;
