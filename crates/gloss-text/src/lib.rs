//! # gloss-text
//!
//! Text preparation for the gloss annotation pipeline: noise filtering and
//! boundary-seeking chunking with original-coordinate offset translation.
//!
//! The central invariant: every chunk's `start_offset`/`end_offset` index
//! the *original* document text, so a chunk-relative candidate span plus the
//! chunk's start offset is a valid absolute position in the untouched text.

pub mod chunker;
pub mod noise;

pub use chunker::{chunk_document, ChunkerConfig};
pub use noise::{clean_to_original_end, clean_to_original_start, filter_noise, NoiseFilterResult};
