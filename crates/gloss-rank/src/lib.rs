//! # gloss-rank
//!
//! Relevance ranking for the gloss annotation pipeline: cosine similarity
//! between chunk and intent embeddings, plus the thoroughness selection
//! policy that bounds how many chunks a run analyzes.

pub mod ranker;
pub mod similarity;

pub use ranker::{rank_chunks, RankedChunk};
pub use similarity::cosine_similarity;
