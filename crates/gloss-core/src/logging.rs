//! Structured logging schema and field name constants for gloss.
//!
//! All crates use these constants for consistent structured logging fields,
//! so log aggregation tools can query by standardized field names across
//! every subsystem.
//!
//! ## Log Level Contract
//!
//! | Level | Usage |
//! |-------|-------|
//! | ERROR | Degraded service, requires operator attention |
//! | WARN  | Recoverable issue, automatic fallback applied |
//! | INFO  | Lifecycle events, run completions |
//! | DEBUG | Decision points, intermediate values, config choices |
//! | TRACE | Per-item iteration, high-volume data (candidates, chunks) |

// ─── Identity fields ───────────────────────────────────────────────────────

/// Subsystem originating the log event.
/// Values: "text", "rank", "inference", "pipeline"
pub const SUBSYSTEM: &str = "subsystem";

/// Component within a subsystem.
/// Examples: "chunker", "noise_filter", "ollama", "hard_gate", "orchestrator"
pub const COMPONENT: &str = "component";

/// Logical operation name.
/// Examples: "embed_texts", "complete", "generate", "verify", "refine"
pub const OPERATION: &str = "op";

// ─── Entity fields ─────────────────────────────────────────────────────────

/// Document UUID being analyzed.
pub const DOCUMENT_ID: &str = "document_id";

/// Chunk UUID being processed.
pub const CHUNK_ID: &str = "chunk_id";

/// Index of the prompt in a multi-prompt run.
pub const PROMPT_INDEX: &str = "prompt_index";

/// Identifier grouping all annotations from one multi-prompt invocation.
pub const ANALYSIS_RUN_ID: &str = "analysis_run_id";

// ─── Measurement fields ────────────────────────────────────────────────────

/// Wall-clock duration in milliseconds.
pub const DURATION_MS: &str = "duration_ms";

/// Number of chunks selected, processed, or failed.
pub const CHUNK_COUNT: &str = "chunk_count";

/// Number of candidates at a pipeline stage.
pub const CANDIDATE_COUNT: &str = "candidate_count";

/// Number of annotations accepted.
pub const ANNOTATION_COUNT: &str = "annotation_count";

/// Byte length of a prompt or response.
pub const PROMPT_LEN: &str = "prompt_len";

/// Byte length of a model response.
pub const RESPONSE_LEN: &str = "response_len";

// ─── Inference fields ──────────────────────────────────────────────────────

/// Model name used for inference.
pub const MODEL: &str = "model";

/// Sampling temperature used for a completion call.
pub const TEMPERATURE: &str = "temperature";

// ─── Outcome fields ────────────────────────────────────────────────────────

/// Boolean success/failure indicator.
pub const SUCCESS: &str = "success";

/// Error message when an operation fails.
pub const ERROR_MSG: &str = "error";

/// Rejection reason for a candidate that failed a gate.
pub const REJECTION: &str = "rejection";

/// Slow operation threshold exceeded.
pub const SLOW: &str = "slow";
