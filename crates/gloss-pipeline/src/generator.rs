//! Candidate generation: one model call per chunk proposing annotation spans.

use serde::Deserialize;
use tracing::{debug, warn};

use gloss_core::models::{AnnotationCategory, Candidate, DocumentContext};
use gloss_core::{CompletionRequest, Result};
use gloss_inference::schema::parse_json_array;

use crate::gate::ModelGate;
use crate::orchestrator::PipelineConfig;
use crate::prompts;

/// Wire shape of one generator output element.
#[derive(Debug, Deserialize)]
struct CandidateWire {
    start: i64,
    end: i64,
    text: String,
    category: String,
    note: String,
    confidence: f64,
}

/// Ask the model for up to `max_candidates_per_chunk` candidate spans.
///
/// Schema-invalid items are dropped here, not retried — the generator is a
/// noisy proposer and correctness is enforced by the verifier gates. The
/// model's offsets are carried as claims for the hard gate to check.
pub(crate) async fn generate(
    gate: &ModelGate,
    config: &PipelineConfig,
    chunk_text: &str,
    intent: &str,
    context: Option<&DocumentContext>,
) -> Result<Vec<Candidate>> {
    let request = CompletionRequest::new(
        prompts::generator_system(),
        prompts::generator_prompt(chunk_text, intent, context, config.max_candidates_per_chunk),
    )
    .with_temperature(config.generator_temperature)
    .json();

    let response = gate.complete(&request).await?;

    let (wires, dropped): (Vec<CandidateWire>, usize) = parse_json_array(&response)?;
    if dropped > 0 {
        warn!(
            subsystem = "pipeline",
            component = "generator",
            dropped,
            "Dropped schema-invalid candidates"
        );
    }

    let mut candidates = Vec::new();
    for wire in wires {
        match validate_wire(wire, chunk_text.len()) {
            Some(candidate) => candidates.push(candidate),
            None => {
                warn!(
                    subsystem = "pipeline",
                    component = "generator",
                    "Dropped candidate failing field validation"
                );
            }
        }
    }
    candidates.truncate(config.max_candidates_per_chunk);

    debug!(
        subsystem = "pipeline",
        component = "generator",
        candidate_count = candidates.len(),
        "Generated candidates"
    );
    Ok(candidates)
}

/// Field-level validation of one wire candidate.
///
/// Offsets are only sanity-bounded here; the hard gate re-locates the text
/// and owns offset authority. Equal start/end is a zero-information claim
/// some models emit and is allowed through — inverted or negative offsets
/// are malformed and drop the candidate.
fn validate_wire(wire: CandidateWire, chunk_len: usize) -> Option<Candidate> {
    if wire.text.trim().is_empty() {
        return None;
    }
    if wire.start < 0 || wire.end < wire.start {
        return None;
    }
    let category: AnnotationCategory = wire.category.parse().ok()?;

    let rel_start = (wire.start as usize).min(chunk_len);
    let rel_end = (wire.end as usize).min(chunk_len);

    Some(Candidate {
        rel_start,
        rel_end,
        text: wire.text,
        category,
        note: wire.note,
        confidence: (wire.confidence as f32).clamp(0.0, 1.0),
    })
}
