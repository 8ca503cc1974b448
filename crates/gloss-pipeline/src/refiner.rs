//! Note/category refinement for verified candidates.
//!
//! One moderate-temperature model call per chunk batch rewrites each note
//! to explain why the span matters to the intent and re-confirms the
//! category. Text and offsets are never altered — the wire shape does not
//! even carry them. Refinement never drops a verified candidate: any parse
//! failure or omitted item falls back to the candidate unchanged.

use serde::Deserialize;
use tracing::{debug, warn};

use gloss_core::models::{AnnotationCategory, DocumentContext, RefinedAnnotation, VerifiedCandidate};
use gloss_core::CompletionRequest;
use gloss_inference::schema::parse_json_array;

use crate::gate::ModelGate;
use crate::prompts;

/// Wire shape of one refinement element.
#[derive(Debug, Deserialize)]
struct RefinementWire {
    index: usize,
    #[serde(default)]
    note: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

/// Refine a chunk's verified batch.
///
/// Batches smaller than `min_batch` pass through unchanged — the extra
/// model call is not worth it for one or two items.
pub(crate) async fn refine(
    gate: &ModelGate,
    min_batch: usize,
    temperature: f32,
    intent: &str,
    context: Option<&DocumentContext>,
    verified: Vec<VerifiedCandidate>,
) -> Vec<RefinedAnnotation> {
    if verified.len() < min_batch {
        return verified.into_iter().map(RefinedAnnotation::from).collect();
    }

    let request = CompletionRequest::new(
        prompts::refiner_system(),
        prompts::refiner_prompt(intent, context, &verified),
    )
    .with_temperature(temperature)
    .json();

    let wires: Vec<RefinementWire> = match gate.complete(&request).await {
        Ok(response) => match parse_json_array(&response) {
            Ok((wires, _dropped)) => wires,
            Err(e) => {
                warn!(
                    subsystem = "pipeline",
                    component = "refiner",
                    error = %e,
                    "Refinement response unparseable, keeping verified notes"
                );
                Vec::new()
            }
        },
        Err(e) => {
            warn!(
                subsystem = "pipeline",
                component = "refiner",
                error = %e,
                "Refinement call failed, keeping verified notes"
            );
            Vec::new()
        }
    };

    let mut by_index: std::collections::HashMap<usize, RefinementWire> =
        std::collections::HashMap::new();
    for wire in wires {
        by_index.entry(wire.index).or_insert(wire);
    }

    let refined: Vec<RefinedAnnotation> = verified
        .into_iter()
        .enumerate()
        .map(|(index, item)| {
            let mut refined = RefinedAnnotation::from(item);
            if let Some(wire) = by_index.get(&index) {
                if let Some(note) = wire.note.as_deref().filter(|n| !n.trim().is_empty()) {
                    refined.note = note.to_string();
                }
                if let Some(category) = wire
                    .category
                    .as_deref()
                    .and_then(|c| c.parse::<AnnotationCategory>().ok())
                {
                    refined.category = category;
                }
            }
            refined
        })
        .collect();

    debug!(
        subsystem = "pipeline",
        component = "refiner",
        candidate_count = refined.len(),
        "Refinement complete"
    );
    refined
}

#[cfg(test)]
mod tests {
    use super::*;
    use gloss_core::models::Candidate;
    use gloss_core::CompletionBackend;
    use gloss_inference::mock::MockInferenceBackend;
    use std::sync::Arc;
    use tokio::sync::Semaphore;

    fn gate_for(backend: MockInferenceBackend) -> ModelGate {
        ModelGate::new(
            Arc::new(backend) as Arc<dyn CompletionBackend>,
            Arc::new(Semaphore::new(2)),
        )
    }

    fn verified(text: &str, note: &str) -> VerifiedCandidate {
        VerifiedCandidate {
            candidate: Candidate {
                rel_start: 0,
                rel_end: text.len(),
                text: text.to_string(),
                category: AnnotationCategory::Evidence,
                note: note.to_string(),
                confidence: 0.8,
            },
            quality_score: 0.9,
        }
    }

    #[tokio::test]
    async fn test_small_batch_passes_through_without_model_call() {
        let backend = MockInferenceBackend::new();
        let gate = gate_for(backend.clone());

        let items = vec![verified("one passage", "n1"), verified("two passage", "n2")];
        let refined = refine(&gate, 3, 0.4, "intent", None, items).await;

        assert_eq!(refined.len(), 2);
        assert_eq!(refined[0].note, "n1");
        assert_eq!(backend.completion_call_count(), 0);
    }

    #[tokio::test]
    async fn test_refinement_applies_notes_and_categories() {
        let backend = MockInferenceBackend::new().with_default_response(
            r#"[{"index": 0, "note": "better note", "category": "argument"},
                {"index": 1, "note": "second note"},
                {"index": 2}]"#,
        );
        let gate = gate_for(backend);

        let items = vec![
            verified("alpha text here", "a"),
            verified("beta text here", "b"),
            verified("gamma text here", "c"),
        ];
        let refined = refine(&gate, 3, 0.4, "intent", None, items).await;

        assert_eq!(refined[0].note, "better note");
        assert_eq!(refined[0].category, AnnotationCategory::Argument);
        assert_eq!(refined[1].note, "second note");
        assert_eq!(refined[1].category, AnnotationCategory::Evidence);
        // No refinement content for item 2: unchanged.
        assert_eq!(refined[2].note, "c");
    }

    #[tokio::test]
    async fn test_refinement_never_alters_text_or_offsets() {
        // Any text/offset fields in the response are not even deserialized.
        let backend = MockInferenceBackend::new().with_default_response(
            r#"[{"index": 0, "note": "n", "text": "TAMPERED", "start": 999, "end": 1000}]"#,
        );
        let gate = gate_for(backend);

        let items = vec![
            verified("original text stays", "x"),
            verified("second item text", "y"),
            verified("third item text", "z"),
        ];
        let refined = refine(&gate, 3, 0.4, "intent", None, items).await;

        assert_eq!(refined[0].text, "original text stays");
        assert_eq!(refined[0].rel_start, 0);
        assert_eq!(refined[0].rel_end, "original text stays".len());
    }

    #[tokio::test]
    async fn test_parse_failure_falls_back_unchanged() {
        let backend = MockInferenceBackend::new().with_default_response("no json here at all");
        let gate = gate_for(backend);

        let items = vec![
            verified("alpha text here", "a"),
            verified("beta text here", "b"),
            verified("gamma text here", "c"),
        ];
        let refined = refine(&gate, 3, 0.4, "intent", None, items).await;

        assert_eq!(refined.len(), 3);
        assert_eq!(refined[0].note, "a");
        assert_eq!(refined[2].note, "c");
    }

    #[tokio::test]
    async fn test_model_failure_falls_back_unchanged() {
        let backend = MockInferenceBackend::new();
        backend.fail_next_completions(1);
        let gate = gate_for(backend);

        let items = vec![
            verified("alpha text here", "a"),
            verified("beta text here", "b"),
            verified("gamma text here", "c"),
        ];
        let refined = refine(&gate, 3, 0.4, "intent", None, items).await;

        assert_eq!(refined.len(), 3);
        assert_eq!(refined[1].note, "b");
    }
}
