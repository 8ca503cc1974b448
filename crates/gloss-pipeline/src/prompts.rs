//! Prompt construction for the three model-facing pipeline stages.
//!
//! Each stage states its exact JSON output shape in the prompt; responses
//! are validated at the provider boundary regardless.

use gloss_core::models::{Candidate, DocumentContext, VerifiedCandidate};

/// System prompt for the candidate generator.
pub fn generator_system() -> &'static str {
    "You are a research assistant extracting annotation-worthy passages from \
     academic and professional documents. You only ever quote text verbatim \
     from the excerpt you are given. You never select citations, reference \
     entries, page numbers, figure or table captions, author metadata, or \
     other boilerplate — only substantive content."
}

/// User prompt asking for up to `max_candidates` spans from one chunk.
pub fn generator_prompt(
    chunk_text: &str,
    intent: &str,
    context: Option<&DocumentContext>,
    max_candidates: usize,
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Research intent: {}\n\n", intent));

    if let Some(context) = context {
        if let Some(summary) = &context.summary {
            prompt.push_str(&format!("Document summary: {}\n", summary));
        }
        if !context.key_concepts.is_empty() {
            prompt.push_str(&format!(
                "Key concepts: {}\n",
                context.key_concepts.join(", ")
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str(&format!(
        "Excerpt:\n---\n{}\n---\n\n\
         Propose up to {} passages from the excerpt that answer the research \
         intent. Copy each passage character-for-character from the excerpt. \
         Skip anything that looks like a citation, reference entry, or page \
         furniture.\n\n\
         Respond with a JSON array, each element:\n\
         {{\"start\": <byte offset in excerpt>, \"end\": <byte offset>, \
         \"text\": \"<verbatim passage>\", \
         \"category\": \"key_quote|argument|evidence|methodology\", \
         \"note\": \"<one sentence on why this matters>\", \
         \"confidence\": <0.0-1.0>}}\n\n\
         Respond with [] if nothing qualifies.",
        chunk_text, max_candidates
    ));
    prompt
}

/// System prompt for the soft verifier.
pub fn verifier_system() -> &'static str {
    "You are a strict reviewer of proposed document annotations. You judge \
     each candidate for topical relevance to the research intent, \
     substantiveness, and category correctness. You never invent new \
     passages and never change offsets."
}

/// User prompt asking for a quality verdict on each surviving candidate.
pub fn verifier_prompt(intent: &str, candidates: &[Candidate]) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Research intent: {}\n\n", intent));
    prompt.push_str("Judge each candidate annotation below.\n\n");

    for (index, candidate) in candidates.iter().enumerate() {
        prompt.push_str(&format!(
            "Candidate {}:\n  text: {:?}\n  category: {}\n  note: {:?}\n",
            index, candidate.text, candidate.category, candidate.note
        ));
    }

    prompt.push_str(
        "\nFor every candidate, respond with a JSON array element:\n\
         {\"index\": <candidate number>, \"score\": <0.0-1.0 quality score>, \
         \"category\": \"<corrected category, optional>\", \
         \"note\": \"<improved note, optional>\"}\n\n\
         Score relevance to the intent and substantiveness; penalize \
         boilerplate, trivial fragments, and miscategorized spans.",
    );
    prompt
}

/// System prompt for the refiner.
pub fn refiner_system() -> &'static str {
    "You are an editor polishing annotation notes. You explain why each \
     highlighted passage matters for the research intent instead of \
     restating it. You never alter the highlighted text itself."
}

/// User prompt asking for improved notes and confirmed categories.
pub fn refiner_prompt(
    intent: &str,
    context: Option<&DocumentContext>,
    verified: &[VerifiedCandidate],
) -> String {
    let mut prompt = String::new();
    prompt.push_str(&format!("Research intent: {}\n", intent));
    if let Some(summary) = context.and_then(|c| c.summary.as_deref()) {
        prompt.push_str(&format!("Document summary: {}\n", summary));
    }
    prompt.push('\n');
    prompt.push_str("Rewrite each note below so it explains why the passage matters to the intent, and confirm or correct the category.\n\n");

    for (index, item) in verified.iter().enumerate() {
        prompt.push_str(&format!(
            "Item {}:\n  text: {:?}\n  category: {}\n  note: {:?}\n",
            index, item.candidate.text, item.candidate.category, item.candidate.note
        ));
    }

    prompt.push_str(
        "\nRespond with a JSON array, one element per item:\n\
         {\"index\": <item number>, \"note\": \"<rewritten note>\", \
         \"category\": \"key_quote|argument|evidence|methodology\"}",
    );
    prompt
}
