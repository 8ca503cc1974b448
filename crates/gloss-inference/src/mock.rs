//! Mock inference backend for deterministic testing.
//!
//! Provides a mock implementation of both backend traits with scripted
//! responses, a call log for assertions, and latency/failure injection.
//!
//! ## Usage
//!
//! ```rust
//! use gloss_inference::mock::MockInferenceBackend;
//!
//! let backend = MockInferenceBackend::new()
//!     .with_dimension(8)
//!     .with_response_rule("propose", r#"[]"#);
//! ```

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use gloss_core::{CompletionBackend, CompletionRequest, EmbeddingBackend, Error, Result, Vector};

/// Mock inference backend for testing.
#[derive(Clone)]
pub struct MockInferenceBackend {
    config: Arc<MockConfig>,
    state: Arc<Mutex<MockState>>,
}

#[derive(Debug, Clone)]
struct MockConfig {
    dimension: usize,
    /// (needle, response): first rule whose needle appears in the prompt wins.
    response_rules: Vec<(String, String)>,
    /// (needle, vector): first rule whose needle appears in the text wins.
    embedding_rules: Vec<(String, Vec<f32>)>,
    default_response: String,
    latency_ms: u64,
    failure_rate: f64,
}

#[derive(Debug, Default)]
struct MockState {
    /// Responses consumed before rules, in order.
    queued_responses: VecDeque<String>,
    /// Forced failures remaining for completion calls.
    failing_completions: usize,
    /// Forced failures remaining for embedding calls.
    failing_embeddings: usize,
    call_log: Vec<MockCall>,
}

/// One logged backend call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub operation: String,
    pub input: String,
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            dimension: 8,
            response_rules: Vec::new(),
            embedding_rules: Vec::new(),
            default_response: "[]".to_string(),
            latency_ms: 0,
            failure_rate: 0.0,
        }
    }
}

impl MockInferenceBackend {
    /// Create a new mock backend with default configuration.
    pub fn new() -> Self {
        Self {
            config: Arc::new(MockConfig::default()),
            state: Arc::new(Mutex::new(MockState::default())),
        }
    }

    /// Set the embedding dimension.
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        Arc::make_mut(&mut self.config).dimension = dimension;
        self
    }

    /// Set the fallback response for completion requests.
    pub fn with_default_response(mut self, response: impl Into<String>) -> Self {
        Arc::make_mut(&mut self.config).default_response = response.into();
        self
    }

    /// Respond with `response` whenever `needle` appears in the prompt.
    /// Rules are checked in insertion order.
    pub fn with_response_rule(
        mut self,
        needle: impl Into<String>,
        response: impl Into<String>,
    ) -> Self {
        Arc::make_mut(&mut self.config)
            .response_rules
            .push((needle.into(), response.into()));
        self
    }

    /// Embed any text containing `needle` as the given vector.
    pub fn with_embedding_rule(mut self, needle: impl Into<String>, vector: Vec<f32>) -> Self {
        Arc::make_mut(&mut self.config)
            .embedding_rules
            .push((needle.into(), vector));
        self
    }

    /// Set simulated latency for all operations.
    pub fn with_latency_ms(mut self, latency_ms: u64) -> Self {
        Arc::make_mut(&mut self.config).latency_ms = latency_ms;
        self
    }

    /// Set a random failure rate (0.0 - 1.0) for testing error handling.
    pub fn with_failure_rate(mut self, rate: f64) -> Self {
        Arc::make_mut(&mut self.config).failure_rate = rate.clamp(0.0, 1.0);
        self
    }

    /// Queue a response consumed (in order) before any rule matching.
    pub fn queue_response(&self, response: impl Into<String>) {
        self.state
            .lock()
            .unwrap()
            .queued_responses
            .push_back(response.into());
    }

    /// Force the next `count` completion calls to fail.
    pub fn fail_next_completions(&self, count: usize) {
        self.state.lock().unwrap().failing_completions = count;
    }

    /// Force the next `count` embedding calls to fail.
    pub fn fail_next_embeddings(&self, count: usize) {
        self.state.lock().unwrap().failing_embeddings = count;
    }

    /// Get all logged calls for assertion.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().call_log.clone()
    }

    /// Number of completion calls made.
    pub fn completion_call_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == "complete")
            .count()
    }

    /// Number of embedding calls made.
    pub fn embed_call_count(&self) -> usize {
        self.state
            .lock()
            .unwrap()
            .call_log
            .iter()
            .filter(|c| c.operation == "embed")
            .count()
    }

    fn log_call(&self, operation: &str, input: &str) {
        self.state.lock().unwrap().call_log.push(MockCall {
            operation: operation.to_string(),
            input: input.to_string(),
        });
    }

    fn should_randomly_fail(&self) -> bool {
        use rand::Rng;
        self.config.failure_rate > 0.0
            && rand::thread_rng().gen::<f64>() < self.config.failure_rate
    }

    async fn simulate_latency(&self) {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(std::time::Duration::from_millis(self.config.latency_ms)).await;
        }
    }

    /// Deterministic embedding derived from text bytes.
    fn derive_embedding(&self, text: &str) -> Vector {
        let dim = self.config.dimension;
        let mut values = vec![0.0f32; dim];
        for (i, byte) in text.bytes().enumerate() {
            values[i % dim] += byte as f32 / 255.0;
        }
        let norm: f32 = values.iter().map(|v| v * v).sum::<f32>().sqrt();
        if norm > 0.0 {
            for v in values.iter_mut() {
                *v /= norm;
            }
        }
        Vector::from(values)
    }
}

impl Default for MockInferenceBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EmbeddingBackend for MockInferenceBackend {
    async fn embed_texts(&self, texts: &[String]) -> Result<Vec<Vector>> {
        for text in texts {
            self.log_call("embed", text);
        }
        self.simulate_latency().await;

        {
            let mut state = self.state.lock().unwrap();
            if state.failing_embeddings > 0 {
                state.failing_embeddings -= 1;
                return Err(Error::Embedding("mock embedding failure".to_string()));
            }
        }
        if self.should_randomly_fail() {
            return Err(Error::Embedding("mock random failure".to_string()));
        }

        Ok(texts
            .iter()
            .map(|text| {
                self.config
                    .embedding_rules
                    .iter()
                    .find(|(needle, _)| text.contains(needle))
                    .map(|(_, v)| Vector::from(v.clone()))
                    .unwrap_or_else(|| self.derive_embedding(text))
            })
            .collect())
    }

    fn dimension(&self) -> usize {
        self.config.dimension
    }

    fn model_name(&self) -> &str {
        "mock-embed"
    }
}

#[async_trait]
impl CompletionBackend for MockInferenceBackend {
    async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        self.log_call("complete", &request.prompt);
        self.simulate_latency().await;

        {
            let mut state = self.state.lock().unwrap();
            if state.failing_completions > 0 {
                state.failing_completions -= 1;
                return Err(Error::Inference("mock completion failure".to_string()));
            }
            if let Some(queued) = state.queued_responses.pop_front() {
                return Ok(queued);
            }
        }
        if self.should_randomly_fail() {
            return Err(Error::Inference("mock random failure".to_string()));
        }

        let haystack = format!("{}\n{}", request.system, request.prompt);
        Ok(self
            .config
            .response_rules
            .iter()
            .find(|(needle, _)| haystack.contains(needle))
            .map(|(_, response)| response.clone())
            .unwrap_or_else(|| self.config.default_response.clone()))
    }

    fn model_name(&self) -> &str {
        "mock-gen"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_embeddings_are_deterministic() {
        let backend = MockInferenceBackend::new().with_dimension(16);
        let texts = vec!["same text".to_string()];

        let a = backend.embed_texts(&texts).await.unwrap();
        let b = backend.embed_texts(&texts).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(a[0].len(), 16);
    }

    #[tokio::test]
    async fn test_embedding_rule_overrides_derivation() {
        let backend = MockInferenceBackend::new()
            .with_dimension(2)
            .with_embedding_rule("special", vec![1.0, 0.0]);

        let vectors = backend
            .embed_texts(&["very special text".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors[0].as_slice(), &[1.0, 0.0]);
    }

    #[tokio::test]
    async fn test_response_rules_match_prompt() {
        let backend = MockInferenceBackend::new()
            .with_response_rule("alpha", "first")
            .with_response_rule("beta", "second");

        let req = CompletionRequest::new("", "this mentions beta only");
        assert_eq!(backend.complete(&req).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_queued_responses_win_over_rules() {
        let backend = MockInferenceBackend::new().with_response_rule("x", "rule");
        backend.queue_response("queued");

        let req = CompletionRequest::new("", "x");
        assert_eq!(backend.complete(&req).await.unwrap(), "queued");
        assert_eq!(backend.complete(&req).await.unwrap(), "rule");
    }

    #[tokio::test]
    async fn test_forced_failures_then_recovery() {
        let backend = MockInferenceBackend::new().with_default_response("ok");
        backend.fail_next_completions(2);

        let req = CompletionRequest::new("", "p");
        assert!(backend.complete(&req).await.is_err());
        assert!(backend.complete(&req).await.is_err());
        assert_eq!(backend.complete(&req).await.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_call_log_counts() {
        let backend = MockInferenceBackend::new();
        let req = CompletionRequest::new("", "p");
        backend.complete(&req).await.unwrap();
        backend
            .embed_texts(&["a".to_string(), "b".to_string()])
            .await
            .unwrap();

        assert_eq!(backend.completion_call_count(), 1);
        assert_eq!(backend.embed_call_count(), 2);
        assert_eq!(backend.calls().len(), 3);
    }
}
