//! Global throttle on outbound model calls.

use std::sync::Arc;

use tokio::sync::Semaphore;

use gloss_core::{CompletionBackend, CompletionRequest, Error, Result};

/// Completion backend wrapped with the run-wide concurrency cap.
///
/// Every generator, soft-verifier, and refiner call goes through one gate,
/// so a multi-prompt fan-out cannot exceed the cap in aggregate.
#[derive(Clone)]
pub(crate) struct ModelGate {
    backend: Arc<dyn CompletionBackend>,
    permits: Arc<Semaphore>,
}

impl ModelGate {
    pub(crate) fn new(backend: Arc<dyn CompletionBackend>, permits: Arc<Semaphore>) -> Self {
        Self { backend, permits }
    }

    pub(crate) async fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let _permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| Error::Internal("Model call semaphore closed".to_string()))?;
        self.backend.complete(request).await
    }
}
