//! LLM provider abstraction
//!
//! Provides a common streaming interface over the OpenAI, Anthropic and Gemini
//! chat APIs.

mod anthropic;
mod error;
mod gemini;
mod models;
mod openai;
mod registry;
mod streaming;
mod types;

pub use anthropic::AnthropicService;
pub use error::{LlmError, LlmErrorKind};
pub use gemini::GeminiService;
pub use models::Provider;
pub use openai::OpenAIService;
pub use registry::{LlmConfig, ModelRegistry};
pub use types::*;

use async_trait::async_trait;
use futures::StreamExt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

/// Common interface for LLM providers
#[async_trait]
pub trait LlmService: Send + Sync {
    /// Open a streaming completion; resolves once the provider has accepted
    /// the request and yields text deltas from then on.
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError>;

    /// Get the model ID
    fn model_id(&self) -> &str;
}

/// Logging wrapper for LLM services
pub struct LoggingService {
    inner: Arc<dyn LlmService>,
    model_id: String,
}

impl LoggingService {
    pub fn new(inner: Arc<dyn LlmService>) -> Self {
        let model_id = inner.model_id().to_string();
        Self { inner, model_id }
    }
}

#[async_trait]
impl LlmService for LoggingService {
    async fn stream(&self, request: &LlmRequest) -> Result<TextStream, LlmError> {
        let start = Instant::now();
        let result = self.inner.stream(request).await;

        match result {
            Ok(stream) => {
                tracing::info!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    messages = request.messages.len(),
                    "LLM stream opened"
                );

                let model = self.model_id.clone();
                let chars = Arc::new(AtomicUsize::new(0));
                let total = chars.clone();
                let logged = stream
                    .inspect(move |item| match item {
                        Ok(text) => {
                            chars.fetch_add(text.len(), Ordering::Relaxed);
                        }
                        Err(e) => tracing::error!(
                            model = %model,
                            error = %e.message,
                            "LLM stream failed"
                        ),
                    })
                    .chain(futures::stream::poll_fn(move |_| {
                        tracing::debug!(
                            duration_ms = %start.elapsed().as_millis(),
                            bytes = total.load(Ordering::Relaxed),
                            "LLM stream finished"
                        );
                        std::task::Poll::Ready(None)
                    }));

                Ok(Box::pin(logged))
            }
            Err(e) => {
                tracing::error!(
                    model = %self.model_id,
                    duration_ms = %start.elapsed().as_millis(),
                    error = %e.message,
                    retryable = e.kind.is_retryable(),
                    "LLM request failed"
                );
                Err(e)
            }
        }
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
