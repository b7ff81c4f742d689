//! In-process backends for subsystem tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use deskmate_core::embeddings::{EmbeddingBackend, EmbeddingError};
use deskmate_core::generation::{CompletionRequest, GenerationBackend, GenerationError};
use tokio::sync::Notify;

/// Embeds text as one axis per keyword it contains, plus a constant bias axis.
pub struct MockEmbedder {
    axes: Vec<String>,
    fail: AtomicBool,
    calls: AtomicUsize,
}

impl MockEmbedder {
    pub fn with_axes(axes: &[&str]) -> Self {
        Self {
            axes: axes.iter().map(|a| a.to_lowercase()).collect(),
            fail: AtomicBool::new(false),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing() -> Self {
        let embedder = Self::with_axes(&[]);
        embedder.fail.store(true, Ordering::SeqCst);
        embedder
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        let mut v: Vec<f32> = self
            .axes
            .iter()
            .map(|axis| if lower.contains(axis.as_str()) { 1.0 } else { 0.0 })
            .collect();
        v.push(0.1);
        v
    }
}

#[async_trait]
impl EmbeddingBackend for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail.load(Ordering::SeqCst) {
            return Err(EmbeddingError::Api {
                code: 503,
                message: "mock outage".to_string(),
            });
        }
        Ok(self.vector_for(text))
    }

    fn dimensions(&self) -> usize {
        self.axes.len() + 1
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// A [`MockEmbedder`] that parks any text containing `gate` until released.
pub struct GatedEmbedder {
    inner: MockEmbedder,
    gate: String,
    pub entered: Notify,
    pub release: Notify,
}

impl GatedEmbedder {
    pub fn new(axes: &[&str], gate: &str) -> Self {
        Self {
            inner: MockEmbedder::with_axes(axes),
            gate: gate.to_lowercase(),
            entered: Notify::new(),
            release: Notify::new(),
        }
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        self.inner.vector_for(text)
    }
}

#[async_trait]
impl EmbeddingBackend for GatedEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>, EmbeddingError> {
        if text.to_lowercase().contains(&self.gate) {
            self.entered.notify_one();
            self.release.notified().await;
        }
        self.inner.embed(text).await
    }

    fn dimensions(&self) -> usize {
        self.inner.dimensions()
    }

    fn name(&self) -> &str {
        "gated-mock"
    }
}

/// Returns a fixed reply (or fails) and keeps the last request it saw.
pub struct MockGenerator {
    reply: Option<String>,
    last: Mutex<Option<CompletionRequest>>,
}

impl MockGenerator {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: Some(reply.to_string()),
            last: Mutex::new(None),
        }
    }

    pub fn failing() -> Self {
        Self {
            reply: None,
            last: Mutex::new(None),
        }
    }

    pub fn last_request(&self) -> Option<CompletionRequest> {
        self.last.lock().unwrap().clone()
    }
}

#[async_trait]
impl GenerationBackend for MockGenerator {
    async fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        *self.last.lock().unwrap() = Some(request.clone());
        match &self.reply {
            Some(text) => Ok(text.clone()),
            None => Err(GenerationError::Api {
                code: 500,
                message: "mock failure".to_string(),
            }),
        }
    }

    fn name(&self) -> &str {
        "mock-chat"
    }
}
