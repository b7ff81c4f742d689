//! Embedder subsystem: builds the external backends and writes record vectors.
//!
//! Record embedding runs in `tokio::spawn` after the upsert response is sent,
//! so writers never wait on the embedding service.

use std::sync::Arc;

use anyhow::Context;
use deskmate_core::{
    corpus::CorpusProvider,
    embeddings::{EmbeddingBackend, EmbeddingClientConfig, OpenAiEmbeddingClient},
    generation::{GenerationBackend, OpenAiChatClient},
    DeskmateConfig,
};
use uuid::Uuid;

fn usable_key(api_key: Option<&str>) -> Option<&str> {
    api_key.map(str::trim).filter(|k| !k.is_empty())
}

/// Embedding backend from `[embedding]`, or `None` without an API key.
pub fn create_embedding_backend(
    config: &DeskmateConfig,
    api_key: Option<&str>,
) -> Option<Arc<dyn EmbeddingBackend>> {
    let Some(key) = usable_key(api_key) else {
        tracing::warn!("No embedding API key configured, semantic retrieval disabled");
        return None;
    };

    match OpenAiEmbeddingClient::new(EmbeddingClientConfig::from_config(&config.embedding, key)) {
        Ok(client) => {
            tracing::info!(
                model = %config.embedding.model,
                dimensions = config.embedding.dimensions,
                "Embedding backend ready"
            );
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create embedding backend");
            None
        }
    }
}

/// Generation backend from `[generation]`, or `None` without an API key.
pub fn create_generation_backend(
    config: &DeskmateConfig,
    api_key: Option<&str>,
) -> Option<Arc<dyn GenerationBackend>> {
    let Some(key) = usable_key(api_key) else {
        tracing::warn!("No generation API key configured, answers will use templated fallback");
        return None;
    };

    match OpenAiChatClient::new(&config.generation, key) {
        Ok(client) => {
            tracing::info!(model = %config.generation.model, "Generation backend ready");
            Some(Arc::new(client))
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to create generation backend");
            None
        }
    }
}

/// Embed one record's `title + body` and store the vector.
///
/// Returns `false` when the record was edited while the embedding was in
/// flight. The vector is then discarded and the task for the newer write
/// stores its own.
pub async fn embed_record(
    corpus: &dyn CorpusProvider,
    backend: &dyn EmbeddingBackend,
    tenant_id: Uuid,
    id: Uuid,
) -> anyhow::Result<bool> {
    let record = corpus.get_record(tenant_id, id).await?;
    let text = record.embedding_text();

    let embedding = backend
        .embed(&text)
        .await
        .with_context(|| format!("embedding record {}", id))?;

    let stored = corpus.store_embedding(tenant_id, id, &text, embedding).await?;
    if stored {
        tracing::debug!(tenant_id = %tenant_id, record_id = %id, backend = backend.name(), "Record embedded");
    } else {
        tracing::debug!(tenant_id = %tenant_id, record_id = %id, "Record changed while embedding, vector discarded");
    }
    Ok(stored)
}

/// Spawn an async task to embed a freshly written record.
pub fn spawn_embed_task(
    corpus: Arc<dyn CorpusProvider>,
    backend: Arc<dyn EmbeddingBackend>,
    tenant_id: Uuid,
    id: Uuid,
) {
    tokio::spawn(async move {
        match embed_record(corpus.as_ref(), backend.as_ref(), tenant_id, id).await {
            Ok(true) => tracing::info!(tenant_id = %tenant_id, record_id = %id, "Background embedding completed"),
            Ok(false) => tracing::info!(tenant_id = %tenant_id, record_id = %id, "Background embedding superseded by a newer edit"),
            Err(e) => tracing::warn!(
                tenant_id = %tenant_id,
                record_id = %id,
                error = %format!("{:#}", e),
                "Background embedding failed, record stays keyword-only until reindex"
            ),
        }
    });
}
