//! Retrieval subsystem: keyword search over patterns and records, and
//! embedding search over records.
//!
//! # Semantic search
//!
//! The query is embedded with the configured backend, every active record of
//! the tenant that carries an embedding is scored by cosine similarity, and
//! the top `limit` are returned. Embedding failures propagate to the caller
//! as `UpstreamUnavailable`; the composer is the only caller that degrades.
//!
//! # Constraints
//! * Empty query is a validation error
//! * Limit defaults to `retrieval.default_limit` and is clamped to `[1, max_limit]`
//! * Records without an embedding are skipped
//! * Scores are clamped to `[0, 1]` unless `retrieval.clamp_scores` is off

use deskmate_core::config::RetrievalConfig;
use deskmate_core::corpus::{CorpusProvider, PatternProvider};
use deskmate_core::embeddings::{EmbeddingBackend, EmbeddingError};
use deskmate_core::error::{DeskmateError, Result};
use deskmate_core::models::{KnowledgeRecord, QueryResult};
use deskmate_core::{ranking, vector};
use uuid::Uuid;

fn require_query(query: &str) -> Result<&str> {
    let query = query.trim();
    if query.is_empty() {
        return Err(DeskmateError::validation("query cannot be empty"));
    }
    Ok(query)
}

/// Rank `records` against an embedded `query`.
pub async fn rank_semantic(
    backend: &dyn EmbeddingBackend,
    query: &str,
    records: &[KnowledgeRecord],
    limit: usize,
    config: &RetrievalConfig,
) -> std::result::Result<Vec<QueryResult>, EmbeddingError> {
    let query_vector = backend.embed_query(query).await?;
    let mut results = vector::rank_by_embedding(&query_vector, records, limit);
    if config.clamp_scores {
        for r in &mut results {
            r.similarity_score = r.similarity_score.clamp(0.0, 1.0);
        }
    }
    Ok(results)
}

/// Keyword ranking for a tenant: patterns first, then records.
pub async fn keyword_search(
    corpus: &dyn CorpusProvider,
    patterns: &dyn PatternProvider,
    config: &RetrievalConfig,
    tenant_id: Uuid,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<QueryResult>> {
    let query = require_query(query)?;
    let records = corpus.list_active_records(tenant_id).await?;
    let patterns = patterns.list_patterns(tenant_id).await?;

    let results = ranking::search_knowledge(
        query,
        &records,
        &patterns,
        config.effective_limit(limit),
        config,
    );
    tracing::debug!(tenant_id = %tenant_id, hits = results.len(), "Keyword search complete");
    Ok(results)
}

/// Embedding ranking for a tenant. No pattern step.
pub async fn semantic_search(
    corpus: &dyn CorpusProvider,
    backend: Option<&dyn EmbeddingBackend>,
    config: &RetrievalConfig,
    tenant_id: Uuid,
    query: &str,
    limit: Option<usize>,
) -> Result<Vec<QueryResult>> {
    let query = require_query(query)?;
    let backend = backend
        .ok_or_else(|| DeskmateError::NotConfigured("embedding backend".to_string()))?;

    let records = corpus.list_active_records(tenant_id).await?;
    let results = rank_semantic(backend, query, &records, config.effective_limit(limit), config)
        .await
        .map_err(|e| {
            tracing::error!(tenant_id = %tenant_id, error = %e, "Failed to embed query");
            DeskmateError::UpstreamUnavailable(format!("embedding service: {}", e))
        })?;

    tracing::debug!(tenant_id = %tenant_id, hits = results.len(), "Semantic search complete");
    Ok(results)
}
