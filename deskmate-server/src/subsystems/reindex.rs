//! Re-index a tenant's knowledge records.
//!
//! Every active record is re-embedded from `title + body` and the vector is
//! written back through the corpus provider. Records are processed one at a
//! time; a failed record is logged and skipped, nothing is rolled back.

use deskmate_core::corpus::CorpusProvider;
use deskmate_core::embeddings::EmbeddingBackend;
use deskmate_core::error::Result;
use serde::Serialize;
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ReindexReport {
    pub embedded: usize,
    pub skipped: usize,
}

pub async fn reindex_tenant(
    corpus: &dyn CorpusProvider,
    backend: &dyn EmbeddingBackend,
    tenant_id: Uuid,
) -> Result<ReindexReport> {
    let records = corpus.list_active_records(tenant_id).await?;
    let mut report = ReindexReport::default();

    tracing::info!(tenant_id = %tenant_id, records = records.len(), backend = backend.name(), "Reindex started");

    for record in &records {
        let text = record.embedding_text();
        let embedding = match backend.embed(&text).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, record_id = %record.id, error = %e, "Reindex skipped record");
                report.skipped += 1;
                continue;
            }
        };

        match corpus.store_embedding(tenant_id, record.id, &text, embedding).await {
            Ok(true) => report.embedded += 1,
            Ok(false) => {
                // the edit spawned its own embedding task
                tracing::debug!(tenant_id = %tenant_id, record_id = %record.id, "Record edited during reindex");
                report.skipped += 1;
            }
            Err(e) => {
                tracing::warn!(tenant_id = %tenant_id, record_id = %record.id, error = %e, "Reindex failed to store vector");
                report.skipped += 1;
            }
        }
    }

    tracing::info!(
        tenant_id = %tenant_id,
        embedded = report.embedded,
        skipped = report.skipped,
        "Reindex complete"
    );
    Ok(report)
}
