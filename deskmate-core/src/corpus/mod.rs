//! Corpus capability: where knowledge records and automation patterns come from.
//!
//! One provider is chosen at startup from `[corpus] provider` and shared by all
//! requests. Callers never query the database per request.

mod demo;
mod postgres;

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::Result;
use crate::models::{AutomationPattern, KnowledgeRecord};

pub use demo::{DemoCorpusProvider, DEMO_TENANT_ID};
pub use postgres::PersistentCorpusProvider;

#[async_trait]
pub trait CorpusProvider: Send + Sync {
    /// Provider name for logging and health output.
    fn name(&self) -> &str;

    /// Active records for a tenant, with embeddings when present.
    async fn list_active_records(&self, tenant_id: Uuid) -> Result<Vec<KnowledgeRecord>>;

    /// One active record. `NotFound` when absent, inactive, or owned by another tenant.
    async fn get_record(&self, tenant_id: Uuid, id: Uuid) -> Result<KnowledgeRecord>;

    /// Insert or replace a record. Replacing clears the stored embedding.
    async fn upsert_record(&self, record: KnowledgeRecord) -> Result<KnowledgeRecord>;

    /// Soft-delete a record by clearing its active flag.
    async fn deactivate_record(&self, tenant_id: Uuid, id: Uuid) -> Result<()>;

    /// Store `embedding` if the record's embedding text still equals
    /// `source_text`. Returns `false` when the record was edited after the
    /// text was read, leaving the stored embedding untouched.
    async fn store_embedding(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        source_text: &str,
        embedding: Vec<f32>,
    ) -> Result<bool>;
}

#[async_trait]
pub trait PatternProvider: Send + Sync {
    async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<AutomationPattern>>;

    async fn add_pattern(&self, pattern: AutomationPattern) -> Result<AutomationPattern>;
}
