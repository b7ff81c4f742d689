use async_trait::async_trait;
use chrono::{DateTime, Utc};
use pgvector::Vector;
use sqlx::PgPool;
use uuid::Uuid;

use super::{CorpusProvider, PatternProvider};
use crate::error::{DeskmateError, Result};
use crate::models::{AutomationPattern, KnowledgeRecord, RecordType};

/// Corpus backed by the `knowledge_items` and `automation_patterns` tables.
#[derive(Debug, Clone)]
pub struct PersistentCorpusProvider {
    pool: PgPool,
}

impl PersistentCorpusProvider {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[derive(sqlx::FromRow)]
struct KnowledgeRow {
    id: Uuid,
    company_id: Uuid,
    title: String,
    body: String,
    item_type: String,
    tags: Vec<String>,
    media_urls: Vec<String>,
    embedding: Option<Vector>,
    is_active: bool,
    updated_at: DateTime<Utc>,
}

impl From<KnowledgeRow> for KnowledgeRecord {
    fn from(row: KnowledgeRow) -> Self {
        let record_type = row.item_type.parse().unwrap_or_else(|e| {
            tracing::warn!(id = %row.id, error = %e, "Unknown item_type, treating as faq");
            RecordType::Faq
        });

        KnowledgeRecord {
            id: row.id,
            tenant_id: row.company_id,
            title: row.title,
            body: row.body,
            record_type,
            tags: row.tags.into_iter().collect(),
            media_urls: row.media_urls,
            embedding: row.embedding.map(|v| v.to_vec()),
            is_active: row.is_active,
            updated_at: row.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct PatternRow {
    id: Uuid,
    company_id: Uuid,
    manager_name: String,
    example_questions: Vec<String>,
    raw_answer: String,
}

impl From<PatternRow> for AutomationPattern {
    fn from(row: PatternRow) -> Self {
        AutomationPattern {
            id: row.id,
            tenant_id: row.company_id,
            manager_name: row.manager_name,
            example_questions: row.example_questions,
            raw_answer: row.raw_answer,
        }
    }
}

const RECORD_COLUMNS: &str =
    "id, company_id, title, body, item_type, tags, media_urls, embedding, is_active, updated_at";

#[async_trait]
impl CorpusProvider for PersistentCorpusProvider {
    fn name(&self) -> &str {
        "postgres"
    }

    async fn list_active_records(&self, tenant_id: Uuid) -> Result<Vec<KnowledgeRecord>> {
        let rows: Vec<KnowledgeRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM knowledge_items \
             WHERE company_id = $1 AND is_active \
             ORDER BY updated_at DESC"
        ))
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(KnowledgeRecord::from).collect())
    }

    async fn get_record(&self, tenant_id: Uuid, id: Uuid) -> Result<KnowledgeRecord> {
        let row: Option<KnowledgeRow> = sqlx::query_as(&format!(
            "SELECT {RECORD_COLUMNS} FROM knowledge_items \
             WHERE id = $1 AND company_id = $2 AND is_active"
        ))
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        row.map(KnowledgeRecord::from)
            .ok_or_else(|| DeskmateError::not_found(format!("knowledge record {}", id)))
    }

    async fn upsert_record(&self, record: KnowledgeRecord) -> Result<KnowledgeRecord> {
        let tags: Vec<String> = record.tags.iter().cloned().collect();
        let result = sqlx::query(
            r#"
            INSERT INTO knowledge_items
                (id, company_id, title, body, item_type, tags, media_urls, embedding, is_active, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, NULL, TRUE, NOW())
            ON CONFLICT (id) DO UPDATE SET
                title = EXCLUDED.title,
                body = EXCLUDED.body,
                item_type = EXCLUDED.item_type,
                tags = EXCLUDED.tags,
                media_urls = EXCLUDED.media_urls,
                embedding = NULL,
                is_active = TRUE,
                updated_at = NOW()
            WHERE knowledge_items.company_id = EXCLUDED.company_id
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(&record.title)
        .bind(&record.body)
        .bind(record.record_type.as_str())
        .bind(&tags)
        .bind(&record.media_urls)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskmateError::not_found(format!("knowledge record {}", record.id)));
        }

        tracing::info!(id = %record.id, tenant = %record.tenant_id, "Knowledge record saved");
        Ok(record)
    }

    async fn deactivate_record(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let result = sqlx::query(
            "UPDATE knowledge_items SET is_active = FALSE, updated_at = NOW() \
             WHERE id = $1 AND company_id = $2",
        )
        .bind(id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(DeskmateError::not_found(format!("knowledge record {}", id)));
        }
        Ok(())
    }

    async fn store_embedding(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        source_text: &str,
        embedding: Vec<f32>,
    ) -> Result<bool> {
        let vector = Vector::from(embedding);
        let result = sqlx::query(
            "UPDATE knowledge_items SET embedding = $1 \
             WHERE id = $2 AND company_id = $3 AND title || chr(10) || body = $4",
        )
        .bind(&vector)
        .bind(id)
        .bind(tenant_id)
        .bind(source_text)
        .execute(&self.pool)
        .await?;

        if result.rows_affected() > 0 {
            return Ok(true);
        }

        let exists: Option<(i32,)> =
            sqlx::query_as("SELECT 1 FROM knowledge_items WHERE id = $1 AND company_id = $2")
                .bind(id)
                .bind(tenant_id)
                .fetch_optional(&self.pool)
                .await?;
        match exists {
            Some(_) => Ok(false),
            None => Err(DeskmateError::not_found(format!("knowledge record {}", id))),
        }
    }
}

#[async_trait]
impl PatternProvider for PersistentCorpusProvider {
    async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<AutomationPattern>> {
        let rows: Vec<PatternRow> = sqlx::query_as(
            "SELECT id, company_id, manager_name, example_questions, raw_answer \
             FROM automation_patterns WHERE company_id = $1 ORDER BY created_at",
        )
        .bind(tenant_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(AutomationPattern::from).collect())
    }

    async fn add_pattern(&self, pattern: AutomationPattern) -> Result<AutomationPattern> {
        sqlx::query(
            "INSERT INTO automation_patterns (id, company_id, manager_name, example_questions, raw_answer) \
             VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(pattern.id)
        .bind(pattern.tenant_id)
        .bind(&pattern.manager_name)
        .bind(&pattern.example_questions)
        .bind(&pattern.raw_answer)
        .execute(&self.pool)
        .await?;

        Ok(pattern)
    }
}
