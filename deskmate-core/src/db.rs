use crate::config::DatabaseConfig;
use sqlx::{postgres::PgPoolOptions, PgPool};

/// Schema for the persistent corpus. Statements are idempotent.
const SCHEMA: &[&str] = &[
    "CREATE EXTENSION IF NOT EXISTS vector",
    r#"
    CREATE TABLE IF NOT EXISTS knowledge_items (
        id          UUID PRIMARY KEY,
        company_id  UUID NOT NULL,
        title       TEXT NOT NULL,
        body        TEXT NOT NULL,
        item_type   TEXT NOT NULL DEFAULT 'faq',
        tags        TEXT[] NOT NULL DEFAULT '{}',
        media_urls  TEXT[] NOT NULL DEFAULT '{}',
        embedding   vector,
        is_active   BOOLEAN NOT NULL DEFAULT TRUE,
        updated_at  TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
    "CREATE INDEX IF NOT EXISTS knowledge_items_company_active ON knowledge_items (company_id) WHERE is_active",
    r#"
    CREATE TABLE IF NOT EXISTS automation_patterns (
        id                 UUID PRIMARY KEY,
        company_id         UUID NOT NULL,
        manager_name       TEXT NOT NULL,
        example_questions  TEXT[] NOT NULL DEFAULT '{}',
        raw_answer         TEXT NOT NULL,
        created_at         TIMESTAMPTZ NOT NULL DEFAULT NOW()
    )
    "#,
];

pub async fn create_pool(config: &DatabaseConfig) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .connect(&config.url)
        .await
}

pub async fn ensure_schema(pool: &PgPool) -> Result<(), sqlx::Error> {
    for statement in SCHEMA {
        sqlx::query(statement).execute(pool).await?;
    }
    tracing::debug!("Corpus schema ensured");
    Ok(())
}

pub async fn health_check(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) = sqlx::query_as("SELECT version()").fetch_one(pool).await?;
    Ok(row.0)
}

pub async fn check_pgvector(pool: &PgPool) -> Result<String, sqlx::Error> {
    let row: (String,) =
        sqlx::query_as("SELECT extversion FROM pg_extension WHERE extname = 'vector'")
            .fetch_one(pool)
            .await?;
    Ok(row.0)
}
