//! Process-wide service container shared by the HTTP and IPC transports.

use std::sync::Arc;

use anyhow::Context;
use deskmate_core::config::CorpusKind;
use deskmate_core::corpus::{CorpusProvider, DemoCorpusProvider, PatternProvider, PersistentCorpusProvider};
use deskmate_core::embeddings::EmbeddingBackend;
use deskmate_core::generation::GenerationBackend;
use deskmate_core::DeskmateConfig;

use crate::subsystems::conversations::ConversationStore;
use crate::subsystems::embedder;
use crate::subsystems::escalation::EscalationStore;
use crate::subsystems::messages::Locale;
use crate::subsystems::rate_limit::RateLimiter;

pub struct AppServices {
    pub config: DeskmateConfig,
    pub corpus: Arc<dyn CorpusProvider>,
    pub patterns: Arc<dyn PatternProvider>,
    pub embedder: Option<Arc<dyn EmbeddingBackend>>,
    pub generator: Option<Arc<dyn GenerationBackend>>,
    pub rate_limiter: RateLimiter,
    pub escalations: EscalationStore,
    pub conversations: ConversationStore,
}

impl AppServices {
    /// Build from config. Connects to PostgreSQL when `corpus.provider = "postgres"`.
    pub async fn from_config(config: DeskmateConfig, api_key: Option<&str>) -> anyhow::Result<Self> {
        let embedder = embedder::create_embedding_backend(&config, api_key);
        let generator = embedder::create_generation_backend(&config, api_key);

        let services = match config.corpus.provider {
            CorpusKind::Demo => {
                tracing::info!("Using seeded in-memory demo corpus");
                Self::with_provider(config, Arc::new(DemoCorpusProvider::seeded()))
            }
            CorpusKind::Postgres => {
                let db = config
                    .database
                    .clone()
                    .context("corpus.provider = \"postgres\" requires a [database] section")?;
                let pool = deskmate_core::db::create_pool(&db)
                    .await
                    .context("Failed to connect to database")?;
                deskmate_core::db::ensure_schema(&pool)
                    .await
                    .context("Failed to prepare database schema")?;
                tracing::info!(max_connections = db.max_connections, "Using PostgreSQL corpus");
                Self::with_provider(config, Arc::new(PersistentCorpusProvider::new(pool)))
            }
        };

        Ok(Self {
            embedder,
            generator,
            ..services
        })
    }

    /// One provider serving both records and patterns, no external backends.
    pub fn with_provider<P>(config: DeskmateConfig, provider: Arc<P>) -> Self
    where
        P: CorpusProvider + PatternProvider + 'static,
    {
        Self {
            rate_limiter: RateLimiter::new(&config.rate_limit),
            corpus: provider.clone(),
            patterns: provider,
            embedder: None,
            generator: None,
            escalations: EscalationStore::with_retention(&config.retention),
            conversations: ConversationStore::with_idle(config.retention.conversation_idle()),
            config,
        }
    }

    /// Seeded demo corpus, no external backends.
    pub fn demo(config: DeskmateConfig) -> Self {
        Self::with_provider(config, Arc::new(DemoCorpusProvider::seeded()))
    }

    pub fn with_embedder(mut self, embedder: Arc<dyn EmbeddingBackend>) -> Self {
        self.embedder = Some(embedder);
        self
    }

    pub fn with_generator(mut self, generator: Arc<dyn GenerationBackend>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn locale(&self) -> Locale {
        Locale::parse(&self.config.service.locale)
    }

    /// Drop expired rate-limit windows, idle conversations and old resolved escalations.
    pub fn sweep(&self) {
        self.rate_limiter.sweep();
        let conversations = self.conversations.sweep();
        let escalations = self.escalations.sweep();
        if conversations + escalations > 0 {
            tracing::debug!(conversations, escalations, "Retention sweep dropped entries");
        }
    }

    /// Backend names for health output.
    pub fn describe(&self) -> serde_json::Value {
        serde_json::json!({
            "corpus": self.corpus.name(),
            "embedding": self.embedder.as_ref().map(|b| b.name().to_string()),
            "generation": self.generator.as_ref().map(|b| b.name().to_string()),
            "locale": self.config.service.locale,
            "conversations": self.conversations.len(),
            "rate_limited_keys": self.rate_limiter.tracked_keys(),
        })
    }
}
