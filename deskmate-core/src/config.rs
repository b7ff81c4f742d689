use std::time::Duration;

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Deserialize, Clone)]
pub struct DeskmateConfig {
    pub service: ServiceConfig,
    #[serde(default)]
    pub database: Option<DatabaseConfig>,
    #[serde(default)]
    pub corpus: CorpusConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub generation: GenerationConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServiceConfig {
    pub socket_path: String,
    pub log_level: String,
    /// Locale for user-facing fallback messages ("he" or "en").
    #[serde(default = "default_locale")]
    pub locale: String,
}

fn default_locale() -> String {
    "he".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// Which corpus provider backs retrieval. Chosen once at startup.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum CorpusKind {
    #[default]
    Demo,
    Postgres,
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct CorpusConfig {
    #[serde(default)]
    pub provider: CorpusKind,
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    pub base_url: String,
    pub model: String,
    pub dimensions: u32,
    pub max_retries: usize,
    pub retry_delay_ms: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            max_retries: 3,
            retry_delay_ms: 1000,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct GenerationConfig {
    pub base_url: String,
    pub model: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub timeout_seconds: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.openai.com/v1".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            max_tokens: 500,
            timeout_seconds: 30,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetrievalConfig {
    pub default_limit: usize,
    pub max_limit: usize,
    /// A pattern is a candidate only when its best keyword score exceeds this.
    pub pattern_min_score: f64,
    pub pattern_boost: f64,
    /// Pattern results above this score are returned verbatim.
    pub pattern_shortcut_score: f64,
    pub title_weight: f64,
    pub record_min_score: f64,
    /// Clamp every final score into [0, 1].
    pub clamp_scores: bool,
    pub excerpt_chars: usize,
    /// Answers below this confidence are escalated to a manager.
    pub escalation_threshold: f64,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            default_limit: 5,
            max_limit: 20,
            pattern_min_score: 0.3,
            pattern_boost: 0.2,
            pattern_shortcut_score: 0.6,
            title_weight: 1.5,
            record_min_score: 0.2,
            clamp_scores: true,
            excerpt_chars: 500,
            escalation_threshold: 0.4,
        }
    }
}

impl RetrievalConfig {
    /// Resolve a caller-supplied limit: default when absent, clamped to `[1, max_limit]`.
    pub fn effective_limit(&self, requested: Option<usize>) -> usize {
        requested
            .unwrap_or(self.default_limit)
            .clamp(1, self.max_limit.max(1))
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct RateLimitConfig {
    pub requests_per_window: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_window: 30,
            window_seconds: 60,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct HttpConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            host: "127.0.0.1".to_string(),
            port: 8780,
        }
    }
}

/// How long in-memory conversation and escalation state is kept.
#[derive(Debug, Deserialize, Clone)]
#[serde(default)]
pub struct RetentionConfig {
    /// Conversations with no new turn for this long are forgotten.
    pub conversation_idle_minutes: u64,
    /// Resolved escalations are dropped this long after resolution.
    pub resolved_escalation_hours: u64,
    /// Per-tenant cap on pending escalations; the oldest are dropped first.
    pub max_pending_escalations: usize,
    pub sweep_interval_secs: u64,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            conversation_idle_minutes: 240,
            resolved_escalation_hours: 24,
            max_pending_escalations: 1000,
            sweep_interval_secs: 60,
        }
    }
}

impl RetentionConfig {
    pub fn conversation_idle(&self) -> Duration {
        Duration::from_secs(self.conversation_idle_minutes * 60)
    }

    pub fn resolved_escalation_ttl(&self) -> Duration {
        Duration::from_secs(self.resolved_escalation_hours * 3600)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

impl DeskmateConfig {
    /// Load from a TOML file, with `DESKMATE__SECTION__KEY` environment overrides.
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let s = Config::builder()
            .add_source(File::with_name(path))
            .add_source(Environment::with_prefix("DESKMATE").separator("__"))
            .build()?;
        s.try_deserialize()
    }

    /// Config used by tests and by the demo server when no file is present.
    pub fn demo() -> Self {
        Self {
            service: ServiceConfig {
                socket_path: "/tmp/deskmate.sock".to_string(),
                log_level: "info".to_string(),
                locale: default_locale(),
            },
            database: None,
            corpus: CorpusConfig::default(),
            embedding: EmbeddingConfig::default(),
            generation: GenerationConfig::default(),
            retrieval: RetrievalConfig::default(),
            rate_limit: RateLimitConfig::default(),
            http: HttpConfig::default(),
            retention: RetentionConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_effective_limit_defaults_and_clamps() {
        let config = RetrievalConfig::default();
        assert_eq!(config.effective_limit(None), 5);
        assert_eq!(config.effective_limit(Some(0)), 1);
        assert_eq!(config.effective_limit(Some(3)), 3);
        assert_eq!(config.effective_limit(Some(500)), 20);
    }

    #[test]
    fn test_load_minimal_toml_fills_defaults() {
        let dir = std::env::temp_dir().join(format!("deskmate-config-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("deskmate.toml");
        std::fs::write(
            &path,
            r#"
[service]
socket_path = "/tmp/test.sock"
log_level = "debug"

[corpus]
provider = "postgres"

[retrieval]
default_limit = 3
"#,
        )
        .unwrap();

        let config = DeskmateConfig::load(path.to_str().unwrap()).unwrap();
        assert_eq!(config.service.locale, "he");
        assert_eq!(config.corpus.provider, CorpusKind::Postgres);
        assert_eq!(config.retrieval.default_limit, 3);
        assert!((config.retrieval.pattern_boost - 0.2).abs() < f64::EPSILON);
        assert_eq!(config.http.port, 8780);
        assert!(config.database.is_none());
        assert_eq!(config.retention.max_pending_escalations, 1000);
        assert_eq!(config.retention.conversation_idle(), Duration::from_secs(240 * 60));

        std::fs::remove_dir_all(&dir).ok();
    }
}
