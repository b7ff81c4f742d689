use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::knowledge::{KnowledgeRecord, RecordType};
use super::pattern::AutomationPattern;

/// One ranked candidate for a query. Produced per request, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    /// Record id, or pattern id when `is_pattern_match`.
    pub record_id: Uuid,
    pub title: String,
    pub body: String,
    /// `None` for pattern matches.
    pub record_type: Option<RecordType>,
    pub similarity_score: f64,
    pub is_pattern_match: bool,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

impl QueryResult {
    pub fn from_record(record: &KnowledgeRecord, score: f64) -> Self {
        Self {
            record_id: record.id,
            title: record.title.clone(),
            body: record.body.clone(),
            record_type: Some(record.record_type),
            similarity_score: score,
            is_pattern_match: false,
            media_urls: record.media_urls.clone(),
        }
    }

    pub fn from_pattern(pattern: &AutomationPattern, score: f64) -> Self {
        Self {
            record_id: pattern.id,
            title: pattern.display_title(),
            body: pattern.raw_answer.clone(),
            record_type: None,
            similarity_score: score,
            is_pattern_match: true,
            media_urls: Vec::new(),
        }
    }

    /// Label used in the generation context block.
    pub fn kind_label(&self) -> &'static str {
        match self.record_type {
            Some(t) => t.as_str(),
            None => "manager_answer",
        }
    }
}

/// Which composer state produced a response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ComposePath {
    NoMatch,
    PatternShortcut,
    GenerativeCompose,
    TemplatedFallback,
}

/// The answer returned to the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResponseEnvelope {
    pub response_text: String,
    pub localized_text: String,
    pub matched_record_id: Option<Uuid>,
    pub confidence_score: f64,
    pub media_urls: Vec<String>,
    pub is_automated: bool,
    pub path: ComposePath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

impl ConversationTurn {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}
