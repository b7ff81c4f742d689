use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum RecordType {
    #[default]
    Faq,
    Policy,
    Procedure,
    Document,
}

impl RecordType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordType::Faq => "faq",
            RecordType::Policy => "policy",
            RecordType::Procedure => "procedure",
            RecordType::Document => "document",
        }
    }
}

impl fmt::Display for RecordType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for RecordType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "faq" => Ok(RecordType::Faq),
            "policy" => Ok(RecordType::Policy),
            "procedure" => Ok(RecordType::Procedure),
            "document" => Ok(RecordType::Document),
            other => Err(format!("unknown record type '{}'", other)),
        }
    }
}

/// A single knowledge-base entry owned by a tenant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnowledgeRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub title: String,
    pub body: String,
    pub record_type: RecordType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
    /// Precomputed embedding of `title + body`. Not serialized over the API.
    #[serde(skip)]
    pub embedding: Option<Vec<f32>>,
    pub is_active: bool,
    pub updated_at: DateTime<Utc>,
}

impl KnowledgeRecord {
    pub fn new(tenant_id: Uuid, title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            title: title.into(),
            body: body.into(),
            record_type: RecordType::default(),
            tags: BTreeSet::new(),
            media_urls: Vec::new(),
            embedding: None,
            is_active: true,
            updated_at: Utc::now(),
        }
    }

    pub fn with_type(mut self, record_type: RecordType) -> Self {
        self.record_type = record_type;
        self
    }

    pub fn with_tags<I, S>(mut self, tags: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.tags = tags.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_media<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.media_urls = urls.into_iter().map(Into::into).collect();
        self
    }

    /// Text fed to the embedding service when (re)indexing.
    pub fn embedding_text(&self) -> String {
        format!("{}\n{}", self.title, self.body)
    }
}

/// Payload for creating or editing a record from the management surface.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordDraft {
    #[serde(default)]
    pub id: Option<Uuid>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
    #[serde(default, rename = "type")]
    pub record_type: RecordType,
    #[serde(default)]
    pub tags: BTreeSet<String>,
    #[serde(default)]
    pub media_urls: Vec<String>,
}

impl RecordDraft {
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.title.trim().is_empty() || self.body.trim().is_empty() {
            return Err(crate::error::DeskmateError::validation("title and body are required"));
        }
        Ok(())
    }

    /// Build the stored record. Any previous embedding is dropped since the text changed.
    pub fn into_record(self, tenant_id: Uuid) -> KnowledgeRecord {
        KnowledgeRecord {
            id: self.id.unwrap_or_else(Uuid::new_v4),
            tenant_id,
            title: self.title.trim().to_string(),
            body: self.body.trim().to_string(),
            record_type: self.record_type,
            tags: self.tags,
            media_urls: self.media_urls,
            embedding: None,
            is_active: true,
            updated_at: Utc::now(),
        }
    }
}
