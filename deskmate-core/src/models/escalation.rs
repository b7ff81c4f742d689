use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A question the assistant could not answer confidently, waiting for a manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Escalation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub conversation_id: Option<String>,
    pub query: String,
    pub confidence_score: f64,
    pub created_at: DateTime<Utc>,
    pub resolution: Option<Resolution>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Resolution {
    pub manager_name: String,
    pub answer: String,
    pub pattern_id: Option<Uuid>,
    pub resolved_at: DateTime<Utc>,
}

impl Escalation {
    pub fn new(
        tenant_id: Uuid,
        conversation_id: Option<String>,
        query: impl Into<String>,
        confidence_score: f64,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            conversation_id,
            query: query.into(),
            confidence_score,
            created_at: Utc::now(),
            resolution: None,
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.resolution.is_some()
    }
}
