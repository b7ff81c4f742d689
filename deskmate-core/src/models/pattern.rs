use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A previously given manager answer, replayed verbatim when a new question
/// resembles the questions it answered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutomationPattern {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub manager_name: String,
    pub example_questions: Vec<String>,
    pub raw_answer: String,
}

impl AutomationPattern {
    pub fn new(
        tenant_id: Uuid,
        manager_name: impl Into<String>,
        example_questions: Vec<String>,
        raw_answer: impl Into<String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            tenant_id,
            manager_name: manager_name.into(),
            example_questions,
            raw_answer: raw_answer.into(),
        }
    }

    /// Title shown for a pattern hit in ranked results.
    pub fn display_title(&self) -> String {
        format!("Answer from {}", self.manager_name)
    }
}
