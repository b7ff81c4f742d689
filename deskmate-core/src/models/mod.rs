pub mod escalation;
pub mod knowledge;
pub mod pattern;
pub mod query;

pub use escalation::{Escalation, Resolution};
pub use knowledge::{KnowledgeRecord, RecordDraft, RecordType};
pub use pattern::AutomationPattern;
pub use query::{ComposePath, ConversationTurn, QueryResult, ResponseEnvelope, Role};
