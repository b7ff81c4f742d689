use std::sync::{PoisonError, RwLock};

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use super::{CorpusProvider, PatternProvider};
use crate::error::{DeskmateError, Result};
use crate::models::{AutomationPattern, KnowledgeRecord, RecordType};

/// Tenant that owns the seeded demo corpus.
pub const DEMO_TENANT_ID: Uuid = Uuid::from_u128(0x6d3f_9a2e_0c1b_4e57_9d1a_5b7c_2f40_8e11);

/// In-memory corpus. Used for demos, local development and tests.
#[derive(Debug, Default)]
pub struct DemoCorpusProvider {
    records: RwLock<Vec<KnowledgeRecord>>,
    patterns: RwLock<Vec<AutomationPattern>>,
}

impl DemoCorpusProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_data(records: Vec<KnowledgeRecord>, patterns: Vec<AutomationPattern>) -> Self {
        Self {
            records: RwLock::new(records),
            patterns: RwLock::new(patterns),
        }
    }

    /// Small bilingual retail knowledge base for [`DEMO_TENANT_ID`].
    pub fn seeded() -> Self {
        let t = DEMO_TENANT_ID;
        let records = vec![
            KnowledgeRecord::new(
                t,
                "שעות פעילות החנות",
                "החנות פתוחה בימים א׳ עד ה׳ בין 09:00-18:00, ביום ו׳ בין 09:00-14:00. בשבת החנות סגורה.",
            )
            .with_tags(["hours", "שעות"]),
            KnowledgeRecord::new(
                t,
                "Return policy",
                "Customers may return unworn items within 30 days with a receipt. Refunds go back to \
                 the original payment method. Sale items can only be exchanged.",
            )
            .with_type(RecordType::Policy)
            .with_tags(["returns", "refunds"]),
            KnowledgeRecord::new(
                t,
                "Opening the register",
                "Count the float (500 NIS in small notes), sign the register log and log in with your \
                 employee code before serving the first customer.",
            )
            .with_type(RecordType::Procedure)
            .with_tags(["register", "cash"]),
            KnowledgeRecord::new(
                t,
                "Shift swaps",
                "Post the swap in the team group and get approval from the shift manager at least 24 \
                 hours before the shift starts.",
            )
            .with_tags(["shifts"]),
            KnowledgeRecord::new(
                t,
                "Dress code",
                "Staff wear the black store t-shirt and a name badge. Closed shoes are required in the \
                 stockroom.",
            )
            .with_type(RecordType::Document)
            .with_media(["https://cdn.deskmate.example/demo/dress-code.jpg"]),
        ];

        let patterns = vec![
            AutomationPattern::new(
                t,
                "Noa",
                vec![
                    "can I take my break early".to_string(),
                    "when is the lunch break".to_string(),
                ],
                "Breaks are 30 minutes. Coordinate with the shift lead before leaving the floor.",
            ),
            AutomationPattern::new(
                t,
                "Avi",
                vec![
                    "איפה שמים את המשלוחים".to_string(),
                    "where do deliveries go".to_string(),
                ],
                "משלוחים נכנסים דרך הדלת האחורית ונרשמים ביומן הקבלה.",
            ),
        ];

        Self::with_data(records, patterns)
    }
}

#[async_trait]
impl CorpusProvider for DemoCorpusProvider {
    fn name(&self) -> &str {
        "demo"
    }

    async fn list_active_records(&self, tenant_id: Uuid) -> Result<Vec<KnowledgeRecord>> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .filter(|r| r.tenant_id == tenant_id && r.is_active)
            .cloned()
            .collect())
    }

    async fn get_record(&self, tenant_id: Uuid, id: Uuid) -> Result<KnowledgeRecord> {
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        records
            .iter()
            .find(|r| r.id == id && r.tenant_id == tenant_id && r.is_active)
            .cloned()
            .ok_or_else(|| DeskmateError::not_found(format!("knowledge record {}", id)))
    }

    async fn upsert_record(&self, record: KnowledgeRecord) -> Result<KnowledgeRecord> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records.iter_mut().find(|r| r.id == record.id) {
            Some(existing) if existing.tenant_id != record.tenant_id => {
                return Err(DeskmateError::not_found(format!("knowledge record {}", record.id)));
            }
            Some(existing) => *existing = record.clone(),
            None => records.push(record.clone()),
        }
        Ok(record)
    }

    async fn deactivate_record(&self, tenant_id: Uuid, id: Uuid) -> Result<()> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .iter_mut()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
            .ok_or_else(|| DeskmateError::not_found(format!("knowledge record {}", id)))?;
        record.is_active = false;
        record.updated_at = Utc::now();
        Ok(())
    }

    async fn store_embedding(
        &self,
        tenant_id: Uuid,
        id: Uuid,
        source_text: &str,
        embedding: Vec<f32>,
    ) -> Result<bool> {
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let record = records
            .iter_mut()
            .find(|r| r.id == id && r.tenant_id == tenant_id)
            .ok_or_else(|| DeskmateError::not_found(format!("knowledge record {}", id)))?;
        if record.embedding_text() != source_text {
            return Ok(false);
        }
        record.embedding = Some(embedding);
        Ok(true)
    }
}

#[async_trait]
impl PatternProvider for DemoCorpusProvider {
    async fn list_patterns(&self, tenant_id: Uuid) -> Result<Vec<AutomationPattern>> {
        let patterns = self.patterns.read().unwrap_or_else(PoisonError::into_inner);
        Ok(patterns
            .iter()
            .filter(|p| p.tenant_id == tenant_id)
            .cloned()
            .collect())
    }

    async fn add_pattern(&self, pattern: AutomationPattern) -> Result<AutomationPattern> {
        self.patterns
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pattern.clone());
        Ok(pattern)
    }
}
