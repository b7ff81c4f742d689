//! Escalation queue: questions the assistant answered with low confidence.
//!
//! Resolving an escalation turns the manager's answer into an automation
//! pattern, so the next identical question is answered verbatim. Pending
//! entries are capped per tenant and resolved entries are swept once they
//! pass the retention window.

use std::collections::HashSet;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, Utc};
use deskmate_core::config::RetentionConfig;
use deskmate_core::corpus::PatternProvider;
use deskmate_core::error::{DeskmateError, Result};
use deskmate_core::models::{AutomationPattern, Escalation, Resolution};
use uuid::Uuid;

#[derive(Debug, Default)]
struct Queue {
    entries: Vec<Escalation>,
    /// Escalations with a resolve awaiting the pattern store.
    resolving: HashSet<Uuid>,
}

#[derive(Debug)]
pub struct EscalationStore {
    queue: Mutex<Queue>,
    max_pending: usize,
    resolved_ttl: Duration,
}

impl Default for EscalationStore {
    fn default() -> Self {
        Self::with_retention(&RetentionConfig::default())
    }
}

/// Clears the in-flight mark when a resolve finishes or is cancelled.
struct InFlight<'a> {
    store: &'a EscalationStore,
    id: Uuid,
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.store.lock().resolving.remove(&self.id);
    }
}

impl EscalationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_retention(retention: &RetentionConfig) -> Self {
        Self {
            queue: Mutex::new(Queue::default()),
            max_pending: retention.max_pending_escalations.max(1),
            resolved_ttl: retention.resolved_escalation_ttl(),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Queue> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn record(&self, escalation: Escalation) -> Uuid {
        let id = escalation.id;
        let tenant_id = escalation.tenant_id;
        tracing::info!(
            tenant_id = %tenant_id,
            escalation_id = %id,
            confidence = escalation.confidence_score,
            "Escalation recorded"
        );

        let mut queue = self.lock();
        queue.entries.push(escalation);

        let pending = queue
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id && !e.is_resolved())
            .count();
        let mut excess = pending.saturating_sub(self.max_pending);
        if excess > 0 {
            let Queue { entries, resolving } = &mut *queue;
            // entries are in arrival order, so the first pending ones are the oldest
            entries.retain(|e| {
                let evict = excess > 0
                    && e.tenant_id == tenant_id
                    && !e.is_resolved()
                    && !resolving.contains(&e.id);
                if evict {
                    excess -= 1;
                }
                !evict
            });
            tracing::warn!(
                tenant_id = %tenant_id,
                max_pending = self.max_pending,
                "Pending escalation cap reached, oldest entries dropped"
            );
        }
        id
    }

    /// Escalations for a tenant, newest first.
    pub fn list(&self, tenant_id: Uuid, include_resolved: bool) -> Vec<Escalation> {
        let queue = self.lock();
        let mut out: Vec<Escalation> = queue
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id)
            .filter(|e| include_resolved || !e.is_resolved())
            .cloned()
            .collect();
        out.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        out
    }

    /// Attach a manager answer and store it as an automation pattern.
    ///
    /// Only one resolve of an escalation can be in flight; a concurrent
    /// second call is rejected before it reaches the pattern store.
    pub async fn resolve(
        &self,
        patterns: &dyn PatternProvider,
        tenant_id: Uuid,
        id: Uuid,
        manager_name: &str,
        answer: &str,
    ) -> Result<Escalation> {
        let manager_name = manager_name.trim();
        let answer = answer.trim();
        if manager_name.is_empty() || answer.is_empty() {
            return Err(DeskmateError::validation(
                "manager_name and answer are required",
            ));
        }

        // Validate and claim before touching the pattern store; the lock is not held across await.
        let (query, _in_flight) = {
            let mut queue = self.lock();
            let entry = queue
                .entries
                .iter()
                .find(|e| e.id == id && e.tenant_id == tenant_id)
                .ok_or_else(|| DeskmateError::not_found(format!("escalation {}", id)))?;
            if entry.is_resolved() {
                return Err(DeskmateError::validation(format!(
                    "escalation {} is already resolved",
                    id
                )));
            }
            let query = entry.query.clone();
            if !queue.resolving.insert(id) {
                return Err(DeskmateError::validation(format!(
                    "escalation {} is already being resolved",
                    id
                )));
            }
            (query, InFlight { store: self, id })
        };

        let pattern = patterns
            .add_pattern(AutomationPattern::new(
                tenant_id,
                manager_name,
                vec![query],
                answer,
            ))
            .await?;

        let mut queue = self.lock();
        let entry = queue
            .entries
            .iter_mut()
            .find(|e| e.id == id && e.tenant_id == tenant_id)
            .ok_or_else(|| DeskmateError::not_found(format!("escalation {}", id)))?;
        entry.resolution = Some(Resolution {
            manager_name: manager_name.to_string(),
            answer: answer.to_string(),
            pattern_id: Some(pattern.id),
            resolved_at: Utc::now(),
        });

        tracing::info!(
            tenant_id = %tenant_id,
            escalation_id = %id,
            pattern_id = %pattern.id,
            "Escalation resolved into automation pattern"
        );
        Ok(entry.clone())
    }

    pub fn pending_count(&self, tenant_id: Uuid) -> usize {
        self.lock()
            .entries
            .iter()
            .filter(|e| e.tenant_id == tenant_id && !e.is_resolved())
            .count()
    }

    /// Drop resolved escalations older than the retention window.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Utc::now())
    }

    fn sweep_at(&self, now: DateTime<Utc>) -> usize {
        let ttl = self.resolved_ttl;
        let mut queue = self.lock();
        let before = queue.entries.len();
        queue.entries.retain(|e| match &e.resolution {
            Some(r) => (now - r.resolved_at).to_std().map_or(true, |age| age < ttl),
            None => true,
        });
        before - queue.entries.len()
    }
}
