//! Per-conversation turn history, keyed by tenant and conversation id.
//!
//! Conversations idle for longer than the configured retention are dropped
//! by [`ConversationStore::sweep`], which the server runs on an interval.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use deskmate_core::config::RetentionConfig;
use deskmate_core::error::{DeskmateError, Result};
use deskmate_core::models::ConversationTurn;
use uuid::Uuid;

/// Oldest turns are dropped beyond this.
pub const MAX_TURNS: usize = 20;

#[derive(Debug)]
struct History {
    turns: Vec<ConversationTurn>,
    last_active: Instant,
}

#[derive(Debug)]
pub struct ConversationStore {
    histories: DashMap<(Uuid, String), History>,
    idle: Duration,
}

impl Default for ConversationStore {
    fn default() -> Self {
        Self::with_idle(RetentionConfig::default().conversation_idle())
    }
}

impl ConversationStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_idle(idle: Duration) -> Self {
        Self {
            histories: DashMap::new(),
            idle,
        }
    }

    /// Stored turns, or an empty history for unknown conversations.
    pub fn history(&self, tenant_id: Uuid, conversation_id: &str) -> Vec<ConversationTurn> {
        self.histories
            .get(&(tenant_id, conversation_id.to_string()))
            .map(|h| h.turns.clone())
            .unwrap_or_default()
    }

    /// Like [`history`](Self::history) but `NotFound` for unknown conversations.
    pub fn get(&self, tenant_id: Uuid, conversation_id: &str) -> Result<Vec<ConversationTurn>> {
        self.histories
            .get(&(tenant_id, conversation_id.to_string()))
            .map(|h| h.turns.clone())
            .ok_or_else(|| DeskmateError::not_found(format!("conversation {}", conversation_id)))
    }

    pub fn append(&self, tenant_id: Uuid, conversation_id: &str, turns: &[ConversationTurn]) {
        self.append_at(tenant_id, conversation_id, turns, Instant::now());
    }

    fn append_at(&self, tenant_id: Uuid, conversation_id: &str, turns: &[ConversationTurn], now: Instant) {
        let mut history = self
            .histories
            .entry((tenant_id, conversation_id.to_string()))
            .or_insert_with(|| History {
                turns: Vec::new(),
                last_active: now,
            });
        history.last_active = now;
        history.turns.extend_from_slice(turns);
        if history.turns.len() > MAX_TURNS {
            let excess = history.turns.len() - MAX_TURNS;
            history.turns.drain(0..excess);
        }
    }

    /// Drop conversations with no new turn within the idle window.
    pub fn sweep(&self) -> usize {
        self.sweep_at(Instant::now())
    }

    fn sweep_at(&self, now: Instant) -> usize {
        let before = self.histories.len();
        self.histories
            .retain(|_, h| now.saturating_duration_since(h.last_active) < self.idle);
        before.saturating_sub(self.histories.len())
    }

    pub fn len(&self) -> usize {
        self.histories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
