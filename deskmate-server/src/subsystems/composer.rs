//! Response composer: turns a ranked result list into the answer an employee sees.
//!
//! Paths, in order of precedence:
//! 1. nothing ranked: `NoMatch`, localized "no relevant information" message
//! 2. top result is a pattern above the shortcut score: `PatternShortcut`,
//!    the manager's answer verbatim
//! 3. a generation backend is configured: `GenerativeCompose` from a context
//!    block of the top results, falling back to 4 on any generation error
//! 4. `TemplatedFallback`, an excerpt of the top result's body
//!
//! Retrieval uses embeddings when a backend is configured and every active
//! record is embedded; an embedding failure degrades to keyword ranking.
//! Errors never reach the caller from here except input validation.

use deskmate_core::config::RetrievalConfig;
use deskmate_core::error::{DeskmateError, Result};
use deskmate_core::generation::{CompletionRequest, GenerationBackend};
use deskmate_core::models::{ComposePath, ConversationTurn, Escalation, QueryResult, ResponseEnvelope};
use deskmate_core::{ranking, text, vector};
use serde::Deserialize;
use uuid::Uuid;

use super::messages::{self, Locale};
use super::retrieve;
use crate::services::AppServices;

/// Results included in the generation context block.
pub const CONTEXT_TOP_K: usize = 3;

const CONTEXT_DELIMITER: &str = "\n\n---\n\n";

#[derive(Debug, Clone, Deserialize)]
pub struct AskRequest {
    pub tenant_id: Uuid,
    pub query: String,
    #[serde(default)]
    pub conversation_id: Option<String>,
    /// Client-held history. When absent the stored conversation history is used.
    #[serde(default)]
    pub history: Option<Vec<ConversationTurn>>,
    #[serde(default)]
    pub caller: Option<String>,
}

/// Pick the compose path from the ranking alone.
pub fn choose_path(results: &[QueryResult], config: &RetrievalConfig, can_generate: bool) -> ComposePath {
    match results.first() {
        None => ComposePath::NoMatch,
        Some(top) if top.is_pattern_match && top.similarity_score > config.pattern_shortcut_score => {
            ComposePath::PatternShortcut
        }
        Some(_) if can_generate => ComposePath::GenerativeCompose,
        Some(_) => ComposePath::TemplatedFallback,
    }
}

/// `[type] title\nbody` blocks for the top results, delimited.
pub fn build_context(results: &[QueryResult]) -> String {
    results
        .iter()
        .take(CONTEXT_TOP_K)
        .map(|r| format!("[{}] {}\n{}", r.kind_label(), r.title, r.body))
        .collect::<Vec<_>>()
        .join(CONTEXT_DELIMITER)
}

pub fn build_system_prompt(context: &str, locale: Locale) -> String {
    let language = match locale {
        Locale::He => "Answer in Hebrew unless the employee writes in another language.",
        Locale::En => "Answer in the language the employee writes in.",
    };
    format!(
        r#"You are the internal knowledge assistant of a retail store. Employees message you during their shift.

Knowledge base entries relevant to the question:

{}

Instructions:
1. Answer only from the entries above
2. If the entries do not cover the question, say so and suggest asking a manager
3. Keep the answer short enough to read on a phone
4. {}"#,
        context, language
    )
}

fn no_match(locale: Locale) -> ResponseEnvelope {
    ResponseEnvelope {
        response_text: messages::no_match(Locale::En).to_string(),
        localized_text: messages::no_match(locale).to_string(),
        matched_record_id: None,
        confidence_score: 0.0,
        media_urls: Vec::new(),
        is_automated: false,
        path: ComposePath::NoMatch,
    }
}

fn matched_id(top: &QueryResult) -> Option<Uuid> {
    (!top.is_pattern_match).then_some(top.record_id)
}

fn templated(top: &QueryResult, config: &RetrievalConfig, locale: Locale) -> ResponseEnvelope {
    let excerpt = text::excerpt(&top.body, config.excerpt_chars);
    ResponseEnvelope {
        response_text: messages::from_knowledge_base(Locale::En, &top.title, &excerpt),
        localized_text: messages::from_knowledge_base(locale, &top.title, &excerpt),
        matched_record_id: matched_id(top),
        confidence_score: top.similarity_score,
        media_urls: top.media_urls.clone(),
        is_automated: false,
        path: ComposePath::TemplatedFallback,
    }
}

/// Compose a response from an existing ranking.
pub async fn compose(
    query: &str,
    results: &[QueryResult],
    history: &[ConversationTurn],
    config: &RetrievalConfig,
    generator: Option<&dyn GenerationBackend>,
    locale: Locale,
) -> ResponseEnvelope {
    let path = choose_path(results, config, generator.is_some());
    let top = match (path, results.first()) {
        (ComposePath::NoMatch, _) | (_, None) => return no_match(locale),
        (_, Some(top)) => top,
    };

    match (path, generator) {
        (ComposePath::PatternShortcut, _) => ResponseEnvelope {
            response_text: top.body.clone(),
            localized_text: top.body.clone(),
            matched_record_id: None,
            confidence_score: top.similarity_score,
            media_urls: top.media_urls.clone(),
            is_automated: true,
            path,
        },
        (ComposePath::GenerativeCompose, Some(generator)) => {
            let request = CompletionRequest {
                system_prompt: build_system_prompt(&build_context(results), locale),
                history: history.to_vec(),
                query: query.to_string(),
            };
            match generator.complete(&request).await {
                Ok(answer) => ResponseEnvelope {
                    response_text: answer.clone(),
                    localized_text: answer,
                    matched_record_id: matched_id(top),
                    confidence_score: top.similarity_score,
                    media_urls: top.media_urls.clone(),
                    is_automated: false,
                    path,
                },
                Err(e) => {
                    tracing::warn!(backend = generator.name(), error = %e, "Generation failed, using templated fallback");
                    templated(top, config, locale)
                }
            }
        }
        _ => templated(top, config, locale),
    }
}

/// Rank for answering: embeddings when the corpus is fully embedded, keywords otherwise.
pub async fn rank_for_answer(services: &AppServices, tenant_id: Uuid, query: &str) -> Vec<QueryResult> {
    let config = &services.config.retrieval;
    let limit = config.default_limit;

    let records = match services.corpus.list_active_records(tenant_id).await {
        Ok(r) => r,
        Err(e) => {
            tracing::error!(tenant_id = %tenant_id, error = %e, "Failed to load knowledge records");
            return Vec::new();
        }
    };

    if let Some(embedder) = services.embedder.as_deref() {
        if vector::fully_embedded(&records) {
            match retrieve::rank_semantic(embedder, query, &records, limit, config).await {
                Ok(results) => return results,
                Err(e) => tracing::warn!(
                    tenant_id = %tenant_id,
                    error = %e,
                    "Embedding failed, degrading to keyword ranking"
                ),
            }
        }
    }

    let patterns = match services.patterns.list_patterns(tenant_id).await {
        Ok(p) => p,
        Err(e) => {
            tracing::warn!(tenant_id = %tenant_id, error = %e, "Failed to load automation patterns");
            Vec::new()
        }
    };
    ranking::search_knowledge(query, &records, &patterns, limit, config)
}

fn should_escalate(envelope: &ResponseEnvelope, config: &RetrievalConfig) -> bool {
    match envelope.path {
        ComposePath::NoMatch => true,
        ComposePath::PatternShortcut => false,
        _ => envelope.confidence_score < config.escalation_threshold,
    }
}

/// Full ask flow: rank, compose, escalate, remember.
pub async fn answer(services: &AppServices, request: AskRequest) -> Result<ResponseEnvelope> {
    let query = request.query.trim();
    if query.is_empty() {
        return Err(DeskmateError::validation("query field is required"));
    }
    let tenant_id = request.tenant_id;
    let conversation_id = request
        .conversation_id
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    let history = match (request.history, conversation_id) {
        (Some(h), _) => h,
        (None, Some(c)) => services.conversations.history(tenant_id, c),
        (None, None) => Vec::new(),
    };

    let results = rank_for_answer(services, tenant_id, query).await;
    let envelope = compose(
        query,
        &results,
        &history,
        &services.config.retrieval,
        services.generator.as_deref(),
        services.locale(),
    )
    .await;

    tracing::info!(
        tenant_id = %tenant_id,
        path = ?envelope.path,
        confidence = envelope.confidence_score,
        candidates = results.len(),
        "Answer composed"
    );

    if should_escalate(&envelope, &services.config.retrieval) {
        services.escalations.record(Escalation::new(
            tenant_id,
            conversation_id.map(str::to_string),
            query,
            envelope.confidence_score,
        ));
    }

    if let Some(c) = conversation_id {
        services.conversations.append(
            tenant_id,
            c,
            &[
                ConversationTurn::user(query),
                ConversationTurn::assistant(envelope.localized_text.clone()),
            ],
        );
    }

    Ok(envelope)
}
