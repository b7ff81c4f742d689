//! Deskmate HTTP REST API
//!
//! Axum-based HTTP server exposing the assistant and the knowledge-base
//! management surface. Runs alongside the Unix socket IPC server on port
//! 8780 (configurable).
//!
//! Each endpoint has a thin axum handler that delegates to an inner function
//! returning `(StatusCode, serde_json::Value)`. The inner functions are tested
//! directly, without axum dispatch.
//!
//! Endpoints:
//! - GET    /health                                   service status and backends
//! - GET    /version                                  server version info
//! - POST   /ask                                      answer an employee question
//! - POST   /search                                   keyword ranking
//! - POST   /semantic-search                          embedding ranking
//! - POST   /tenants/:tenant_id/records               create or replace a record
//! - GET    /tenants/:tenant_id/records/:id           fetch a record
//! - DELETE /tenants/:tenant_id/records/:id           soft-delete a record
//! - POST   /tenants/:tenant_id/reindex               re-embed every active record
//! - GET    /tenants/:tenant_id/escalations           pending (or all) escalations
//! - POST   /tenants/:tenant_id/escalations/:id/resolve
//! - GET    /tenants/:tenant_id/conversations/:id     stored conversation history

use std::sync::Arc;
use std::time::Instant;

use anyhow::Result;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use deskmate_core::ipc::{DeskmateRequest, DeskmateResponse, ErrorKind, PROTOCOL_VERSION};
use deskmate_core::models::{ConversationTurn, RecordDraft};
use deskmate_core::DeskmateError;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::router;
use crate::services::AppServices;
use crate::subsystems::{embedder, retrieve};

/// Build the Axum router with all endpoints
pub fn build_router(services: Arc<AppServices>) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .route("/version", get(version_handler))
        .route("/ask", post(ask_handler))
        .route("/search", post(search_handler))
        .route("/semantic-search", post(semantic_search_handler))
        .route("/tenants/:tenant_id/records", post(upsert_record_handler))
        .route(
            "/tenants/:tenant_id/records/:id",
            get(get_record_handler).delete(delete_record_handler),
        )
        .route("/tenants/:tenant_id/reindex", post(reindex_handler))
        .route("/tenants/:tenant_id/escalations", get(list_escalations_handler))
        .route(
            "/tenants/:tenant_id/escalations/:id/resolve",
            post(resolve_escalation_handler),
        )
        .route(
            "/tenants/:tenant_id/conversations/:conversation_id",
            get(conversation_handler),
        )
        .with_state(services)
}

/// Start the HTTP server on the configured address.
/// Gracefully shuts down when the broadcast shutdown signal fires.
pub async fn start_http_server(
    services: Arc<AppServices>,
    mut shutdown: broadcast::Receiver<()>,
) -> Result<()> {
    let addr = format!("{}:{}", services.config.http.host, services.config.http.port);

    let app = build_router(services);
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!("Deskmate HTTP API listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = shutdown.recv().await;
            tracing::info!("HTTP server shutting down...");
        })
        .await?;

    Ok(())
}

// ============================================================================
// Request / Response DTOs
// ============================================================================

#[derive(Debug, Deserialize, Default)]
pub struct AskBody {
    pub tenant_id: Option<Uuid>,
    pub query: Option<String>,
    pub conversation_id: Option<String>,
    pub history: Option<Vec<ConversationTurn>>,
    pub caller: Option<String>,
}

#[derive(Debug, Deserialize, Default)]
pub struct SearchBody {
    pub tenant_id: Option<Uuid>,
    pub query: Option<String>,
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
pub struct ResolveBody {
    #[serde(default)]
    pub manager_name: String,
    #[serde(default)]
    pub answer: String,
}

#[derive(Debug, Deserialize, Default)]
pub struct EscalationFilter {
    #[serde(default)]
    pub include_resolved: bool,
}

/// Standard HTTP error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    pub status: String,
}

impl ErrorResponse {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            error: msg.into(),
            status: "error".to_string(),
        }
    }

    fn into_value(self) -> serde_json::Value {
        serde_json::json!({ "error": self.error, "status": self.status })
    }
}

pub type HttpResult = (StatusCode, serde_json::Value);

fn bad_request(msg: &str) -> HttpResult {
    (StatusCode::BAD_REQUEST, ErrorResponse::new(msg).into_value())
}

/// Tenant and non-blank query, or a 400.
fn require_tenant_and_query(
    tenant_id: Option<Uuid>,
    query: Option<String>,
) -> std::result::Result<(Uuid, String), HttpResult> {
    let tenant_id = tenant_id.ok_or_else(|| bad_request("tenant_id field is required"))?;
    match query {
        Some(q) if !q.trim().is_empty() => Ok((tenant_id, q)),
        _ => Err(bad_request("query field is required")),
    }
}

fn with_took_ms(result: HttpResult, start: Instant) -> HttpResult {
    let (status, mut data) = result;
    if status == StatusCode::OK {
        if let Some(obj) = data.as_object_mut() {
            let took_ms = start.elapsed().as_millis() as u64;
            obj.insert("took_ms".to_string(), serde_json::json!(took_ms));
        }
    }
    (status, data)
}

// ============================================================================
// Inner (directly testable) business logic functions
// ============================================================================

/// Reports configured backends. Never calls external services.
pub fn health_inner(services: &AppServices) -> HttpResult {
    let mut body = services.describe();
    if let Some(obj) = body.as_object_mut() {
        obj.insert("status".to_string(), serde_json::json!("healthy"));
        obj.insert("version".to_string(), serde_json::json!(env!("CARGO_PKG_VERSION")));
        obj.insert(
            "socket".to_string(),
            serde_json::json!(services.config.service.socket_path),
        );
    }
    (StatusCode::OK, body)
}

/// Version info, no IO.
pub fn version_inner() -> serde_json::Value {
    serde_json::json!({
        "version": env!("CARGO_PKG_VERSION"),
        "protocol": PROTOCOL_VERSION,
    })
}

pub async fn ask_inner(services: &AppServices, req: AskBody) -> HttpResult {
    let (tenant_id, query) = match require_tenant_and_query(req.tenant_id, req.query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let start = Instant::now();
    let request = DeskmateRequest::Ask {
        tenant_id,
        query,
        conversation_id: req.conversation_id,
        history: req.history,
        caller: req.caller,
    };
    let response = router::handle_request(request, services).await;
    with_took_ms(response_to_http(response), start)
}

pub async fn search_inner(services: &AppServices, req: SearchBody) -> HttpResult {
    let (tenant_id, query) = match require_tenant_and_query(req.tenant_id, req.query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let start = Instant::now();
    let request = DeskmateRequest::Search {
        tenant_id,
        query,
        limit: req.limit,
    };
    let response = router::handle_request(request, services).await;
    with_took_ms(response_to_http(response), start)
}

pub async fn semantic_search_inner(services: &AppServices, req: SearchBody) -> HttpResult {
    let (tenant_id, query) = match require_tenant_and_query(req.tenant_id, req.query) {
        Ok(v) => v,
        Err(resp) => return resp,
    };

    let start = Instant::now();
    let result = retrieve::semantic_search(
        services.corpus.as_ref(),
        services.embedder.as_deref(),
        &services.config.retrieval,
        tenant_id,
        &query,
        req.limit,
    )
    .await;

    match result {
        Ok(results) => with_took_ms(
            (
                StatusCode::OK,
                serde_json::json!({ "count": results.len(), "results": results }),
            ),
            start,
        ),
        Err(e) => error_to_http(&e),
    }
}

pub async fn get_record_inner(services: &AppServices, tenant_id: Uuid, id: Uuid) -> HttpResult {
    let response =
        router::handle_request(DeskmateRequest::GetRecord { tenant_id, id }, services).await;
    response_to_http(response)
}

/// Stores the record, then embeds it in the background.
pub async fn upsert_record_inner(
    services: &AppServices,
    tenant_id: Uuid,
    draft: RecordDraft,
) -> HttpResult {
    if let Err(e) = draft.validate() {
        return error_to_http(&e);
    }

    let record = match services.corpus.upsert_record(draft.into_record(tenant_id)).await {
        Ok(r) => r,
        Err(e) => return error_to_http(&e),
    };
    tracing::info!(tenant_id = %tenant_id, record_id = %record.id, "Knowledge record saved");

    if let Some(backend) = services.embedder.clone() {
        embedder::spawn_embed_task(services.corpus.clone(), backend, tenant_id, record.id);
    }

    match serde_json::to_value(&record) {
        Ok(body) => (StatusCode::OK, body),
        Err(e) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(e.to_string()).into_value(),
        ),
    }
}

pub async fn delete_record_inner(services: &AppServices, tenant_id: Uuid, id: Uuid) -> HttpResult {
    match services.corpus.deactivate_record(tenant_id, id).await {
        Ok(()) => {
            tracing::info!(tenant_id = %tenant_id, record_id = %id, "Knowledge record deactivated");
            (StatusCode::OK, serde_json::json!({ "deleted": true, "id": id }))
        }
        Err(e) => error_to_http(&e),
    }
}

pub async fn reindex_inner(services: &AppServices, tenant_id: Uuid) -> HttpResult {
    let start = Instant::now();
    let response = router::handle_request(DeskmateRequest::Reindex { tenant_id }, services).await;
    with_took_ms(response_to_http(response), start)
}

pub fn list_escalations_inner(
    services: &AppServices,
    tenant_id: Uuid,
    filter: EscalationFilter,
) -> HttpResult {
    let escalations = services.escalations.list(tenant_id, filter.include_resolved);
    (
        StatusCode::OK,
        serde_json::json!({ "count": escalations.len(), "escalations": escalations }),
    )
}

pub async fn resolve_escalation_inner(
    services: &AppServices,
    tenant_id: Uuid,
    id: Uuid,
    req: ResolveBody,
) -> HttpResult {
    let resolved = services
        .escalations
        .resolve(
            services.patterns.as_ref(),
            tenant_id,
            id,
            &req.manager_name,
            &req.answer,
        )
        .await;

    match resolved.map(|e| serde_json::to_value(&e)) {
        Ok(Ok(body)) => (StatusCode::OK, body),
        Ok(Err(e)) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            ErrorResponse::new(e.to_string()).into_value(),
        ),
        Err(e) => error_to_http(&e),
    }
}

pub fn conversation_inner(services: &AppServices, tenant_id: Uuid, conversation_id: &str) -> HttpResult {
    match services.conversations.get(tenant_id, conversation_id) {
        Ok(turns) => (
            StatusCode::OK,
            serde_json::json!({ "conversation_id": conversation_id, "turns": turns }),
        ),
        Err(e) => error_to_http(&e),
    }
}

// ============================================================================
// Axum handler wrappers
// ============================================================================

pub async fn health_handler(State(services): State<Arc<AppServices>>) -> impl IntoResponse {
    let (status, body) = health_inner(&services);
    (status, Json(body))
}

pub async fn version_handler() -> impl IntoResponse {
    (StatusCode::OK, Json(version_inner()))
}

pub async fn ask_handler(
    State(services): State<Arc<AppServices>>,
    Json(req): Json<AskBody>,
) -> impl IntoResponse {
    let (status, body) = ask_inner(&services, req).await;
    (status, Json(body))
}

pub async fn search_handler(
    State(services): State<Arc<AppServices>>,
    Json(req): Json<SearchBody>,
) -> impl IntoResponse {
    let (status, body) = search_inner(&services, req).await;
    (status, Json(body))
}

pub async fn semantic_search_handler(
    State(services): State<Arc<AppServices>>,
    Json(req): Json<SearchBody>,
) -> impl IntoResponse {
    let (status, body) = semantic_search_inner(&services, req).await;
    (status, Json(body))
}

pub async fn upsert_record_handler(
    State(services): State<Arc<AppServices>>,
    Path(tenant_id): Path<Uuid>,
    Json(draft): Json<RecordDraft>,
) -> impl IntoResponse {
    let (status, body) = upsert_record_inner(&services, tenant_id, draft).await;
    (status, Json(body))
}

pub async fn get_record_handler(
    State(services): State<Arc<AppServices>>,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let (status, body) = get_record_inner(&services, tenant_id, id).await;
    (status, Json(body))
}

pub async fn delete_record_handler(
    State(services): State<Arc<AppServices>>,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
) -> impl IntoResponse {
    let (status, body) = delete_record_inner(&services, tenant_id, id).await;
    (status, Json(body))
}

pub async fn reindex_handler(
    State(services): State<Arc<AppServices>>,
    Path(tenant_id): Path<Uuid>,
) -> impl IntoResponse {
    let (status, body) = reindex_inner(&services, tenant_id).await;
    (status, Json(body))
}

pub async fn list_escalations_handler(
    State(services): State<Arc<AppServices>>,
    Path(tenant_id): Path<Uuid>,
    Query(filter): Query<EscalationFilter>,
) -> impl IntoResponse {
    let (status, body) = list_escalations_inner(&services, tenant_id, filter);
    (status, Json(body))
}

pub async fn resolve_escalation_handler(
    State(services): State<Arc<AppServices>>,
    Path((tenant_id, id)): Path<(Uuid, Uuid)>,
    Json(req): Json<ResolveBody>,
) -> impl IntoResponse {
    let (status, body) = resolve_escalation_inner(&services, tenant_id, id, req).await;
    (status, Json(body))
}

pub async fn conversation_handler(
    State(services): State<Arc<AppServices>>,
    Path((tenant_id, conversation_id)): Path<(Uuid, String)>,
) -> impl IntoResponse {
    let (status, body) = conversation_inner(&services, tenant_id, &conversation_id);
    (status, Json(body))
}

// ============================================================================
// Helpers
// ============================================================================

pub fn status_for(kind: Option<ErrorKind>) -> StatusCode {
    match kind {
        Some(ErrorKind::NotFound) => StatusCode::NOT_FOUND,
        Some(ErrorKind::Validation) => StatusCode::BAD_REQUEST,
        Some(ErrorKind::RateLimited) => StatusCode::TOO_MANY_REQUESTS,
        Some(ErrorKind::Upstream) => StatusCode::BAD_GATEWAY,
        Some(ErrorKind::Unconfigured) => StatusCode::SERVICE_UNAVAILABLE,
        Some(ErrorKind::Internal) | None => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Convert a router `DeskmateResponse` into an HTTP status and body.
pub fn response_to_http(response: DeskmateResponse) -> HttpResult {
    if response.is_ok() {
        (
            StatusCode::OK,
            response.data.unwrap_or_else(|| serde_json::json!({})),
        )
    } else {
        let message = response.error.unwrap_or_else(|| "unknown error".to_string());
        (
            status_for(response.error_kind),
            ErrorResponse::new(message).into_value(),
        )
    }
}

fn error_to_http(error: &DeskmateError) -> HttpResult {
    response_to_http(router::error_response(error))
}

// ============================================================================
// Unit Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::subsystems::testing::MockEmbedder;
    use deskmate_core::corpus::DEMO_TENANT_ID;
    use deskmate_core::DeskmateConfig;

    fn demo() -> AppServices {
        AppServices::demo(DeskmateConfig::demo())
    }

    fn search(query: &str) -> SearchBody {
        SearchBody {
            tenant_id: Some(DEMO_TENANT_ID),
            query: Some(query.to_string()),
            limit: None,
        }
    }

    #[test]
    fn test_version_inner_pure() {
        let v = version_inner();
        assert!(v["version"].is_string(), "version must be string");
        assert_eq!(v["protocol"], "deskmate/1");
    }

    #[test]
    fn test_health_inner_reports_backends() {
        let (status, body) = health_inner(&demo());
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "healthy");
        assert_eq!(body["corpus"], "demo");
        assert_eq!(body["socket"], "/tmp/deskmate.sock");
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_response_to_http_maps_error_kinds() {
        let cases = [
            (ErrorKind::NotFound, StatusCode::NOT_FOUND),
            (ErrorKind::Validation, StatusCode::BAD_REQUEST),
            (ErrorKind::RateLimited, StatusCode::TOO_MANY_REQUESTS),
            (ErrorKind::Upstream, StatusCode::BAD_GATEWAY),
            (ErrorKind::Unconfigured, StatusCode::SERVICE_UNAVAILABLE),
            (ErrorKind::Internal, StatusCode::INTERNAL_SERVER_ERROR),
        ];
        for (kind, expected) in cases {
            let (status, body) = response_to_http(DeskmateResponse::err(kind, "boom"));
            assert_eq!(status, expected);
            assert_eq!(body["error"], "boom");
            assert_eq!(body["status"], "error");
        }
    }

    #[test]
    fn test_response_to_http_ok_no_data() {
        let mut resp = DeskmateResponse::ok(serde_json::json!({}));
        resp.data = None;
        let (status, body) = response_to_http(resp);
        assert_eq!(status, StatusCode::OK);
        assert!(body.is_object());
    }

    #[tokio::test]
    async fn test_ask_inner_missing_fields() {
        let services = demo();

        let (status, body) = ask_inner(&services, AskBody::default()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"].as_str().unwrap().contains("tenant_id"));

        let req = AskBody {
            tenant_id: Some(DEMO_TENANT_ID),
            query: Some("   ".to_string()),
            ..Default::default()
        };
        let (status, _) = ask_inner(&services, req).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_ask_inner_returns_envelope_with_timing() {
        let req = AskBody {
            tenant_id: Some(DEMO_TENANT_ID),
            query: Some("what is the return policy".to_string()),
            ..Default::default()
        };
        let (status, body) = ask_inner(&demo(), req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["path"], "templated_fallback");
        assert!(body["took_ms"].is_number());
        assert!(body["matched_record_id"].is_string());
    }

    #[tokio::test]
    async fn test_search_inner_includes_patterns() {
        let (status, body) = search_inner(&demo(), search("when is the lunch break")).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["results"][0]["is_pattern_match"], true);
    }

    #[tokio::test]
    async fn test_semantic_search_inner_without_backend_is_503() {
        let (status, _) = semantic_search_inner(&demo(), search("hours")).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_semantic_search_inner_backend_failure_is_502() {
        let services = demo().with_embedder(Arc::new(MockEmbedder::failing()));
        let (status, body) = semantic_search_inner(&services, search("hours")).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["status"], "error");
    }

    #[tokio::test]
    async fn test_record_lifecycle() {
        let services = demo();
        let draft: RecordDraft = serde_json::from_value(serde_json::json!({
            "title": "Gift wrapping",
            "body": "Gift wrapping is free for purchases over 100 NIS.",
            "type": "policy"
        }))
        .unwrap();

        let (status, created) = upsert_record_inner(&services, DEMO_TENANT_ID, draft).await;
        assert_eq!(status, StatusCode::OK);
        let id: Uuid = serde_json::from_value(created["id"].clone()).unwrap();
        assert_eq!(created["record_type"], "policy");

        let (status, fetched) = get_record_inner(&services, DEMO_TENANT_ID, id).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(fetched["title"], "Gift wrapping");

        // other tenants cannot see it
        let (status, _) = get_record_inner(&services, Uuid::new_v4(), id).await;
        assert_eq!(status, StatusCode::NOT_FOUND);

        let (status, _) = delete_record_inner(&services, DEMO_TENANT_ID, id).await;
        assert_eq!(status, StatusCode::OK);
        let (status, _) = get_record_inner(&services, DEMO_TENANT_ID, id).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_upsert_rejects_empty_body() {
        let draft: RecordDraft = serde_json::from_value(serde_json::json!({ "title": "x" })).unwrap();
        let (status, _) = upsert_record_inner(&demo(), DEMO_TENANT_ID, draft).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_escalation_flow() {
        let services = demo();
        let req = AskBody {
            tenant_id: Some(DEMO_TENANT_ID),
            query: Some("is parking allowed near loading zone".to_string()),
            ..Default::default()
        };
        let (_, answered) = ask_inner(&services, req).await;
        assert_eq!(answered["path"], "no_match");

        let (_, listed) = list_escalations_inner(&services, DEMO_TENANT_ID, EscalationFilter::default());
        assert_eq!(listed["count"], 1);
        let id: Uuid = serde_json::from_value(listed["escalations"][0]["id"].clone()).unwrap();

        let (status, _) = resolve_escalation_inner(
            &services,
            DEMO_TENANT_ID,
            id,
            ResolveBody {
                manager_name: String::new(),
                answer: "x".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, resolved) = resolve_escalation_inner(
            &services,
            DEMO_TENANT_ID,
            id,
            ResolveBody {
                manager_name: "Noa".to_string(),
                answer: "Only before 08:00.".to_string(),
            },
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resolved["resolution"]["manager_name"], "Noa");

        let (_, listed) = list_escalations_inner(&services, DEMO_TENANT_ID, EscalationFilter::default());
        assert_eq!(listed["count"], 0);
    }

    #[tokio::test]
    async fn test_conversation_inner() {
        let services = demo();
        let (status, _) = conversation_inner(&services, DEMO_TENANT_ID, "missing");
        assert_eq!(status, StatusCode::NOT_FOUND);

        let req = AskBody {
            tenant_id: Some(DEMO_TENANT_ID),
            query: Some("dress code".to_string()),
            conversation_id: Some("c-1".to_string()),
            ..Default::default()
        };
        ask_inner(&services, req).await;

        let (status, body) = conversation_inner(&services, DEMO_TENANT_ID, "c-1");
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["turns"].as_array().unwrap().len(), 2);
        assert_eq!(body["turns"][0]["role"], "user");
    }
}
