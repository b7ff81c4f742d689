use crate::services::AppServices;
use crate::subsystems::composer::{self, AskRequest};
use crate::subsystems::{reindex, retrieve};
use deskmate_core::ipc::{DeskmateRequest, DeskmateResponse, ErrorKind};
use deskmate_core::DeskmateError;
use serde::Serialize;

/// Dispatch one request. Shared by the IPC socket and the HTTP API.
pub async fn handle_request(request: DeskmateRequest, services: &AppServices) -> DeskmateResponse {
    match request {
        DeskmateRequest::Ping => DeskmateResponse::pong(),
        DeskmateRequest::Health => {
            let mut data = services.describe();
            if let Some(obj) = data.as_object_mut() {
                obj.insert("status".to_string(), serde_json::json!("healthy"));
            }
            DeskmateResponse::ok(data)
        }
        DeskmateRequest::Ask {
            tenant_id,
            query,
            conversation_id,
            history,
            caller,
        } => {
            let key = format!("{}:{}", tenant_id, caller.as_deref().unwrap_or("anonymous"));
            if let Err(limited) = services.rate_limiter.check(&key) {
                tracing::warn!(tenant_id = %tenant_id, key = %key, "Rate limit exceeded");
                return DeskmateResponse::err(ErrorKind::RateLimited, limited.to_string());
            }

            let request = AskRequest {
                tenant_id,
                query,
                conversation_id,
                history,
                caller,
            };
            match composer::answer(services, request).await {
                Ok(envelope) => to_data(&envelope),
                Err(e) => error_response(&e),
            }
        }
        DeskmateRequest::Search { tenant_id, query, limit } => {
            match retrieve::keyword_search(
                services.corpus.as_ref(),
                services.patterns.as_ref(),
                &services.config.retrieval,
                tenant_id,
                &query,
                limit,
            )
            .await
            {
                Ok(results) => DeskmateResponse::ok(serde_json::json!({
                    "count": results.len(),
                    "results": results,
                })),
                Err(e) => error_response(&e),
            }
        }
        DeskmateRequest::GetRecord { tenant_id, id } => {
            match services.corpus.get_record(tenant_id, id).await {
                Ok(record) => to_data(&record),
                Err(e) => error_response(&e),
            }
        }
        DeskmateRequest::Reindex { tenant_id } => {
            let Some(embedder) = services.embedder.as_deref() else {
                return error_response(&DeskmateError::NotConfigured("embedding backend".to_string()));
            };
            match reindex::reindex_tenant(services.corpus.as_ref(), embedder, tenant_id).await {
                Ok(report) => to_data(&report),
                Err(e) => error_response(&e),
            }
        }
    }
}

pub fn error_kind(error: &DeskmateError) -> ErrorKind {
    match error {
        DeskmateError::NotFound(_) => ErrorKind::NotFound,
        DeskmateError::Validation(_) => ErrorKind::Validation,
        DeskmateError::UpstreamUnavailable(_) => ErrorKind::Upstream,
        DeskmateError::NotConfigured(_) => ErrorKind::Unconfigured,
        DeskmateError::Persistence(_) | DeskmateError::Config(_) | DeskmateError::Io(_) => {
            ErrorKind::Internal
        }
    }
}

pub fn error_response(error: &DeskmateError) -> DeskmateResponse {
    let kind = error_kind(error);
    if kind == ErrorKind::Internal {
        tracing::error!(error = %error, "Request failed");
    }
    DeskmateResponse::err(kind, error.to_string())
}

fn to_data<T: Serialize>(value: &T) -> DeskmateResponse {
    match serde_json::to_value(value) {
        Ok(data) => DeskmateResponse::ok(data),
        Err(e) => DeskmateResponse::err(ErrorKind::Internal, format!("Serialization error: {}", e)),
    }
}
