use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::ConversationTurn;

/// Protocol version reported in every response.
pub const PROTOCOL_VERSION: &str = "deskmate/1";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DeskmateRequest {
    Ping,
    Health,
    Ask {
        tenant_id: Uuid,
        query: String,
        #[serde(default)]
        conversation_id: Option<String>,
        #[serde(default)]
        history: Option<Vec<ConversationTurn>>,
        #[serde(default)]
        caller: Option<String>,
    },
    Search {
        tenant_id: Uuid,
        query: String,
        limit: Option<usize>,
    },
    GetRecord {
        tenant_id: Uuid,
        id: Uuid,
    },
    Reindex {
        tenant_id: Uuid,
    },
}

/// Machine-readable error category carried next to the message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    NotFound,
    Validation,
    RateLimited,
    Upstream,
    Unconfigured,
    Internal,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct DeskmateResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    #[serde(default)]
    pub error_kind: Option<ErrorKind>,
    pub version: String,
}

impl DeskmateResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            error_kind: None,
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn err(kind: ErrorKind, msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            error_kind: Some(kind),
            version: PROTOCOL_VERSION.to_string(),
        }
    }

    pub fn pong() -> Self {
        Self::ok(serde_json::json!({"pong": true}))
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_uses_action_tag() {
        let req: DeskmateRequest = serde_json::from_value(serde_json::json!({
            "action": "ask",
            "tenant_id": "6d3f9a2e-0c1b-4e57-9d1a-5b7c2f408e11",
            "query": "when do we open",
            "history": [{ "role": "user", "content": "hi" }]
        }))
        .unwrap();

        match req {
            DeskmateRequest::Ask { query, history, conversation_id, .. } => {
                assert_eq!(query, "when do we open");
                assert_eq!(history.unwrap().len(), 1);
                assert!(conversation_id.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_error_response_shape() {
        let resp = DeskmateResponse::err(ErrorKind::NotFound, "knowledge record x");
        assert!(!resp.is_ok());
        let json = serde_json::to_value(&resp).unwrap();
        assert_eq!(json["error_kind"], "not_found");
        assert_eq!(json["version"], PROTOCOL_VERSION);
    }
}
