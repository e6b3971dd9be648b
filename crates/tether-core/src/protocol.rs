//! Wire protocol
//!
//! Inbound envelope:
//! `{ type: "connect" | "executeCommand", nonce, sessionToken?, requestId, command? }`
//!
//! Outbound response: `{ requestId, payload }`, where a failed command's
//! payload is `{ error, code, success: false }`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use tether_session::TabId;

use crate::error::ProtocolError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EnvelopeKind {
    Connect,
    ExecuteCommand,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Envelope {
    #[serde(rename = "type")]
    pub kind: EnvelopeKind,
    #[serde(default)]
    pub nonce: Option<String>,
    #[serde(default)]
    pub session_token: Option<String>,
    pub request_id: String,
    #[serde(default)]
    pub command: Option<Value>,
}

impl Envelope {
    /// The tab a command names, read before the command is fully parsed
    pub fn tab_hint(&self) -> Option<TabId> {
        self.command
            .as_ref()
            .and_then(|c| c.get("tabId"))
            .and_then(Value::as_u64)
            .and_then(|id| TabId::try_from(id).ok())
    }
}

/// Commands carried by an `executeCommand` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum Command {
    CreateTab {
        session_id: String,
        #[serde(default)]
        url: Option<String>,
    },
    ListTabs {
        session_id: String,
    },
    Navigate {
        session_id: String,
        #[serde(default)]
        tab_id: Option<TabId>,
        url: String,
    },
    Execute {
        session_id: String,
        tab_id: TabId,
        tool: String,
        #[serde(default)]
        args: Value,
    },
}

impl Command {
    const KINDS: [&'static str; 4] = ["createTab", "listTabs", "navigate", "execute"];

    /// Parse a raw command, telling an unknown `type` apart from bad fields
    pub fn parse(raw: Value) -> Result<Self, ProtocolError> {
        let kind = raw
            .get("type")
            .and_then(Value::as_str)
            .ok_or_else(|| ProtocolError::MalformedMessage("command has no type".into()))?;

        if !Self::KINDS.contains(&kind) {
            return Err(ProtocolError::UnknownCommand(kind.to_string()));
        }

        serde_json::from_value(raw).map_err(|e| ProtocolError::MalformedMessage(e.to_string()))
    }

    pub fn session_id(&self) -> &str {
        match self {
            Command::CreateTab { session_id, .. }
            | Command::ListTabs { session_id }
            | Command::Navigate { session_id, .. }
            | Command::Execute { session_id, .. } => session_id,
        }
    }

    /// The existing tab this command acts on, if any
    pub fn tab_id(&self) -> Option<TabId> {
        match self {
            Command::Navigate { tab_id, .. } => *tab_id,
            Command::Execute { tab_id, .. } => Some(*tab_id),
            Command::CreateTab { .. } | Command::ListTabs { .. } => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub request_id: String,
    pub payload: Value,
}

impl Response {
    pub fn ok(request_id: impl Into<String>, payload: Value) -> Self {
        Self {
            request_id: request_id.into(),
            payload,
        }
    }

    pub fn error(request_id: impl Into<String>, err: &ProtocolError) -> Self {
        Self {
            request_id: request_id.into(),
            payload: json!({
                "error": err.to_string(),
                "code": err.code(),
                "success": false,
            }),
        }
    }

    pub fn is_error(&self) -> bool {
        self.payload.get("success") == Some(&Value::Bool(false))
    }

    pub fn error_code(&self) -> Option<&str> {
        if !self.is_error() {
            return None;
        }
        self.payload.get("code").and_then(Value::as_str)
    }
}

/// Payload answering a successful `connect`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionCreated {
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub session_token: String,
    pub expires_at: DateTime<Utc>,
}

impl SessionCreated {
    pub fn to_payload(&self) -> Value {
        json!({
            "sessionId": self.session_id,
            "createdAt": self.created_at,
            "sessionToken": self.session_token,
            "expiresAt": self.expires_at,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_envelope() {
        let envelope: Envelope = serde_json::from_value(json!({
            "type": "executeCommand",
            "nonce": "n-1",
            "sessionToken": "tok",
            "requestId": "r-1",
            "command": { "type": "execute", "sessionId": "s-1", "tabId": 4, "tool": "click" }
        }))
        .unwrap();

        assert_eq!(envelope.kind, EnvelopeKind::ExecuteCommand);
        assert_eq!(envelope.session_token.as_deref(), Some("tok"));
        assert_eq!(envelope.tab_hint(), Some(4));
    }

    #[test]
    fn test_unknown_envelope_kind() {
        let envelope: Envelope =
            serde_json::from_value(json!({ "type": "shutdown", "requestId": "r-1" })).unwrap();
        assert_eq!(envelope.kind, EnvelopeKind::Unknown);
        assert!(envelope.nonce.is_none());
    }

    #[test]
    fn test_parse_commands() {
        let command = Command::parse(json!({
            "type": "navigate",
            "sessionId": "s-1",
            "url": "https://bank.com"
        }))
        .unwrap();
        assert_eq!(
            command,
            Command::Navigate {
                session_id: "s-1".into(),
                tab_id: None,
                url: "https://bank.com".into(),
            }
        );
        assert_eq!(command.tab_id(), None);

        let command = Command::parse(json!({
            "type": "execute",
            "sessionId": "s-1",
            "tabId": 2,
            "tool": "type",
            "args": { "ref": "e3", "text": "hello" }
        }))
        .unwrap();
        assert_eq!(command.session_id(), "s-1");
        assert_eq!(command.tab_id(), Some(2));
    }

    #[test]
    fn test_parse_rejections() {
        assert!(matches!(
            Command::parse(json!({ "type": "formatDisk", "sessionId": "s-1" })),
            Err(ProtocolError::UnknownCommand(kind)) if kind == "formatDisk"
        ));

        // Known type, missing required field
        assert!(matches!(
            Command::parse(json!({ "type": "execute", "sessionId": "s-1", "tool": "click" })),
            Err(ProtocolError::MalformedMessage(_))
        ));

        assert!(matches!(
            Command::parse(json!({ "sessionId": "s-1" })),
            Err(ProtocolError::MalformedMessage(_))
        ));
    }

    #[test]
    fn test_error_response_shape() {
        let response = Response::error("r-9", &ProtocolError::TabAccessDenied(7));

        assert_eq!(response.request_id, "r-9");
        assert!(response.is_error());
        assert_eq!(response.error_code(), Some("TabAccessDenied"));
        assert_eq!(response.payload["success"], json!(false));
        assert_eq!(response.payload["error"], json!("Access denied to tab 7"));

        let ok = Response::ok("r-10", json!({ "success": true }));
        assert!(!ok.is_error());
        assert_eq!(ok.error_code(), None);
    }

    #[test]
    fn test_session_created_payload_is_camel_case() {
        let now = Utc::now();
        let created = SessionCreated {
            session_id: "s-1".into(),
            created_at: now,
            session_token: "tok".into(),
            expires_at: now,
        };

        let payload = created.to_payload();
        assert_eq!(payload["sessionId"], json!("s-1"));
        assert_eq!(payload["sessionToken"], json!("tok"));

        let back: SessionCreated = serde_json::from_value(payload).unwrap();
        assert_eq!(back, created);
    }
}
