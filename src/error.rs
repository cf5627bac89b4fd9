use thiserror::Error;

use crate::client::ResponsePayload;

// ── ActionError ───────────────────────────────────────────────────────────────

/// Why a dispatcher action ended without a result.
///
/// Every variant is terminal for the action that raised it: nothing is retried,
/// the operator re-triggers the action.
#[derive(Debug, Clone, Error)]
pub enum ActionError {
    /// Rejected locally before any network call.
    #[error("{0}")]
    Validation(String),
    /// The call never produced an HTTP response.
    #[error("{0}")]
    Transport(String),
    /// The service answered with a non-2xx status; the payload is kept whole.
    #[error("{} {} returned {}", .0.method, .0.url, .0.status)]
    Response(Box<ResponsePayload>),
    /// The handler itself failed (panic or missing registration).
    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Validation,
    Transport,
    Response,
    Internal,
}

impl ErrorKind {
    pub fn label(self) -> &'static str {
        match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Transport => "transport",
            ErrorKind::Response => "response",
            ErrorKind::Internal => "internal",
        }
    }
}

impl ActionError {
    pub fn validation(msg: impl Into<String>) -> Self {
        ActionError::Validation(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ActionError::Validation(_) => ErrorKind::Validation,
            ActionError::Transport(_) => ErrorKind::Transport,
            ActionError::Response(_) => ErrorKind::Response,
            ActionError::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Structured body for the console: the full payload for response errors,
    /// `{"error": message}` for everything else.
    pub fn to_record_body(&self) -> serde_json::Value {
        match self {
            ActionError::Response(payload) => serde_json::to_value(payload.as_ref())
                .unwrap_or_else(|e| serde_json::json!({ "error": e.to_string() })),
            other => serde_json::json!({ "error": other.to_string() }),
        }
    }
}
