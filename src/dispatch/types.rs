use serde::Serialize;

/// The processing service took the record (any 2xx).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DispatchAccepted {
    pub status: u16,
    /// Response body, parsed as JSON when possible, else a JSON string.
    pub body: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DispatchError {
    /// Connection failure or timeout; the service may never have seen the request.
    #[error("transient dispatch failure: {reason}")]
    Transient { reason: String },

    /// The service refused the record (non-2xx below 500). Not retried.
    #[error("processing service rejected request ({status}): {body}")]
    RequestRejected { status: u16, body: String },

    #[error("processing service unavailable ({status}): {body}")]
    ServiceUnavailable { status: u16, body: String },
}

impl DispatchError {
    /// Whether redelivering the record could succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. } | Self::ServiceUnavailable { .. })
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Transient { .. } => "transient",
            Self::RequestRejected { .. } => "request_rejected",
            Self::ServiceUnavailable { .. } => "service_unavailable",
        }
    }
}
