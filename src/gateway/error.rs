use serde_json::Value;
use thiserror::Error;

/// Every way a call to the authority service can fail. The `Display` text is
/// the message shown to the player.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GatewayError {
    #[error("Could not reach the game server: {0}")]
    Network(String),

    #[error("The game server did not answer within {after_ms} ms")]
    Timeout { after_ms: u64 },

    #[error("API {status}")]
    Protocol { status: u16 },

    #[error("{message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected response from the game server: {detail}")]
    Malformed { detail: String },
}

/// Result type alias for gateway operations
pub type GatewayResult<T> = Result<T, GatewayError>;

/// Coarse classification of a [`GatewayError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    NetworkFailure,
    ProtocolError,
    ApplicationRejection,
    MalformedResponse,
}

impl GatewayError {
    pub fn malformed(detail: impl Into<String>) -> Self {
        Self::Malformed {
            detail: detail.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Network(_) | Self::Timeout { .. } => ErrorKind::NetworkFailure,
            Self::Protocol { .. } => ErrorKind::ProtocolError,
            Self::Rejected { .. } => ErrorKind::ApplicationRejection,
            Self::Malformed { .. } => ErrorKind::MalformedResponse,
        }
    }
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        Self::Network(e.to_string())
    }
}

/// Turn a raw HTTP status and body into parsed JSON or a classified failure.
///
/// Error bodies come in several shapes: nothing at all, plain text, or JSON
/// carrying `message` and/or `error`. `message` wins when both are present.
pub fn classify_response(status: u16, body: &[u8]) -> GatewayResult<Value> {
    if (200..300).contains(&status) {
        return serde_json::from_slice(body).map_err(|e| GatewayError::malformed(e.to_string()));
    }
    let message = serde_json::from_slice::<Value>(body)
        .ok()
        .and_then(|json| rejection_message(&json));
    match message {
        Some(message) => Err(GatewayError::Rejected { status, message }),
        None => Err(GatewayError::Protocol { status }),
    }
}

fn rejection_message(json: &Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .filter_map(|key| json.get(key)?.as_str())
        .map(str::trim)
        .find(|text| !text.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_body_is_parsed() {
        let json = classify_response(200, br#"{"state": {"territories": {}}}"#).unwrap();
        assert!(json.get("state").is_some());
    }

    #[test]
    fn success_without_json_is_malformed() {
        let err = classify_response(200, b"<html>").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
        let err = classify_response(204, b"").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::MalformedResponse);
    }

    #[test]
    fn message_body_is_a_rejection() {
        let err = classify_response(400, br#"{"message":"no dice left"}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApplicationRejection);
        assert_eq!(err.to_string(), "no dice left");
    }

    #[test]
    fn message_wins_over_error() {
        let body = br#"{"error":"Nenhuma jogada para analisar","message":"Execute pelo menos um turno"}"#;
        let err = classify_response(400, body).unwrap_err();
        assert_eq!(err.to_string(), "Execute pelo menos um turno");
    }

    #[test]
    fn error_field_is_used_alone() {
        let err = classify_response(404, br#"{"error":"Game not found"}"#).unwrap_err();
        assert_eq!(
            err,
            GatewayError::Rejected {
                status: 404,
                message: "Game not found".into()
            }
        );
    }

    #[test]
    fn unusable_bodies_are_protocol_errors() {
        let bodies: [&[u8]; 4] = [
            b"",
            b"Internal Server Error",
            br#"{"error": ""}"#,
            br#"{"code": 7}"#,
        ];
        for body in bodies {
            let err = classify_response(500, body).unwrap_err();
            assert_eq!(err, GatewayError::Protocol { status: 500 });
            assert_eq!(err.to_string(), "API 500");
        }
    }
}
