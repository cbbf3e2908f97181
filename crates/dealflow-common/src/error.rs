use serde::{Deserialize, Serialize};

/// Error taxonomy shared by server responses and client-side failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Referenced pipeline, stage or deal is absent.
    NotFound,
    /// Malformed or out-of-range field.
    InvalidInput,
    /// Well-formed request that breaks a transition rule.
    InvalidState,
    /// Missing, expired or rejected bearer token.
    Unauthorized,
    /// Transport error or timeout. Only ever observed by clients.
    NetworkFailure,
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NotFound => "not_found",
            Self::InvalidInput => "invalid_input",
            Self::InvalidState => "invalid_state",
            Self::Unauthorized => "unauthorized",
            Self::NetworkFailure => "network_failure",
            Self::Internal => "internal",
        }
    }
}

/// JSON envelope of every error response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ErrorBody {
    pub error: String,
    pub kind: ErrorKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_body_shape() {
        let body = ErrorBody {
            error: "Deal 4 not found".into(),
            kind: ErrorKind::NotFound,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json["kind"], "not_found");
        assert_eq!(json["error"], "Deal 4 not found");
    }

    #[test]
    fn test_as_str_matches_serde_name() {
        for kind in [
            ErrorKind::NotFound,
            ErrorKind::InvalidInput,
            ErrorKind::InvalidState,
            ErrorKind::Unauthorized,
            ErrorKind::NetworkFailure,
            ErrorKind::Internal,
        ] {
            let json = serde_json::to_string(&kind).unwrap();
            assert_eq!(json, format!("\"{}\"", kind.as_str()));
        }
    }
}
