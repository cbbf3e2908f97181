//! Bearer-token check in front of `/api` and `/ws`.
//!
//! Tokens are issued by an external identity service and listed in the
//! `[auth]` config section; this side only verifies them.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, Request, State},
    http::{StatusCode, header},
    middleware::Next,
    response::{IntoResponse, Response},
};
use dealflow_common::{ErrorBody, ErrorKind};

#[derive(Debug, Clone, Default)]
pub struct TokenVerifier {
    tokens: HashSet<String>,
}

impl TokenVerifier {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            tokens: tokens
                .into_iter()
                .map(Into::into)
                .filter(|t: &String| !t.is_empty())
                .collect(),
        }
    }

    /// With no tokens configured every request is let through.
    pub fn is_enabled(&self) -> bool {
        !self.tokens.is_empty()
    }

    pub fn verify(&self, token: Option<&str>) -> bool {
        if !self.is_enabled() {
            return true;
        }
        token.is_some_and(|t| self.tokens.contains(t))
    }
}

/// Pull the token from `Authorization: Bearer ...`, falling back to an
/// `access_token` query parameter (browsers cannot set headers on a
/// WebSocket upgrade). The scheme is matched case-insensitively and the
/// query value is percent-decoded.
fn request_token(req: &Request) -> Option<String> {
    let from_header = req
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().split_once(' '))
        .filter(|(scheme, _)| scheme.eq_ignore_ascii_case("bearer"))
        .map(|(_, token)| token.trim().to_string());
    from_header.or_else(|| {
        let Query(mut params) = Query::<HashMap<String, String>>::try_from_uri(req.uri()).ok()?;
        params.remove("access_token")
    })
}

pub async fn require_bearer(
    State(verifier): State<Arc<TokenVerifier>>,
    req: Request,
    next: Next,
) -> Response {
    if verifier.verify(request_token(&req).as_deref()) {
        return next.run(req).await;
    }
    tracing::debug!(path = %req.uri().path(), "rejected request without a valid token");
    let body = ErrorBody {
        error: "Missing or invalid bearer token".to_string(),
        kind: ErrorKind::Unauthorized,
    };
    (StatusCode::UNAUTHORIZED, Json(body)).into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    #[test]
    fn test_disabled_verifier_accepts_everything() {
        let verifier = TokenVerifier::default();
        assert!(!verifier.is_enabled());
        assert!(verifier.verify(None));
        assert!(verifier.verify(Some("anything")));
    }

    #[test]
    fn test_verifier_checks_membership() {
        let verifier = TokenVerifier::new(["alpha", "", "beta"]);
        assert!(verifier.is_enabled());
        assert!(verifier.verify(Some("beta")));
        assert!(!verifier.verify(Some("gamma")));
        assert!(!verifier.verify(Some("")));
        assert!(!verifier.verify(None));
    }

    fn request(uri: &str, authorization: Option<&str>) -> Request {
        let mut builder = Request::builder().uri(uri);
        if let Some(value) = authorization {
            builder = builder.header("authorization", value);
        }
        builder.body(Body::empty()).unwrap()
    }

    #[test]
    fn test_request_token_from_header_or_query() {
        let req = request("/api/deals", Some("Bearer secret"));
        assert_eq!(request_token(&req).as_deref(), Some("secret"));

        let req = request("/ws?x=1&access_token=qtoken", None);
        assert_eq!(request_token(&req).as_deref(), Some("qtoken"));

        let req = request("/api/deals", Some("Basic abc"));
        assert_eq!(request_token(&req), None);

        let req = request("/ws?x=1", None);
        assert_eq!(request_token(&req), None);
    }

    #[test]
    fn test_bearer_scheme_is_case_insensitive() {
        for value in ["bearer secret", "BEARER secret", "Bearer  secret "] {
            let req = request("/api/deals", Some(value));
            assert_eq!(request_token(&req).as_deref(), Some("secret"), "{}", value);
        }
    }

    #[test]
    fn test_query_token_is_percent_decoded() {
        let verifier = TokenVerifier::new(["a+b/c="]);
        let req = request("/ws?access_token=a%2Bb%2Fc%3D", None);
        let token = request_token(&req);
        assert_eq!(token.as_deref(), Some("a+b/c="));
        assert!(verifier.verify(token.as_deref()));
    }
}
