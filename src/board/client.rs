//! HTTP client for the CRM API.
//!
//! The board talks to the server through the [`DealApi`] trait so tests can
//! substitute an in-process fake. [`CrmClient`] is the real implementation.

use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use dealflow_common::{
    CreateDealRequest, Deal, DealFilter, ErrorBody, ErrorKind, MoveDealRequest, Pipeline,
    SnapshotQuery, Stage, StageSnapshot, StageTransition,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use crate::errors::ClientError;

/// Per-request ceiling for the underlying HTTP client. Move calls are
/// additionally bounded by the board's own timeout.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The subset of the API the board synchronizer needs.
#[async_trait]
pub trait DealApi: Send + Sync {
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, ClientError>;

    async fn kanban_snapshot(&self, pipeline_id: i64) -> Result<Vec<StageSnapshot>, ClientError>;

    async fn move_deal(
        &self,
        deal_id: i64,
        stage_id: i64,
        reason: Option<String>,
    ) -> Result<Deal, ClientError>;
}

/// Where to send requests and which bearer token to present.
///
/// The token comes from the external identity service; an empty token sends
/// no `Authorization` header (servers with auth disabled).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub base_url: String,
    pub token: String,
}

impl Session {
    pub fn new(base_url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token: token.into(),
        }
    }
}

pub struct CrmClient {
    http: Client,
    session: Mutex<Option<Session>>,
}

impl CrmClient {
    pub fn new(session: Session) -> Result<Self, ClientError> {
        let http = Client::builder().timeout(HTTP_TIMEOUT).build()?;
        Ok(Self {
            http,
            session: Mutex::new(Some(session)),
        })
    }

    pub fn login(&self, session: Session) {
        *self.lock_session() = Some(session);
    }

    /// Drop the session; every later call fails with `Unauthorized` without
    /// touching the network.
    pub fn logout(&self) {
        *self.lock_session() = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.lock_session().is_some()
    }

    fn lock_session(&self) -> std::sync::MutexGuard<'_, Option<Session>> {
        // The guarded value is a plain Option; a poisoned lock still holds a
        // usable one.
        self.session.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn request(&self, method: Method, path: &str) -> Result<RequestBuilder, ClientError> {
        let session = self.lock_session().clone().ok_or(ClientError::Unauthorized)?;
        let builder = self
            .http
            .request(method, format!("{}{}", session.base_url, path));
        Ok(if session.token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&session.token)
        })
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ClientError> {
        let response = builder.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status == StatusCode::UNAUTHORIZED {
            tracing::warn!("server rejected the session token; logging out");
            self.logout();
            return Err(ClientError::Unauthorized);
        }

        let text = response.text().await.unwrap_or_default();
        Err(match serde_json::from_str::<ErrorBody>(&text) {
            Ok(body) => ClientError::Api {
                kind: body.kind,
                message: body.error,
            },
            Err(_) => ClientError::Api {
                kind: kind_for_status(status),
                message: format!(
                    "HTTP {}: {}",
                    status,
                    text.chars().take(200).collect::<String>()
                ),
            },
        })
    }

    async fn json<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, ClientError> {
        let response = self.send(builder).await?;
        Ok(response.json().await?)
    }

    pub async fn get_deal(&self, deal_id: i64) -> Result<Deal, ClientError> {
        self.json(self.request(Method::GET, &format!("/api/deals/{}", deal_id))?)
            .await
    }

    pub async fn list_stages(&self, pipeline_id: i64) -> Result<Vec<Stage>, ClientError> {
        self.json(self.request(Method::GET, &format!("/api/pipelines/{}/stages", pipeline_id))?)
            .await
    }

    pub async fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, ClientError> {
        self.json(self.request(Method::GET, "/api/deals")?.query(filter))
            .await
    }

    pub async fn create_deal(&self, req: &CreateDealRequest) -> Result<Deal, ClientError> {
        self.json(self.request(Method::POST, "/api/deals")?.json(req))
            .await
    }

    pub async fn delete_deal(&self, deal_id: i64) -> Result<(), ClientError> {
        self.send(self.request(Method::DELETE, &format!("/api/deals/{}", deal_id))?)
            .await?;
        Ok(())
    }

    pub async fn deal_history(&self, deal_id: i64) -> Result<Vec<StageTransition>, ClientError> {
        self.json(self.request(Method::GET, &format!("/api/deals/{}/history", deal_id))?)
            .await
    }
}

/// Fallback when an error response carries no typed body.
fn kind_for_status(status: StatusCode) -> ErrorKind {
    match status {
        StatusCode::NOT_FOUND => ErrorKind::NotFound,
        StatusCode::BAD_REQUEST => ErrorKind::InvalidInput,
        StatusCode::UNPROCESSABLE_ENTITY | StatusCode::CONFLICT => ErrorKind::InvalidState,
        StatusCode::UNAUTHORIZED => ErrorKind::Unauthorized,
        _ => ErrorKind::Internal,
    }
}

#[async_trait]
impl DealApi for CrmClient {
    async fn list_pipelines(&self) -> Result<Vec<Pipeline>, ClientError> {
        self.json(self.request(Method::GET, "/api/pipelines")?).await
    }

    async fn kanban_snapshot(&self, pipeline_id: i64) -> Result<Vec<StageSnapshot>, ClientError> {
        self.json(
            self.request(Method::GET, "/api/deals/stats/pipeline")?
                .query(&SnapshotQuery { pipeline_id }),
        )
        .await
    }

    async fn move_deal(
        &self,
        deal_id: i64,
        stage_id: i64,
        reason: Option<String>,
    ) -> Result<Deal, ClientError> {
        let body = MoveDealRequest { stage_id, reason };
        self.json(
            self.request(Method::POST, &format!("/api/deals/{}/move", deal_id))?
                .json(&body),
        )
        .await
    }
}
