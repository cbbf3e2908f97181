use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{
        Path, Query, State,
        rejection::{JsonRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post, put},
};
use dealflow_common::{
    CreateDealRequest, CreatePipelineRequest, DealFilter, ErrorBody, ErrorKind, MoveDealRequest,
    NewStage, SnapshotQuery, UpdateDealRequest, UpdatePipelineRequest, UpdateStageRequest,
};
use tokio::sync::broadcast;

use super::db::DbHandle;
use super::ws::{WsMessage, broadcast_message};
use crate::errors::CrmError;

// ── Shared application state ──────────────────────────────────────────

pub struct AppState {
    pub db: DbHandle,
    pub ws_tx: broadcast::Sender<String>,
    /// Currency applied to new deals that do not name one.
    pub default_currency: String,
}

pub type SharedState = Arc<AppState>;

// ── Error handling ────────────────────────────────────────────────────

#[derive(Debug)]
pub enum ApiError {
    NotFound(String),
    BadRequest(String),
    Unprocessable(String),
    Internal(String),
}

impl From<CrmError> for ApiError {
    fn from(err: CrmError) -> Self {
        let message = err.to_string();
        match err.kind() {
            ErrorKind::NotFound => ApiError::NotFound(message),
            ErrorKind::InvalidInput => ApiError::BadRequest(message),
            ErrorKind::InvalidState => ApiError::Unprocessable(message),
            _ => ApiError::Internal(message),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, message) = match self {
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, ErrorKind::NotFound, msg),
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, ErrorKind::InvalidInput, msg),
            ApiError::Unprocessable(msg) => {
                (StatusCode::UNPROCESSABLE_ENTITY, ErrorKind::InvalidState, msg)
            }
            ApiError::Internal(msg) => {
                tracing::error!(error = %msg, "internal error");
                (StatusCode::INTERNAL_SERVER_ERROR, ErrorKind::Internal, msg)
            }
        };
        (status, Json(ErrorBody { error: message, kind })).into_response()
    }
}

// ── Router ────────────────────────────────────────────────────────────

/// Routes under `/api`. Authentication is layered on by the server.
pub fn api_router() -> Router<SharedState> {
    Router::new()
        .route("/api/pipelines", get(list_pipelines).post(create_pipeline))
        .route(
            "/api/pipelines/{id}",
            get(get_pipeline).patch(update_pipeline),
        )
        .route(
            "/api/pipelines/{id}/stages",
            get(list_stages).post(create_stage),
        )
        .route(
            "/api/pipelines/stages/{id}",
            put(update_stage).delete(delete_stage),
        )
        .route("/api/deals", get(list_deals).post(create_deal))
        .route("/api/deals/stats/pipeline", get(pipeline_stats))
        .route(
            "/api/deals/{id}",
            get(get_deal).put(update_deal).delete(delete_deal),
        )
        .route("/api/deals/{id}/move", post(move_deal))
        .route("/api/deals/{id}/history", get(deal_history))
}

// ── Handlers ──────────────────────────────────────────────────────────

pub async fn health_check() -> &'static str {
    "ok"
}

async fn list_pipelines(State(state): State<SharedState>) -> Result<impl IntoResponse, ApiError> {
    let pipelines = state.db.call(|db| db.list_pipelines()).await?;
    Ok(Json(pipelines))
}

async fn create_pipeline(
    State(state): State<SharedState>,
    payload: Result<Json<CreatePipelineRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let pipeline = state.db.call(move |db| db.create_pipeline(&req)).await?;
    tracing::info!(pipeline_id = pipeline.id, name = %pipeline.name, "pipeline created");
    broadcast_message(
        &state.ws_tx,
        &WsMessage::PipelineCreated {
            pipeline: pipeline.clone(),
        },
    );
    Ok((StatusCode::CREATED, Json(pipeline)))
}

async fn get_pipeline(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let pipeline = state.db.call(move |db| db.get_pipeline(id)).await?;
    match pipeline {
        Some(pipeline) => Ok(Json(pipeline)),
        None => Err(CrmError::PipelineNotFound { id }.into()),
    }
}

async fn update_pipeline(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdatePipelineRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let pipeline = state
        .db
        .call(move |db| db.update_pipeline(id, &req))
        .await?;
    tracing::info!(pipeline_id = id, active = pipeline.is_active, "pipeline updated");
    broadcast_message(
        &state.ws_tx,
        &WsMessage::PipelineUpdated {
            pipeline: pipeline.clone(),
        },
    );
    Ok(Json(pipeline))
}

async fn list_stages(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let stages = state.db.call(move |db| db.list_stages(id)).await?;
    Ok(Json(stages))
}

async fn create_stage(
    State(state): State<SharedState>,
    Path(pipeline_id): Path<i64>,
    payload: Result<Json<NewStage>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let stage = state
        .db
        .call(move |db| db.create_stage(pipeline_id, &req))
        .await?;
    tracing::info!(pipeline_id, stage_id = stage.id, sort_order = stage.sort_order, "stage created");
    broadcast_message(&state.ws_tx, &WsMessage::StageCreated { stage: stage.clone() });
    Ok((StatusCode::CREATED, Json(stage)))
}

async fn update_stage(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateStageRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let stage = state.db.call(move |db| db.update_stage(id, &req)).await?;
    tracing::info!(stage_id = id, sort_order = stage.sort_order, "stage updated");
    broadcast_message(&state.ws_tx, &WsMessage::StageUpdated { stage: stage.clone() });
    Ok(Json(stage))
}

async fn delete_stage(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let stage = state.db.call(move |db| db.delete_stage(id)).await?;
    tracing::info!(stage_id = id, pipeline_id = stage.pipeline_id, "stage deleted");
    broadcast_message(
        &state.ws_tx,
        &WsMessage::StageDeleted {
            stage_id: id,
            pipeline_id: stage.pipeline_id,
        },
    );
    Ok(StatusCode::NO_CONTENT)
}

async fn list_deals(
    State(state): State<SharedState>,
    query: Result<Query<DealFilter>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(filter) = query?;
    let deals = state.db.call(move |db| db.list_deals(&filter)).await?;
    Ok(Json(deals))
}

async fn create_deal(
    State(state): State<SharedState>,
    payload: Result<Json<CreateDealRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let currency = state.default_currency.clone();
    let deal = state
        .db
        .call(move |db| db.create_deal(&req, &currency))
        .await?;
    tracing::info!(deal_id = deal.id, pipeline_id = deal.pipeline_id, stage_id = deal.stage_id, "deal created");
    broadcast_message(&state.ws_tx, &WsMessage::DealCreated { deal: deal.clone() });
    Ok((StatusCode::CREATED, Json(deal)))
}

async fn get_deal(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let deal = state.db.call(move |db| db.get_deal(id)).await?;
    match deal {
        Some(deal) => Ok(Json(deal)),
        None => Err(CrmError::DealNotFound { id }.into()),
    }
}

async fn update_deal(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Result<Json<UpdateDealRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let deal = state.db.call(move |db| db.update_deal(id, &req)).await?;
    broadcast_message(&state.ws_tx, &WsMessage::DealUpdated { deal: deal.clone() });
    Ok(Json(deal))
}

async fn delete_deal(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    state.db.call(move |db| db.delete_deal(id)).await?;
    tracing::info!(deal_id = id, "deal deleted");
    broadcast_message(&state.ws_tx, &WsMessage::DealDeleted { deal_id: id });
    Ok(StatusCode::NO_CONTENT)
}

async fn move_deal(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
    payload: Result<Json<MoveDealRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Json(req) = payload?;
    let stage_id = req.stage_id;
    let result = state
        .db
        .call(move |db| db.move_deal(id, stage_id, req.reason.as_deref()))
        .await;
    let (deal, plan) = match result {
        Ok(moved) => moved,
        Err(e) => {
            tracing::warn!(deal_id = id, stage_id, error = %e, "move rejected");
            return Err(e.into());
        }
    };

    tracing::info!(
        deal_id = id,
        from_stage_id = plan.from_stage_id,
        to_stage_id = plan.to_stage_id,
        status = %plan.status,
        "deal moved"
    );
    broadcast_message(
        &state.ws_tx,
        &WsMessage::DealMoved {
            deal_id: id,
            pipeline_id: deal.pipeline_id,
            from_stage_id: plan.from_stage_id,
            to_stage_id: plan.to_stage_id,
            status: plan.status,
        },
    );
    Ok(Json(deal))
}

async fn deal_history(
    State(state): State<SharedState>,
    Path(id): Path<i64>,
) -> Result<impl IntoResponse, ApiError> {
    let history = state.db.call(move |db| db.deal_history(id)).await?;
    Ok(Json(history))
}

async fn pipeline_stats(
    State(state): State<SharedState>,
    query: Result<Query<SnapshotQuery>, QueryRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let Query(SnapshotQuery { pipeline_id }) = query?;
    let snapshot = state
        .db
        .call(move |db| db.kanban_snapshot(pipeline_id))
        .await?;
    Ok(Json(snapshot))
}

// ── Tests ─────────────────────────────────────────────────────────────
