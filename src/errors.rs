//! Typed error hierarchy for dealflow.
//!
//! Three enums cover the three sides of the system:
//! - `CrmError`: catalog, deal store and transition failures (server side)
//! - `ClientError`: HTTP API failures as observed by a client
//! - `BoardError`: gestures the board synchronizer refuses locally

use dealflow_common::{DealStatus, ErrorKind};
use thiserror::Error;

/// Errors from the catalog, deal store and transition validator.
#[derive(Debug, Error)]
pub enum CrmError {
    #[error("Pipeline {id} not found")]
    PipelineNotFound { id: i64 },

    #[error("Stage {id} not found")]
    StageNotFound { id: i64 },

    #[error("Deal {id} not found")]
    DealNotFound { id: i64 },

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(
        "Cross-pipeline move: stage {stage_id} belongs to pipeline {stage_pipeline_id}, deal is in pipeline {deal_pipeline_id}"
    )]
    CrossPipelineMove {
        stage_id: i64,
        stage_pipeline_id: i64,
        deal_pipeline_id: i64,
    },

    #[error("Terminal deal: deal {deal_id} is already {status}")]
    TerminalDeal { deal_id: i64, status: DealStatus },

    #[error("Pipeline {pipeline_id} has no stages")]
    EmptyPipeline { pipeline_id: i64 },

    #[error("Stage {stage_id} still holds {deals} deal(s)")]
    StageInUse { stage_id: i64, deals: i64 },

    #[error("Database lock poisoned")]
    LockPoisoned,

    #[error("Database error: {0:#}")]
    Database(#[from] anyhow::Error),
}

impl CrmError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::PipelineNotFound { .. } | Self::StageNotFound { .. } | Self::DealNotFound { .. } => {
                ErrorKind::NotFound
            }
            Self::InvalidInput(_) => ErrorKind::InvalidInput,
            Self::CrossPipelineMove { .. }
            | Self::TerminalDeal { .. }
            | Self::EmptyPipeline { .. }
            | Self::StageInUse { .. } => ErrorKind::InvalidState,
            Self::LockPoisoned | Self::Database(_) => ErrorKind::Internal,
        }
    }
}

/// Errors from the HTTP API as seen by a client.
#[derive(Debug, Clone, Error)]
pub enum ClientError {
    /// The server answered with a typed error body.
    #[error("{message}")]
    Api { kind: ErrorKind, message: String },

    #[error("Session expired or missing; log in again")]
    Unauthorized,

    #[error("Network failure: {0}")]
    Network(String),
}

impl ClientError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Api { kind, .. } => *kind,
            Self::Unauthorized => ErrorKind::Unauthorized,
            Self::Network(_) => ErrorKind::NetworkFailure,
        }
    }
}

impl From<reqwest::Error> for ClientError {
    fn from(err: reqwest::Error) -> Self {
        ClientError::Network(err.to_string())
    }
}

/// Gestures the board refuses before any request is issued.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BoardError {
    #[error("A move of deal {deal_id} is still in flight")]
    MoveInFlight { deal_id: i64 },

    #[error("No drag in progress")]
    NoDragInProgress,

    #[error("Deal {deal_id} is not on the board")]
    UnknownDeal { deal_id: i64 },

    #[error("Stage {stage_id} is not a column of this board")]
    UnknownStage { stage_id: i64 },

    #[error("Deal {deal_id} is already in stage {stage_id}")]
    SameStage { deal_id: i64, stage_id: i64 },

    #[error("No move is pending")]
    NothingPending,

    #[error("Move report for deal {reported} does not match the pending move of deal {pending}")]
    ReportMismatch { pending: i64, reported: i64 },
}
