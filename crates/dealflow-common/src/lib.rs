//! Wire types shared by the dealflow server and the board client.
//!
//! Everything here crosses the HTTP boundary as JSON: catalog rows
//! (`Pipeline`, `Stage`), deals, the derived `StageSnapshot`, request bodies
//! and the error envelope.

pub mod error;
pub mod models;
pub mod requests;

pub use error::{ErrorBody, ErrorKind};
pub use models::{Deal, DealCard, DealStatus, Pipeline, Stage, StageSnapshot, StageTransition};
pub use requests::{
    CreateDealRequest, CreatePipelineRequest, DealFilter, MoveDealRequest, NewStage,
    SnapshotQuery, UpdateDealRequest, UpdatePipelineRequest, UpdateStageRequest,
};
