//! Request bodies and query strings.
//!
//! Bodies reject unknown fields so a payload that tries to set stage or
//! status through the wrong endpoint fails at the boundary.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::DealStatus;

fn default_color() -> String {
    "#3B82F6".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct NewStage {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_color")]
    pub color: String,
    pub sort_order: i32,
    #[serde(default)]
    pub win_probability: i32,
    #[serde(default)]
    pub is_final: bool,
    #[serde(default)]
    pub is_won: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(deny_unknown_fields)]
pub struct CreatePipelineRequest {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub sort_order: i32,
    #[serde(default)]
    pub stages: Vec<NewStage>,
}

/// Partial update of a pipeline; absent fields are left alone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdatePipelineRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_active: Option<bool>,
}

/// Partial update of a stage.
///
/// A new `sort_order` moves the stage to that position and shifts the
/// stages in between, so the pipeline's order stays dense.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateStageRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort_order: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub win_probability: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_final: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_won: Option<bool>,
}

/// Body of `POST /api/deals`.
///
/// `stage_id` and `status` exist for compatibility with older clients that
/// sent them; when present they must name the pipeline's first stage and
/// `open`, since placement is decided by the server.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateDealRequest {
    pub title: String,
    pub client_id: i64,
    pub pipeline_id: i64,
    pub amount: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_close_date: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DealStatus>,
}

/// Descriptive fields only; stage and status move through `MoveDealRequest`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateDealRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub amount: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub currency: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expected_close_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MoveDealRequest {
    pub stage_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Query string of `GET /api/deals`. Filters combine with AND.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DealFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pipeline_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<DealStatus>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manager_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotQuery {
    pub pipeline_id: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_move_request_rejects_unknown_fields() {
        let err = serde_json::from_str::<MoveDealRequest>(r#"{"stage_id": 3, "status": "won"}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_update_request_rejects_stage_id() {
        let err = serde_json::from_str::<UpdateDealRequest>(r#"{"title": "x", "stage_id": 2}"#);
        assert!(err.is_err());
    }

    #[test]
    fn test_create_deal_request_accepts_legacy_fields() {
        let req: CreateDealRequest = serde_json::from_str(
            r#"{"title": "Deal", "client_id": 1, "pipeline_id": 1, "stage_id": 4,
                "amount": 10.5, "currency": "RUB", "status": "open"}"#,
        )
        .unwrap();
        assert_eq!(req.stage_id, Some(4));
        assert_eq!(req.status, Some(DealStatus::Open));
        assert!(req.description.is_none());
    }

    #[test]
    fn test_update_stage_request_is_partial() {
        let req: UpdateStageRequest = serde_json::from_str(r##"{"color": "#000000"}"##).unwrap();
        assert_eq!(req.color.as_deref(), Some("#000000"));
        assert!(req.name.is_none() && req.sort_order.is_none());
        assert!(serde_json::from_str::<UpdateStageRequest>(r#"{"pipeline_id": 2}"#).is_err());
    }

    #[test]
    fn test_new_stage_defaults() {
        let stage: NewStage = serde_json::from_str(r#"{"name": "New", "sort_order": 0}"#).unwrap();
        assert_eq!(stage.color, "#3B82F6");
        assert_eq!(stage.win_probability, 0);
        assert!(!stage.is_final);
        assert!(!stage.is_won);
    }
}
