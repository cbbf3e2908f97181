use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Pipeline {
    pub id: i64,
    pub name: String,
    pub description: Option<String>,
    pub sort_order: i32,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
}

/// One step of a pipeline. Belongs to exactly one pipeline.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Stage {
    pub id: i64,
    pub pipeline_id: i64,
    pub name: String,
    pub description: Option<String>,
    pub color: String,
    pub sort_order: i32,
    /// Advisory close probability, 0-100.
    pub win_probability: i32,
    pub is_final: bool,
    pub is_won: bool,
    pub created_at: DateTime<Utc>,
}

impl Stage {
    /// The deal status a deal takes on when it lands on this stage.
    pub fn landing_status(&self) -> DealStatus {
        match (self.is_final, self.is_won) {
            (false, _) => DealStatus::Open,
            (true, true) => DealStatus::Won,
            (true, false) => DealStatus::Lost,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum DealStatus {
    #[default]
    Open,
    Won,
    Lost,
}

impl DealStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Won => "won",
            Self::Lost => "lost",
        }
    }

    /// Won and lost deals admit no further stage moves.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Won | Self::Lost)
    }
}

impl FromStr for DealStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "open" => Ok(Self::Open),
            "won" => Ok(Self::Won),
            "lost" => Ok(Self::Lost),
            _ => Err(format!("Invalid deal status: {}", s)),
        }
    }
}

impl std::fmt::Display for DealStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Deal {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub client_id: i64,
    pub manager_id: Option<i64>,
    pub pipeline_id: i64,
    pub stage_id: i64,
    pub amount: f64,
    pub currency: String,
    pub status: DealStatus,
    pub lost_reason: Option<String>,
    pub expected_close_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub closed_at: Option<DateTime<Utc>>,
}

/// Card-sized view of a deal, as rendered inside a board column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DealCard {
    pub id: i64,
    pub title: String,
    pub amount: f64,
    pub currency: String,
    pub client_id: i64,
    pub status: DealStatus,
}

impl From<&Deal> for DealCard {
    fn from(deal: &Deal) -> Self {
        Self {
            id: deal.id,
            title: deal.title.clone(),
            amount: deal.amount,
            currency: deal.currency.clone(),
            client_id: deal.client_id,
            status: deal.status,
        }
    }
}

/// Derived per-stage view of a pipeline. Never persisted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageSnapshot {
    pub stage_id: i64,
    pub stage_name: String,
    pub color: String,
    pub sort_order: i32,
    pub is_final: bool,
    pub is_won: bool,
    pub deals_count: usize,
    /// Nominal sum across currencies; amounts are not converted.
    pub total_amount: f64,
    pub deals: Vec<DealCard>,
}

/// One row of a deal's stage history.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StageTransition {
    pub id: i64,
    pub deal_id: i64,
    pub from_stage_id: Option<i64>,
    pub to_stage_id: i64,
    pub status: DealStatus,
    pub reason: Option<String>,
    pub changed_at: DateTime<Utc>,
}
