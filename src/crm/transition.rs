//! Stage-transition rules for deals.
//!
//! A deal is `open` at some non-final stage of its pipeline until it lands on
//! a final stage, which makes it `won` or `lost` for good. Between non-final
//! stages any move is allowed in either direction; funnel order is advisory.
//!
//! Validation is pure: [`plan_move`] decides, [`MovePlan::apply`] mutates an
//! in-memory deal, and the store persists the result inside one transaction.

use chrono::{DateTime, Utc};
use dealflow_common::{Deal, DealStatus, Stage};

use crate::errors::CrmError;

/// The validated effect of a move, ready to be written.
#[derive(Debug, Clone, PartialEq)]
pub struct MovePlan {
    pub deal_id: i64,
    pub from_stage_id: i64,
    pub to_stage_id: i64,
    pub status: DealStatus,
    /// Only set for losses; `None` means the reason was not given.
    pub lost_reason: Option<String>,
}

impl MovePlan {
    pub fn closes_deal(&self) -> bool {
        self.status.is_terminal()
    }

    pub fn changes_stage(&self) -> bool {
        self.from_stage_id != self.to_stage_id
    }

    /// Apply the plan to a deal, stamping `updated_at` and, on a terminal
    /// transition, `closed_at`.
    pub fn apply(&self, deal: &mut Deal, now: DateTime<Utc>) {
        deal.stage_id = self.to_stage_id;
        deal.status = self.status;
        if self.status == DealStatus::Lost {
            deal.lost_reason = self.lost_reason.clone();
        }
        deal.updated_at = now;
        if self.closes_deal() {
            deal.closed_at = Some(now);
        }
    }
}

/// Decide whether `deal` may move onto `target`.
///
/// Checks run in a fixed order: cross-pipeline first, then terminal status.
/// Existence of both records is the caller's concern.
pub fn plan_move(deal: &Deal, target: &Stage, reason: Option<&str>) -> Result<MovePlan, CrmError> {
    if target.pipeline_id != deal.pipeline_id {
        return Err(CrmError::CrossPipelineMove {
            stage_id: target.id,
            stage_pipeline_id: target.pipeline_id,
            deal_pipeline_id: deal.pipeline_id,
        });
    }
    if deal.status.is_terminal() {
        return Err(CrmError::TerminalDeal {
            deal_id: deal.id,
            status: deal.status,
        });
    }

    let status = target.landing_status();
    // Loss reasons are advisory: a missing one is stored as absent.
    let lost_reason = match status {
        DealStatus::Lost => reason
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .map(str::to_string),
        _ => None,
    };

    Ok(MovePlan {
        deal_id: deal.id,
        from_stage_id: deal.stage_id,
        to_stage_id: target.id,
        status,
        lost_reason,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stage(id: i64, pipeline_id: i64, order: i32, is_final: bool, is_won: bool) -> Stage {
        Stage {
            id,
            pipeline_id,
            name: format!("stage-{}", id),
            description: None,
            color: "#3B82F6".into(),
            sort_order: order,
            win_probability: 0,
            is_final,
            is_won,
            created_at: Utc::now(),
        }
    }

    fn open_deal(stage_id: i64) -> Deal {
        let now = Utc::now();
        Deal {
            id: 1,
            title: "Big sale".into(),
            description: None,
            client_id: 1,
            manager_id: None,
            pipeline_id: 1,
            stage_id,
            amount: 1000.0,
            currency: "RUB".into(),
            status: DealStatus::Open,
            lost_reason: None,
            expected_close_date: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    #[test]
    fn test_forward_move_stays_open() {
        let deal = open_deal(10);
        let plan = plan_move(&deal, &stage(11, 1, 1, false, false), None).unwrap();
        assert_eq!(plan.status, DealStatus::Open);
        assert_eq!(plan.to_stage_id, 11);
        assert!(!plan.closes_deal());
    }

    #[test]
    fn test_backward_move_is_allowed() {
        let deal = open_deal(12);
        let plan = plan_move(&deal, &stage(10, 1, 0, false, false), None).unwrap();
        assert_eq!(plan.from_stage_id, 12);
        assert_eq!(plan.to_stage_id, 10);
        assert_eq!(plan.status, DealStatus::Open);
    }

    #[test]
    fn test_move_to_won_stage_wins() {
        let mut deal = open_deal(10);
        let plan = plan_move(&deal, &stage(12, 1, 2, true, true), Some("ignored")).unwrap();
        assert_eq!(plan.status, DealStatus::Won);
        assert_eq!(plan.lost_reason, None);

        let now = Utc::now();
        plan.apply(&mut deal, now);
        assert_eq!(deal.status, DealStatus::Won);
        assert_eq!(deal.stage_id, 12);
        assert_eq!(deal.closed_at, Some(now));
        assert_eq!(deal.updated_at, now);
    }

    #[test]
    fn test_move_to_final_non_won_stage_loses_with_reason() {
        let mut deal = open_deal(10);
        let plan = plan_move(&deal, &stage(13, 1, 3, true, false), Some(" budget cut ")).unwrap();
        assert_eq!(plan.status, DealStatus::Lost);
        assert_eq!(plan.lost_reason.as_deref(), Some("budget cut"));

        plan.apply(&mut deal, Utc::now());
        assert_eq!(deal.status, DealStatus::Lost);
        assert_eq!(deal.lost_reason.as_deref(), Some("budget cut"));
        assert!(deal.closed_at.is_some());
    }

    #[test]
    fn test_loss_without_reason_is_accepted() {
        let deal = open_deal(10);
        let plan = plan_move(&deal, &stage(13, 1, 3, true, false), None).unwrap();
        assert_eq!(plan.status, DealStatus::Lost);
        assert_eq!(plan.lost_reason, None);

        let blank = plan_move(&deal, &stage(13, 1, 3, true, false), Some("   ")).unwrap();
        assert_eq!(blank.lost_reason, None);
    }

    #[test]
    fn test_cross_pipeline_move_rejected() {
        let deal = open_deal(10);
        let err = plan_move(&deal, &stage(20, 2, 0, false, false), None).unwrap_err();
        assert!(matches!(
            err,
            CrmError::CrossPipelineMove {
                stage_id: 20,
                stage_pipeline_id: 2,
                deal_pipeline_id: 1
            }
        ));
    }

    #[test]
    fn test_terminal_deals_reject_every_move() {
        for status in [DealStatus::Won, DealStatus::Lost] {
            let mut deal = open_deal(12);
            deal.status = status;
            for target in [
                stage(10, 1, 0, false, false),
                stage(12, 1, 2, true, true),
                stage(13, 1, 3, true, false),
            ] {
                let err = plan_move(&deal, &target, None).unwrap_err();
                assert!(matches!(err, CrmError::TerminalDeal { .. }));
            }
        }
    }

    #[test]
    fn test_cross_pipeline_checked_before_terminal() {
        let mut deal = open_deal(12);
        deal.status = DealStatus::Won;
        let err = plan_move(&deal, &stage(20, 2, 0, false, false), None).unwrap_err();
        assert!(matches!(err, CrmError::CrossPipelineMove { .. }));
    }

    #[test]
    fn test_same_stage_move_is_a_no_op_plan() {
        let deal = open_deal(10);
        let plan = plan_move(&deal, &stage(10, 1, 0, false, false), None).unwrap();
        assert!(!plan.changes_stage());
        assert_eq!(plan.status, DealStatus::Open);
    }
}
