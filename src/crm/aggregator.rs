//! Per-stage projection of a pipeline's deals.

use std::collections::HashMap;

use dealflow_common::{Deal, DealCard, Stage, StageSnapshot};

/// Build one snapshot per stage, in `sort_order`.
///
/// Every deal at a stage is counted whatever its status, so won and lost
/// deals sitting on final stages show up there. Amounts are summed nominally
/// across currencies. Deals whose stage is not in `stages` are ignored.
pub fn build_snapshots(stages: &[Stage], deals: &[Deal]) -> Vec<StageSnapshot> {
    let mut by_stage: HashMap<i64, Vec<&Deal>> = HashMap::new();
    for deal in deals {
        by_stage.entry(deal.stage_id).or_default().push(deal);
    }

    let mut ordered: Vec<&Stage> = stages.iter().collect();
    ordered.sort_by_key(|s| (s.sort_order, s.id));

    ordered
        .into_iter()
        .map(|stage| {
            let column = by_stage.remove(&stage.id).unwrap_or_default();
            StageSnapshot {
                stage_id: stage.id,
                stage_name: stage.name.clone(),
                color: stage.color.clone(),
                sort_order: stage.sort_order,
                is_final: stage.is_final,
                is_won: stage.is_won,
                deals_count: column.len(),
                total_amount: column.iter().map(|d| d.amount).sum(),
                deals: column.into_iter().map(DealCard::from).collect(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dealflow_common::DealStatus;

    fn stage(id: i64, order: i32) -> Stage {
        Stage {
            id,
            pipeline_id: 1,
            name: format!("stage-{}", id),
            description: None,
            color: "#3B82F6".into(),
            sort_order: order,
            win_probability: 0,
            is_final: false,
            is_won: false,
            created_at: Utc::now(),
        }
    }

    fn deal(id: i64, stage_id: i64, amount: f64, status: DealStatus) -> Deal {
        let now = Utc::now();
        Deal {
            id,
            title: format!("deal-{}", id),
            description: None,
            client_id: 1,
            manager_id: None,
            pipeline_id: 1,
            stage_id,
            amount,
            currency: "RUB".into(),
            status,
            lost_reason: None,
            expected_close_date: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    #[test]
    fn test_empty_pipeline_yields_zeroed_columns() {
        let stages = vec![stage(1, 0), stage(2, 1), stage(3, 2)];
        let snapshots = build_snapshots(&stages, &[]);
        assert_eq!(snapshots.len(), 3);
        for s in &snapshots {
            assert_eq!(s.deals_count, 0);
            assert_eq!(s.total_amount, 0.0);
            assert!(s.deals.is_empty());
        }
    }

    #[test]
    fn test_counts_and_totals_per_stage() {
        let stages = vec![stage(1, 0), stage(2, 1)];
        let deals = vec![
            deal(1, 2, 500.0, DealStatus::Open),
            deal(2, 2, 700.0, DealStatus::Open),
            deal(3, 1, 50.0, DealStatus::Open),
        ];
        let snapshots = build_snapshots(&stages, &deals);
        assert_eq!(snapshots[1].stage_id, 2);
        assert_eq!(snapshots[1].deals_count, 2);
        assert_eq!(snapshots[1].total_amount, 1200.0);
        assert_eq!(snapshots[0].deals_count, 1);
    }

    #[test]
    fn test_ordered_by_sort_order_not_input_position() {
        let stages = vec![stage(7, 2), stage(5, 0), stage(6, 1)];
        let ids: Vec<i64> = build_snapshots(&stages, &[])
            .iter()
            .map(|s| s.stage_id)
            .collect();
        assert_eq!(ids, vec![5, 6, 7]);
    }

    #[test]
    fn test_terminal_deals_are_counted() {
        let stages = vec![stage(1, 0), stage(2, 1)];
        let deals = vec![
            deal(1, 2, 100.0, DealStatus::Won),
            deal(2, 2, 10.0, DealStatus::Lost),
        ];
        let snapshots = build_snapshots(&stages, &deals);
        assert_eq!(snapshots[1].deals_count, 2);
        assert_eq!(snapshots[1].total_amount, 110.0);
    }

    #[test]
    fn test_counts_sum_to_deal_total() {
        let stages = vec![stage(1, 0), stage(2, 1), stage(3, 2)];
        let deals: Vec<Deal> = (1..=9)
            .map(|i| deal(i, (i % 3) + 1, i as f64, DealStatus::Open))
            .collect();
        let total: usize = build_snapshots(&stages, &deals)
            .iter()
            .map(|s| s.deals_count)
            .sum();
        assert_eq!(total, deals.len());
    }
}
