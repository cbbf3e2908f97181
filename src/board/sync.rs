//! Optimistic kanban board.
//!
//! A drop is two-phase. [`BoardSync::dispatch`] applies the move tentatively
//! (the card jumps to the target column marked `pending`, column counts and
//! totals are adjusted) and spawns the server call. [`BoardSync::resolve`]
//! then either replaces the whole board with the server's fresh snapshot or
//! puts the card back where it was and records a notice for the user.
//!
//! Only one move may be pending at a time. The server call is never
//! cancelled: a timeout only stops waiting for it and counts as a network
//! failure, so a move that lands late shows up on the next refresh.

use std::sync::Arc;
use std::time::Duration;

use dealflow_common::{Deal, DealCard, StageSnapshot};
use tokio::task::JoinHandle;

use super::client::DealApi;
use crate::errors::{BoardError, ClientError};

#[derive(Debug, Clone, PartialEq)]
pub struct Card {
    pub deal: DealCard,
    /// Tentatively placed; the server has not confirmed the move yet.
    pub pending: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Column {
    pub stage_id: i64,
    pub name: String,
    pub color: String,
    pub is_final: bool,
    pub is_won: bool,
    pub deals_count: usize,
    pub total_amount: f64,
    pub cards: Vec<Card>,
}

impl From<StageSnapshot> for Column {
    fn from(s: StageSnapshot) -> Self {
        Self {
            stage_id: s.stage_id,
            name: s.stage_name,
            color: s.color,
            is_final: s.is_final,
            is_won: s.is_won,
            deals_count: s.deals_count,
            total_amount: s.total_amount,
            cards: s
                .deals
                .into_iter()
                .map(|deal| Card {
                    deal,
                    pending: false,
                })
                .collect(),
        }
    }
}

/// A tentatively applied move, with what is needed to undo it exactly.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingMove {
    pub deal_id: i64,
    pub from_stage_id: i64,
    pub to_stage_id: i64,
    pub reason: Option<String>,
    card: DealCard,
    from_index: usize,
    from_totals: (usize, f64),
    to_totals: (usize, f64),
}

/// What the spawned move task reports back.
#[derive(Debug)]
pub enum MoveReport {
    /// The server accepted the move. The snapshot is the follow-up fetch.
    Moved {
        deal: Deal,
        snapshot: Result<Vec<StageSnapshot>, ClientError>,
    },
    Failed(ClientError),
}

/// The spawned server call for one gesture.
pub struct MoveTask {
    pub deal_id: i64,
    handle: JoinHandle<MoveReport>,
}

impl MoveTask {
    pub async fn wait(self) -> MoveReport {
        match self.handle.await {
            Ok(report) => report,
            Err(e) => MoveReport::Failed(ClientError::Network(format!("move task failed: {}", e))),
        }
    }
}

#[derive(Debug)]
pub enum MoveOutcome {
    /// Board replaced by the server's snapshot.
    Committed(Deal),
    /// The move succeeded but the refresh did not; the optimistic placement
    /// is kept.
    CommittedStale { deal: Deal, error: ClientError },
    /// The card went back to its previous column.
    RolledBack(ClientError),
}

pub struct BoardSync {
    pipeline_id: i64,
    columns: Vec<Column>,
    dragging: Option<i64>,
    pending: Option<PendingMove>,
    notice: Option<String>,
}

impl BoardSync {
    pub fn new(pipeline_id: i64, snapshot: Vec<StageSnapshot>) -> Self {
        Self {
            pipeline_id,
            columns: snapshot.into_iter().map(Column::from).collect(),
            dragging: None,
            pending: None,
            notice: None,
        }
    }

    pub async fn load(api: &dyn DealApi, pipeline_id: i64) -> Result<Self, ClientError> {
        let snapshot = api.kanban_snapshot(pipeline_id).await?;
        Ok(Self::new(pipeline_id, snapshot))
    }

    pub fn pipeline_id(&self) -> i64 {
        self.pipeline_id
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column(&self, stage_id: i64) -> Option<&Column> {
        self.columns.iter().find(|c| c.stage_id == stage_id)
    }

    pub fn pending(&self) -> Option<&PendingMove> {
        self.pending.as_ref()
    }

    /// Last user-visible message about a failed or half-failed move.
    pub fn notice(&self) -> Option<&str> {
        self.notice.as_deref()
    }

    pub fn dismiss_notice(&mut self) {
        self.notice = None;
    }

    fn locate(&self, deal_id: i64) -> Option<(usize, usize)> {
        self.columns.iter().enumerate().find_map(|(ci, col)| {
            col.cards
                .iter()
                .position(|card| card.deal.id == deal_id)
                .map(|pos| (ci, pos))
        })
    }

    fn column_index(&self, stage_id: i64) -> Option<usize> {
        self.columns.iter().position(|c| c.stage_id == stage_id)
    }

    fn check_idle(&self) -> Result<(), BoardError> {
        match &self.pending {
            Some(p) => Err(BoardError::MoveInFlight { deal_id: p.deal_id }),
            None => Ok(()),
        }
    }

    pub fn drag_start(&mut self, deal_id: i64) -> Result<(), BoardError> {
        self.check_idle()?;
        if self.locate(deal_id).is_none() {
            return Err(BoardError::UnknownDeal { deal_id });
        }
        self.dragging = Some(deal_id);
        Ok(())
    }

    pub fn drag_cancel(&mut self) {
        self.dragging = None;
    }

    /// Move the dragged card into `stage_id` locally and mark it pending.
    /// Any drop ends the drag, accepted or not.
    pub fn apply_tentative(
        &mut self,
        stage_id: i64,
        reason: Option<String>,
    ) -> Result<PendingMove, BoardError> {
        self.check_idle()?;
        let deal_id = self.dragging.take().ok_or(BoardError::NoDragInProgress)?;
        let (from, index) = self
            .locate(deal_id)
            .ok_or(BoardError::UnknownDeal { deal_id })?;
        let to = self
            .column_index(stage_id)
            .ok_or(BoardError::UnknownStage { stage_id })?;
        if from == to {
            return Err(BoardError::SameStage { deal_id, stage_id });
        }

        let from_totals = (self.columns[from].deals_count, self.columns[from].total_amount);
        let to_totals = (self.columns[to].deals_count, self.columns[to].total_amount);

        let card = self.columns[from].cards.remove(index).deal;
        let source = &mut self.columns[from];
        source.deals_count = source.deals_count.saturating_sub(1);
        source.total_amount -= card.amount;

        let target = &mut self.columns[to];
        target.deals_count += 1;
        target.total_amount += card.amount;
        target.cards.push(Card {
            deal: card.clone(),
            pending: true,
        });

        let pending = PendingMove {
            deal_id,
            from_stage_id: self.columns[from].stage_id,
            to_stage_id: stage_id,
            reason,
            card,
            from_index: index,
            from_totals,
            to_totals,
        };
        self.pending = Some(pending.clone());
        Ok(pending)
    }

    /// Apply the drop tentatively and spawn the server call. The call's wait
    /// is bounded by `timeout`; expiry reports a network failure.
    pub fn dispatch(
        &mut self,
        api: Arc<dyn DealApi>,
        stage_id: i64,
        reason: Option<String>,
        timeout: Duration,
    ) -> Result<MoveTask, BoardError> {
        let pending = self.apply_tentative(stage_id, reason)?;
        let deal_id = pending.deal_id;
        let pipeline_id = self.pipeline_id;
        tracing::debug!(deal_id, to_stage_id = stage_id, "dispatching move");

        let handle = tokio::spawn(async move {
            // Spawned on its own so that giving up on the wait does not
            // cancel the request.
            let call = tokio::spawn({
                let api = api.clone();
                async move {
                    api.move_deal(pending.deal_id, pending.to_stage_id, pending.reason)
                        .await
                }
            });
            let deal = match tokio::time::timeout(timeout, call).await {
                Err(_) => {
                    return MoveReport::Failed(ClientError::Network(format!(
                        "move did not complete within {}s",
                        timeout.as_secs_f64()
                    )));
                }
                Ok(Err(e)) => {
                    return MoveReport::Failed(ClientError::Network(format!(
                        "move task failed: {}",
                        e
                    )));
                }
                Ok(Ok(Err(e))) => return MoveReport::Failed(e),
                Ok(Ok(Ok(deal))) => deal,
            };
            let snapshot = api.kanban_snapshot(pipeline_id).await;
            MoveReport::Moved { deal, snapshot }
        });

        Ok(MoveTask { deal_id, handle })
    }

    /// Settle the pending move with the task's report.
    ///
    /// A success report for a deal other than the pending one is refused and
    /// leaves the pending move in place.
    pub fn resolve(&mut self, report: MoveReport) -> Result<MoveOutcome, BoardError> {
        let pending_deal = self
            .pending
            .as_ref()
            .map(|p| p.deal_id)
            .ok_or(BoardError::NothingPending)?;
        if let MoveReport::Moved { deal, .. } = &report {
            if deal.id != pending_deal {
                return Err(BoardError::ReportMismatch {
                    pending: pending_deal,
                    reported: deal.id,
                });
            }
        }
        match report {
            MoveReport::Moved {
                deal,
                snapshot: Ok(snapshot),
            } => {
                self.commit(snapshot);
                tracing::debug!(deal_id = deal.id, "move committed");
                Ok(MoveOutcome::Committed(deal))
            }
            MoveReport::Moved {
                deal,
                snapshot: Err(error),
            } => {
                self.settle_stale(&deal);
                self.notice = Some(format!(
                    "\"{}\" was moved, but the board could not be refreshed: {}",
                    deal.title, error
                ));
                tracing::warn!(deal_id = deal.id, error = %error, "board refresh failed after move");
                Ok(MoveOutcome::CommittedStale { deal, error })
            }
            MoveReport::Failed(error) => {
                self.rollback(&error)?;
                Ok(MoveOutcome::RolledBack(error))
            }
        }
    }

    /// Dispatch a drop and wait for it to settle.
    pub async fn drop_on(
        &mut self,
        api: Arc<dyn DealApi>,
        stage_id: i64,
        reason: Option<String>,
        timeout: Duration,
    ) -> Result<MoveOutcome, BoardError> {
        let task = self.dispatch(api, stage_id, reason, timeout)?;
        let report = task.wait().await;
        self.resolve(report)
    }

    /// Replace the whole board with a server snapshot.
    pub fn commit(&mut self, snapshot: Vec<StageSnapshot>) {
        self.pending = None;
        self.notice = None;
        self.columns = snapshot.into_iter().map(Column::from).collect();
    }

    /// Undo the pending move: the card returns to its last known column and
    /// both columns get their previous count and total back.
    pub fn rollback(&mut self, error: &ClientError) -> Result<(), BoardError> {
        let pending = self.pending.take().ok_or(BoardError::NothingPending)?;

        if let Some(to) = self.column_index(pending.to_stage_id) {
            let target = &mut self.columns[to];
            target.cards.retain(|c| c.deal.id != pending.deal_id);
            (target.deals_count, target.total_amount) = pending.to_totals;
        }
        if let Some(from) = self.column_index(pending.from_stage_id) {
            let source = &mut self.columns[from];
            let index = pending.from_index.min(source.cards.len());
            source.cards.insert(
                index,
                Card {
                    deal: pending.card.clone(),
                    pending: false,
                },
            );
            (source.deals_count, source.total_amount) = pending.from_totals;
        }

        let message = match error {
            ClientError::Unauthorized => "your session has expired; log in again".to_string(),
            other => other.to_string(),
        };
        self.notice = Some(format!("Could not move \"{}\": {}", pending.card.title, message));
        tracing::warn!(deal_id = pending.deal_id, error = %error, "move rolled back");
        Ok(())
    }

    fn settle_stale(&mut self, deal: &Deal) {
        let Some(pending) = self.pending.take() else {
            return;
        };
        if let Some(to) = self.column_index(pending.to_stage_id) {
            for card in &mut self.columns[to].cards {
                if card.deal.id == pending.deal_id {
                    card.pending = false;
                    card.deal.status = deal.status;
                }
            }
        }
    }

    /// Replace the board with a fresh snapshot, e.g. after a change
    /// notification. Refused while a move is pending.
    pub fn refresh(&mut self, snapshot: Vec<StageSnapshot>) -> Result<(), BoardError> {
        self.check_idle()?;
        self.columns = snapshot.into_iter().map(Column::from).collect();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Utc;
    use dealflow_common::{DealStatus, ErrorKind, Pipeline};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Notify;

    fn card(id: i64, amount: f64) -> DealCard {
        DealCard {
            id,
            title: format!("deal-{}", id),
            amount,
            currency: "RUB".into(),
            client_id: 1,
            status: DealStatus::Open,
        }
    }

    fn column(stage_id: i64, order: i32, cards: Vec<DealCard>) -> StageSnapshot {
        StageSnapshot {
            stage_id,
            stage_name: format!("stage-{}", stage_id),
            color: "#3B82F6".into(),
            sort_order: order,
            is_final: false,
            is_won: false,
            deals_count: cards.len(),
            total_amount: cards.iter().map(|c| c.amount).sum(),
            deals: cards,
        }
    }

    /// Stage 1 holds deals 10 (100.0) and 11 (50.0); stage 2 is empty.
    fn initial() -> Vec<StageSnapshot> {
        vec![
            column(1, 0, vec![card(10, 100.0), card(11, 50.0)]),
            column(2, 1, vec![]),
        ]
    }

    /// The server's view after deal 10 moved to stage 2.
    fn after_move() -> Vec<StageSnapshot> {
        vec![
            column(1, 0, vec![card(11, 50.0)]),
            column(2, 1, vec![card(10, 100.0)]),
        ]
    }

    fn deal(id: i64, stage_id: i64) -> Deal {
        let now = Utc::now();
        Deal {
            id,
            title: format!("deal-{}", id),
            description: None,
            client_id: 1,
            manager_id: None,
            pipeline_id: 1,
            stage_id,
            amount: 100.0,
            currency: "RUB".into(),
            status: DealStatus::Open,
            lost_reason: None,
            expected_close_date: None,
            created_at: now,
            updated_at: now,
            closed_at: None,
        }
    }

    struct FakeApi {
        move_result: Mutex<Result<Deal, ClientError>>,
        snapshot: Mutex<Result<Vec<StageSnapshot>, ClientError>>,
        gate: Option<Arc<Notify>>,
        completed_moves: AtomicUsize,
    }

    impl FakeApi {
        fn ok() -> Self {
            Self {
                move_result: Mutex::new(Ok(deal(10, 2))),
                snapshot: Mutex::new(Ok(after_move())),
                gate: None,
                completed_moves: AtomicUsize::new(0),
            }
        }

        fn failing(error: ClientError) -> Self {
            let api = Self::ok();
            *api.move_result.lock().unwrap() = Err(error);
            api
        }

        fn gated(gate: Arc<Notify>) -> Self {
            Self {
                gate: Some(gate),
                ..Self::ok()
            }
        }
    }

    #[async_trait]
    impl DealApi for FakeApi {
        async fn list_pipelines(&self) -> Result<Vec<Pipeline>, ClientError> {
            Ok(vec![])
        }

        async fn kanban_snapshot(&self, _pipeline_id: i64) -> Result<Vec<StageSnapshot>, ClientError> {
            self.snapshot.lock().unwrap().clone()
        }

        async fn move_deal(
            &self,
            _deal_id: i64,
            _stage_id: i64,
            _reason: Option<String>,
        ) -> Result<Deal, ClientError> {
            if let Some(gate) = &self.gate {
                gate.notified().await;
            }
            self.completed_moves.fetch_add(1, Ordering::SeqCst);
            self.move_result.lock().unwrap().clone()
        }
    }

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[test]
    fn test_drag_start_unknown_deal() {
        let mut board = BoardSync::new(1, initial());
        assert_eq!(
            board.drag_start(99),
            Err(BoardError::UnknownDeal { deal_id: 99 })
        );
    }

    #[test]
    fn test_drop_without_drag() {
        let mut board = BoardSync::new(1, initial());
        assert_eq!(
            board.apply_tentative(2, None),
            Err(BoardError::NoDragInProgress)
        );
    }

    #[test]
    fn test_drop_on_same_or_unknown_column() {
        let mut board = BoardSync::new(1, initial());
        board.drag_start(10).unwrap();
        assert_eq!(
            board.apply_tentative(1, None),
            Err(BoardError::SameStage {
                deal_id: 10,
                stage_id: 1
            })
        );
        // The rejected drop ended the drag.
        assert_eq!(
            board.apply_tentative(2, None),
            Err(BoardError::NoDragInProgress)
        );

        board.drag_start(10).unwrap();
        assert_eq!(
            board.apply_tentative(7, None),
            Err(BoardError::UnknownStage { stage_id: 7 })
        );
        assert!(board.pending().is_none());
    }

    #[test]
    fn test_tentative_apply_adjusts_columns() {
        let mut board = BoardSync::new(1, initial());
        board.drag_start(10).unwrap();
        let pending = board.apply_tentative(2, None).unwrap();
        assert_eq!(pending.from_stage_id, 1);
        assert_eq!(pending.to_stage_id, 2);

        let source = board.column(1).unwrap();
        assert_eq!(source.deals_count, 1);
        assert_eq!(source.total_amount, 50.0);
        let target = board.column(2).unwrap();
        assert_eq!(target.deals_count, 1);
        assert_eq!(target.total_amount, 100.0);
        assert!(target.cards[0].pending);
    }

    #[test]
    fn test_second_drop_while_pending_is_rejected() {
        let mut board = BoardSync::new(1, initial());
        board.drag_start(10).unwrap();
        board.apply_tentative(2, None).unwrap();
        assert_eq!(
            board.drag_start(11),
            Err(BoardError::MoveInFlight { deal_id: 10 })
        );
        assert_eq!(
            board.refresh(initial()),
            Err(BoardError::MoveInFlight { deal_id: 10 })
        );
    }

    #[test]
    fn test_rollback_restores_board_exactly() {
        let mut board = BoardSync::new(1, initial());
        let before = board.columns().to_vec();
        board.drag_start(10).unwrap();
        board.apply_tentative(2, None).unwrap();

        board
            .rollback(&ClientError::Network("connection refused".into()))
            .unwrap();
        assert_eq!(board.columns(), before.as_slice());
        assert!(board.pending().is_none());
        let notice = board.notice().unwrap();
        assert!(notice.contains("deal-10"));
        assert!(notice.contains("connection refused"));

        assert_eq!(
            board.rollback(&ClientError::Unauthorized),
            Err(BoardError::NothingPending)
        );
    }

    #[test]
    fn test_resolve_refuses_report_for_another_deal() {
        let mut board = BoardSync::new(1, initial());
        board.drag_start(10).unwrap();
        board.apply_tentative(2, None).unwrap();
        let tentative = board.columns().to_vec();

        let report = MoveReport::Moved {
            deal: deal(11, 2),
            snapshot: Ok(after_move()),
        };
        assert_eq!(
            board.resolve(report).err(),
            Some(BoardError::ReportMismatch {
                pending: 10,
                reported: 11
            })
        );
        assert_eq!(board.pending().map(|p| p.deal_id), Some(10));
        assert_eq!(board.columns(), tentative.as_slice());

        let outcome = board
            .resolve(MoveReport::Moved {
                deal: deal(10, 2),
                snapshot: Ok(after_move()),
            })
            .unwrap();
        assert!(matches!(outcome, MoveOutcome::Committed(ref d) if d.id == 10));
    }

    #[tokio::test]
    async fn test_successful_move_replaces_board() {
        let api: Arc<dyn DealApi> = Arc::new(FakeApi::ok());
        let mut board = BoardSync::load(api.as_ref(), 1).await.unwrap();
        // load() used the fake's post-move snapshot; start from the initial one.
        board.commit(initial());

        board.drag_start(10).unwrap();
        let outcome = board.drop_on(api, 2, None, TIMEOUT).await.unwrap();
        assert!(matches!(outcome, MoveOutcome::Committed(ref d) if d.id == 10));

        let target = board.column(2).unwrap();
        assert_eq!(target.deals_count, 1);
        assert!(!target.cards[0].pending);
        assert!(board.pending().is_none());
        assert!(board.notice().is_none());
    }

    #[tokio::test]
    async fn test_rejected_move_rolls_back() {
        let api: Arc<dyn DealApi> = Arc::new(FakeApi::failing(ClientError::Api {
            kind: ErrorKind::InvalidState,
            message: "Terminal deal: deal 10 is already won".into(),
        }));
        let mut board = BoardSync::new(1, initial());
        let before = board.columns().to_vec();

        board.drag_start(10).unwrap();
        let outcome = board.drop_on(api, 2, None, TIMEOUT).await.unwrap();
        match outcome {
            MoveOutcome::RolledBack(err) => assert_eq!(err.kind(), ErrorKind::InvalidState),
            other => panic!("expected rollback, got {:?}", other),
        }
        assert_eq!(board.columns(), before.as_slice());
        assert!(board.notice().unwrap().contains("Terminal deal"));
    }

    #[tokio::test]
    async fn test_unauthorized_move_rolls_back_with_session_notice() {
        let api: Arc<dyn DealApi> = Arc::new(FakeApi::failing(ClientError::Unauthorized));
        let mut board = BoardSync::new(1, initial());
        board.drag_start(11).unwrap();
        let outcome = board.drop_on(api, 2, None, TIMEOUT).await.unwrap();
        assert!(matches!(outcome, MoveOutcome::RolledBack(ClientError::Unauthorized)));
        assert!(board.notice().unwrap().contains("session has expired"));
        assert_eq!(board.column(1).unwrap().cards[1].deal.id, 11);
    }

    #[tokio::test]
    async fn test_timeout_rolls_back_without_cancelling_call() {
        let gate = Arc::new(Notify::new());
        let fake = Arc::new(FakeApi::gated(gate.clone()));
        let api: Arc<dyn DealApi> = fake.clone();
        let mut board = BoardSync::new(1, initial());

        board.drag_start(10).unwrap();
        let outcome = board
            .drop_on(api, 2, None, Duration::from_millis(50))
            .await
            .unwrap();
        match outcome {
            MoveOutcome::RolledBack(err) => assert_eq!(err.kind(), ErrorKind::NetworkFailure),
            other => panic!("expected rollback, got {:?}", other),
        }
        assert_eq!(board.column(2).unwrap().deals_count, 0);

        // The server call is still alive and completes once released.
        gate.notify_one();
        for _ in 0..100 {
            if fake.completed_moves.load(Ordering::SeqCst) == 1 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(fake.completed_moves.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_board_usable_while_move_in_flight() {
        let gate = Arc::new(Notify::new());
        let api: Arc<dyn DealApi> = Arc::new(FakeApi::gated(gate.clone()));
        let mut board = BoardSync::new(1, initial());

        board.drag_start(10).unwrap();
        let task = board.dispatch(api, 2, None, TIMEOUT).unwrap();
        assert_eq!(task.deal_id, 10);

        // Reads still work; a second gesture is refused.
        assert_eq!(board.column(2).unwrap().deals_count, 1);
        assert_eq!(
            board.drag_start(11),
            Err(BoardError::MoveInFlight { deal_id: 10 })
        );

        gate.notify_one();
        let outcome = board.resolve(task.wait().await).unwrap();
        assert!(matches!(outcome, MoveOutcome::Committed(_)));
        board.drag_start(11).unwrap();
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_optimistic_placement() {
        let fake = FakeApi::ok();
        *fake.snapshot.lock().unwrap() = Err(ClientError::Network("reset".into()));
        let api: Arc<dyn DealApi> = Arc::new(fake);
        let mut board = BoardSync::new(1, initial());

        board.drag_start(10).unwrap();
        let outcome = board.drop_on(api, 2, None, TIMEOUT).await.unwrap();
        assert!(matches!(outcome, MoveOutcome::CommittedStale { .. }));
        let target = board.column(2).unwrap();
        assert_eq!(target.cards.len(), 1);
        assert!(!target.cards[0].pending);
        assert!(board.pending().is_none());
        assert!(board.notice().unwrap().contains("could not be refreshed"));
    }

    #[test]
    fn test_resolve_without_pending() {
        let mut board = BoardSync::new(1, initial());
        let err = board
            .resolve(MoveReport::Failed(ClientError::Network("x".into())))
            .unwrap_err();
        assert_eq!(err, BoardError::NothingPending);
    }
}
