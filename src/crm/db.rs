use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use anyhow::Context;
use chrono::{DateTime, Utc};
use dealflow_common::{
    CreateDealRequest, CreatePipelineRequest, Deal, DealFilter, DealStatus, NewStage, Pipeline,
    Stage, StageSnapshot, StageTransition, UpdateDealRequest, UpdatePipelineRequest,
    UpdateStageRequest,
};
use rusqlite::{Connection, OptionalExtension, Row, params, params_from_iter, types::Value};

use super::aggregator::build_snapshots;
use super::catalog;
use super::transition::{MovePlan, plan_move};
use super::validate;
use crate::errors::CrmError;

/// Page size of `list_deals` when the caller does not ask for one.
pub const DEFAULT_LIST_LIMIT: i64 = 100;
/// Largest page `list_deals` will return.
pub const MAX_LIST_LIMIT: i64 = 500;

/// Async-safe handle to the CRM database.
///
/// Wraps `CrmDb` behind `Arc<Mutex>` and runs all access on tokio's blocking
/// thread pool via `spawn_blocking`. The mutex serializes every mutation, so
/// two moves of the same deal never interleave; the last one wins.
#[derive(Clone)]
pub struct DbHandle {
    inner: Arc<std::sync::Mutex<CrmDb>>,
}

impl DbHandle {
    pub fn new(db: CrmDb) -> Self {
        Self {
            inner: Arc::new(std::sync::Mutex::new(db)),
        }
    }

    /// Run a closure with access to the database on a blocking thread.
    /// All data passed into `f` must be owned (`'static`).
    pub async fn call<F, R>(&self, f: F) -> Result<R, CrmError>
    where
        F: FnOnce(&CrmDb) -> Result<R, CrmError> + Send + 'static,
        R: Send + 'static,
    {
        let db = self.inner.clone();
        tokio::task::spawn_blocking(move || {
            let guard = db.lock().map_err(|_| CrmError::LockPoisoned)?;
            f(&guard)
        })
        .await
        .context("DB task panicked")?
    }
}

pub struct CrmDb {
    conn: Connection,
}

impl CrmDb {
    /// Open (or create) a SQLite database at the given path and run migrations.
    pub fn new(path: &Path) -> anyhow::Result<Self> {
        let conn = Connection::open(path).context("Failed to open SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Create an in-memory SQLite database (for testing).
    pub fn new_in_memory() -> anyhow::Result<Self> {
        let conn =
            Connection::open_in_memory().context("Failed to open in-memory SQLite database")?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    fn init(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch("PRAGMA foreign_keys = ON;")
            .context("Failed to enable foreign keys")?;
        self.run_migrations().context("Failed to run migrations")?;
        Ok(())
    }

    fn run_migrations(&self) -> anyhow::Result<()> {
        self.conn
            .execute_batch(
                "
                CREATE TABLE IF NOT EXISTS pipelines (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    name TEXT NOT NULL,
                    description TEXT,
                    sort_order INTEGER NOT NULL DEFAULT 0,
                    is_active INTEGER NOT NULL DEFAULT 1,
                    created_at TEXT NOT NULL
                );

                CREATE TABLE IF NOT EXISTS stages (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    pipeline_id INTEGER NOT NULL REFERENCES pipelines(id) ON DELETE CASCADE,
                    name TEXT NOT NULL,
                    description TEXT,
                    color TEXT NOT NULL DEFAULT '#3B82F6',
                    sort_order INTEGER NOT NULL,
                    win_probability INTEGER NOT NULL DEFAULT 0,
                    is_final INTEGER NOT NULL DEFAULT 0,
                    is_won INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    UNIQUE(pipeline_id, sort_order)
                );

                CREATE TABLE IF NOT EXISTS deals (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    title TEXT NOT NULL,
                    description TEXT,
                    client_id INTEGER NOT NULL,
                    manager_id INTEGER,
                    pipeline_id INTEGER NOT NULL REFERENCES pipelines(id),
                    stage_id INTEGER NOT NULL REFERENCES stages(id),
                    amount REAL NOT NULL DEFAULT 0,
                    currency TEXT NOT NULL,
                    status TEXT NOT NULL DEFAULT 'open',
                    lost_reason TEXT,
                    expected_close_date TEXT,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL,
                    closed_at TEXT
                );

                CREATE TABLE IF NOT EXISTS deal_stage_history (
                    id INTEGER PRIMARY KEY AUTOINCREMENT,
                    deal_id INTEGER NOT NULL REFERENCES deals(id) ON DELETE CASCADE,
                    from_stage_id INTEGER,
                    to_stage_id INTEGER NOT NULL,
                    status TEXT NOT NULL,
                    reason TEXT,
                    changed_at TEXT NOT NULL
                );

                CREATE INDEX IF NOT EXISTS idx_stages_pipeline ON stages(pipeline_id);
                CREATE INDEX IF NOT EXISTS idx_deals_pipeline ON deals(pipeline_id, stage_id);
                CREATE INDEX IF NOT EXISTS idx_deals_status ON deals(status);
                CREATE INDEX IF NOT EXISTS idx_deals_manager ON deals(manager_id);
                CREATE INDEX IF NOT EXISTS idx_history_deal ON deal_stage_history(deal_id);
                ",
            )
            .context("Failed to create tables")?;
        Ok(())
    }

    // ── Pipeline catalog ──────────────────────────────────────────────

    /// Insert a pipeline and its stages in one transaction, after checking
    /// the stage-order invariants.
    pub fn create_pipeline(&self, req: &CreatePipelineRequest) -> Result<Pipeline, CrmError> {
        catalog::validate_pipeline(req)?;

        // Safety: DbHandle's Mutex already guarantees single-threaded access.
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let now = Utc::now();
        tx.execute(
            "INSERT INTO pipelines (name, description, sort_order, is_active, created_at)
             VALUES (?1, ?2, ?3, 1, ?4)",
            params![
                req.name.trim(),
                validate::optional_text(req.description.as_deref()),
                req.sort_order,
                now
            ],
        )
        .context("Failed to insert pipeline")?;
        let id = tx.last_insert_rowid();

        for stage in &req.stages {
            insert_stage(&tx, id, stage, now)?;
        }
        tx.commit().context("Failed to commit pipeline")?;

        Ok(fetch_pipeline(&self.conn, id)?.context("Pipeline not found after insert")?)
    }

    /// Active pipelines by `sort_order`, ties broken by id.
    pub fn list_pipelines(&self) -> Result<Vec<Pipeline>, CrmError> {
        let mut stmt = self
            .conn
            .prepare(&format!(
                "SELECT {PIPELINE_COLUMNS} FROM pipelines WHERE is_active = 1 ORDER BY sort_order, id"
            ))
            .context("Failed to prepare list_pipelines")?;
        let rows = stmt
            .query_map([], pipeline_from_row)
            .context("Failed to query pipelines")?;
        let mut pipelines = Vec::new();
        for row in rows {
            pipelines.push(row.context("Failed to read pipeline row")?);
        }
        Ok(pipelines)
    }

    /// Any pipeline, active or not.
    pub fn get_pipeline(&self, id: i64) -> Result<Option<Pipeline>, CrmError> {
        Ok(fetch_pipeline(&self.conn, id)?)
    }

    /// Rename, describe, reorder or (de)activate a pipeline, active or not.
    pub fn update_pipeline(
        &self,
        id: i64,
        req: &UpdatePipelineRequest,
    ) -> Result<Pipeline, CrmError> {
        let mut pipeline =
            fetch_pipeline(&self.conn, id)?.ok_or(CrmError::PipelineNotFound { id })?;
        if let Some(name) = &req.name {
            let name = name.trim();
            if name.is_empty() {
                return Err(CrmError::InvalidInput("pipeline name must not be empty".into()));
            }
            pipeline.name = name.to_string();
        }
        if let Some(description) = &req.description {
            pipeline.description = validate::optional_text(Some(description.as_str()));
        }
        if let Some(sort_order) = req.sort_order {
            pipeline.sort_order = sort_order;
        }
        if let Some(active) = req.is_active {
            pipeline.is_active = active;
        }

        self.conn
            .execute(
                "UPDATE pipelines SET name = ?1, description = ?2, sort_order = ?3, is_active = ?4
                 WHERE id = ?5",
                params![
                    pipeline.name,
                    pipeline.description,
                    pipeline.sort_order,
                    pipeline.is_active,
                    id
                ],
            )
            .context("Failed to update pipeline")?;
        Ok(pipeline)
    }

    /// Stages of an active pipeline, ordered by `sort_order`.
    pub fn list_stages(&self, pipeline_id: i64) -> Result<Vec<Stage>, CrmError> {
        require_active_pipeline(&self.conn, pipeline_id)?;
        Ok(fetch_stages(&self.conn, pipeline_id)?)
    }

    pub fn get_stage(&self, id: i64) -> Result<Option<Stage>, CrmError> {
        Ok(fetch_stage(&self.conn, id)?)
    }

    /// Insert a stage at position `stage.sort_order` of any existing
    /// pipeline, shifting the stages from that position on by one.
    pub fn create_stage(&self, pipeline_id: i64, stage: &NewStage) -> Result<Stage, CrmError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        if fetch_pipeline(&tx, pipeline_id)?.is_none() {
            return Err(CrmError::PipelineNotFound { id: pipeline_id });
        }
        let mut layout = stage_layout(&fetch_stages(&tx, pipeline_id)?);
        let position = catalog::insert_position(stage.sort_order, layout.len())?;
        layout.insert(position, (None, stage.clone()));

        let id = write_layout(&tx, pipeline_id, layout, Utc::now())?
            .context("Inserted stage has no id")?;
        tx.commit().context("Failed to commit stage")?;
        Ok(fetch_stage(&self.conn, id)?.context("Stage not found after insert")?)
    }

    /// Apply a partial update to a stage.
    ///
    /// `is_final` / `is_won` decide the status of the deals at the stage, so
    /// they only change while the stage is empty.
    pub fn update_stage(&self, id: i64, req: &UpdateStageRequest) -> Result<Stage, CrmError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let current = fetch_stage(&tx, id)?.ok_or(CrmError::StageNotFound { id })?;

        let mut stage = catalog::draft(&current);
        if let Some(name) = &req.name {
            stage.name = name.trim().to_string();
        }
        if let Some(description) = &req.description {
            stage.description = validate::optional_text(Some(description.as_str()));
        }
        if let Some(color) = &req.color {
            stage.color = color.clone();
        }
        if let Some(win_probability) = req.win_probability {
            stage.win_probability = win_probability;
        }
        if let Some(is_final) = req.is_final {
            stage.is_final = is_final;
        }
        if let Some(is_won) = req.is_won {
            stage.is_won = is_won;
        }
        if (stage.is_final, stage.is_won) != (current.is_final, current.is_won) {
            let deals = count_deals_at(&tx, id)?;
            if deals > 0 {
                return Err(CrmError::StageInUse {
                    stage_id: id,
                    deals,
                });
            }
        }

        let others: Vec<Stage> = fetch_stages(&tx, current.pipeline_id)?
            .into_iter()
            .filter(|s| s.id != id)
            .collect();
        let mut layout = stage_layout(&others);
        let position = match req.sort_order {
            Some(order) => catalog::insert_position(order, layout.len())?,
            None => others
                .iter()
                .position(|s| s.sort_order > current.sort_order)
                .unwrap_or(others.len()),
        };
        layout.insert(position, (Some(id), stage));

        write_layout(&tx, current.pipeline_id, layout, Utc::now())?;
        tx.commit().context("Failed to commit stage")?;
        Ok(fetch_stage(&self.conn, id)?.context("Stage not found after update")?)
    }

    /// Delete an empty stage and close the gap it leaves in the order.
    /// Returns the deleted stage.
    pub fn delete_stage(&self, id: i64) -> Result<Stage, CrmError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let stage = fetch_stage(&tx, id)?.ok_or(CrmError::StageNotFound { id })?;
        let deals = count_deals_at(&tx, id)?;
        if deals > 0 {
            return Err(CrmError::StageInUse {
                stage_id: id,
                deals,
            });
        }

        tx.execute("DELETE FROM stages WHERE id = ?1", params![id])
            .context("Failed to delete stage")?;
        let layout = stage_layout(&fetch_stages(&tx, stage.pipeline_id)?);
        write_layout(&tx, stage.pipeline_id, layout, Utc::now())?;
        tx.commit().context("Failed to commit stage deletion")?;
        Ok(stage)
    }

    /// Install `pipelines` (or the built-in default when empty) if the
    /// catalog has no pipelines yet. Returns how many were created.
    pub fn seed_catalog(&self, pipelines: &[CreatePipelineRequest]) -> Result<usize, CrmError> {
        let existing: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM pipelines", [], |row| row.get(0))
            .context("Failed to count pipelines")?;
        if existing > 0 {
            return Ok(0);
        }

        let seeds = if pipelines.is_empty() {
            vec![catalog::default_pipeline()]
        } else {
            pipelines.to_vec()
        };
        for seed in &seeds {
            self.create_pipeline(seed)?;
        }
        Ok(seeds.len())
    }

    // ── Deal store ────────────────────────────────────────────────────

    /// Create a deal at the first stage of its pipeline with status `open`.
    pub fn create_deal(
        &self,
        req: &CreateDealRequest,
        default_currency: &str,
    ) -> Result<Deal, CrmError> {
        let title = validate::title(&req.title)?;
        let amount = validate::amount(req.amount)?;
        let client_id = validate::reference("client_id", req.client_id)?;
        let currency = validate::currency(req.currency.as_deref().unwrap_or(default_currency))?;
        if let Some(manager_id) = req.manager_id {
            validate::reference("manager_id", manager_id)?;
        }
        if let Some(status) = req.status {
            if status != DealStatus::Open {
                return Err(CrmError::InvalidInput(format!(
                    "new deals start open, got status '{}'",
                    status
                )));
            }
        }

        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        require_active_pipeline(&tx, req.pipeline_id)?;
        let first = fetch_stages(&tx, req.pipeline_id)?
            .into_iter()
            .next()
            .ok_or(CrmError::EmptyPipeline {
                pipeline_id: req.pipeline_id,
            })?;
        if let Some(stage_id) = req.stage_id {
            if stage_id != first.id {
                return Err(CrmError::InvalidInput(format!(
                    "new deals start at the first stage ({}), got stage {}",
                    first.id, stage_id
                )));
            }
        }

        let now = Utc::now();
        tx.execute(
            "INSERT INTO deals (title, description, client_id, manager_id, pipeline_id, stage_id, amount, currency, status, expected_close_date, created_at, updated_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, 'open', ?9, ?10, ?10)",
            params![
                title,
                validate::optional_text(req.description.as_deref()),
                client_id,
                req.manager_id,
                req.pipeline_id,
                first.id,
                amount,
                currency,
                req.expected_close_date,
                now
            ],
        )
        .context("Failed to insert deal")?;
        let id = tx.last_insert_rowid();
        insert_transition(&tx, id, None, first.id, DealStatus::Open, None, now)?;
        tx.commit().context("Failed to commit deal")?;

        Ok(fetch_deal(&self.conn, id)?.context("Deal not found after insert")?)
    }

    pub fn get_deal(&self, id: i64) -> Result<Option<Deal>, CrmError> {
        Ok(fetch_deal(&self.conn, id)?)
    }

    /// Deals matching every given filter, newest first.
    pub fn list_deals(&self, filter: &DealFilter) -> Result<Vec<Deal>, CrmError> {
        let mut clauses = Vec::new();
        let mut values = Vec::new();
        if let Some(pipeline_id) = filter.pipeline_id {
            clauses.push("pipeline_id = ?");
            values.push(Value::Integer(pipeline_id));
        }
        if let Some(stage_id) = filter.stage_id {
            clauses.push("stage_id = ?");
            values.push(Value::Integer(stage_id));
        }
        if let Some(status) = filter.status {
            clauses.push("status = ?");
            values.push(Value::Text(status.as_str().to_string()));
        }
        if let Some(manager_id) = filter.manager_id {
            clauses.push("manager_id = ?");
            values.push(Value::Integer(manager_id));
        }
        let where_clause = if clauses.is_empty() {
            String::new()
        } else {
            format!("WHERE {}", clauses.join(" AND "))
        };
        values.push(Value::Integer(
            filter
                .limit
                .unwrap_or(DEFAULT_LIST_LIMIT)
                .clamp(1, MAX_LIST_LIMIT),
        ));
        values.push(Value::Integer(filter.skip.unwrap_or(0).max(0)));

        let sql = format!(
            "SELECT {DEAL_COLUMNS} FROM deals {where_clause} ORDER BY id DESC LIMIT ? OFFSET ?"
        );
        Ok(query_deals(&self.conn, &sql, params_from_iter(values))?)
    }

    /// Update descriptive fields. Stage and status are never touched here.
    pub fn update_deal(&self, id: i64, req: &UpdateDealRequest) -> Result<Deal, CrmError> {
        let mut deal = fetch_deal(&self.conn, id)?.ok_or(CrmError::DealNotFound { id })?;

        if let Some(title) = &req.title {
            deal.title = validate::title(title)?;
        }
        if let Some(description) = &req.description {
            deal.description = validate::optional_text(Some(description.as_str()));
        }
        if let Some(amount) = req.amount {
            deal.amount = validate::amount(amount)?;
        }
        if let Some(currency) = &req.currency {
            deal.currency = validate::currency(currency)?;
        }
        if let Some(manager_id) = req.manager_id {
            deal.manager_id = Some(validate::reference("manager_id", manager_id)?);
        }
        if let Some(date) = req.expected_close_date {
            deal.expected_close_date = Some(date);
        }
        deal.updated_at = Utc::now();

        self.conn
            .execute(
                "UPDATE deals SET title = ?1, description = ?2, amount = ?3, currency = ?4, manager_id = ?5,
                 expected_close_date = ?6, updated_at = ?7 WHERE id = ?8",
                params![
                    deal.title,
                    deal.description,
                    deal.amount,
                    deal.currency,
                    deal.manager_id,
                    deal.expected_close_date,
                    deal.updated_at,
                    id
                ],
            )
            .context("Failed to update deal")?;
        Ok(fetch_deal(&self.conn, id)?.context("Deal not found after update")?)
    }

    pub fn delete_deal(&self, id: i64) -> Result<(), CrmError> {
        let count = self
            .conn
            .execute("DELETE FROM deals WHERE id = ?1", params![id])
            .context("Failed to delete deal")?;
        if count == 0 {
            return Err(CrmError::DealNotFound { id });
        }
        Ok(())
    }

    // ── Transitions ───────────────────────────────────────────────────

    /// Move a deal to `stage_id`.
    ///
    /// Lookup, validation, the deal update and the history row share one
    /// transaction: a rejected move leaves stage, status and timestamps as
    /// they were.
    pub fn move_deal(
        &self,
        id: i64,
        stage_id: i64,
        reason: Option<&str>,
    ) -> Result<(Deal, MovePlan), CrmError> {
        let tx = self
            .conn
            .unchecked_transaction()
            .context("Failed to begin transaction")?;
        let deal = fetch_deal(&tx, id)?.ok_or(CrmError::DealNotFound { id })?;
        let target = fetch_stage(&tx, stage_id)?.ok_or(CrmError::StageNotFound { id: stage_id })?;
        let plan = plan_move(&deal, &target, reason)?;

        let mut moved = deal;
        let now = Utc::now();
        plan.apply(&mut moved, now);
        tx.execute(
            "UPDATE deals SET stage_id = ?1, status = ?2, lost_reason = ?3, updated_at = ?4, closed_at = ?5
             WHERE id = ?6",
            params![
                moved.stage_id,
                moved.status.as_str(),
                moved.lost_reason,
                moved.updated_at,
                moved.closed_at,
                id
            ],
        )
        .context("Failed to move deal")?;
        if plan.changes_stage() {
            insert_transition(
                &tx,
                id,
                Some(plan.from_stage_id),
                plan.to_stage_id,
                plan.status,
                plan.lost_reason.as_deref(),
                now,
            )?;
        }
        tx.commit().context("Failed to commit move")?;

        let deal = fetch_deal(&self.conn, id)?.context("Deal not found after move")?;
        Ok((deal, plan))
    }

    pub fn deal_history(&self, id: i64) -> Result<Vec<StageTransition>, CrmError> {
        if fetch_deal(&self.conn, id)?.is_none() {
            return Err(CrmError::DealNotFound { id });
        }
        let mut stmt = self
            .conn
            .prepare(
                "SELECT id, deal_id, from_stage_id, to_stage_id, status, reason, changed_at
                 FROM deal_stage_history WHERE deal_id = ?1 ORDER BY id",
            )
            .context("Failed to prepare deal_history")?;
        let rows = stmt
            .query_map(params![id], |row| {
                Ok(TransitionRow {
                    id: row.get(0)?,
                    deal_id: row.get(1)?,
                    from_stage_id: row.get(2)?,
                    to_stage_id: row.get(3)?,
                    status: row.get(4)?,
                    reason: row.get(5)?,
                    changed_at: row.get(6)?,
                })
            })
            .context("Failed to query deal history")?;
        let mut history = Vec::new();
        for row in rows {
            let r = row.context("Failed to read history row")?;
            history.push(r.into_transition()?);
        }
        Ok(history)
    }

    // ── Stage aggregates ──────────────────────────────────────────────

    /// Fresh per-stage counts and totals for an active pipeline.
    pub fn kanban_snapshot(&self, pipeline_id: i64) -> Result<Vec<StageSnapshot>, CrmError> {
        require_active_pipeline(&self.conn, pipeline_id)?;
        let stages = fetch_stages(&self.conn, pipeline_id)?;
        let deals = query_deals(
            &self.conn,
            &format!("SELECT {DEAL_COLUMNS} FROM deals WHERE pipeline_id = ?1 ORDER BY id"),
            params![pipeline_id],
        )?;
        Ok(build_snapshots(&stages, &deals))
    }
}

// ── Row helpers ───────────────────────────────────────────────────────
//
// Free functions over `&Connection` so they work on the plain connection and
// inside a transaction alike.

const PIPELINE_COLUMNS: &str = "id, name, description, sort_order, is_active, created_at";
const STAGE_COLUMNS: &str = "id, pipeline_id, name, description, color, sort_order, win_probability, is_final, is_won, created_at";
const DEAL_COLUMNS: &str = "id, title, description, client_id, manager_id, pipeline_id, stage_id, amount, currency, status, lost_reason, expected_close_date, created_at, updated_at, closed_at";

fn pipeline_from_row(row: &Row<'_>) -> rusqlite::Result<Pipeline> {
    Ok(Pipeline {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        sort_order: row.get(3)?,
        is_active: row.get(4)?,
        created_at: row.get(5)?,
    })
}

fn stage_from_row(row: &Row<'_>) -> rusqlite::Result<Stage> {
    Ok(Stage {
        id: row.get(0)?,
        pipeline_id: row.get(1)?,
        name: row.get(2)?,
        description: row.get(3)?,
        color: row.get(4)?,
        sort_order: row.get(5)?,
        win_probability: row.get(6)?,
        is_final: row.get(7)?,
        is_won: row.get(8)?,
        created_at: row.get(9)?,
    })
}

fn fetch_pipeline(conn: &Connection, id: i64) -> anyhow::Result<Option<Pipeline>> {
    conn.query_row(
        &format!("SELECT {PIPELINE_COLUMNS} FROM pipelines WHERE id = ?1"),
        params![id],
        pipeline_from_row,
    )
    .optional()
    .context("Failed to query pipeline")
}

/// Catalog reads treat an inactive pipeline as absent.
fn require_active_pipeline(conn: &Connection, id: i64) -> Result<Pipeline, CrmError> {
    match fetch_pipeline(conn, id)? {
        Some(pipeline) if pipeline.is_active => Ok(pipeline),
        _ => Err(CrmError::PipelineNotFound { id }),
    }
}

fn fetch_stage(conn: &Connection, id: i64) -> anyhow::Result<Option<Stage>> {
    conn.query_row(
        &format!("SELECT {STAGE_COLUMNS} FROM stages WHERE id = ?1"),
        params![id],
        stage_from_row,
    )
    .optional()
    .context("Failed to query stage")
}

fn fetch_stages(conn: &Connection, pipeline_id: i64) -> anyhow::Result<Vec<Stage>> {
    let mut stmt = conn
        .prepare(&format!(
            "SELECT {STAGE_COLUMNS} FROM stages WHERE pipeline_id = ?1 ORDER BY sort_order, id"
        ))
        .context("Failed to prepare stage query")?;
    let rows = stmt
        .query_map(params![pipeline_id], stage_from_row)
        .context("Failed to query stages")?;
    let mut stages = Vec::new();
    for row in rows {
        stages.push(row.context("Failed to read stage row")?);
    }
    Ok(stages)
}

fn insert_stage(
    conn: &Connection,
    pipeline_id: i64,
    stage: &NewStage,
    at: DateTime<Utc>,
) -> anyhow::Result<i64> {
    conn.execute(
        "INSERT INTO stages (pipeline_id, name, description, color, sort_order, win_probability, is_final, is_won, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            pipeline_id,
            stage.name.trim(),
            validate::optional_text(stage.description.as_deref()),
            stage.color,
            stage.sort_order,
            stage.win_probability,
            stage.is_final,
            stage.is_won,
            at
        ],
    )
    .context("Failed to insert stage")?;
    Ok(conn.last_insert_rowid())
}

/// A pipeline's stages in order, each with its id (`None` for one not yet
/// written).
type StageLayout = Vec<(Option<i64>, NewStage)>;

fn stage_layout(stages: &[Stage]) -> StageLayout {
    stages
        .iter()
        .map(|s| (Some(s.id), catalog::draft(s)))
        .collect()
}

/// Renumber `layout` densely, validate the whole pipeline and write it back.
/// Returns the id of the stage inserted for the `None` entry, if any.
///
/// Existing orders are parked at negative values first so that
/// `UNIQUE(pipeline_id, sort_order)` holds after every statement.
fn write_layout(
    conn: &Connection,
    pipeline_id: i64,
    mut layout: StageLayout,
    at: DateTime<Utc>,
) -> Result<Option<i64>, CrmError> {
    catalog::renumber(layout.iter_mut().map(|(_, stage)| stage));
    let stages: Vec<NewStage> = layout.iter().map(|(_, stage)| stage.clone()).collect();
    catalog::validate_stages(&stages)?;

    conn.execute(
        "UPDATE stages SET sort_order = -1 - sort_order WHERE pipeline_id = ?1",
        params![pipeline_id],
    )
    .context("Failed to park stage order")?;
    let mut inserted = None;
    for (id, stage) in &layout {
        match id {
            Some(id) => {
                conn.execute(
                    "UPDATE stages SET name = ?1, description = ?2, color = ?3, sort_order = ?4,
                     win_probability = ?5, is_final = ?6, is_won = ?7 WHERE id = ?8",
                    params![
                        stage.name.trim(),
                        validate::optional_text(stage.description.as_deref()),
                        stage.color,
                        stage.sort_order,
                        stage.win_probability,
                        stage.is_final,
                        stage.is_won,
                        id
                    ],
                )
                .context("Failed to update stage")?;
            }
            None => inserted = Some(insert_stage(conn, pipeline_id, stage, at)?),
        }
    }
    Ok(inserted)
}

fn count_deals_at(conn: &Connection, stage_id: i64) -> anyhow::Result<i64> {
    conn.query_row(
        "SELECT COUNT(*) FROM deals WHERE stage_id = ?1",
        params![stage_id],
        |row| row.get(0),
    )
    .context("Failed to count deals at stage")
}

fn fetch_deal(conn: &Connection, id: i64) -> anyhow::Result<Option<Deal>> {
    let row = conn
        .query_row(
            &format!("SELECT {DEAL_COLUMNS} FROM deals WHERE id = ?1"),
            params![id],
            deal_row,
        )
        .optional()
        .context("Failed to query deal")?;
    row.map(DealRow::into_deal).transpose()
}

fn query_deals<P: rusqlite::Params>(
    conn: &Connection,
    sql: &str,
    params: P,
) -> anyhow::Result<Vec<Deal>> {
    let mut stmt = conn.prepare(sql).context("Failed to prepare deal query")?;
    let rows = stmt
        .query_map(params, deal_row)
        .context("Failed to query deals")?;
    let mut deals = Vec::new();
    for row in rows {
        let r = row.context("Failed to read deal row")?;
        deals.push(r.into_deal()?);
    }
    Ok(deals)
}

fn insert_transition(
    conn: &Connection,
    deal_id: i64,
    from_stage_id: Option<i64>,
    to_stage_id: i64,
    status: DealStatus,
    reason: Option<&str>,
    at: DateTime<Utc>,
) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO deal_stage_history (deal_id, from_stage_id, to_stage_id, status, reason, changed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![deal_id, from_stage_id, to_stage_id, status.as_str(), reason, at],
    )
    .context("Failed to record stage transition")?;
    Ok(())
}

struct DealRow {
    id: i64,
    title: String,
    description: Option<String>,
    client_id: i64,
    manager_id: Option<i64>,
    pipeline_id: i64,
    stage_id: i64,
    amount: f64,
    currency: String,
    status: String,
    lost_reason: Option<String>,
    expected_close_date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    closed_at: Option<DateTime<Utc>>,
}

fn deal_row(row: &Row<'_>) -> rusqlite::Result<DealRow> {
    Ok(DealRow {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        client_id: row.get(3)?,
        manager_id: row.get(4)?,
        pipeline_id: row.get(5)?,
        stage_id: row.get(6)?,
        amount: row.get(7)?,
        currency: row.get(8)?,
        status: row.get(9)?,
        lost_reason: row.get(10)?,
        expected_close_date: row.get(11)?,
        created_at: row.get(12)?,
        updated_at: row.get(13)?,
        closed_at: row.get(14)?,
    })
}

impl DealRow {
    fn into_deal(self) -> anyhow::Result<Deal> {
        let status = DealStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse deal status")?;

        Ok(Deal {
            id: self.id,
            title: self.title,
            description: self.description,
            client_id: self.client_id,
            manager_id: self.manager_id,
            pipeline_id: self.pipeline_id,
            stage_id: self.stage_id,
            amount: self.amount,
            currency: self.currency,
            status,
            lost_reason: self.lost_reason,
            expected_close_date: self.expected_close_date,
            created_at: self.created_at,
            updated_at: self.updated_at,
            closed_at: self.closed_at,
        })
    }
}

struct TransitionRow {
    id: i64,
    deal_id: i64,
    from_stage_id: Option<i64>,
    to_stage_id: i64,
    status: String,
    reason: Option<String>,
    changed_at: DateTime<Utc>,
}

impl TransitionRow {
    fn into_transition(self) -> anyhow::Result<StageTransition> {
        let status = DealStatus::from_str(&self.status)
            .map_err(|e| anyhow::anyhow!(e))
            .context("Failed to parse transition status")?;
        Ok(StageTransition {
            id: self.id,
            deal_id: self.deal_id,
            from_stage_id: self.from_stage_id,
            to_stage_id: self.to_stage_id,
            status,
            reason: self.reason,
            changed_at: self.changed_at,
        })
    }
}
