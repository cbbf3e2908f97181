//! CRM server: pipeline catalog, deal store and stage transitions.
//!
//! ## Module Map
//!
//! ```text
//! ┌──────────┐   HTTP   ┌──────────────────────────────────────────────────┐
//! │  Board   │ ───────> │  server.rs  (axum Router, ServerConfig)          │
//! │  client  │ <─────── │    ├─ auth.rs  (bearer check on /api and /ws)    │
//! └──────────┘ WebSocket│    └─ api.rs   (route handlers, AppState)        │
//!                       │         │                                        │
//!                       │         │ DbHandle::call()                       │
//!                       │         v                                        │
//!                       │  db.rs  (CrmDb: catalog, deals, history)         │
//!                       │    ├─ catalog.rs     (stage-order rules)         │
//!                       │    ├─ validate.rs    (field checks)              │
//!                       │    ├─ transition.rs  (plan_move, MovePlan)       │
//!                       │    └─ aggregator.rs  (per-stage snapshots)       │
//!                       └──────────────────────────────────────────────────┘
//! ```
//!
//! ## Typical Request Flow (move a deal)
//!
//! 1. `POST /api/deals/{id}/move` → `api::move_deal()`
//! 2. `CrmDb::move_deal()` opens a transaction, loads the deal and the target
//!    stage, and asks `transition::plan_move()` whether the move is legal.
//! 3. The plan is applied: stage, status, `updated_at` and (for won/lost)
//!    `closed_at`, plus a `deal_stage_history` row. Commit.
//! 4. `ws::broadcast_message()` pushes `DealMoved` to every connected board.

pub mod aggregator;
pub mod api;
pub mod auth;
pub mod catalog;
pub mod db;
pub mod server;
pub mod transition;
pub mod validate;
pub mod ws;
