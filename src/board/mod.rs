//! Client side: the HTTP client and the optimistic kanban board.
//!
//! | Module   | Responsibility                                            |
//! |----------|-----------------------------------------------------------|
//! | `client` | `DealApi` trait, `CrmClient` over reqwest, `Session`      |
//! | `sync`   | `BoardSync`: tentative apply, spawned move, resolve       |

pub mod client;
pub mod sync;

pub use client::{CrmClient, DealApi, Session};
pub use sync::{BoardSync, Card, Column, MoveOutcome, MoveReport, MoveTask, PendingMove};
