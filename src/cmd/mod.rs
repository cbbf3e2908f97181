//! CLI command implementations.
//!
//! | Module  | Commands handled     |
//! |---------|----------------------|
//! | `serve` | `Serve`, `Init`      |
//! | `board` | `Board`, `Move`      |

pub mod board;
pub mod serve;

pub use board::{cmd_board, cmd_move};
pub use serve::{cmd_init, cmd_serve};
