pub mod board;
pub mod config;
pub mod crm;
pub mod errors;
