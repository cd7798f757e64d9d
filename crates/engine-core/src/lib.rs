pub mod error;
pub mod fsm;
pub mod manifest;
pub mod metrics;
pub mod retry;
pub mod schedule;
pub mod signature;
pub mod text;
