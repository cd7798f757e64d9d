pub mod errors;
pub mod lifecycle;
pub mod metrics;
pub mod retry;
