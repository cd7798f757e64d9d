pub mod aggregate;
pub mod canonical;
pub mod retry;
pub mod retry_queue;
