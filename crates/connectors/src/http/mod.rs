pub mod client;
pub mod headers;
pub mod response;

pub use client::{HttpBatchClient, HttpClientConfig};
