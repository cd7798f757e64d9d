pub mod adapter;
pub mod error;
pub mod http;
pub mod tool;

pub use adapter::BatchTransport;
pub use error::{TransportError, TransportErrorKind};
