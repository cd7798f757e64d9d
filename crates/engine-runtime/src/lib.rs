pub mod error;
pub mod execution;
pub mod session;

pub use error::RunError;
pub use execution::{
    driver::{BatchDriver, RunOutcome},
    options::RunOptions,
    report::RunReport,
};
pub use session::{BatchSession, RunTicket};
