pub mod scripted;
pub mod session;
pub mod utils;
