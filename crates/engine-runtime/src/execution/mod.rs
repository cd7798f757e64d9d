pub mod driver;
pub mod options;
pub mod polling;
pub mod report;
