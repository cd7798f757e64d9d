pub mod card;
pub mod manifest;
pub mod result;
