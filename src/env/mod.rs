pub mod base;
pub mod driving;
