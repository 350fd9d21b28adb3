pub mod common;
pub mod env;
pub mod error;

pub use error::{EnvError, Result};
