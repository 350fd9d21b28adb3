pub mod eval;
pub mod logger;
pub mod spaces;
pub mod timer;
pub mod to_tensor;
pub mod utils;
