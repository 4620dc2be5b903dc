pub mod arch;
pub mod error;
pub mod graph;
pub mod initialization;
pub mod optimization;

pub use error::{MlErr, Result};
