mod adam;
mod optimizer;
mod plateau;

pub use adam::Adam;
pub use optimizer::Optimizer;
pub use plateau::{PlateauConfig, ReduceLrOnPlateau};
