pub mod activations;
mod graph_net;
pub mod layers;
pub mod loss;
mod model;

pub use graph_net::GraphNet;
pub use model::{Model, ParamShape};
