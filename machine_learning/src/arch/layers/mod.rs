mod dense;
mod graph_conv;
mod layer;

pub use dense::Dense;
pub use graph_conv::GraphConv;
pub use layer::Layer;
