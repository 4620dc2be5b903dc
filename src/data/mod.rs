mod batch;
mod dataset;
mod loader;
mod sample;

pub use batch::Batch;
pub use dataset::GraphDataset;
pub use loader::DataLoader;
pub use sample::{GraphSample, NUM_RANKS};
