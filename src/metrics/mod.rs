mod binarize;
mod confusion;
mod report;

pub use binarize::{THRESHOLD, binarize, is_positive};
pub use confusion::ConfusionMatrix;
pub use report::{MetricsAggregator, MetricsReport};
