mod goal;
mod layout;
mod task;

pub use goal::Goal;
pub use layout::OutputLayout;
pub use task::{SchedulerConfig, TaskConfig};
