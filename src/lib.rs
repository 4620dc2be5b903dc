pub mod accuracy;
pub mod best;
pub mod builder;
pub mod checkpoint;
pub mod configs;
pub mod controller;
pub mod data;
pub mod error;
pub mod history;
pub mod metrics;
pub mod phase;
pub mod plot;
pub mod run_log;
pub mod runner;
pub mod tracker;

pub use builder::{GraphSession, SessionBuilder};
pub use configs::{Goal, OutputLayout, TaskConfig};
pub use controller::{Controller, RunState, RunSummary};
pub use error::{Result, TrainerErr};
pub use phase::Phase;
