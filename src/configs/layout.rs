use std::path::{Path, PathBuf};

use chrono::{DateTime, Local};

use super::{Goal, TaskConfig};
use crate::phase::Phase;

/// The filesystem layout of a run: where the splits are read from and where the checkpoint,
/// plots and run log go.
#[derive(Debug, Clone)]
pub struct OutputLayout {
    root: PathBuf,
    goal: Goal,
    timestamp: String,
    suffix: String,
}

impl OutputLayout {
    /// Creates a new `OutputLayout`.
    ///
    /// # Arguments
    /// * `root` - The directory every other path hangs from.
    /// * `config` - The task whose name and hyper-parameters key the output files.
    /// * `started_at` - The moment the run started, keys the checkpoint and the run log.
    pub fn new(
        root: impl Into<PathBuf>,
        config: &TaskConfig,
        started_at: DateTime<Local>,
    ) -> Self {
        let suffix = format!(
            "{}_{}_L2{}_{}",
            config.hidden_layers, config.batch_size, config.weight_decay, config.seed_num
        );

        Self {
            root: root.into(),
            goal: config.goal,
            timestamp: started_at.format("%Y%m%d_%H%M%S").to_string(),
            suffix,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn timestamp(&self) -> &str {
        &self.timestamp
    }

    /// `dataset/{task}/data_{phase}/`
    pub fn split_dir(&self, phase: Phase) -> PathBuf {
        self.root
            .join("dataset")
            .join(self.goal.as_str())
            .join(format!("data_{phase}"))
    }

    /// `best_models/best_models_{task}/model_{timestamp}`
    pub fn checkpoint_path(&self) -> PathBuf {
        self.root
            .join("best_models")
            .join(format!("best_models_{}", self.goal))
            .join(format!("model_{}", self.timestamp))
    }

    /// `plots/plots_{task}/train_{hl}_{batch}_L2{wd}_{seed}.svg`
    pub fn curve_path(&self) -> PathBuf {
        self.plots_dir().join(format!("train_{}.svg", self.suffix))
    }

    /// `plots/plots_{task}/CM{phase}_{hl}_{batch}_L2{wd}_{seed}.svg`
    pub fn confusion_path(&self, phase: Phase) -> PathBuf {
        let name = format!("CM{phase}_{}.svg", self.suffix);
        self.plots_dir().join(name)
    }

    /// `runs/fashion_trainer_{timestamp}`
    pub fn run_log_dir(&self) -> PathBuf {
        self.root
            .join("runs")
            .join(format!("fashion_trainer_{}", self.timestamp))
    }

    fn plots_dir(&self) -> PathBuf {
        self.root.join("plots").join(format!("plots_{}", self.goal))
    }
}
