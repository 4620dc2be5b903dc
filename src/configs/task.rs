use std::{fs, path::Path};

use machine_learning::optimization::PlateauConfig;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::Goal;
use crate::error::{IoContext, Result, TrainerErr};

/// The plateau scheduler knobs as they appear in a config file.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SchedulerConfig {
    pub factor: f32,
    pub patience: usize,
    pub threshold: f32,
    pub cooldown: usize,
    pub min_lr: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        let PlateauConfig {
            factor,
            patience,
            threshold,
            cooldown,
            min_lr,
            ..
        } = PlateauConfig::default();

        Self {
            factor,
            patience,
            threshold,
            cooldown,
            min_lr,
        }
    }
}

impl From<SchedulerConfig> for PlateauConfig {
    fn from(config: SchedulerConfig) -> Self {
        Self {
            factor: config.factor,
            patience: config.patience,
            threshold: config.threshold,
            cooldown: config.cooldown,
            min_lr: config.min_lr,
            ..Default::default()
        }
    }
}

/// Everything a training run needs to know about its task.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskConfig {
    pub goal: Goal,
    pub learning_rate: f32,
    pub hidden_layers: usize,
    pub batch_size: usize,
    pub weight_decay: f32,
    /// Seeds the shuffling of the training split.
    pub seed_num: u64,
    /// Seeds the parameter initialization.
    pub torch_seed: u64,
    pub max_epochs: usize,
    /// The early stopping fires once this many epochs in a row fail to improve.
    pub patience: usize,
    pub scheduler: SchedulerConfig,
}

impl TaskConfig {
    pub fn scheduling() -> Self {
        Self {
            goal: Goal::Scheduling,
            learning_rate: 1e-3,
            hidden_layers: 64,
            batch_size: 32,
            weight_decay: 5e-4,
            seed_num: 42,
            torch_seed: 42,
            max_epochs: 300,
            patience: 10,
            scheduler: SchedulerConfig::default(),
        }
    }

    pub fn picking_success() -> Self {
        Self {
            goal: Goal::PickingSuccess,
            learning_rate: 1e-3,
            hidden_layers: 32,
            batch_size: 16,
            weight_decay: 1e-4,
            ..Self::scheduling()
        }
    }

    /// Returns the preset of `goal`.
    pub fn for_goal(goal: Goal) -> Self {
        match goal {
            Goal::Scheduling => Self::scheduling(),
            Goal::PickingSuccess => Self::picking_success(),
        }
    }

    /// Loads a config from a JSON file whose keys override the preset of `goal`.
    ///
    /// The file may hold any subset of the fields, including `goal` itself, in which case the
    /// overrides are applied on top of that goal's preset instead.
    pub fn from_json_file(goal: Goal, path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).at(path)?;
        let json_err = |source| TrainerErr::Json {
            path: path.to_path_buf(),
            source,
        };

        let overrides: Value = serde_json::from_str(&content).map_err(json_err)?;
        let Value::Object(overrides) = overrides else {
            return Err(TrainerErr::InvalidConfig(format!(
                "{} must hold a JSON object",
                path.display()
            )));
        };

        let goal = match overrides.get("goal").and_then(Value::as_str) {
            Some(name) => name.parse()?,
            None => goal,
        };

        let mut merged = serde_json::to_value(Self::for_goal(goal)).map_err(json_err)?;
        merge(&mut merged, Value::Object(overrides));

        let config: Self = serde_json::from_value(merged).map_err(json_err)?;
        config.validate()?;
        Ok(config)
    }

    /// Rejects configurations that can't drive a training run.
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(TrainerErr::InvalidConfig(msg.to_string()));

        if self.batch_size == 0 {
            return invalid("batch_size must be > 0");
        }
        if self.learning_rate.is_nan() || self.learning_rate <= 0. {
            return invalid("learning_rate must be > 0");
        }
        if self.weight_decay.is_nan() || self.weight_decay < 0. {
            return invalid("weight_decay must be >= 0");
        }
        if self.hidden_layers == 0 {
            return invalid("hidden_layers must be > 0");
        }
        if self.max_epochs == 0 {
            return invalid("max_epochs must be > 0");
        }
        let factor = self.scheduler.factor;
        if factor.is_nan() || factor <= 0. || factor >= 1. {
            return invalid("scheduler.factor must be in (0, 1)");
        }

        Ok(())
    }
}

fn merge(base: &mut Value, overrides: Value) {
    match (base, overrides) {
        (Value::Object(base), Value::Object(overrides)) => {
            for (key, value) in overrides {
                match base.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}
