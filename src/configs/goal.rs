use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::error::TrainerErr;

/// The classification objective, selects the dataset, model size and accuracy functional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Goal {
    #[default]
    Scheduling,
    PickingSuccess,
}

impl Goal {
    pub fn as_str(&self) -> &'static str {
        match self {
            Goal::Scheduling => "scheduling",
            Goal::PickingSuccess => "picking_success",
        }
    }

    /// Whether the samples of this goal carry rank labels.
    pub fn has_ranks(&self) -> bool {
        matches!(self, Goal::Scheduling)
    }
}

impl fmt::Display for Goal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Goal {
    type Err = TrainerErr;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "scheduling" => Ok(Goal::Scheduling),
            "picking_success" => Ok(Goal::PickingSuccess),
            other => Err(TrainerErr::UnknownGoal(other.to_string())),
        }
    }
}
