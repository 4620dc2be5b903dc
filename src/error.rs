use std::{fmt, io, path::PathBuf};

use machine_learning::MlErr;

/// The result type used across the training driver.
pub type Result<T> = std::result::Result<T, TrainerErr>;

/// All errors that can occur while training, validating or testing a model.
#[derive(Debug)]
pub enum TrainerErr {
    /// Invalid configuration, caught before any data is loaded.
    InvalidConfig(String),
    /// The goal name doesn't match any known task.
    UnknownGoal(String),
    /// A filesystem operation on `path` failed.
    Io { path: PathBuf, source: io::Error },
    /// A JSON document couldn't be parsed or written.
    Json {
        path: PathBuf,
        source: serde_json::Error,
    },
    /// A dataset file holds an inconsistent graph.
    Dataset { path: PathBuf, msg: String },
    /// Predictions, targets or ranks of a batch don't line up.
    ShapeMismatch {
        what: &'static str,
        got: usize,
        expected: usize,
    },
    /// A target outside of `[0, 1]`.
    InvalidTarget(f32),
    /// A rank label outside of `1..=17`.
    InvalidRank(i64),
    /// The scheduling tracker got a batch without rank labels.
    MissingRanks,
    /// A pass was run over a loader that yielded no batches.
    EmptyLoader(&'static str),
    /// The model checkpoint couldn't be encoded or decoded.
    Checkpoint { path: PathBuf, msg: String },
    /// Testing was requested but no checkpoint was ever written.
    NoCheckpoint,
    /// The numerical layer failed.
    Ml(MlErr),
}

impl fmt::Display for TrainerErr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidConfig(msg) => write!(f, "invalid config: {msg}"),
            Self::UnknownGoal(goal) => write!(f, "unknown goal: {goal}"),
            Self::Io { path, source } => write!(f, "io error on {}: {source}", path.display()),
            Self::Json { path, source } => {
                write!(f, "invalid json in {}: {source}", path.display())
            }
            Self::Dataset { path, msg } => write!(f, "bad sample {}: {msg}", path.display()),
            Self::ShapeMismatch {
                what,
                got,
                expected,
            } => write!(f, "shape mismatch in {what}: got {got}, want {expected}"),
            Self::InvalidTarget(t) => write!(f, "target {t} is outside of [0, 1]"),
            Self::InvalidRank(rank) => write!(f, "rank label {rank} is outside of 1..=17"),
            Self::MissingRanks => write!(f, "the batch carries no rank labels"),
            Self::EmptyLoader(phase) => write!(f, "the {phase} loader yielded no batches"),
            Self::Checkpoint { path, msg } => {
                write!(f, "checkpoint {} error: {msg}", path.display())
            }
            Self::NoCheckpoint => write!(f, "no checkpoint was written during training"),
            Self::Ml(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for TrainerErr {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Json { source, .. } => Some(source),
            Self::Ml(e) => Some(e),
            _ => None,
        }
    }
}

impl From<MlErr> for TrainerErr {
    fn from(e: MlErr) -> Self {
        Self::Ml(e)
    }
}

/// Attaches the offending path to io errors.
pub(crate) trait IoContext<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T>;
}

impl<T> IoContext<T> for io::Result<T> {
    fn at(self, path: impl Into<PathBuf>) -> Result<T> {
        self.map_err(|source| TrainerErr::Io {
            path: path.into(),
            source,
        })
    }
}
