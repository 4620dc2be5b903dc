use std::path::{Path, PathBuf};

use crate::{error::Result, plot::CurveAnnotations};

/// The best values seen so far in a run, and the checkpoint that goes with the best
/// validation loss.
#[derive(Debug, Clone, PartialEq)]
pub struct BestState {
    val_loss: f32,
    train_loss: f32,
    train_acc: f32,
    val_acc: f32,
    checkpoint: Option<PathBuf>,
}

impl Default for BestState {
    fn default() -> Self {
        Self {
            val_loss: f32::INFINITY,
            train_loss: f32::INFINITY,
            train_acc: 0.,
            val_acc: 0.,
            checkpoint: None,
        }
    }
}

/// The per-epoch numbers `BestState` keeps track of.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochScores {
    pub train_loss: f32,
    pub train_acc: f32,
    pub val_loss: f32,
    pub val_acc: f32,
}

impl BestState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn val_loss(&self) -> f32 {
        self.val_loss
    }

    pub fn train_loss(&self) -> f32 {
        self.train_loss
    }

    pub fn train_acc(&self) -> f32 {
        self.train_acc
    }

    pub fn val_acc(&self) -> f32 {
        self.val_acc
    }

    /// The checkpoint holding the parameters that reached `val_loss`.
    pub fn checkpoint(&self) -> Option<&Path> {
        self.checkpoint.as_deref()
    }

    /// Folds the scores of a completed epoch into the record.
    ///
    /// When the validation loss strictly improves, `save` is called first and the record only
    /// moves to the new loss once the checkpoint it returns is in place.
    ///
    /// # Returns
    /// Whether the validation loss improved.
    pub fn update<F>(&mut self, scores: EpochScores, save: F) -> Result<bool>
    where
        F: FnOnce() -> Result<PathBuf>,
    {
        let improved = scores.val_loss < self.val_loss;
        if improved {
            let path = save()?;
            self.val_loss = scores.val_loss;
            self.checkpoint = Some(path);
        }

        if scores.train_loss < self.train_loss {
            self.train_loss = scores.train_loss;
        }
        if scores.train_acc > self.train_acc {
            self.train_acc = scores.train_acc;
        }
        if scores.val_acc > self.val_acc {
            self.val_acc = scores.val_acc;
        }

        Ok(improved)
    }

    /// The values written over the final curves.
    pub fn annotations(&self, final_epoch: usize) -> CurveAnnotations {
        CurveAnnotations {
            final_epoch,
            train_loss: self.train_loss,
            val_loss: self.val_loss,
            train_acc: self.train_acc,
            val_acc: self.val_acc,
        }
    }
}

/// Counts the consecutive epochs without validation loss improvement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EarlyStopping {
    patience: usize,
    counter: usize,
}

impl EarlyStopping {
    pub fn new(patience: usize) -> Self {
        Self {
            patience,
            counter: 0,
        }
    }

    pub fn counter(&self) -> usize {
        self.counter
    }

    /// Resets the counter on improvement, bumps it otherwise.
    pub fn observe(&mut self, improved: bool) {
        if improved {
            self.counter = 0;
        } else {
            self.counter += 1;
        }
    }

    /// Training stops once the counter goes past the patience.
    pub fn should_stop(&self) -> bool {
        self.counter > self.patience
    }
}

#[cfg(test)]
mod tests {
    use std::cell::Cell;

    use super::*;
    use crate::error::TrainerErr;

    fn scores(val_loss: f32) -> EpochScores {
        EpochScores {
            train_loss: 1.,
            train_acc: 0.5,
            val_loss,
            val_acc: 0.5,
        }
    }

    #[test]
    fn checkpoint_follows_the_best_validation_loss() {
        let writes = Cell::new(0);
        let save = || {
            writes.set(writes.get() + 1);
            Ok(PathBuf::from(format!("model_{}", writes.get())))
        };

        let mut best = BestState::new();
        assert_eq!(best.val_loss(), f32::INFINITY);

        assert!(best.update(scores(0.8), save).unwrap());
        assert_eq!(best.val_loss(), 0.8);
        assert_eq!(writes.get(), 1);

        assert!(!best.update(scores(0.9), save).unwrap());
        assert_eq!(best.val_loss(), 0.8);
        assert_eq!(writes.get(), 1);
        assert_eq!(best.checkpoint(), Some(Path::new("model_1")));
    }

    #[test]
    fn equal_loss_is_not_an_improvement() {
        let mut best = BestState::new();
        best.update(scores(0.5), || Ok(PathBuf::from("a"))).unwrap();
        assert!(!best.update(scores(0.5), || Ok(PathBuf::from("b"))).unwrap());
        assert_eq!(best.checkpoint(), Some(Path::new("a")));
    }

    #[test]
    fn failed_save_leaves_the_record_untouched() {
        let mut best = BestState::new();
        let err = best.update(scores(0.5), || Err(TrainerErr::NoCheckpoint));

        assert!(err.is_err());
        assert_eq!(best, BestState::new());
    }

    #[test]
    fn other_records_move_independently() {
        let mut best = BestState::new();
        best.update(scores(0.5), || Ok(PathBuf::from("a"))).unwrap();

        let worse_val_better_train = EpochScores {
            train_loss: 0.3,
            train_acc: 0.9,
            val_loss: 0.7,
            val_acc: 0.4,
        };
        best.update(worse_val_better_train, || Ok(PathBuf::from("b")))
            .unwrap();

        assert_eq!(best.val_loss(), 0.5);
        assert_eq!(best.train_loss(), 0.3);
        assert_eq!(best.train_acc(), 0.9);
        assert_eq!(best.val_acc(), 0.5);
    }

    #[test]
    fn stopping_fires_past_the_patience() {
        let mut stopping = EarlyStopping::new(10);
        for _ in 0..10 {
            stopping.observe(false);
            assert!(!stopping.should_stop());
        }

        stopping.observe(false);
        assert_eq!(stopping.counter(), 11);
        assert!(stopping.should_stop());
    }

    #[test]
    fn improvement_resets_the_counter() {
        let mut stopping = EarlyStopping::new(10);
        stopping.observe(false);
        stopping.observe(false);
        stopping.observe(true);
        assert_eq!(stopping.counter(), 0);
    }
}
