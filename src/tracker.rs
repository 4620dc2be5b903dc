use log::{info, warn};
use ndarray::ArrayView1;

use crate::{
    data::{Batch, NUM_RANKS},
    error::{Result, TrainerErr},
    metrics::is_positive,
    phase::Phase,
};

/// Task specific statistics gathered alongside the loss and accuracy of a pass.
pub trait TaskMetricsCollector {
    /// Forgets everything seen so far, called at the start of every pass.
    fn reset(&mut self);

    /// Records the predictions the model made for `batch`.
    fn observe(&mut self, y_pred: ArrayView1<f32>, batch: &Batch) -> Result<()>;

    /// Logs what was gathered during the pass.
    fn report(&self, phase: Phase);
}

/// For tasks without rank semantics.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullTracker;

impl TaskMetricsCollector for NullTracker {
    fn reset(&mut self) {}

    fn observe(&mut self, _y_pred: ArrayView1<f32>, _batch: &Batch) -> Result<()> {
        Ok(())
    }

    fn report(&self, _phase: Phase) {}
}

/// Tallies the rank labels of the nodes predicted positive, together with the confidence the
/// model put on the first and second ranked ones.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SchedulingRankTracker {
    tally: [usize; NUM_RANKS],
    confidence: [f32; 2],
}

impl SchedulingRankTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// How many positive predictions carried each rank, index `rank - 1`.
    pub fn tally(&self) -> &[usize; NUM_RANKS] {
        &self.tally
    }

    /// Returns the mean prediction of the positives labeled `rank`, which must be 1 or 2.
    ///
    /// # Returns
    /// `None` if no positive prediction carried that rank.
    pub fn mean_confidence(&self, rank: usize) -> Option<f32> {
        let sum = *self.confidence.get(rank.checked_sub(1)?)?;
        let count = self.tally[rank - 1];

        (count > 0).then(|| sum / count as f32)
    }
}

impl TaskMetricsCollector for SchedulingRankTracker {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn observe(&mut self, y_pred: ArrayView1<f32>, batch: &Batch) -> Result<()> {
        let ranks = batch.ranks.as_deref().ok_or(TrainerErr::MissingRanks)?;

        if ranks.len() != y_pred.len() {
            return Err(TrainerErr::ShapeMismatch {
                what: "rank labels",
                got: ranks.len(),
                expected: y_pred.len(),
            });
        }

        for (&p, &rank) in y_pred.iter().zip(ranks) {
            if !is_positive(p) {
                continue;
            }

            let slot = usize::from(rank)
                .checked_sub(1)
                .filter(|&slot| slot < NUM_RANKS)
                .ok_or(TrainerErr::InvalidRank(i64::from(rank)))?;

            self.tally[slot] += 1;
            if let Some(confidence) = self.confidence.get_mut(slot) {
                *confidence += p;
            }
        }

        Ok(())
    }

    fn report(&self, phase: Phase) {
        info!(
            "{phase} rank tally of positive predictions: {:?}",
            self.tally
        );

        for (rank, name) in [(1, "first"), (2, "second")] {
            match self.mean_confidence(rank) {
                Some(mean) => info!("{phase} mean confidence on {name} ranked: {mean:.4}"),
                None => warn!(
                    "{phase} no {name} ranked node was predicted positive, skipping its mean \
                     confidence"
                ),
            }
        }
    }
}
