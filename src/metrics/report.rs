use std::path::Path;

use log::info;

use super::ConfusionMatrix;
use crate::{error::Result, phase::Phase, plot};

/// The classification scores of one complete pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricsReport {
    pub confusion: ConfusionMatrix,
    pub accuracy: f32,
    /// Indexed by class.
    pub precision: [f32; 2],
    pub recall: [f32; 2],
    pub f1: [f32; 2],
}

impl MetricsReport {
    pub fn new(confusion: ConfusionMatrix) -> Self {
        let per_class = |score: fn(&ConfusionMatrix, usize) -> f32| {
            [score(&confusion, 0), score(&confusion, 1)]
        };

        Self {
            accuracy: confusion.accuracy(),
            precision: per_class(ConfusionMatrix::precision),
            recall: per_class(ConfusionMatrix::recall),
            f1: per_class(ConfusionMatrix::f1),
            confusion,
        }
    }

    pub fn log(&self, phase: Phase) {
        info!("{phase} confusion matrix:\n{}", self.confusion);
        info!("{phase} f1 score: {:?}", self.f1);
        info!("{phase} accuracy: {}", self.accuracy);
        info!("{phase} precision: {:?}", self.precision);
        info!("{phase} recall: {:?}", self.recall);
    }
}

/// Turns the binarized outputs of a pass into a `MetricsReport`. Keeps no state between calls.
#[derive(Debug, Clone, Copy, Default)]
pub struct MetricsAggregator;

impl MetricsAggregator {
    /// Computes, logs and optionally renders the metrics of one pass.
    ///
    /// # Arguments
    /// * `phase` - The pass the labels come from.
    /// * `preds` - The binarized predictions of every node of the pass.
    /// * `truths` - The binarized targets, aligned with `preds`.
    /// * `export` - Where to write the confusion matrix image, if anywhere.
    pub fn evaluate(
        &self,
        phase: Phase,
        preds: &[u8],
        truths: &[u8],
        export: Option<&Path>,
    ) -> Result<MetricsReport> {
        let report = MetricsReport::new(ConfusionMatrix::from_labels(preds, truths)?);
        report.log(phase);

        if let Some(path) = export {
            plot::draw_confusion_matrix(&report.confusion, phase.as_str(), path)?;
            info!("saved {phase} confusion matrix to {}", path.display());
        }

        Ok(report)
    }
}
