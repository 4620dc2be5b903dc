use std::fmt;

use crate::error::{Result, TrainerErr};

/// A binary confusion matrix, `counts[truth][pred]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    counts: [[usize; 2]; 2],
}

impl ConfusionMatrix {
    /// Counts every `(pred, truth)` pair of already binarized labels.
    pub fn from_labels(preds: &[u8], truths: &[u8]) -> Result<Self> {
        if preds.len() != truths.len() {
            return Err(TrainerErr::ShapeMismatch {
                what: "confusion matrix labels",
                got: truths.len(),
                expected: preds.len(),
            });
        }

        let mut counts = [[0; 2]; 2];
        for (&p, &t) in preds.iter().zip(truths) {
            counts[usize::from(t > 0)][usize::from(p > 0)] += 1;
        }

        Ok(Self { counts })
    }

    pub fn get(&self, truth: usize, pred: usize) -> usize {
        self.counts[truth][pred]
    }

    pub fn total(&self) -> usize {
        self.counts.iter().flatten().sum()
    }

    pub fn accuracy(&self) -> f32 {
        ratio(self.counts[0][0] + self.counts[1][1], self.total())
    }

    /// Of everything predicted as `class`, the fraction that was.
    pub fn precision(&self, class: usize) -> f32 {
        let predicted = self.counts[0][class] + self.counts[1][class];
        ratio(self.counts[class][class], predicted)
    }

    /// Of everything that was `class`, the fraction predicted as such.
    pub fn recall(&self, class: usize) -> f32 {
        ratio(self.counts[class][class], self.counts[class].iter().sum())
    }

    pub fn f1(&self, class: usize) -> f32 {
        let (p, r) = (self.precision(class), self.recall(class));
        if p + r == 0. {
            return 0.;
        }

        2. * p * r / (p + r)
    }
}

fn ratio(num: usize, den: usize) -> f32 {
    if den == 0 {
        return 0.;
    }

    num as f32 / den as f32
}

impl fmt::Display for ConfusionMatrix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [[tn, fp], [fn_, tp]] = self.counts;
        write!(f, "[[{tn} {fp}]\n [{fn_} {tp}]]")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn counts_are_indexed_by_truth_then_prediction() {
        let cm = ConfusionMatrix::from_labels(&[1, 0, 1, 0, 1], &[1, 0, 1, 0, 0]).unwrap();

        assert_eq!(cm.get(1, 1), 2);
        assert_eq!(cm.get(0, 0), 2);
        assert_eq!(cm.get(0, 1), 1);
        assert_eq!(cm.get(1, 0), 0);
        assert_eq!(cm.total(), 5);
    }

    #[test]
    fn per_class_scores() {
        let cm = ConfusionMatrix::from_labels(&[1, 0, 1, 0, 1], &[1, 0, 1, 0, 0]).unwrap();

        assert_eq!(cm.accuracy(), 0.8);
        assert_eq!(cm.precision(1), 2. / 3.);
        assert_eq!(cm.recall(1), 1.);
        assert_eq!(cm.precision(0), 1.);
        assert_eq!(cm.recall(0), 2. / 3.);
        assert!((cm.f1(1) - 0.8).abs() < 1e-6);
    }

    #[test]
    fn undefined_scores_are_zero() {
        let cm = ConfusionMatrix::from_labels(&[0, 0], &[0, 0]).unwrap();

        assert_eq!(cm.precision(1), 0.);
        assert_eq!(cm.recall(1), 0.);
        assert_eq!(cm.f1(1), 0.);
        assert_eq!(cm.f1(0), 1.);
    }

    #[test]
    fn display_matches_the_usual_layout() {
        let cm = ConfusionMatrix::from_labels(&[1, 0, 1], &[1, 1, 0]).unwrap();
        assert_eq!(cm.to_string(), "[[0 1]\n [1 1]]");
    }

    #[test]
    fn label_counts_must_match() {
        assert!(ConfusionMatrix::from_labels(&[1], &[]).is_err());
    }
}
