use machine_learning::graph::graph_ranges;
use ndarray::ArrayView1;

use crate::{
    error::{Result, TrainerErr},
    metrics::THRESHOLD,
};

/// Counts how many nodes of a batch were classified correctly. The epoch accuracy is the sum
/// of these counts divided by the total amount of nodes seen.
pub trait Accuracy {
    /// # Arguments
    /// * `y_pred` - The per-node predictions.
    /// * `y` - The per-node targets.
    /// * `assignment` - The graph each node belongs to.
    fn correct(
        &self,
        y_pred: ArrayView1<f32>,
        y: ArrayView1<f32>,
        assignment: &[usize],
    ) -> Result<f32>;
}

fn check_lengths(
    y_pred: &ArrayView1<f32>,
    y: &ArrayView1<f32>,
    assignment: &[usize],
) -> Result<()> {
    if y_pred.len() != y.len() {
        return Err(TrainerErr::ShapeMismatch {
            what: "accuracy targets",
            got: y.len(),
            expected: y_pred.len(),
        });
    }

    if assignment.len() != y.len() {
        return Err(TrainerErr::ShapeMismatch {
            what: "accuracy assignment",
            got: assignment.len(),
            expected: y.len(),
        });
    }

    Ok(())
}

/// Every node whose thresholded prediction matches its thresholded target is correct.
#[derive(Debug, Clone, Copy, Default)]
pub struct NodeAccuracy;

impl Accuracy for NodeAccuracy {
    fn correct(
        &self,
        y_pred: ArrayView1<f32>,
        y: ArrayView1<f32>,
        assignment: &[usize],
    ) -> Result<f32> {
        check_lengths(&y_pred, &y, assignment)?;

        let hits = y_pred
            .iter()
            .zip(&y)
            .filter(|&(&p, &t)| (p > THRESHOLD) == (t > THRESHOLD))
            .count();

        Ok(hits as f32)
    }
}

/// A graph is correct when its highest scored node is a positive one, in which case all of
/// its nodes count as correct.
#[derive(Debug, Clone, Copy, Default)]
pub struct TopRankAccuracy;

impl Accuracy for TopRankAccuracy {
    fn correct(
        &self,
        y_pred: ArrayView1<f32>,
        y: ArrayView1<f32>,
        assignment: &[usize],
    ) -> Result<f32> {
        check_lengths(&y_pred, &y, assignment)?;

        let mut hits = 0;
        for range in graph_ranges(assignment) {
            let top = range
                .clone()
                .max_by(|&a, &b| y_pred[a].total_cmp(&y_pred[b]).then(b.cmp(&a)));

            if top.is_some_and(|i| y[i] > THRESHOLD) {
                hits += range.len();
            }
        }

        Ok(hits as f32)
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn node_accuracy_counts_matching_nodes() {
        let y_pred = array![0.9, 0.2, 0.6, 0.4, 0.55];
        let y = array![1.0, 0.0, 1.0, 0.0, 0.0];

        let correct = NodeAccuracy
            .correct(y_pred.view(), y.view(), &[0, 1, 2, 3, 4])
            .unwrap();
        assert_eq!(correct, 4.);
    }

    #[test]
    fn half_is_not_positive() {
        let correct = NodeAccuracy
            .correct(array![0.5].view(), array![0.0].view(), &[0])
            .unwrap();
        assert_eq!(correct, 1.);
    }

    #[test]
    fn top_rank_credits_whole_graphs() {
        // graph 0 picks node 1 (positive), graph 1 picks node 3 (negative)
        let y_pred = array![0.3, 0.8, 0.1, 0.9, 0.2];
        let y = array![0.0, 1.0, 0.0, 0.0, 1.0];

        let correct = TopRankAccuracy
            .correct(y_pred.view(), y.view(), &[0, 0, 0, 1, 1])
            .unwrap();
        assert_eq!(correct, 3.);
    }

    #[test]
    fn top_rank_ties_pick_the_first_node() {
        let y_pred = array![0.5, 0.5];
        let y = array![1.0, 0.0];

        let correct = TopRankAccuracy
            .correct(y_pred.view(), y.view(), &[0, 0])
            .unwrap();
        assert_eq!(correct, 2.);
    }

    #[test]
    fn mismatched_lengths_are_fatal() {
        let err = NodeAccuracy
            .correct(array![0.1, 0.2].view(), array![1.0].view(), &[0, 0])
            .unwrap_err();
        assert!(matches!(err, TrainerErr::ShapeMismatch { .. }));
    }
}
