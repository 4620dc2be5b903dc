use std::ops::Range;

use ndarray::{Array2, ArrayView2};

use crate::{MlErr, Result};

/// A batch of disjoint graphs flattened into a single node set.
///
/// Node `i` belongs to graph `assignment[i]`. Graph indices start at 0 and never decrease, so
/// the nodes of every graph are contiguous.
#[derive(Debug, Clone)]
pub struct GraphBatch {
    x: Array2<f32>,
    edges: Vec<(usize, usize)>,
    assignment: Vec<usize>,
    num_graphs: usize,
}

impl GraphBatch {
    /// Creates a new `GraphBatch`.
    ///
    /// # Arguments
    /// * `x` - The node feature matrix, one row per node.
    /// * `edges` - Directed `(src, dst)` edges over batch-global node indices.
    /// * `assignment` - The graph each node belongs to.
    ///
    /// # Returns
    /// A new `GraphBatch` or an error if the pieces are inconsistent.
    pub fn new(
        x: Array2<f32>,
        edges: Vec<(usize, usize)>,
        assignment: Vec<usize>,
    ) -> Result<Self> {
        let nodes = x.nrows();

        if assignment.len() != nodes {
            return Err(MlErr::SizeMismatch {
                what: "batch assignment",
                got: assignment.len(),
                expected: nodes,
            });
        }

        if let Some(&(src, dst)) = edges.iter().find(|&&(s, d)| s >= nodes || d >= nodes) {
            return Err(MlErr::InvalidGraph(format!(
                "edge ({src}, {dst}) points outside of the {nodes} nodes of the batch"
            )));
        }

        let mut num_graphs = 0;
        for &g in &assignment {
            if g == num_graphs {
                num_graphs += 1;
            } else if g + 1 != num_graphs {
                return Err(MlErr::InvalidGraph(format!(
                    "graph index {g} breaks the contiguous assignment after graph {}",
                    num_graphs.saturating_sub(1)
                )));
            }
        }

        Ok(Self {
            x,
            edges,
            assignment,
            num_graphs,
        })
    }

    pub fn x(&self) -> ArrayView2<'_, f32> {
        self.x.view()
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn assignment(&self) -> &[usize] {
        &self.assignment
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }

    pub fn num_graphs(&self) -> usize {
        self.num_graphs
    }

    /// Returns the node range of every graph in the batch, in order.
    pub fn graph_ranges(&self) -> Vec<Range<usize>> {
        graph_ranges(&self.assignment)
    }
}

/// Splits a contiguous batch assignment into per-graph node ranges.
pub fn graph_ranges(assignment: &[usize]) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut start = 0;

    for i in 1..=assignment.len() {
        if i == assignment.len() || assignment[i] != assignment[start] {
            ranges.push(start..i);
            start = i;
        }
    }

    ranges
}

/// The mean-aggregation operator of a batch: every node averages itself together with its
/// in-neighbours.
#[derive(Debug, Clone)]
pub struct Propagation {
    nodes: usize,
    // (src, dst, weight), self loops included
    entries: Vec<(usize, usize, f32)>,
}

impl Propagation {
    /// Builds the operator for the given batch.
    pub fn new(batch: &GraphBatch) -> Self {
        let nodes = batch.num_nodes();
        let mut in_degree = vec![1usize; nodes];

        for &(_, dst) in batch.edges() {
            in_degree[dst] += 1;
        }

        let entries = (0..nodes)
            .map(|i| (i, i))
            .chain(batch.edges().iter().copied())
            .map(|(src, dst)| (src, dst, 1. / in_degree[dst] as f32))
            .collect();

        Self { nodes, entries }
    }

    /// Returns `A h`.
    pub fn aggregate(&self, h: ArrayView2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros((self.nodes, h.ncols()));

        for &(src, dst, w) in &self.entries {
            out.row_mut(dst).scaled_add(w, &h.row(src));
        }

        out
    }

    /// Returns `A^T d`, the gradient of `aggregate` with respect to its input.
    pub fn aggregate_transposed(&self, d: ArrayView2<f32>) -> Array2<f32> {
        let mut out = Array2::zeros((self.nodes, d.ncols()));

        for &(src, dst, w) in &self.entries {
            out.row_mut(src).scaled_add(w, &d.row(dst));
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    fn close(a: &Array2<f32>, b: &Array2<f32>) -> bool {
        a.shape() == b.shape() && a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-6)
    }

    #[test]
    fn rejects_non_contiguous_assignment() {
        let x = Array2::zeros((3, 1));
        let err = GraphBatch::new(x, vec![], vec![0, 1, 0]).unwrap_err();
        assert!(matches!(err, MlErr::InvalidGraph(_)));
    }

    #[test]
    fn rejects_out_of_range_edges() {
        let x = Array2::zeros((2, 1));
        assert!(GraphBatch::new(x, vec![(0, 2)], vec![0, 0]).is_err());
    }

    #[test]
    fn rejects_assignment_length_mismatch() {
        let x = Array2::zeros((2, 1));
        let err = GraphBatch::new(x, vec![], vec![0]).unwrap_err();
        assert_eq!(
            err,
            MlErr::SizeMismatch {
                what: "batch assignment",
                got: 1,
                expected: 2
            }
        );
    }

    #[test]
    fn graph_ranges_follow_assignment() {
        let x = Array2::zeros((5, 1));
        let batch = GraphBatch::new(x, vec![], vec![0, 0, 1, 2, 2]).unwrap();
        assert_eq!(batch.num_graphs(), 3);
        assert_eq!(batch.graph_ranges(), vec![0..2, 2..3, 3..5]);
    }

    #[test]
    fn aggregation_averages_self_and_in_neighbours() {
        let x = array![[1.0], [3.0], [5.0]];
        let batch = GraphBatch::new(x, vec![(0, 1), (2, 1)], vec![0, 0, 0]).unwrap();
        let prop = Propagation::new(&batch);

        let out = prop.aggregate(batch.x());
        let expected = array![[1.0], [3.0], [5.0]];
        assert!(close(&out, &expected));

        let d = array![[0.0], [3.0], [0.0]];
        let back = prop.aggregate_transposed(d.view());
        let expected = array![[1.0], [1.0], [1.0]];
        assert!(close(&back, &expected));
    }
}
