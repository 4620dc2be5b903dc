use machine_learning::graph::GraphBatch;
use ndarray::{Array1, ArrayView2, Axis, concatenate};

use super::GraphSample;
use crate::error::{Result, TrainerErr};

/// A group of samples flattened into one disjoint graph for a single step.
#[derive(Debug, Clone)]
pub struct Batch {
    pub graph: GraphBatch,
    pub y: Array1<f32>,
    /// Present only when every sample of the batch carries rank labels.
    pub ranks: Option<Vec<u8>>,
}

impl Batch {
    /// Joins `samples` into a single `Batch`, offsetting the edges of every sample by the
    /// amount of nodes that come before it.
    pub fn collate(samples: &[&GraphSample]) -> Result<Self> {
        if samples.is_empty() {
            return Err(TrainerErr::ShapeMismatch {
                what: "collated samples",
                got: 0,
                expected: 1,
            });
        }

        let views: Vec<ArrayView2<f32>> = samples.iter().map(|s| s.x().view()).collect();
        let x = concatenate(Axis(0), &views).map_err(|_| TrainerErr::ShapeMismatch {
            what: "collated features",
            got: samples.iter().map(|s| s.num_features()).max().unwrap_or(0),
            expected: samples[0].num_features(),
        })?;

        let nodes = x.nrows();
        let mut edges = Vec::with_capacity(samples.iter().map(|s| s.edges().len()).sum());
        let mut assignment = Vec::with_capacity(nodes);
        let mut y = Vec::with_capacity(nodes);
        let mut ranks = Some(Vec::with_capacity(nodes));
        let mut offset = 0;

        for (g, sample) in samples.iter().enumerate() {
            for &(src, dst) in sample.edges() {
                edges.push((src + offset, dst + offset));
            }
            assignment.extend(std::iter::repeat_n(g, sample.num_nodes()));
            y.extend_from_slice(sample.y());

            ranks = match (ranks, sample.ranks()) {
                (Some(mut acc), Some(r)) => {
                    acc.extend_from_slice(r);
                    Some(acc)
                }
                _ => None,
            };

            offset += sample.num_nodes();
        }

        Ok(Self {
            graph: GraphBatch::new(x, edges, assignment)?,
            y: Array1::from(y),
            ranks,
        })
    }

    pub fn num_nodes(&self) -> usize {
        self.graph.num_nodes()
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;

    #[test]
    fn edges_are_offset_and_nodes_assigned() {
        let a = GraphSample::new(
            array![[1.0], [2.0]],
            vec![(0, 1)],
            vec![1.0, 0.0],
            Some(vec![1, 2]),
        )
        .unwrap();
        let b = GraphSample::new(
            array![[3.0], [4.0], [5.0]],
            vec![(2, 0)],
            vec![0.0, 0.0, 1.0],
            Some(vec![3, 1, 2]),
        )
        .unwrap();

        let batch = Batch::collate(&[&a, &b]).unwrap();

        assert_eq!(batch.num_nodes(), 5);
        assert_eq!(batch.graph.edges(), &[(0, 1), (4, 2)]);
        assert_eq!(batch.graph.assignment(), &[0, 0, 1, 1, 1]);
        assert_eq!(batch.y, array![1.0, 0.0, 0.0, 0.0, 1.0]);
        assert_eq!(batch.ranks, Some(vec![1, 2, 3, 1, 2]));
    }

    #[test]
    fn ranks_are_dropped_when_any_sample_lacks_them() {
        let a = GraphSample::new(array![[1.0]], vec![], vec![1.0], Some(vec![1])).unwrap();
        let b = GraphSample::new(array![[1.0]], vec![], vec![1.0], None).unwrap();

        let batch = Batch::collate(&[&a, &b]).unwrap();
        assert_eq!(batch.ranks, None);
    }

    #[test]
    fn empty_batches_are_rejected() {
        assert!(Batch::collate(&[]).is_err());
    }
}
