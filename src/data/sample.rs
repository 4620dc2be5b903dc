use std::{fs, path::Path};

use ndarray::Array2;
use serde::Deserialize;

use crate::error::{IoContext, Result, TrainerErr};

/// The amount of rank labels a scheduling candidate can carry.
pub const NUM_RANKS: usize = 17;

/// One labeled graph.
#[derive(Debug, Clone, PartialEq)]
pub struct GraphSample {
    x: Array2<f32>,
    edges: Vec<(usize, usize)>,
    y: Vec<f32>,
    ranks: Option<Vec<u8>>,
}

#[derive(Deserialize)]
struct RawSample {
    x: Vec<Vec<f32>>,
    #[serde(default)]
    edges: Vec<[usize; 2]>,
    y: Vec<f32>,
    #[serde(default)]
    rank: Option<Vec<i64>>,
}

impl GraphSample {
    /// Creates a new `GraphSample`.
    ///
    /// # Arguments
    /// * `x` - The node features, one row per node.
    /// * `edges` - Directed `(src, dst)` edges over the sample's node indices.
    /// * `y` - The per-node target in `[0, 1]`.
    /// * `ranks` - The per-node rank labels in `1..=17`, if the task has them.
    pub fn new(
        x: Array2<f32>,
        edges: Vec<(usize, usize)>,
        y: Vec<f32>,
        ranks: Option<Vec<i64>>,
    ) -> Result<Self> {
        let nodes = x.nrows();

        if nodes == 0 {
            return Err(TrainerErr::ShapeMismatch {
                what: "sample nodes",
                got: 0,
                expected: 1,
            });
        }

        if y.len() != nodes {
            return Err(TrainerErr::ShapeMismatch {
                what: "sample targets",
                got: y.len(),
                expected: nodes,
            });
        }

        if let Some(&(src, dst)) = edges.iter().find(|&&(s, d)| s >= nodes || d >= nodes) {
            return Err(TrainerErr::ShapeMismatch {
                what: "edge endpoint",
                got: src.max(dst),
                expected: nodes - 1,
            });
        }

        if let Some(&t) = y.iter().find(|t| !(0.0..=1.0).contains(*t)) {
            return Err(TrainerErr::InvalidTarget(t));
        }

        let ranks = ranks
            .map(|ranks| {
                if ranks.len() != nodes {
                    return Err(TrainerErr::ShapeMismatch {
                        what: "sample ranks",
                        got: ranks.len(),
                        expected: nodes,
                    });
                }

                ranks
                    .into_iter()
                    .map(|r| match u8::try_from(r) {
                        Ok(rank) if (1..=NUM_RANKS as u8).contains(&rank) => Ok(rank),
                        _ => Err(TrainerErr::InvalidRank(r)),
                    })
                    .collect::<Result<Vec<_>>>()
            })
            .transpose()?;

        Ok(Self { x, edges, y, ranks })
    }

    /// Reads a sample from a JSON document of the form
    /// `{"x": [[..]], "edges": [[src, dst]], "y": [..], "rank": [..]}`.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).at(path)?;
        let raw: RawSample = serde_json::from_str(&content).map_err(|source| TrainerErr::Json {
            path: path.to_path_buf(),
            source,
        })?;

        let bad_sample = |msg: String| TrainerErr::Dataset {
            path: path.to_path_buf(),
            msg,
        };

        let features = raw.x.first().map(Vec::len).unwrap_or_default();
        if let Some(row) = raw.x.iter().position(|row| row.len() != features) {
            return Err(bad_sample(format!(
                "node {row} has {} features, expected {features}",
                raw.x[row].len()
            )));
        }

        let nodes = raw.x.len();
        let flat = raw.x.into_iter().flatten().collect();
        let x = Array2::from_shape_vec((nodes, features), flat)
            .map_err(|e| bad_sample(e.to_string()))?;
        let edges = raw.edges.into_iter().map(|[s, d]| (s, d)).collect();

        Self::new(x, edges, raw.y, raw.rank).map_err(|e| bad_sample(e.to_string()))
    }

    pub fn x(&self) -> &Array2<f32> {
        &self.x
    }

    pub fn edges(&self) -> &[(usize, usize)] {
        &self.edges
    }

    pub fn y(&self) -> &[f32] {
        &self.y
    }

    pub fn ranks(&self) -> Option<&[u8]> {
        self.ranks.as_deref()
    }

    pub fn num_nodes(&self) -> usize {
        self.x.nrows()
    }

    pub fn num_features(&self) -> usize {
        self.x.ncols()
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use ndarray::array;

    use super::*;

    #[test]
    fn sample_is_read_from_json() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"x": [[1.0, 0.0], [0.5, 0.5]], "edges": [[0, 1]], "y": [1.0, 0.0], "rank": [1, 3]}}"#
        )
        .unwrap();

        let sample = GraphSample::from_json_file(file.path()).unwrap();

        assert_eq!(sample.x(), &array![[1.0, 0.0], [0.5, 0.5]]);
        assert_eq!(sample.edges(), &[(0, 1)]);
        assert_eq!(sample.y(), &[1.0, 0.0]);
        assert_eq!(sample.ranks(), Some(&[1, 3][..]));
    }

    #[test]
    fn ragged_features_name_the_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"x": [[1.0, 0.0], [0.5]], "y": [1.0, 0.0]}}"#).unwrap();

        let err = GraphSample::from_json_file(file.path()).unwrap_err();
        assert!(matches!(err, TrainerErr::Dataset { path, .. } if path == file.path()));
    }

    #[test]
    fn targets_must_match_the_nodes() {
        let err = GraphSample::new(array![[1.0], [2.0]], vec![], vec![1.0], None).unwrap_err();
        assert!(matches!(err, TrainerErr::ShapeMismatch { got: 1, expected: 2, .. }));
    }

    #[test]
    fn ranks_outside_of_range_are_rejected() {
        for rank in [0, 18, -1] {
            let err = GraphSample::new(array![[1.0]], vec![], vec![1.0], Some(vec![rank]));
            assert!(matches!(err, Err(TrainerErr::InvalidRank(r)) if r == rank));
        }
    }

    #[test]
    fn edges_must_stay_inside_the_graph() {
        let err = GraphSample::new(array![[1.0], [2.0]], vec![(0, 2)], vec![1.0, 0.0], None);
        assert!(err.is_err());
    }
}
