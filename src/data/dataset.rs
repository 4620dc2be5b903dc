use std::{fs, path::Path};

use log::info;

use super::GraphSample;
use crate::error::{IoContext, Result, TrainerErr};

/// An ordered collection of graphs sharing the same node feature width.
#[derive(Debug, Clone)]
pub struct GraphDataset {
    samples: Vec<GraphSample>,
    num_features: usize,
}

impl GraphDataset {
    /// Creates a new `GraphDataset`.
    ///
    /// # Returns
    /// The dataset or an error if it's empty or its samples disagree on the feature width.
    pub fn new(samples: Vec<GraphSample>) -> Result<Self> {
        let Some(first) = samples.first() else {
            return Err(TrainerErr::ShapeMismatch {
                what: "dataset samples",
                got: 0,
                expected: 1,
            });
        };

        let num_features = first.num_features();
        if let Some(sample) = samples.iter().find(|s| s.num_features() != num_features) {
            return Err(TrainerErr::ShapeMismatch {
                what: "sample features",
                got: sample.num_features(),
                expected: num_features,
            });
        }

        Ok(Self {
            samples,
            num_features,
        })
    }

    /// Loads every `*.json` file of `dir` as one sample, in file name order.
    pub fn load(dir: &Path) -> Result<Self> {
        let mut paths = Vec::new();
        for entry in fs::read_dir(dir).at(dir)? {
            let path = entry.at(dir)?.path();
            if path.extension().is_some_and(|ext| ext == "json") {
                paths.push(path);
            }
        }
        paths.sort();

        let samples = paths
            .iter()
            .map(|path| GraphSample::from_json_file(path))
            .collect::<Result<Vec<_>>>()?;

        let dataset = Self::new(samples).map_err(|e| TrainerErr::Dataset {
            path: dir.to_path_buf(),
            msg: e.to_string(),
        })?;

        info!(
            "loaded {} graphs with {} node features from {}",
            dataset.len(),
            dataset.num_features(),
            dir.display()
        );

        Ok(dataset)
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    /// Whether every sample carries rank labels.
    pub fn has_ranks(&self) -> bool {
        self.samples.iter().all(|s| s.ranks().is_some())
    }

    pub fn samples(&self) -> &[GraphSample] {
        &self.samples
    }
}
