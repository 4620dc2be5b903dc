use rand::{SeedableRng, rngs::StdRng, seq::SliceRandom};

use super::{Batch, GraphDataset};
use crate::error::{Result, TrainerErr};

/// Splits a dataset into batches, one epoch at a time.
#[derive(Debug, Clone)]
pub struct DataLoader {
    dataset: GraphDataset,
    batch_size: usize,
    rng: Option<StdRng>,
}

impl DataLoader {
    /// Creates a new `DataLoader` that yields the samples in dataset order.
    pub fn new(dataset: GraphDataset, batch_size: usize) -> Result<Self> {
        if batch_size == 0 {
            return Err(TrainerErr::InvalidConfig("batch_size must be > 0".into()));
        }

        Ok(Self {
            dataset,
            batch_size,
            rng: None,
        })
    }

    /// Creates a `DataLoader` that yields the whole dataset as a single batch.
    pub fn whole(dataset: GraphDataset) -> Self {
        let batch_size = dataset.len().max(1);
        Self {
            dataset,
            batch_size,
            rng: None,
        }
    }

    /// Reshuffles the sample order at the start of every epoch.
    pub fn shuffled(mut self, seed: u64) -> Self {
        self.rng = Some(StdRng::seed_from_u64(seed));
        self
    }

    pub fn dataset(&self) -> &GraphDataset {
        &self.dataset
    }

    /// Returns the amount of batches in one epoch.
    pub fn num_batches(&self) -> usize {
        self.dataset.len().div_ceil(self.batch_size)
    }

    /// Collates the batches of one epoch.
    pub fn batches(&mut self) -> Result<Vec<Batch>> {
        let samples = self.dataset.samples();
        let mut order: Vec<usize> = (0..samples.len()).collect();

        if let Some(rng) = &mut self.rng {
            order.shuffle(rng);
        }

        order
            .chunks(self.batch_size)
            .map(|chunk| {
                let chunk: Vec<_> = chunk.iter().map(|&i| &samples[i]).collect();
                Batch::collate(&chunk)
            })
            .collect()
    }
}
