/// The per-epoch curves of a run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TrainingHistory {
    epochs: Vec<usize>,
    train_loss: Vec<f32>,
    val_loss: Vec<f32>,
    train_acc: Vec<f32>,
    val_acc: Vec<f32>,
}

/// One point of every curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochPoint {
    pub epoch: usize,
    pub train_loss: f32,
    pub val_loss: f32,
    pub train_acc: f32,
    pub val_acc: f32,
}

impl TrainingHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends the results of a completed epoch.
    pub fn push(&mut self, point: EpochPoint) {
        self.epochs.push(point.epoch);
        self.train_loss.push(point.train_loss);
        self.val_loss.push(point.val_loss);
        self.train_acc.push(point.train_acc);
        self.val_acc.push(point.val_acc);
    }

    pub fn len(&self) -> usize {
        self.epochs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.epochs.is_empty()
    }

    pub fn epochs(&self) -> &[usize] {
        &self.epochs
    }

    pub fn train_loss(&self) -> &[f32] {
        &self.train_loss
    }

    pub fn val_loss(&self) -> &[f32] {
        &self.val_loss
    }

    pub fn train_acc(&self) -> &[f32] {
        &self.train_acc
    }

    pub fn val_acc(&self) -> &[f32] {
        &self.val_acc
    }

    pub fn last(&self) -> Option<EpochPoint> {
        let i = self.len().checked_sub(1)?;
        Some(EpochPoint {
            epoch: self.epochs[i],
            train_loss: self.train_loss[i],
            val_loss: self.val_loss[i],
            train_acc: self.train_acc[i],
            val_acc: self.val_acc[i],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn curves_grow_together() {
        let mut history = TrainingHistory::new();
        assert_eq!(history.last(), None);

        let point = EpochPoint {
            epoch: 1,
            train_loss: 0.7,
            val_loss: 0.8,
            train_acc: 0.5,
            val_acc: 0.4,
        };
        history.push(point);
        history.push(EpochPoint { epoch: 2, ..point });

        assert_eq!(history.len(), 2);
        assert_eq!(history.epochs(), &[1, 2]);
        assert_eq!(history.val_loss(), &[0.8, 0.8]);
        assert_eq!(history.last().map(|p| p.epoch), Some(2));
    }
}
