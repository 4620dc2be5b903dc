use log::warn;

use super::Optimizer;

/// The knobs of a `ReduceLrOnPlateau` scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlateauConfig {
    /// The multiplier applied to the learning rate on every reduction.
    pub factor: f32,
    /// The amount of non improving steps tolerated before reducing.
    pub patience: usize,
    /// The relative improvement a metric needs to count as better.
    pub threshold: f32,
    /// The amount of steps to wait after a reduction before counting bad steps again.
    pub cooldown: usize,
    /// The lower bound for the learning rate.
    pub min_lr: f32,
    /// Reductions smaller than this are ignored.
    pub eps: f32,
}

impl Default for PlateauConfig {
    fn default() -> Self {
        Self {
            factor: 0.1,
            patience: 10,
            threshold: 1e-4,
            cooldown: 0,
            min_lr: 0.,
            eps: 1e-8,
        }
    }
}

/// Reduces the learning rate of an optimizer once a minimized metric stops improving.
#[derive(Debug, Clone)]
pub struct ReduceLrOnPlateau {
    config: PlateauConfig,
    best: f32,
    bad_steps: usize,
    cooldown_left: usize,
}

impl ReduceLrOnPlateau {
    /// Creates a new `ReduceLrOnPlateau`.
    pub fn new(config: PlateauConfig) -> Self {
        Self {
            config,
            best: f32::INFINITY,
            bad_steps: 0,
            cooldown_left: 0,
        }
    }

    /// Returns the amount of consecutive steps without improvement.
    pub fn bad_steps(&self) -> usize {
        self.bad_steps
    }

    /// Feeds a new value of the monitored metric.
    ///
    /// # Arguments
    /// * `metric` - The latest value of the metric, lower is better.
    /// * `optimizer` - The optimizer whose learning rate is managed.
    ///
    /// # Returns
    /// The new learning rate if it was reduced on this step.
    pub fn step(&mut self, metric: f32, optimizer: &mut dyn Optimizer) -> Option<f32> {
        if !metric.is_finite() {
            warn!("plateau scheduler ignored a non finite metric: {metric}");
            return None;
        }

        if metric < self.best * (1. - self.config.threshold) {
            self.best = metric;
            self.bad_steps = 0;
        } else {
            self.bad_steps += 1;
        }

        if self.cooldown_left > 0 {
            self.cooldown_left -= 1;
            self.bad_steps = 0;
        }

        if self.bad_steps <= self.config.patience {
            return None;
        }

        self.cooldown_left = self.config.cooldown;
        self.bad_steps = 0;

        let old_lr = optimizer.learning_rate();
        let new_lr = (old_lr * self.config.factor).max(self.config.min_lr);

        if old_lr - new_lr <= self.config.eps {
            return None;
        }

        optimizer.set_learning_rate(new_lr);
        Some(new_lr)
    }
}
