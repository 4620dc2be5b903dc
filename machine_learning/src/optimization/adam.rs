use super::Optimizer;
use crate::{MlErr, Result};

const BETA1: f32 = 0.9;
const BETA2: f32 = 0.999;
const EPSILON: f32 = 1e-8;

/// Adam with L2 regularization: the weight decay is added to the gradient before the moments
/// are updated.
#[derive(Debug, Clone)]
pub struct Adam {
    learning_rate: f32,
    weight_decay: f32,
    steps: i32,
    /// First moment estimate of every parameter.
    m: Box<[f32]>,
    /// Second moment estimate of every parameter.
    v: Box<[f32]>,
}

impl Adam {
    /// Creates a new `Adam` optimizer with betas of 0.9 and 0.999.
    ///
    /// # Arguments
    /// * `len` - The amount of parameters this instance should hold.
    /// * `learning_rate` - The small coefficient that modulates the amount of training per update.
    /// * `weight_decay` - The L2 penalty coefficient.
    pub fn new(len: usize, learning_rate: f32, weight_decay: f32) -> Self {
        Self {
            learning_rate,
            weight_decay,
            steps: 0,
            m: vec![0.; len].into_boxed_slice(),
            v: vec![0.; len].into_boxed_slice(),
        }
    }

    /// The amount of updates applied so far.
    pub fn steps(&self) -> i32 {
        self.steps
    }
}

impl Optimizer for Adam {
    fn update_params(&mut self, params: &mut [f32], grad: &[f32]) -> Result<()> {
        let expected = self.m.len();
        for got in [params.len(), grad.len()] {
            if got != expected {
                return Err(MlErr::SizeMismatch {
                    what: "optimizer state",
                    got,
                    expected,
                });
            }
        }

        self.steps = self.steps.saturating_add(1);
        let bias1 = 1. - BETA1.powi(self.steps);
        let bias2_sqrt = (1. - BETA2.powi(self.steps)).sqrt();
        let step_size = self.learning_rate / bias1;
        let wd = self.weight_decay;

        for (i, p) in params.iter_mut().enumerate() {
            let g = grad[i] + wd * *p;
            let m = &mut self.m[i];
            let v = &mut self.v[i];

            *m = BETA1 * *m + (1. - BETA1) * g;
            *v = BETA2 * *v + (1. - BETA2) * g * g;

            let denom = v.sqrt() / bias2_sqrt + EPSILON;
            *p -= step_size * *m / denom;
        }

        Ok(())
    }

    fn learning_rate(&self) -> f32 {
        self.learning_rate
    }

    fn set_learning_rate(&mut self, learning_rate: f32) {
        self.learning_rate = learning_rate;
    }
}
