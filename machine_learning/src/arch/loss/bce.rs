use ndarray::{Array1, ArrayView1, Zip};

use super::LossFn;

const LOG_FLOOR: f32 = -100.;
const EPS: f32 = 1e-7;

/// Binary cross-entropy loss function, averaged over the elements.
#[derive(Debug, Default, Clone, Copy)]
pub struct Bce;

impl Bce {
    /// Returns a new `Bce`.
    pub fn new() -> Self {
        Self
    }
}

impl LossFn for Bce {
    fn loss(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> f32 {
        let n = y_pred.len();
        if n == 0 {
            return 0.;
        }

        let total = Zip::from(&y_pred).and(&y).fold(0f32, |acc, &p, &t| {
            let log_p = p.ln().max(LOG_FLOOR);
            let log_q = (1. - p).ln().max(LOG_FLOOR);
            acc - (t * log_p + (1. - t) * log_q)
        });

        total / n as f32
    }

    fn loss_prime(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> Array1<f32> {
        let n = y_pred.len() as f32;

        Zip::from(&y_pred).and(&y).map_collect(|&p, &t| {
            let p = p.clamp(EPS, 1. - EPS);
            (p - t) / (p * (1. - p)) / n
        })
    }
}
