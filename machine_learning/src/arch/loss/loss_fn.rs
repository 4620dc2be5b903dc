use ndarray::{Array1, ArrayView1};

use crate::{MlErr, Result};

pub trait LossFn {
    fn loss(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> f32;
    fn loss_prime(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> Array1<f32>;

    /// Same as `loss` but fails instead of silently pairing mismatched inputs.
    fn checked_loss(&self, y_pred: ArrayView1<f32>, y: ArrayView1<f32>) -> Result<f32> {
        if y_pred.len() != y.len() {
            return Err(MlErr::SizeMismatch {
                what: "predictions and targets",
                got: y_pred.len(),
                expected: y.len(),
            });
        }

        Ok(self.loss(y_pred, y))
    }
}
