use ndarray::prelude::*;

use super::layer::{view_grad, view_params};
use crate::{MlErr, Result, arch::activations::ActFn};

/// A fully connected layer applied to every node independently.
#[derive(Debug, Clone)]
pub struct Dense {
    dim: (usize, usize),
    act_fn: Option<ActFn>,

    // Forward metadata
    x: Option<Array2<f32>>,
    z: Option<Array2<f32>>,
}

impl Dense {
    /// Creates a new `Dense`.
    ///
    /// # Arguments
    /// * `dim` - The `(fan_in, fan_out)` of the layer.
    /// * `act_fn` - The activation applied after the affine map, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            act_fn,
            x: None,
            z: None,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    /// Computes `act(x W + b)` and keeps what the backward pass needs.
    pub fn forward(&mut self, params: &[f32], x: ArrayView2<f32>) -> Result<Array2<f32>> {
        let (w, b) = view_params(self.dim, params)?;

        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "dense input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let z = x.dot(&w) + &b;
        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        self.x = Some(x.to_owned());
        self.z = Some(z);
        Ok(a)
    }

    /// Accumulates this layer's gradient into `grad` and returns the delta for the previous
    /// layer.
    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
    ) -> Result<Array2<f32>> {
        let (Some(x), Some(z)) = (&self.x, &self.z) else {
            return Err(MlErr::MissingForward);
        };

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = view_grad(self.dim, grad)?;
        dw += &x.t().dot(&d);
        db += &d.sum_axis(Axis(0));

        let (w, _) = view_params(self.dim, params)?;
        Ok(d.dot(&w.t()))
    }
}
