use ndarray::{Array2, ArrayView1, ArrayView2, ArrayViewMut1, ArrayViewMut2};

use super::{Dense, GraphConv};
use crate::{MlErr, Result, arch::activations::ActFn, graph::Propagation};

#[derive(Debug, Clone)]
pub enum Layer {
    Dense(Dense),
    GraphConv(GraphConv),
}

impl Layer {
    pub fn dense(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::Dense(Dense::new(dim, act_fn))
    }

    pub fn graph_conv(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self::GraphConv(GraphConv::new(dim, act_fn))
    }

    /// Returns the `(fan_in, fan_out)` of the layer.
    pub fn dim(&self) -> (usize, usize) {
        match self {
            Layer::Dense(l) => l.dim(),
            Layer::GraphConv(l) => l.dim(),
        }
    }

    /// Returns the amount of parameters this layer has.
    pub fn size(&self) -> usize {
        let (n, m) = self.dim();
        (n + 1) * m
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        prop: &Propagation,
    ) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.forward(params, x),
            Layer::GraphConv(l) => l.forward(params, x, prop),
        }
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        d: Array2<f32>,
        prop: &Propagation,
    ) -> Result<Array2<f32>> {
        match self {
            Layer::Dense(l) => l.backward(params, grad, d),
            Layer::GraphConv(l) => l.backward(params, grad, d, prop),
        }
    }
}

/// Gives a view of a raw parameter slice as the weights and biases of a `dim` shaped layer.
pub(super) fn view_params(
    dim: (usize, usize),
    params: &[f32],
) -> Result<(ArrayView2<'_, f32>, ArrayView1<'_, f32>)> {
    let w_size = dim.0 * dim.1;
    check_len(dim, params.len())?;

    let (w_raw, b_raw) = params.split_at(w_size);
    let w = ArrayView2::from_shape(dim, w_raw).map_err(|_| mismatch(dim, params.len()))?;
    let b = ArrayView1::from_shape(dim.1, b_raw).map_err(|_| mismatch(dim, params.len()))?;
    Ok((w, b))
}

/// Gives a view of a raw gradient slice as the delta weights and delta biases of a `dim` shaped
/// layer.
pub(super) fn view_grad(
    dim: (usize, usize),
    grad: &mut [f32],
) -> Result<(ArrayViewMut2<'_, f32>, ArrayViewMut1<'_, f32>)> {
    let w_size = dim.0 * dim.1;
    let len = grad.len();
    check_len(dim, len)?;

    let (dw_raw, db_raw) = grad.split_at_mut(w_size);
    let dw = ArrayViewMut2::from_shape(dim, dw_raw).map_err(|_| mismatch(dim, len))?;
    let db = ArrayViewMut1::from_shape(dim.1, db_raw).map_err(|_| mismatch(dim, len))?;
    Ok((dw, db))
}

fn check_len(dim: (usize, usize), len: usize) -> Result<()> {
    if len != (dim.0 + 1) * dim.1 {
        return Err(mismatch(dim, len));
    }

    Ok(())
}

fn mismatch(dim: (usize, usize), len: usize) -> MlErr {
    MlErr::SizeMismatch {
        what: "layer parameters",
        got: len,
        expected: (dim.0 + 1) * dim.1,
    }
}
