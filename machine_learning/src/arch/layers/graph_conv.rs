use ndarray::prelude::*;

use super::layer::{view_grad, view_params};
use crate::{MlErr, Result, arch::activations::ActFn, graph::Propagation};

/// A message passing layer: every node averages its own features with those of its
/// in-neighbours and then goes through an affine map and an optional activation.
#[derive(Debug, Clone)]
pub struct GraphConv {
    dim: (usize, usize),
    act_fn: Option<ActFn>,

    // Forward metadata
    m: Option<Array2<f32>>,
    z: Option<Array2<f32>>,
}

impl GraphConv {
    /// Creates a new `GraphConv`.
    ///
    /// # Arguments
    /// * `dim` - The `(fan_in, fan_out)` of the layer.
    /// * `act_fn` - The activation applied after the affine map, if any.
    pub fn new(dim: (usize, usize), act_fn: Option<ActFn>) -> Self {
        Self {
            dim,
            act_fn,
            m: None,
            z: None,
        }
    }

    pub fn dim(&self) -> (usize, usize) {
        self.dim
    }

    pub fn forward(
        &mut self,
        params: &[f32],
        x: ArrayView2<f32>,
        prop: &Propagation,
    ) -> Result<Array2<f32>> {
        let (w, b) = view_params(self.dim, params)?;

        if x.ncols() != self.dim.0 {
            return Err(MlErr::SizeMismatch {
                what: "graph conv input features",
                got: x.ncols(),
                expected: self.dim.0,
            });
        }

        let m = prop.aggregate(x);
        let z = m.dot(&w) + &b;
        let a = match &self.act_fn {
            Some(act_fn) => z.mapv(|z| act_fn.f(z)),
            None => z.clone(),
        };

        self.m = Some(m);
        self.z = Some(z);
        Ok(a)
    }

    pub fn backward(
        &mut self,
        params: &[f32],
        grad: &mut [f32],
        mut d: Array2<f32>,
        prop: &Propagation,
    ) -> Result<Array2<f32>> {
        let (Some(m), Some(z)) = (&self.m, &self.z) else {
            return Err(MlErr::MissingForward);
        };

        if let Some(act_fn) = &self.act_fn {
            d.zip_mut_with(z, |d, &z| *d *= act_fn.df(z));
        }

        let (mut dw, mut db) = view_grad(self.dim, grad)?;
        dw += &m.t().dot(&d);
        db += &d.sum_axis(Axis(0));

        let (w, _) = view_params(self.dim, params)?;
        let dm = d.dot(&w.t());
        Ok(prop.aggregate_transposed(dm.view()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBatch;

    #[test]
    fn isolated_nodes_behave_like_a_dense_layer() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let batch = GraphBatch::new(x.clone(), vec![], vec![0, 1]).unwrap();
        let prop = Propagation::new(&batch);
        let params = [1., -1., 0.5];

        let mut conv = GraphConv::new((2, 1), None);
        let y = conv.forward(&params, x.view(), &prop).unwrap();

        assert_eq!(y, array![[-0.5], [-0.5]]);
    }

    #[test]
    fn neighbours_are_mixed_into_the_output() {
        let x = array![[2.0], [0.0]];
        let batch = GraphBatch::new(x.clone(), vec![(0, 1)], vec![0, 0]).unwrap();
        let prop = Propagation::new(&batch);
        let params = [1., 0.];

        let mut conv = GraphConv::new((1, 1), None);
        let y = conv.forward(&params, x.view(), &prop).unwrap();

        assert_eq!(y, array![[2.0], [1.0]]);
    }

    #[test]
    fn backward_routes_deltas_to_the_sources() {
        let x = array![[2.0], [0.0]];
        let batch = GraphBatch::new(x.clone(), vec![(0, 1)], vec![0, 0]).unwrap();
        let prop = Propagation::new(&batch);
        let params = [1., 0.];

        let mut conv = GraphConv::new((1, 1), None);
        conv.forward(&params, x.view(), &prop).unwrap();

        let mut grad = [0.; 2];
        let prev = conv
            .backward(&params, &mut grad, array![[0.0], [1.0]], &prop)
            .unwrap();

        // dw = m^T d = 1 * 1, db = 1
        assert_eq!(grad, [1., 1.]);
        assert_eq!(prev, array![[0.5], [0.5]]);
    }
}
