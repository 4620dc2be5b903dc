use ndarray::{Array1, ArrayView1, Axis};
use rand::Rng;

use super::{Model, ParamShape, activations::ActFn, layers::Layer};
use crate::{
    MlErr, Result,
    graph::{GraphBatch, Propagation},
    initialization::xavier_uniform,
};

/// A graph neural network made of layers that share a single flat parameter buffer: information
/// flows forward when computing a prediction and backward when computing the gradient.
#[derive(Debug, Clone)]
pub struct GraphNet {
    layers: Vec<Layer>,
    params: Vec<f32>,
    grad: Vec<f32>,

    // Forward metadata
    prop: Option<Propagation>,
    nodes: usize,
}

impl GraphNet {
    /// Creates a new `GraphNet`.
    ///
    /// # Arguments
    /// * `layers` - The layers the network is composed of, the last one must output a single
    ///   value per node.
    /// * `rng` - The source of randomness for the Xavier uniform weight initialization.
    ///
    /// # Returns
    /// A new `GraphNet` instance or an error if adjacent layers don't fit together.
    pub fn new<I, R>(layers: I, rng: &mut R) -> Result<Self>
    where
        I: IntoIterator<Item = Layer>,
        R: Rng,
    {
        let layers: Vec<Layer> = layers.into_iter().collect();

        for pair in layers.windows(2) {
            let (_, out) = pair[0].dim();
            let (inp, _) = pair[1].dim();

            if out != inp {
                return Err(MlErr::SizeMismatch {
                    what: "adjacent layer dimensions",
                    got: inp,
                    expected: out,
                });
            }
        }

        let last_out = layers.last().map(|l| l.dim().1).unwrap_or_default();
        if last_out != 1 {
            return Err(MlErr::SizeMismatch {
                what: "output layer width",
                got: last_out,
                expected: 1,
            });
        }

        let mut params = Vec::with_capacity(layers.iter().map(Layer::size).sum());
        for layer in &layers {
            let (n, m) = layer.dim();
            params.extend(xavier_uniform(rng, n, m)?);
            params.extend(std::iter::repeat_n(0., m));
        }

        Ok(Self {
            grad: vec![0.; params.len()],
            layers,
            params,
            prop: None,
            nodes: 0,
        })
    }

    /// Creates the default node classifier: two ReLU graph convolutions of width `hidden`
    /// followed by a sigmoid read-out.
    pub fn node_classifier<R: Rng>(
        in_features: usize,
        hidden: usize,
        rng: &mut R,
    ) -> Result<Self> {
        Self::new(
            [
                Layer::graph_conv((in_features, hidden), Some(ActFn::relu())),
                Layer::graph_conv((hidden, hidden), Some(ActFn::relu())),
                Layer::dense((hidden, 1), Some(ActFn::sigmoid(1.))),
            ],
            rng,
        )
    }

    fn offsets(&self) -> Vec<usize> {
        self.layers
            .iter()
            .scan(0, |acc, layer| {
                let start = *acc;
                *acc += layer.size();
                Some(start)
            })
            .collect()
    }
}

impl Model for GraphNet {
    fn size(&self) -> usize {
        self.params.len()
    }

    fn forward(&mut self, batch: &GraphBatch) -> Result<Array1<f32>> {
        let prop = Propagation::new(batch);
        let offsets = self.offsets();
        let mut x = batch.x().to_owned();

        for (layer, start) in self.layers.iter_mut().zip(offsets) {
            let params = &self.params[start..start + layer.size()];
            x = layer.forward(params, x.view(), &prop)?;
        }

        self.prop = Some(prop);
        self.nodes = batch.num_nodes();
        Ok(x.index_axis_move(Axis(1), 0))
    }

    fn backward(&mut self, d: ArrayView1<f32>) -> Result<()> {
        let Some(prop) = &self.prop else {
            return Err(MlErr::MissingForward);
        };

        if d.len() != self.nodes {
            return Err(MlErr::SizeMismatch {
                what: "prediction gradient",
                got: d.len(),
                expected: self.nodes,
            });
        }

        let offsets = self.offsets();
        let mut d = d.insert_axis(Axis(1)).to_owned();

        for (layer, start) in self.layers.iter_mut().zip(offsets).rev() {
            let end = start + layer.size();
            let params = &self.params[start..end];
            let grad = &mut self.grad[start..end];
            d = layer.backward(params, grad, d, prop)?;
        }

        Ok(())
    }

    fn zero_grad(&mut self) {
        self.grad.fill(0.);
    }

    fn params(&self) -> &[f32] {
        &self.params
    }

    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]) {
        (&mut self.params, &self.grad)
    }

    fn param_shapes(&self) -> Vec<ParamShape> {
        self.layers
            .iter()
            .enumerate()
            .flat_map(|(i, layer)| {
                let (n, m) = layer.dim();
                [
                    ParamShape {
                        name: format!("layers.{i}.weight"),
                        shape: vec![n, m],
                    },
                    ParamShape {
                        name: format!("layers.{i}.bias"),
                        shape: vec![m],
                    },
                ]
            })
            .collect()
    }

    fn load_params(&mut self, params: &[f32]) -> Result<()> {
        if params.len() != self.params.len() {
            return Err(MlErr::SizeMismatch {
                what: "model parameters",
                got: params.len(),
                expected: self.params.len(),
            });
        }

        self.params.copy_from_slice(params);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;
    use rand::{SeedableRng, rngs::StdRng};

    use super::*;
    use crate::arch::loss::{Bce, LossFn};

    fn line_graph() -> GraphBatch {
        let x = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0]];
        GraphBatch::new(x, vec![(0, 1), (1, 2)], vec![0, 0, 0]).unwrap()
    }

    #[test]
    fn mismatched_layers_are_rejected() {
        let mut rng = StdRng::seed_from_u64(0);
        let layers = [Layer::dense((2, 3), None), Layer::dense((2, 1), None)];
        assert!(GraphNet::new(layers, &mut rng).is_err());
    }

    #[test]
    fn same_seed_gives_same_parameters() {
        let a = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(7)).unwrap();
        let b = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(7)).unwrap();
        assert_eq!(a.params(), b.params());
        assert_eq!(a.size(), 3 * 4 + 5 * 4 + 5);
    }

    #[test]
    fn weights_are_xavier_bounded_and_biases_start_at_zero() {
        let net = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(5)).unwrap();

        // first layer is 2 x 4, so the range is sqrt(6 / 6)
        let (weight, rest) = net.params().split_at(8);
        assert!(weight.iter().all(|w| w.abs() <= 1.));
        assert!(rest[..4].iter().all(|&b| b == 0.));
    }

    #[test]
    fn predictions_are_probabilities_one_per_node() {
        let mut net = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(1)).unwrap();
        let y = net.forward(&line_graph()).unwrap();

        assert_eq!(y.len(), 3);
        assert!(y.iter().all(|&p| (0.0..=1.0).contains(&p)));
    }

    #[test]
    fn param_shapes_cover_the_whole_buffer() {
        let net = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(1)).unwrap();
        let total: usize = net.param_shapes().iter().map(ParamShape::len).sum();
        assert_eq!(total, net.size());
        assert_eq!(net.param_shapes()[0].name, "layers.0.weight");
    }

    #[test]
    fn backward_before_forward_fails() {
        let mut net = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(1)).unwrap();
        let d = Array1::zeros(3);
        assert_eq!(net.backward(d.view()).unwrap_err(), MlErr::MissingForward);
    }

    #[test]
    fn gradient_matches_finite_differences() {
        let batch = line_graph();
        let y = array![1.0, 0.0, 1.0];
        let mut net = GraphNet::node_classifier(2, 3, &mut StdRng::seed_from_u64(3)).unwrap();

        net.zero_grad();
        let y_pred = net.forward(&batch).unwrap();
        let d = Bce.loss_prime(y_pred.view(), y.view());
        net.backward(d.view()).unwrap();
        let analytic = net.grad.clone();

        let eps = 1e-2;
        let base = net.params().to_vec();
        // The read-out layer parameters are always active, so check those.
        let last = net.size() - 4;
        for i in last..net.size() {
            let mut plus = base.clone();
            plus[i] += eps;
            net.load_params(&plus).unwrap();
            let lp = Bce.loss(net.forward(&batch).unwrap().view(), y.view());

            let mut minus = base.clone();
            minus[i] -= eps;
            net.load_params(&minus).unwrap();
            let lm = Bce.loss(net.forward(&batch).unwrap().view(), y.view());

            let numeric = (lp - lm) / (2. * eps);
            assert!(
                (numeric - analytic[i]).abs() < 1e-2,
                "param {i}: numeric {numeric}, analytic {}",
                analytic[i]
            );
        }
    }

    #[test]
    fn loading_wrong_sized_params_fails() {
        let mut net = GraphNet::node_classifier(2, 4, &mut StdRng::seed_from_u64(1)).unwrap();
        let err = net.load_params(&[0.; 3]).unwrap_err();
        assert!(matches!(err, MlErr::SizeMismatch { .. }));
    }
}
