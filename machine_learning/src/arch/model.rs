use ndarray::{Array1, ArrayView1};

use crate::{Result, graph::GraphBatch};

/// A named block of the flat parameter buffer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamShape {
    pub name: String,
    pub shape: Vec<usize>,
}

impl ParamShape {
    /// Returns the amount of parameters in the block.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// A node-level binary classifier over batches of graphs.
pub trait Model {
    /// Returns the amount of parameters in the model.
    fn size(&self) -> usize;

    /// Computes one prediction per node of the batch.
    fn forward(&mut self, batch: &GraphBatch) -> Result<Array1<f32>>;

    /// Accumulates into the model's gradient the derivative of the loss, given the derivative
    /// of the loss with respect to the predictions of the last `forward` call.
    fn backward(&mut self, d: ArrayView1<f32>) -> Result<()>;

    /// Sets the accumulated gradient to zero.
    fn zero_grad(&mut self);

    /// Returns the model's flat parameter buffer.
    fn params(&self) -> &[f32];

    /// Returns the parameters (mutable) together with the gradient, for an optimizer step.
    fn params_and_grad(&mut self) -> (&mut [f32], &[f32]);

    /// Returns the named parameter blocks, in the order they appear in `params`.
    fn param_shapes(&self) -> Vec<ParamShape>;

    /// Replaces every parameter of the model.
    ///
    /// # Arguments
    /// * `params` - A buffer laid out as described by `param_shapes`.
    fn load_params(&mut self, params: &[f32]) -> Result<()>;
}
