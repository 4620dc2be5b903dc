use rand::Rng;
use rand_distr::{Distribution, Uniform};

use crate::Result;

/// Samples the weights of a `fan_in x fan_out` matrix using Xavier uniform initialization,
/// that is from `U(-a, a)` with `a = sqrt(6 / (fan_in + fan_out))`.
///
/// # Arguments
/// * `rng` - A random number generator.
/// * `fan_in` - The number of input units in the weight tensor.
/// * `fan_out` - The number of output units in the weight tensor.
///
/// # Returns
/// An error if the calculated range is invalid.
pub fn xavier_uniform<R: Rng>(rng: &mut R, fan_in: usize, fan_out: usize) -> Result<Vec<f32>> {
    let range = (6. / (fan_in + fan_out) as f32).sqrt();
    let distribution = Uniform::new_inclusive(-range, range)?;

    let weights = distribution.sample_iter(rng).take(fan_in * fan_out);
    Ok(weights.collect())
}
