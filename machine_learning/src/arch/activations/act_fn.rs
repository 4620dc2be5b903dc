use super::{Relu, Sigmoid};

#[derive(Debug, Clone)]
pub enum ActFn {
    Sigmoid(Sigmoid),
    Relu(Relu),
}

impl ActFn {
    pub fn sigmoid(amp: f32) -> Self {
        ActFn::Sigmoid(Sigmoid::new(amp))
    }

    pub fn relu() -> Self {
        ActFn::Relu(Relu)
    }

    pub fn f(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.f(x),
            ActFn::Relu(a) => a.f(x),
        }
    }

    pub fn df(&self, x: f32) -> f32 {
        match self {
            ActFn::Sigmoid(a) => a.df(x),
            ActFn::Relu(a) => a.df(x),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relu_passes_positives_and_clips_negatives() {
        let relu = ActFn::relu();
        assert_eq!(relu.f(2.5), 2.5);
        assert_eq!(relu.f(-1.), 0.);
        assert_eq!(relu.df(2.5), 1.);
        assert_eq!(relu.df(-1.), 0.);
    }

    #[test]
    fn sigmoid_is_centered_at_half_its_amplitude() {
        let sigmoid = ActFn::sigmoid(2.);
        assert!((sigmoid.f(0.) - 1.).abs() < 1e-7);
        assert!((sigmoid.df(0.) - 0.5).abs() < 1e-7);
    }
}
