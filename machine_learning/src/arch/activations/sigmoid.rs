#[derive(Clone, Debug, Default)]
pub struct Sigmoid {
    amp: f32,
}

impl Sigmoid {
    pub fn new(amp: f32) -> Self {
        Self { amp }
    }

    pub fn f(&self, z: f32) -> f32 {
        self.amp / (1. + (-z).exp())
    }

    // saturates to 0 for large |z|
    pub fn df(&self, z: f32) -> f32 {
        let s = 1. / (1. + (-z).exp());

        self.amp * s * (1. - s)
    }
}
