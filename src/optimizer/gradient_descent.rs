use super::*;

/// Plain gradient descent, optionally with classical momentum.
/// With a momentum of zero every step is just `-l_rate * gradient`.
#[derive(Clone, Debug)]
pub struct GradientDescent {
    l_rate: f32,
    momentum: f32,
    velocity: Vec<f32>,
}

impl OptimizerAlg for GradientDescent {
    fn update_weights(&mut self, weights: &mut [f32], gradients: &[f32]) {
        assert_eq!(weights.len(), gradients.len());
        assert_eq!(weights.len(), self.velocity.len());

        for ((w, g), v) in weights.iter_mut().zip(gradients).zip(&mut self.velocity) {
            *v = self.momentum * *v - self.l_rate * *g;
            *w += *v;
        }
    }
}

impl GradientDescent {
    pub fn builder() -> GradDescBuilder {
        Default::default()
    }

    pub fn new(l_rate: f32, momentum: f32, len: usize) -> Self {
        Self {
            l_rate,
            momentum,
            velocity: vec![0.; len],
        }
    }
}

#[derive(Clone, Debug)]
pub struct GradDescBuilder {
    l_rate: f32,
    momentum: f32,
}

impl Default for GradDescBuilder {
    fn default() -> Self {
        Self {
            l_rate: 0.01,
            momentum: 0.,
        }
    }
}

impl GradDescBuilder {
    pub fn new() -> Self {
        Default::default()
    }

    pub fn l_rate(mut self, l_rate: f32) -> Self {
        self.l_rate = l_rate;
        self
    }

    /// Fraction of the previous step carried into the next one, in `[0, 1)`.
    pub fn momentum(mut self, momentum: f32) -> Self {
        self.momentum = momentum;
        self
    }

    pub fn build(self) -> GradDescConstructor {
        GradDescConstructor { builder: self }
    }
}

#[derive(Debug, Clone, Default)]
pub struct GradDescConstructor {
    builder: GradDescBuilder,
}

impl AlgBuilder for GradDescConstructor {
    type Output = GradientDescent;

    fn build(&self, len: usize) -> Self::Output {
        GradientDescent::new(self.builder.l_rate, self.builder.momentum, len)
    }
}
