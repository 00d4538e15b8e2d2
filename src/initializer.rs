use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use rand_distr::StandardNormal;

use std::iter::{repeat, Repeat};

//I used this blog post as reference to the initialization methods ->
//https://towardsdatascience.com/weight-initialization-in-neural-networks-a-journey-from-the-basics-to-kaiming-954fb9b47c79

/// Produces the initial weights of a layer given the layer's fan-in and size.
/// Any iterator over floats is an initializer which simply yields its own values.
pub trait Initializer {
    type Iter: Iterator<Item = f32>;
    fn construct(self, in_size: usize, size: usize) -> Self::Iter;
}

impl<I> Initializer for I
where
    I: Iterator<Item = f32>,
{
    type Iter = I;

    fn construct(self, _in_size: usize, _size: usize) -> Self::Iter {
        self
    }
}

/// Normally distributed values multiplied by a fixed scale.
pub struct ScaledNormal {
    rng: SmallRng,
    scale: f32,
}

impl Iterator for ScaledNormal {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.rng.sample::<f32, _>(StandardNormal) * self.scale)
    }
}

///Xavier initialization should be used for layers with symetric activation functions such as sigmoid or tanH
pub struct Xavier {
    rng: SmallRng,
}

impl Xavier {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for Xavier {
    fn default() -> Self {
        Self::new()
    }
}

impl Initializer for Xavier {
    type Iter = ScaledNormal;

    fn construct(self, in_size: usize, _size: usize) -> Self::Iter {
        ScaledNormal {
            rng: self.rng,
            scale: 1. / (in_size.max(1) as f32).sqrt(),
        }
    }
}

///Kaiming initialization should be used for layers with asymetric activation functions such as RELU
pub struct Kaiming {
    rng: SmallRng,
}

impl Kaiming {
    pub fn new() -> Self {
        Self {
            rng: SmallRng::from_entropy(),
        }
    }

    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: SmallRng::seed_from_u64(seed),
        }
    }
}

impl Default for Kaiming {
    fn default() -> Self {
        Self::new()
    }
}

impl Initializer for Kaiming {
    type Iter = ScaledNormal;

    fn construct(self, in_size: usize, _size: usize) -> Self::Iter {
        ScaledNormal {
            rng: self.rng,
            scale: (2. / in_size.max(1) as f32).sqrt(),
        }
    }
}

///Always initializes weights to one
#[derive(Clone, Copy, Debug, Default)]
pub struct Ones;

impl Initializer for Ones {
    type Iter = Repeat<f32>;

    fn construct(self, _in_size: usize, _size: usize) -> Self::Iter {
        repeat(1.)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seeded_initializers_repeat() {
        let a: Vec<f32> = Xavier::with_seed(7).construct(16, 4).take(8).collect();
        let b: Vec<f32> = Xavier::with_seed(7).construct(16, 4).take(8).collect();
        assert_eq!(a, b);
    }

    #[test]
    fn kaiming_is_wider_than_xavier() {
        let spread = |v: Vec<f32>| v.iter().map(|x| x * x).sum::<f32>();
        let x = spread(Xavier::with_seed(1).construct(64, 1).take(256).collect());
        let k = spread(Kaiming::with_seed(1).construct(64, 1).take(256).collect());
        // same samples, scale differs by sqrt(2)
        assert!((k / x - 2.).abs() < 1e-3);
    }
}
