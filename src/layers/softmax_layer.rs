use crate::{
    layers::{Layer, LayerBuilder},
    storage::{Allocator, GradStorage, WeightStorage},
};
use serde::{Deserialize, Serialize};

/// Softmax applied separately to every consecutive group of `group` inputs, so each group
/// describes one categorical choice. Has no weights.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct SoftmaxLayer {
    size: usize,
    group: usize,

    #[serde(skip)]
    activations: Vec<f32>,
}

impl SoftmaxLayer {
    pub fn new(size: usize, group: usize) -> Self {
        assert!(group > 0, "Softmax groups must not be empty");
        assert_eq!(
            size % group,
            0,
            "Softmax input of size {} can't be split into groups of {}",
            size,
            group
        );
        let mut layer = Self {
            size,
            group,
            activations: Vec::new(),
        };
        layer.rebuild();
        layer
    }

    pub fn group(&self) -> usize {
        self.group
    }
}

impl Layer for SoftmaxLayer {
    fn eval(&mut self, input: &[f32], _weights: &WeightStorage) -> &[f32] {
        assert_eq!(input.len(), self.size);

        for (inp, out) in input
            .chunks(self.group)
            .zip(self.activations.chunks_mut(self.group))
        {
            // shift by the maximum so exp can't overflow
            let max = inp.iter().copied().fold(f32::NEG_INFINITY, f32::max);
            let mut sum = 0.;
            for (o, i) in out.iter_mut().zip(inp) {
                *o = (i - max).exp();
                sum += *o;
            }
            out.iter_mut().for_each(|o| *o /= sum);
        }

        &self.activations
    }

    fn calc_gradients(
        &mut self,
        input: &[f32],
        _weights: &WeightStorage,
        _gradients: &mut GradStorage,
        in_grads: &[f32],
        out_grads: &mut [f32],
    ) {
        assert_eq!(input.len(), self.size);
        assert_eq!(in_grads.len(), self.size);
        assert_eq!(out_grads.len(), self.size);

        for ((s, g), od) in self
            .activations
            .chunks(self.group)
            .zip(in_grads.chunks(self.group))
            .zip(out_grads.chunks_mut(self.group))
        {
            let dot: f32 = s.iter().zip(g).map(|(s, g)| s * g).sum();
            for ((od, s), g) in od.iter_mut().zip(s).zip(g) {
                *od += s * (g - dot);
            }
        }
    }

    fn activations(&self) -> &[f32] {
        &self.activations
    }

    fn input(&self) -> usize {
        self.size
    }

    fn output(&self) -> usize {
        self.size
    }

    fn weight_count(&self) -> usize {
        0
    }

    fn weight_end(&self) -> usize {
        0
    }

    fn rebuild(&mut self) {
        self.activations = vec![0.; self.size];
    }
}

pub struct SoftmaxBuilder {
    group: usize,
}

impl SoftmaxBuilder {
    pub fn new(group: usize) -> Self {
        Self { group }
    }
}

impl LayerBuilder for SoftmaxBuilder {
    type Output = SoftmaxLayer;

    fn connect(self, input: usize, _alloc: &mut Allocator) -> Self::Output {
        SoftmaxLayer::new(input, self.group)
    }
}
