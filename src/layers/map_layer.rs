use crate::{
    a_funcs::{ActivFunc, Activation, Identity},
    initializer::{Initializer, Ones},
    layers::{Layer, LayerBuilder},
    storage::{Allocator, GradStorage, Handle, WeightStorage},
};
use serde::{Deserialize, Serialize};

/// Layer type where every neuron operates only on a single output of the layer below.
/// Useful when you want to normalize some values
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct MapLayer {
    size: usize,

    weights: Handle,
    biases: Handle,

    a_func: Activation,

    #[serde(skip)]
    weighted_inputs: Vec<f32>,
    #[serde(skip)]
    activations: Vec<f32>,
}

impl MapLayer {
    pub fn new<I>(a_func: Activation, init: I, alloc: &mut Allocator, size: usize) -> Self
    where
        I: Initializer,
    {
        let init = init.construct(size, size);
        let weights = alloc.allocate(size, init);
        let biases = alloc.allocate_zeroed(size);

        let mut layer = MapLayer {
            size,
            weights,
            biases,
            a_func,
            weighted_inputs: Vec::new(),
            activations: Vec::new(),
        };
        layer.rebuild();
        layer
    }
}

impl Layer for MapLayer {
    fn eval(&mut self, input: &[f32], weights: &WeightStorage) -> &[f32] {
        assert_eq!(input.len(), self.size);

        for (((inp, w), b), wi) in input
            .iter()
            .zip(weights.get(self.weights))
            .zip(weights.get(self.biases))
            .zip(&mut self.weighted_inputs)
        {
            *wi = inp.mul_add(*w, *b);
        }

        for (wi, o) in self.weighted_inputs.iter().zip(&mut self.activations) {
            *o = self.a_func.evaluate(*wi);
        }

        &self.activations
    }

    fn calc_gradients(
        &mut self,
        input: &[f32],
        weights: &WeightStorage,
        gradients: &mut GradStorage,
        in_grads: &[f32],
        out_grads: &mut [f32],
    ) {
        let (w_grad, b_grad) = gradients
            .get_pair_mut(self.weights, self.biases)
            .expect("Weight and bias handles overlap");
        let weights = weights.get(self.weights);

        assert_eq!(w_grad.len(), self.size);
        assert_eq!(b_grad.len(), self.size);
        assert_eq!(input.len(), self.size);
        assert_eq!(in_grads.len(), self.size);
        assert_eq!(out_grads.len(), self.size);

        for (((((((w, wd), bd), inp), wi), a), id), od) in weights
            .iter()
            .zip(w_grad.iter_mut())
            .zip(b_grad.iter_mut())
            .zip(input)
            .zip(&self.weighted_inputs)
            .zip(&self.activations)
            .zip(in_grads)
            .zip(out_grads.iter_mut())
        {
            let af_deriv = *id * self.a_func.derivative(*wi, *a);

            *bd += af_deriv; //bias derivative
            *wd += af_deriv * *inp;
            *od += af_deriv * *w;
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
        self.weights.len() + self.biases.len()
    }

    fn weight_end(&self) -> usize {
        self.weights.end().max(self.biases.end())
    }

    fn rebuild(&mut self) {
        self.weighted_inputs = vec![0.; self.size];
        self.activations = vec![0.; self.size];
    }
}

pub struct MapBuilder<I = Ones> {
    a_func: Activation,
    init: I,
}

impl<I> MapBuilder<I> {
    pub fn new<F: Into<Activation>>(a_func: F, init: I) -> Self {
        MapBuilder {
            a_func: a_func.into(),
            init,
        }
    }
}

impl Default for MapBuilder {
    /// Identity mapping which the optimizer is free to rescale.
    fn default() -> Self {
        MapBuilder::new(Identity, Ones)
    }
}

impl<I> LayerBuilder for MapBuilder<I>
where
    I: Initializer,
{
    type Output = MapLayer;

    fn connect(self, input: usize, alloc: &mut Allocator) -> Self::Output {
        MapLayer::new(self.a_func, self.init, alloc, input)
    }
}
