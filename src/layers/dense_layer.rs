use crate::{
    a_funcs::{ActivFunc, Activation},
    initializer::{Initializer, Xavier},
    layers::{Layer, LayerBuilder},
    storage::{Allocator, GradStorage, Handle, WeightStorage},
};
use serde::{Deserialize, Serialize};

/// Your run of the mill fully connected (dense) layer
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct DenseLayer {
    in_size: usize,
    size: usize,

    weights: Handle,
    biases: Handle,

    update_weights: bool,
    update_biases: bool,

    a_func: Activation,

    #[serde(skip)]
    weighted_inputs: Vec<f32>,
    #[serde(skip)]
    activations: Vec<f32>,
    #[serde(skip)]
    temp: Vec<f32>,
}

impl Layer for DenseLayer {
    fn eval(&mut self, input: &[f32], weights: &WeightStorage) -> &[f32] {
        let biases = weights.get(self.biases);
        let weights = weights.get(self.weights);

        // assert dominance
        assert_eq!(weights.len(), self.in_size * self.size);
        assert_eq!(biases.len(), self.size);
        assert_eq!(input.len(), self.in_size);
        assert_eq!(self.weighted_inputs.len(), self.size);

        for ((row, b), wi) in weights
            .chunks_exact(self.in_size)
            .zip(biases)
            .zip(&mut self.weighted_inputs)
        {
            *wi = row.iter().zip(input).map(|(w, i)| w * i).sum::<f32>() + b;
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
        let w = weights.get(self.weights);

        assert_eq!(w.len(), self.in_size * self.size);
        assert_eq!(input.len(), self.in_size);
        assert_eq!(in_grads.len(), self.size);
        assert_eq!(out_grads.len(), self.in_size);

        // compute activation function derivatives
        for (((temp, inp), out), id) in self
            .temp
            .iter_mut()
            .zip(&self.weighted_inputs)
            .zip(&self.activations)
            .zip(in_grads)
        {
            *temp = self.a_func.derivative(*inp, *out) * *id;
        }

        // compute bias derivatives
        if self.update_biases {
            for (bd, temp) in gradients.get_mut(self.biases).iter_mut().zip(&self.temp) {
                *bd += *temp;
            }
        }

        // compute weight derivative
        if self.update_weights {
            let w_grads = gradients.get_mut(self.weights);
            for (wds, temp) in w_grads.chunks_exact_mut(self.in_size).zip(&self.temp) {
                for (wd, inp) in wds.iter_mut().zip(input) {
                    *wd += *inp * *temp;
                }
            }
        }

        //compute output derivatives
        for (row, temp) in w.chunks_exact(self.in_size).zip(&self.temp) {
            for (od, w) in out_grads.iter_mut().zip(row) {
                *od += *w * *temp;
            }
        }
    }

    fn activations(&self) -> &[f32] {
        &self.activations
    }

    fn input(&self) -> usize {
        self.in_size
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
        self.temp = vec![0.; self.size];
    }
}

impl DenseLayer {
    pub fn new<I>(
        a_func: Activation,
        init: I,
        alloc: &mut Allocator,
        in_size: usize,
        size: usize,
        update_w: bool,
        update_b: bool,
    ) -> Self
    where
        I: Initializer,
    {
        let init = init.construct(in_size, size);
        let weights = alloc.allocate(in_size * size, init);
        let biases = alloc.allocate_zeroed(size);

        let mut layer = Self {
            in_size,
            size,
            weights,
            biases,
            update_weights: update_w,
            update_biases: update_b,
            a_func,
            weighted_inputs: Vec::new(),
            activations: Vec::new(),
            temp: Vec::new(),
        };
        layer.rebuild();
        layer
    }
}

pub struct DenseBuilder<I = Xavier> {
    a_func: Activation,
    init: I,
    size: usize,
    update_w: bool,
    update_b: bool,
}

impl<I> DenseBuilder<I> {
    pub fn new<F: Into<Activation>>(
        a_func: F,
        init: I,
        size: usize,
        update_w: bool,
        update_b: bool,
    ) -> Self {
        DenseBuilder {
            a_func: a_func.into(),
            init,
            size,
            update_w,
            update_b,
        }
    }
}

impl<I> LayerBuilder for DenseBuilder<I>
where
    I: Initializer,
{
    type Output = DenseLayer;

    fn connect(self, input: usize, alloc: &mut Allocator) -> Self::Output {
        DenseLayer::new(
            self.a_func,
            self.init,
            alloc,
            input,
            self.size,
            self.update_w,
            self.update_b,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{a_funcs::Identity, layers::tests::check};

    fn create_layer() -> (DenseLayer, WeightStorage, GradStorage) {
        let mut alloc = Allocator::new();
        let init = (1..=12).map(|x| x as f32);
        let layer = DenseLayer::new(Identity.into(), init, &mut alloc, 4, 3, true, true);

        let weights = alloc.finish();
        let grads = GradStorage::zeroed(weights.len());
        (layer, weights, grads)
    }

    const INPUTS: [f32; 4] = [1., 2., 3., 4.];
    const TOLERANCE: f32 = 0.0001;

    #[test]
    fn dense_eval() {
        let (mut layer, weights, _) = create_layer();

        let output = layer.eval(&INPUTS, &weights);
        let expected = &[30., 70., 110.];

        check(expected, output, TOLERANCE, "output");
    }

    /// Computes the various derivatives to be tested.
    /// The derivatives are returned in this order [weight_deriv, bias_deriv, out_deriv]
    fn derivs() -> [Vec<f32>; 3] {
        let (mut layer, weights, mut grads) = create_layer();

        let in_grads = [0.1, 0.2, 0.3];
        let mut out_grads = [0.; 4];

        layer.eval(&INPUTS, &weights);
        layer.calc_gradients(&INPUTS, &weights, &mut grads, &in_grads, &mut out_grads);

        [
            grads.get(layer.weights).to_owned(),
            grads.get(layer.biases).to_owned(),
            out_grads.to_vec(),
        ]
    }

    #[test]
    fn dense_backprop_weights() {
        let output = &derivs()[0];
        let expected = [0.1, 0.2, 0.3, 0.4, 0.2, 0.4, 0.6, 0.8, 0.3, 0.6, 0.9, 1.2];
        check(&expected, output, TOLERANCE, "weight derivatives");
    }

    #[test]
    fn dense_backprop_bias() {
        let output = &derivs()[1];
        let expected = [0.1, 0.2, 0.3];
        check(&expected, output, TOLERANCE, "bias derivatives");
    }

    #[test]
    fn dense_backprop_output() {
        let output = &derivs()[2];
        let expected = [3.8, 4.4, 5.0, 5.6];
        check(&expected, output, TOLERANCE, "output derivatives");
    }

    #[test]
    fn frozen_weights_collect_no_gradients() {
        let mut alloc = Allocator::new();
        let init = (1..=12).map(|x| x as f32);
        let mut layer = DenseLayer::new(Identity.into(), init, &mut alloc, 4, 3, false, false);
        let weights = alloc.finish();
        let mut grads = GradStorage::zeroed(weights.len());
        let mut out_grads = [0.; 4];

        layer.eval(&INPUTS, &weights);
        layer.calc_gradients(&INPUTS, &weights, &mut grads, &[1., 1., 1.], &mut out_grads);

        assert!(grads.raw().iter().all(|g| *g == 0.));
        check(&[15., 18., 21., 24.], &out_grads, TOLERANCE, "output derivatives");
    }
}
