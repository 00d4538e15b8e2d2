pub use adam::{Adam, AdamBuilder, AdamConstructor};
pub mod adam;

pub use gradient_descent::{GradDescBuilder, GradDescConstructor, GradientDescent};
pub mod gradient_descent;

use crate::models::{Gradients, Model};

use std::fmt;
use std::marker::PhantomData;

/// This trait provides interface which must be implemented by optimization
/// algorithms so that they can be used by a [Binding](self::Binding).
pub trait OptimizerAlg {
    /// Modifies the weights based on the gradients such that a minimum can be reached.
    fn update_weights(&mut self, weights: &mut [f32], gradients: &[f32]);
}

/// Structs implementing this trait can be constructed into an instance of OptimizerAlg
/// by being provided the length of the data they work on.
pub trait AlgBuilder {
    type Output: OptimizerAlg;
    /// Receives data length and constructs Self::Output
    fn build(&self, len: usize) -> Self::Output;
}

/// An optimizer bound to the parameters of one model type.
///
/// The binding is the scope of an update: it owns the gradient buffers and one algorithm
/// instance per parameter block of `M`, and [apply](Binding::apply) only ever receives an `M`.
/// Gradients computed for other parts of a larger graph never reach its parameters.
pub struct Binding<M, O> {
    algs: Vec<O>,
    grads: Gradients,
    n: usize,
    model: PhantomData<fn(&mut M)>,
}

impl<M, O> Binding<M, O>
where
    M: Model,
    O: OptimizerAlg,
{
    pub fn new<B>(builder: &B, model: &M) -> Self
    where
        B: AlgBuilder<Output = O>,
    {
        let algs = model
            .parameters()
            .iter()
            .map(|p| builder.build(p.len()))
            .collect();
        Self {
            algs,
            grads: Gradients::for_model(model),
            n: 0,
            model: PhantomData,
        }
    }

    /// Lets `func` add the gradients of one sample to the binding's buffers.
    pub fn accumulate<F, R>(&mut self, func: F) -> R
    where
        F: FnOnce(&mut Gradients) -> R,
    {
        let res = func(&mut self.grads);
        self.n += 1;
        res
    }

    /// Number of samples accumulated since the last update.
    pub fn pending(&self) -> usize {
        self.n
    }

    /// Update model weights based on collected gradients.
    pub fn apply(&mut self, model: &mut M) {
        if self.n == 0 {
            log::warn!("Attempted to update the model without processing any gradients.");
            return;
        }

        // We have to average the gradients
        let avg = 1. / self.n as f32;
        let params = model.parameters_mut();
        assert_eq!(params.len(), self.algs.len(), "Model doesn't match binding");

        for ((alg, weights), grads) in self
            .algs
            .iter_mut()
            .zip(params)
            .zip(self.grads.parts_mut())
        {
            grads.raw_mut().iter_mut().for_each(|g| *g *= avg);
            alg.update_weights(weights.raw_mut(), grads.raw());
        }

        self.grads.reset();
        self.n = 0;
    }
}

impl<M, O> fmt::Debug for Binding<M, O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Binding")
            .field("model", &std::any::type_name::<M>())
            .field("blocks", &self.algs.len())
            .field("pending", &self.n)
            .finish()
    }
}
