pub mod dense_layer;
pub mod map_layer;
pub mod softmax_layer;

pub use dense_layer::{DenseBuilder, DenseLayer};
pub use map_layer::{MapBuilder, MapLayer};
pub use softmax_layer::{SoftmaxBuilder, SoftmaxLayer};

use crate::storage::{Allocator, GradStorage, WeightStorage};

use enum_dispatch::enum_dispatch;
use serde::{Deserialize, Serialize};

/// A single step of a feed forward network operating on one sample at a time.
#[enum_dispatch]
pub trait Layer {
    /// Evaluate the layer's output.
    fn eval(&mut self, input: &[f32], weights: &WeightStorage) -> &[f32];

    /// Accumulates the derivatives of the layer's weights into `gradients`. `in_grads` are the partial
    /// derivatives at the layer's output and `out_grads` are the derivatives at the layer's input,
    /// which will be added to. Relies on the activations of the last [eval](Layer::eval) call.
    fn calc_gradients(
        &mut self,
        input: &[f32],
        weights: &WeightStorage,
        gradients: &mut GradStorage,
        in_grads: &[f32],
        out_grads: &mut [f32],
    );

    /// Get layer's output
    fn activations(&self) -> &[f32];
    /// Get layer's input size
    fn input(&self) -> usize;
    /// Get layer's output size
    fn output(&self) -> usize;
    /// Get number of weights in the layer
    fn weight_count(&self) -> usize;
    /// Highest storage index the layer addresses
    fn weight_end(&self) -> usize;

    /// Reallocate memory needed for evaluation.
    /// Used after deserialization as this memory doesnt need to be serialized.
    fn rebuild(&mut self);
}

/// Trait all layer builders must implement in order to be added to a LinearBuilder.
pub trait LayerBuilder {
    type Output: Layer;
    /// Connect a layer to the previous one. `input` is the output size of the previous layer.
    fn connect(self, input: usize, alloc: &mut Allocator) -> Self::Output;
}

/// This enum describes the architecture of a layer so it can be easily serialized and deserialized.
#[enum_dispatch(Layer)]
#[derive(Serialize, Deserialize, Clone, Debug)]
pub enum BasicLayer {
    DenseLayer(DenseLayer),
    MapLayer(MapLayer),
    SoftmaxLayer(SoftmaxLayer),
}

#[cfg(test)]
mod tests {
    /// Compares two arrays with the given error tolerance. Returns None if either of the arrays contains NaN.
    pub(crate) fn is_equal_ish(left: &[f32], right: &[f32], tolerance: f32) -> Option<bool> {
        assert_eq!(left.len(), right.len());
        let err = left
            .iter()
            .zip(right)
            .map(|(l, r)| f32::abs(l - r))
            .try_fold(0f32, |a, b| a.partial_cmp(&b).map(|_| a.max(b)));
        err.map(|e| e < tolerance)
    }

    pub(crate) fn check(expected: &[f32], output: &[f32], tolerance: f32, id: &str) {
        let diag = || format!("expected: {:?}\nreceived: {:?}", expected, output);

        match is_equal_ish(expected, output, tolerance) {
            Some(true) => (),
            Some(false) => panic!("Evaluation produced incorrect {}.\n{}", id, diag()),
            None => panic!("Evaluation produced a NaN\n{}", diag()),
        }
    }
}
