pub mod construction;
pub mod feed_forward;

pub use self::construction::LinearBuilder;
pub use self::feed_forward::{ConsError, FeedForward};

use crate::storage::{GradStorage, WeightStorage};

/// Trait all neural network architectures must implement
pub trait Network {
    /// Predict the value corresponding to `input`.
    fn predict(&mut self, input: &[f32]) -> &[f32];

    /// Get network output.
    fn output(&self) -> &[f32];

    /// Get network weights.
    fn weights(&self) -> &WeightStorage;

    /// Get mutable weights.
    fn weights_mut(&mut self) -> &mut WeightStorage;

    /// Returns input size of the network
    fn in_size(&self) -> usize;

    /// Return output size of the network
    fn out_size(&self) -> usize;

    /// Accumulates weight gradients into `gradients` based on the gradients of the output of the last
    /// prediction. Returns the gradients at the network's input so that networks can be chained.
    fn calc_gradients(&mut self, gradients: &mut GradStorage, output_gradients: &[f32]) -> &[f32];
}
