use serde::{Deserialize, Serialize};

use super::{Gradients, Inits, Model};
use crate::a_funcs::{Identity, ReLU};
use crate::config::Hyperparameters;
use crate::layers::{DenseBuilder, MapBuilder};
use crate::network::{FeedForward, LinearBuilder, Network};
use crate::storage::WeightStorage;

/// Stack parameters -> spectrum.
///
/// The input is the discrete block followed by the continuous block. A trainable element-wise
/// scale and shift normalizes it before the dense layers produce the flattened spectrum.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ForwardModel {
    network: FeedForward,

    #[serde(skip)]
    input: Vec<f32>,
}

impl ForwardModel {
    pub fn new(params: &Hyperparameters) -> Self {
        let mut inits = Inits::new(params.seed);
        let hidden = params.hidden;

        let network = LinearBuilder::new(params.label_len())
            .layer(MapBuilder::default())
            .layer(DenseBuilder::new(ReLU, inits.kaiming(), hidden, true, true))
            .layer(DenseBuilder::new(ReLU, inits.kaiming(), hidden, true, true))
            .layer(DenseBuilder::new(
                Identity,
                inits.xavier(),
                params.spectrum_len(),
                true,
                true,
            ))
            .build::<FeedForward>()
            .expect("Forward layers are compatible");

        Self {
            network,
            input: Vec::new(),
        }
    }

    pub fn in_size(&self) -> usize {
        self.network.in_size()
    }

    pub fn out_size(&self) -> usize {
        self.network.out_size()
    }

    pub fn predict(&mut self, labels: &[f32]) -> &[f32] {
        self.network.predict(labels)
    }

    /// Predicts from the two label blocks without the caller having to concatenate them.
    pub fn predict_parts(&mut self, discrete: &[f32], continuous: &[f32]) -> &[f32] {
        self.input.clear();
        self.input.extend_from_slice(discrete);
        self.input.extend_from_slice(continuous);
        self.network.predict(&self.input)
    }

    pub fn output(&self) -> &[f32] {
        self.network.output()
    }

    /// Backpropagates the derivatives at the spectrum output of the last prediction.
    /// Returns the derivatives at the label input.
    pub fn calc_gradients(&mut self, gradients: &mut Gradients, output_grads: &[f32]) -> &[f32] {
        match gradients.parts_mut() {
            [g] => self.network.calc_gradients(g, output_grads),
            parts => panic!(
                "Forward model has 1 parameter block, received {} gradient blocks",
                parts.len()
            ),
        }
    }
}

impl Model for ForwardModel {
    fn parameters(&self) -> Vec<&WeightStorage> {
        vec![self.network.weights()]
    }

    fn parameters_mut(&mut self) -> Vec<&mut WeightStorage> {
        vec![self.network.weights_mut()]
    }
}
