use serde::{Deserialize, Serialize};

use super::{Gradients, Inits, Model};
use crate::a_funcs::{Identity, ReLU};
use crate::config::{Hyperparameters, CHOICE_WIDTH, CONTINUOUS_OUTPUTS, DISCRETE_OUTPUTS};
use crate::layers::{DenseBuilder, MapBuilder, SoftmaxBuilder};
use crate::network::{FeedForward, LinearBuilder, Network};
use crate::storage::WeightStorage;

/// Outputs of the two heads of an [InverseModel].
#[derive(Clone, Copy, Debug)]
pub struct Heads<'a> {
    pub discrete: &'a [f32],
    pub continuous: &'a [f32],
}

/// Spectrum -> stack parameters.
///
/// A shared trunk feeds two heads: the discrete head predicts the four one-hot encoded choices
/// with a two-way softmax each, the continuous head regresses the ten physical parameters.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InverseModel {
    trunk: FeedForward,
    discrete: FeedForward,
    continuous: FeedForward,

    #[serde(skip)]
    hidden_grads: Vec<f32>,
}

impl InverseModel {
    pub fn new(params: &Hyperparameters) -> Self {
        let mut inits = Inits::new(params.seed);
        let hidden = params.hidden;

        let trunk = LinearBuilder::new(params.spectrum_len())
            .layer(DenseBuilder::new(ReLU, inits.kaiming(), hidden, true, true))
            .layer(DenseBuilder::new(ReLU, inits.kaiming(), hidden, true, true))
            .build::<FeedForward>();
        let discrete = LinearBuilder::new(hidden)
            .layer(DenseBuilder::new(ReLU, inits.kaiming(), hidden, true, true))
            .layer(DenseBuilder::new(Identity, inits.xavier(), DISCRETE_OUTPUTS, true, true))
            .layer(SoftmaxBuilder::new(CHOICE_WIDTH))
            .build::<FeedForward>();
        let continuous = LinearBuilder::new(hidden)
            .layer(DenseBuilder::new(ReLU, inits.kaiming(), hidden, true, true))
            .layer(MapBuilder::default())
            .layer(DenseBuilder::new(Identity, inits.xavier(), CONTINUOUS_OUTPUTS, true, true))
            .build::<FeedForward>();

        Self::from_parts(
            trunk.expect("Trunk layers are compatible"),
            discrete.expect("Discrete head layers are compatible"),
            continuous.expect("Continuous head layers are compatible"),
        )
    }

    fn from_parts(trunk: FeedForward, discrete: FeedForward, continuous: FeedForward) -> Self {
        Self {
            trunk,
            discrete,
            continuous,
            hidden_grads: Vec::new(),
        }
    }

    pub fn in_size(&self) -> usize {
        self.trunk.in_size()
    }

    /// Width of both heads concatenated, which is what a forward model consumes.
    pub fn out_size(&self) -> usize {
        self.discrete.out_size() + self.continuous.out_size()
    }

    pub fn discrete_size(&self) -> usize {
        self.discrete.out_size()
    }

    pub fn predict(&mut self, spectrum: &[f32]) -> Heads<'_> {
        let hidden = self.trunk.predict(spectrum);
        self.discrete.predict(hidden);
        self.continuous.predict(hidden);
        self.heads()
    }

    /// Outputs of the last prediction.
    pub fn heads(&self) -> Heads<'_> {
        Heads {
            discrete: self.discrete.output(),
            continuous: self.continuous.output(),
        }
    }

    /// Backpropagates the derivatives at both heads of the last prediction.
    /// Returns the derivatives at the spectrum input.
    pub fn calc_gradients(
        &mut self,
        gradients: &mut Gradients,
        discrete_grads: &[f32],
        continuous_grads: &[f32],
    ) -> &[f32] {
        let (trunk, discrete, continuous) = match gradients.parts_mut() {
            [t, d, c] => (t, d, c),
            parts => panic!(
                "Inverse model has 3 parameter blocks, received {} gradient blocks",
                parts.len()
            ),
        };

        let d = self.discrete.calc_gradients(discrete, discrete_grads);
        self.hidden_grads.clear();
        self.hidden_grads.extend_from_slice(d);

        let c = self.continuous.calc_gradients(continuous, continuous_grads);
        for (h, c) in self.hidden_grads.iter_mut().zip(c) {
            *h += c;
        }

        self.trunk.calc_gradients(trunk, &self.hidden_grads)
    }
}

impl Model for InverseModel {
    fn parameters(&self) -> Vec<&WeightStorage> {
        vec![
            self.trunk.weights(),
            self.discrete.weights(),
            self.continuous.weights(),
        ]
    }

    fn parameters_mut(&mut self) -> Vec<&mut WeightStorage> {
        vec![
            self.trunk.weights_mut(),
            self.discrete.weights_mut(),
            self.continuous.weights_mut(),
        ]
    }
}
