use std::convert::TryFrom;
use std::error;
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{construction::LinearConstruction, Network};
use crate::layers::{BasicLayer, Layer};
use crate::storage::{GradStorage, WeightStorage};

/// This struct represents a neural network and supports the basic functionality of giving predictions based on provided input.
/// Additionally, it can be both saved to and loaded from a file through serde.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(into = "NetworkUnvalidated", try_from = "NetworkUnvalidated")]
pub struct FeedForward {
    weights: WeightStorage,
    in_size: usize,
    layers: Vec<BasicLayer>,

    /// Copy of the last input, the first layer needs it for backpropagation
    input: Vec<f32>,
    buffer1: Vec<f32>,
    buffer2: Vec<f32>,
}

impl FeedForward {
    pub fn layers(&self) -> &[BasicLayer] {
        &self.layers
    }
}

impl Network for FeedForward {
    fn predict(&mut self, input: &[f32]) -> &[f32] {
        assert_eq!(
            input.len(),
            self.in_size,
            "Input size mismatch. Network input size is {}, received {}",
            self.in_size,
            input.len()
        );
        self.input.clear();
        self.input.extend_from_slice(input);

        let (l, layers) = self
            .layers
            .split_first_mut()
            .expect("Networks are constructed with at least one layer");
        let mut output = l.eval(&self.input, &self.weights);
        for l in layers {
            output = l.eval(output, &self.weights);
        }
        output
    }

    fn output(&self) -> &[f32] {
        match self.layers.last() {
            Some(l) => l.activations(),
            None => &[],
        }
    }

    fn weights(&self) -> &WeightStorage {
        &self.weights
    }

    fn weights_mut(&mut self) -> &mut WeightStorage {
        &mut self.weights
    }

    fn in_size(&self) -> usize {
        self.in_size
    }

    fn out_size(&self) -> usize {
        self.layers.last().map_or(0, |l| l.output())
    }

    fn calc_gradients(&mut self, gradients: &mut GradStorage, output_gradients: &[f32]) -> &[f32] {
        assert_eq!(output_gradients.len(), self.out_size());
        assert_eq!(gradients.len(), self.weights.len());

        self.buffer1.clear();
        self.buffer1.extend_from_slice(output_gradients);

        for idx in (0..self.layers.len()).rev() {
            let (before, rest) = self.layers.split_at_mut(idx);
            let layer = &mut rest[0];
            let input = match before.last() {
                Some(prev) => prev.activations(),
                None => &self.input[..],
            };

            //zero out space needed in the buffer
            self.buffer2.clear();
            self.buffer2.resize(layer.input(), 0.);

            layer.calc_gradients(
                input,
                &self.weights,
                gradients,
                &self.buffer1,
                &mut self.buffer2,
            );

            // swap the buffers so the input derivatives become the next layer's output derivatives
            std::mem::swap(&mut self.buffer1, &mut self.buffer2);
        }
        &self.buffer1
    }
}

impl LinearConstruction for FeedForward {
    type Layer = BasicLayer;
    type Error = ConsError;
    type Output = Self;

    fn construct(
        weights: WeightStorage,
        in_size: usize,
        layers: Vec<BasicLayer>,
    ) -> Result<Self, ConsError> {
        Self::try_from(NetworkUnvalidated {
            weights,
            in_size,
            layers,
        })
    }
}

/// When deserializing, we first construct this object, validate that it's structure is correct and convert to Network
#[derive(Serialize, Deserialize)]
struct NetworkUnvalidated {
    weights: WeightStorage,
    in_size: usize,
    layers: Vec<BasicLayer>,
}

impl From<FeedForward> for NetworkUnvalidated {
    fn from(network: FeedForward) -> Self {
        NetworkUnvalidated {
            weights: network.weights,
            in_size: network.in_size,
            layers: network.layers,
        }
    }
}

/// An Error during the construction of a network.
#[derive(Debug, Clone, PartialEq)]
pub enum ConsError {
    /// A layer is incompatible with the previous one
    Incompatible {
        index: usize,
        received_input: usize,
        expected_input: usize,
    },
    /// The number of weights doesn't match what the layers address.
    NotEnoughWeights { weights: usize, expected: usize },
    Empty,
}

impl error::Error for ConsError {}

impl fmt::Display for ConsError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConsError::Incompatible {
                index,
                received_input,
                expected_input,
            } => write!(
                f,
                "Layer {} is incompatible with its input:\n\tExpected input length of {} but received {}.",
                index, expected_input, received_input,
            ),
            ConsError::NotEnoughWeights { weights, expected } => write!(
                f,
                "Expected {} weights but {} were provided.",
                expected, weights
            ),
            ConsError::Empty => {
                f.write_str("The network must have at least a single layer, but it was empty.")
            }
        }
    }
}

impl TryFrom<NetworkUnvalidated> for FeedForward {
    type Error = ConsError;

    fn try_from(mut value: NetworkUnvalidated) -> Result<Self, Self::Error> {
        if value.layers.is_empty() {
            return Err(ConsError::Empty);
        }

        let mut received_input = value.in_size;
        let mut expected = 0;
        let mut end = 0;
        for (index, l) in value.layers.iter().enumerate() {
            if l.input() != received_input {
                return Err(ConsError::Incompatible {
                    index,
                    received_input,
                    expected_input: l.input(),
                });
            }
            received_input = l.output();
            expected += l.weight_count();
            end = end.max(l.weight_end());
        }
        if expected != value.weights.len() || end > value.weights.len() {
            return Err(ConsError::NotEnoughWeights {
                weights: value.weights.len(),
                expected: expected.max(end),
            });
        }

        for l in &mut value.layers {
            l.rebuild();
        }

        Ok(FeedForward {
            weights: value.weights,
            in_size: value.in_size,
            layers: value.layers,
            input: Vec::with_capacity(value.in_size),
            buffer1: Vec::new(),
            buffer2: Vec::new(),
        })
    }
}
