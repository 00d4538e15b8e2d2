use serde::{Deserialize, Serialize};

use std::fs;
use std::path::Path;

use crate::error::Error;

/// Width of the discrete label block: four independent two-way choices, one-hot encoded.
pub const DISCRETE_OUTPUTS: usize = 8;
/// Width of a single one-hot choice inside the discrete block.
pub const CHOICE_WIDTH: usize = 2;
/// Width of the continuous label block, see [StackParams](crate::data::StackParams::columns).
pub const CONTINUOUS_OUTPUTS: usize = 10;

/// Settings shared by the data pipeline, the model graphs and the training loops.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Hyperparameters {
    /// Number of spectral points; every point carries two channels.
    pub model_inputs: usize,
    /// Samples per stored batch. Batches are read whole, this is only checked against.
    pub batch_size: usize,
    /// Width of the hidden dense layers.
    pub hidden: usize,
    pub epochs: u32,
    pub learning_rate: f32,
    pub optimizer: OptimizerKind,
    /// Only used by gradient descent.
    pub momentum: f32,
    /// Seeds weight initialization and batch order. Entropy is used when absent.
    pub seed: Option<u64>,
}

/// Update rule used by every training mode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptimizerKind {
    Adam,
    GradientDescent,
}

impl Default for Hyperparameters {
    fn default() -> Self {
        Self {
            model_inputs: 160,
            batch_size: 128,
            hidden: 256,
            epochs: 10,
            learning_rate: 1e-3,
            optimizer: OptimizerKind::Adam,
            momentum: 0.,
            seed: None,
        }
    }
}

impl Hyperparameters {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let s = fs::read_to_string(path)?;
        let params: Self = serde_json::from_str(&s)?;
        params.validate()?;
        Ok(params)
    }

    /// Length of a flattened spectrum.
    pub fn spectrum_len(&self) -> usize {
        self.model_inputs * 2
    }

    /// Length of a flattened label row, the forward model's input.
    pub fn label_len(&self) -> usize {
        DISCRETE_OUTPUTS + CONTINUOUS_OUTPUTS
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.model_inputs == 0 || self.batch_size == 0 || self.hidden == 0 {
            return Err(Error::config(
                "model_inputs, batch_size and hidden must be positive",
            ));
        }
        if !(self.learning_rate > 0.) {
            return Err(Error::config(format!(
                "learning rate must be positive, got {}",
                self.learning_rate
            )));
        }
        if !(0. ..1.).contains(&self.momentum) {
            return Err(Error::config(format!(
                "momentum must be in [0, 1), got {}",
                self.momentum
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_files_fall_back_to_defaults() {
        let params: Hyperparameters = serde_json::from_str(r#"{"epochs": 3}"#).unwrap();
        assert_eq!(params.epochs, 3);
        assert_eq!(params.model_inputs, 160);
        assert_eq!(params.spectrum_len(), 320);
    }

    #[test]
    fn optimizer_is_named_in_snake_case() {
        let params: Hyperparameters =
            serde_json::from_str(r#"{"optimizer": "gradient_descent", "momentum": 0.9}"#).unwrap();
        assert_eq!(params.optimizer, OptimizerKind::GradientDescent);
        assert_eq!(params.momentum, 0.9);
        assert_eq!(Hyperparameters::default().optimizer, OptimizerKind::Adam);

        let bad = Hyperparameters {
            momentum: 1.,
            ..Default::default()
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn zero_sizes_are_rejected() {
        let params = Hyperparameters {
            batch_size: 0,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
