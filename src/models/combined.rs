use serde::{Deserialize, Serialize};

use super::{ForwardModel, Gradients, InverseModel, Model};
use crate::error::Error;
use crate::storage::WeightStorage;

/// An inverse model whose heads are fed into a forward model, trained to reconstruct its own input
/// spectrum. Both halves stay owned by the combined model; training decides which of them is
/// updated.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CombinedModel {
    inverse: InverseModel,
    forward: ForwardModel,
}

impl CombinedModel {
    /// Fails if the forward model doesn't consume what the inverse model produces, or doesn't
    /// produce spectra of the length the inverse model consumes.
    pub fn new(inverse: InverseModel, forward: ForwardModel) -> Result<Self, Error> {
        if inverse.out_size() != forward.in_size() {
            return Err(Error::config(format!(
                "Inverse model produces {} values but the forward model expects {}",
                inverse.out_size(),
                forward.in_size()
            )));
        }
        if forward.out_size() != inverse.in_size() {
            return Err(Error::config(format!(
                "Forward model produces spectra of length {} but the inverse model expects {}",
                forward.out_size(),
                inverse.in_size()
            )));
        }
        Ok(Self { inverse, forward })
    }

    pub fn in_size(&self) -> usize {
        self.inverse.in_size()
    }

    pub fn out_size(&self) -> usize {
        self.forward.out_size()
    }

    pub fn inverse(&self) -> &InverseModel {
        &self.inverse
    }

    pub fn inverse_mut(&mut self) -> &mut InverseModel {
        &mut self.inverse
    }

    pub fn forward(&self) -> &ForwardModel {
        &self.forward
    }

    pub fn forward_mut(&mut self) -> &mut ForwardModel {
        &mut self.forward
    }

    /// Reconstructs a spectrum by passing the inverse model's heads through the forward model.
    pub fn predict(&mut self, spectrum: &[f32]) -> &[f32] {
        let heads = self.inverse.predict(spectrum);
        self.forward.predict_parts(heads.discrete, heads.continuous)
    }

    /// Backpropagates through both halves. Weight derivatives of the forward model land in
    /// `forward_grads` and those of the inverse model in `inverse_grads`, the caller decides
    /// which of them are applied.
    pub fn calc_gradients(
        &mut self,
        inverse_grads: &mut Gradients,
        forward_grads: &mut Gradients,
        output_grads: &[f32],
    ) -> &[f32] {
        let split = self.inverse.discrete_size();
        let label_grads = self.forward.calc_gradients(forward_grads, output_grads);
        let (discrete, continuous) = label_grads.split_at(split);
        self.inverse.calc_gradients(inverse_grads, discrete, continuous)
    }

    /// A standalone copy of the inverse half.
    pub fn extract_inverse(&self) -> InverseModel {
        self.inverse.clone()
    }

    /// Gives up the combined model, keeping only the inverse half.
    pub fn into_inverse(self) -> InverseModel {
        self.inverse
    }
}

impl Model for CombinedModel {
    fn parameters(&self) -> Vec<&WeightStorage> {
        let mut params = self.inverse.parameters();
        params.extend(self.forward.parameters());
        params
    }

    fn parameters_mut(&mut self) -> Vec<&mut WeightStorage> {
        let mut params = self.inverse.parameters_mut();
        params.extend(self.forward.parameters_mut());
        params
    }
}
