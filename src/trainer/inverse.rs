use ndarray::Array3;

use super::{Optimizer, Step, StepMean};
use crate::data::{spectrum, Inverse, Labels};
use crate::config::CHOICE_WIDTH;
use crate::loss::{choice_accuracy, mean_absolute_error, BinaryCrossEntropy, LossFunc, MeanSquared};
use crate::models::InverseModel;
use crate::optimizer::{AlgBuilder, Binding, OptimizerAlg};

/// Trains an [InverseModel] with binary cross-entropy on the discrete head and mean squared error
/// on the continuous head. The reported loss is the sum of both, the mean absolute error is that
/// of the continuous head and the accuracy the share of discrete choices predicted correctly.
#[derive(Debug)]
pub struct InverseOptimizer<A> {
    model: InverseModel,
    binding: Binding<InverseModel, A>,
    discrete_loss: BinaryCrossEntropy,
    continuous_loss: MeanSquared,
}

impl<A: OptimizerAlg> InverseOptimizer<A> {
    pub fn new<B>(model: InverseModel, builder: &B) -> Self
    where
        B: AlgBuilder<Output = A>,
    {
        Self {
            binding: Binding::new(builder, &model),
            model,
            discrete_loss: BinaryCrossEntropy::default(),
            continuous_loss: MeanSquared,
        }
    }

    pub fn model(&self) -> &InverseModel {
        &self.model
    }

    pub fn into_model(self) -> InverseModel {
        self.model
    }

    fn run(&mut self, spectra: &Array3<f32>, labels: &Labels, update: bool) -> Step {
        let mut mean = StepMean::default();
        for i in 0..labels.len() {
            let heads = self.model.predict(spectrum(spectra, i));
            let discrete = self.discrete_loss.eval(heads.discrete, labels.discrete_row(i));
            let continuous = self
                .continuous_loss
                .eval(heads.continuous, labels.continuous_row(i));

            mean.add(Step {
                loss: discrete.loss + continuous.loss,
                mae: mean_absolute_error(heads.continuous, labels.continuous_row(i)),
                accuracy: Some(choice_accuracy(
                    heads.discrete,
                    labels.discrete_row(i),
                    CHOICE_WIDTH,
                )),
            });

            if update {
                let model = &mut self.model;
                self.binding.accumulate(|grads| {
                    model.calc_gradients(grads, &discrete.grads, &continuous.grads);
                });
            }
        }
        if update {
            self.binding.apply(&mut self.model);
        }
        mean.mean()
    }
}

impl<A: OptimizerAlg> Optimizer for InverseOptimizer<A> {
    type Mode = Inverse;

    fn train_on_batch(&mut self, spectra: &Array3<f32>, labels: &Labels) -> Step {
        self.run(spectra, labels, true)
    }

    fn evaluate(&mut self, spectra: &Array3<f32>, labels: &Labels) -> Step {
        self.run(spectra, labels, false)
    }
}
