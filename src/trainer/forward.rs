use ndarray::Array3;

use super::{Optimizer, Step, StepMean};
use crate::data::{spectrum, Forward, Labels};
use crate::loss::{mean_absolute_error, LossFunc, MeanSquared};
use crate::models::ForwardModel;
use crate::optimizer::{AlgBuilder, Binding, OptimizerAlg};

/// Trains a [ForwardModel] with mean squared error on the spectrum.
#[derive(Debug)]
pub struct ForwardOptimizer<A> {
    model: ForwardModel,
    binding: Binding<ForwardModel, A>,
}

impl<A: OptimizerAlg> ForwardOptimizer<A> {
    pub fn new<B>(model: ForwardModel, builder: &B) -> Self
    where
        B: AlgBuilder<Output = A>,
    {
        Self {
            binding: Binding::new(builder, &model),
            model,
        }
    }

    pub fn model(&self) -> &ForwardModel {
        &self.model
    }

    pub fn into_model(self) -> ForwardModel {
        self.model
    }
}

/// Runs a forward model over a batch. Gradients are accumulated into `binding` and applied once
/// at the end if one is provided, otherwise the batch is only evaluated.
pub(crate) fn forward_batch<A: OptimizerAlg>(
    model: &mut ForwardModel,
    mut binding: Option<&mut Binding<ForwardModel, A>>,
    labels: &Labels,
    spectra: &Array3<f32>,
) -> Step {
    let mut mean = StepMean::default();
    for i in 0..labels.len() {
        let target = spectrum(spectra, i);
        let out = model.predict_parts(labels.discrete_row(i), labels.continuous_row(i));
        let loss = MeanSquared.eval(out, target);
        mean.add(Step {
            loss: loss.loss,
            mae: mean_absolute_error(out, target),
            accuracy: None,
        });

        if let Some(binding) = binding.as_deref_mut() {
            binding.accumulate(|grads| {
                model.calc_gradients(grads, &loss.grads);
            });
        }
    }
    if let Some(binding) = binding {
        binding.apply(model);
    }
    mean.mean()
}

impl<A: OptimizerAlg> Optimizer for ForwardOptimizer<A> {
    type Mode = Forward;

    fn train_on_batch(&mut self, labels: &Labels, spectra: &Array3<f32>) -> Step {
        forward_batch(&mut self.model, Some(&mut self.binding), labels, spectra)
    }

    fn evaluate(&mut self, labels: &Labels, spectra: &Array3<f32>) -> Step {
        forward_batch::<A>(&mut self.model, None, labels, spectra)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Hyperparameters, CONTINUOUS_OUTPUTS, DISCRETE_OUTPUTS};
    use crate::optimizer::{GradDescBuilder, GradientDescent};
    use ndarray::Array2;

    #[test]
    fn gradient_descent_reduces_loss() {
        let params = Hyperparameters {
            model_inputs: 3,
            hidden: 10,
            seed: Some(8),
            ..Default::default()
        };
        let mut opt: ForwardOptimizer<GradientDescent> = ForwardOptimizer::new(
            ForwardModel::new(&params),
            &GradDescBuilder::new().l_rate(0.01).build(),
        );

        let labels = Labels {
            discrete: Array2::from_shape_fn((3, DISCRETE_OUTPUTS), |(s, c)| {
                ((s + c) % 2) as f32
            }),
            continuous: Array2::from_shape_fn((3, CONTINUOUS_OUTPUTS), |(s, c)| {
                (s * c) as f32 * 0.05
            }),
        };
        let spectra = Array3::from_shape_fn((3, 3, 2), |(s, p, c)| (s + p) as f32 * 0.2 - c as f32);

        let initial = opt.evaluate(&labels, &spectra);
        assert_eq!(initial.accuracy, None);
        for _ in 0..30 {
            opt.train_on_batch(&labels, &spectra);
        }
        let trained = opt.evaluate(&labels, &spectra);
        assert!(trained.loss < initial.loss, "{:?} -> {:?}", initial, trained);
    }
}
