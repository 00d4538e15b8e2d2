use ndarray::Array3;

use super::forward::forward_batch;
use super::{EpochRecord, History, Logger, MockLogger, Step, StepMean};
use crate::data::{spectrum, BatchSource, Combined, Forward, Labels, Pairs};
use crate::error::Result;
use crate::loss::{mean_absolute_error, LossFunc, MeanSquared};
use crate::models::{CombinedModel, ForwardModel, Gradients, InverseModel};
use crate::optimizer::{AlgBuilder, Binding, OptimizerAlg};

/// Where in a training step the [AlternatingTrainer] is.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// No step has been taken yet.
    Idle,
    /// The forward model is being fitted to `(labels, spectra)`.
    ForwardUpdate,
    /// The forward update is done and the forward model may no longer change.
    FreezeForward,
    /// The inverse model is being fitted through the frozen forward model.
    CombinedUpdate,
}

/// Trains a combined model by alternating between its halves.
///
/// Every step first fits the forward model to a `(labels, spectra)` batch, then fits the whole
/// graph to reconstruct the same spectra. In the second update gradients flow through the forward
/// model into the inverse model, but only the inverse model's binding applies them. The forward
/// derivatives of that update go into a scratch buffer which is cleared afterwards.
#[derive(Debug)]
pub struct AlternatingTrainer<A, S> {
    model: CombinedModel,
    forward_binding: Binding<ForwardModel, A>,
    inverse_binding: Binding<InverseModel, A>,
    scratch: Gradients,

    train: Pairs<S, Forward>,
    validation_forward: Pairs<S, Forward>,
    validation_combined: Pairs<S, Combined>,
    logger: Box<dyn Logger>,

    steps: usize,
    validation_steps: usize,
    epoch: u32,
    phase: Phase,
}

impl<A, S> AlternatingTrainer<A, S>
where
    A: OptimizerAlg,
    S: BatchSource,
{
    /// Steps per epoch and validation steps default to the sizes of the training and the
    /// forward validation listings.
    pub fn new<B>(
        model: CombinedModel,
        builder: &B,
        train: Pairs<S, Forward>,
        validation_forward: Pairs<S, Forward>,
        validation_combined: Pairs<S, Combined>,
    ) -> Result<Self>
    where
        B: AlgBuilder<Output = A>,
    {
        let steps = train.batch_count()?;
        let validation_steps = validation_forward.batch_count()?;
        Ok(Self {
            forward_binding: Binding::new(builder, model.forward()),
            inverse_binding: Binding::new(builder, model.inverse()),
            scratch: Gradients::for_model(model.forward()),
            model,
            train,
            validation_forward,
            validation_combined,
            logger: Box::new(MockLogger),
            steps,
            validation_steps,
            epoch: 0,
            phase: Phase::Idle,
        })
    }

    pub fn logger<L: Logger + 'static>(mut self, logger: L) -> Self {
        self.logger = Box::new(logger);
        self
    }

    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = steps;
        self
    }

    pub fn validation_steps(mut self, steps: usize) -> Self {
        self.validation_steps = steps;
        self
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether the forward model's parameters may currently change.
    pub fn forward_trainable(&self) -> bool {
        self.phase == Phase::ForwardUpdate
    }

    pub fn model(&self) -> &CombinedModel {
        &self.model
    }

    pub fn into_model(self) -> CombinedModel {
        self.model
    }

    /// One optimizer step on the forward model.
    pub fn forward_update(&mut self, labels: &Labels, spectra: &Array3<f32>) -> Step {
        self.phase = Phase::ForwardUpdate;
        forward_batch(
            self.model.forward_mut(),
            Some(&mut self.forward_binding),
            labels,
            spectra,
        )
    }

    pub fn freeze_forward(&mut self) {
        self.phase = Phase::FreezeForward;
    }

    /// One optimizer step on the combined graph which only updates the inverse model.
    pub fn combined_update(&mut self, spectra: &Array3<f32>) -> Step {
        self.phase = Phase::CombinedUpdate;
        combined_batch(
            &mut self.model,
            Some((&mut self.inverse_binding, &mut self.scratch)),
            spectra,
            spectra,
        )
    }

    /// A full alternating step on the next training batch.
    /// Returns the forward and the combined metrics.
    pub fn do_batch(&mut self, batch: u32) -> Result<(Step, Step)> {
        let (labels, spectra) = self.train.next_pair()?;
        let forward = self.forward_update(&labels, &spectra);
        self.freeze_forward();
        let combined = self.combined_update(&spectra);
        self.logger.batch_loss(self.epoch, batch, combined.loss);
        Ok((forward, combined))
    }

    /// Mean metrics of the forward model on forward validation pairs and of the combined model
    /// on combined validation pairs.
    pub fn evaluate(&mut self) -> Result<(Step, Step)> {
        let mut forward = StepMean::default();
        for _ in 0..self.validation_steps {
            let (labels, spectra) = self.validation_forward.next_pair()?;
            forward.add(forward_batch::<A>(
                self.model.forward_mut(),
                None,
                &labels,
                &spectra,
            ));
        }

        let mut combined = StepMean::default();
        for _ in 0..self.validation_steps {
            let (input, target) = self.validation_combined.next_pair()?;
            combined.add(combined_batch::<A>(&mut self.model, None, &input, &target));
        }
        Ok((forward.mean(), combined.mean()))
    }

    pub fn do_epoch(&mut self) -> Result<EpochRecord> {
        let mut forward = StepMean::default();
        let mut combined = StepMean::default();
        for batch in 0..self.steps {
            let (f, c) = self.do_batch(batch as u32)?;
            forward.add(f);
            combined.add(c);
        }

        let (val_forward, val_combined) = self.evaluate()?;
        log::info!(
            "forward mae {:e} combined mae {:e}",
            val_forward.mae,
            val_combined.mae
        );

        let mut record = EpochRecord::new(self.epoch);
        for (name, step) in &[
            ("forward", forward.mean()),
            ("combined", combined.mean()),
            ("val_forward", val_forward),
            ("val_combined", val_combined),
        ] {
            record.insert(format!("{}_loss", name), step.loss);
            record.insert(format!("{}_mae", name), step.mae);
        }
        self.logger.epoch(&record);
        self.epoch += 1;
        Ok(record)
    }

    pub fn train(&mut self, epochs: u32) -> Result<History> {
        let mut history = History::new();
        for _ in 0..epochs {
            history.push(&self.do_epoch()?);
        }
        Ok(history)
    }
}

/// Runs a combined model over a batch. With an inverse binding and a scratch buffer for the
/// forward derivatives the inverse model is updated once at the end, otherwise the batch is only
/// evaluated.
fn combined_batch<A: OptimizerAlg>(
    model: &mut CombinedModel,
    mut update: Option<(&mut Binding<InverseModel, A>, &mut Gradients)>,
    spectra: &Array3<f32>,
    target: &Array3<f32>,
) -> Step {
    let mut mean = StepMean::default();
    for i in 0..spectra.len_of(ndarray::Axis(0)) {
        let expected = spectrum(target, i);
        let out = model.predict(spectrum(spectra, i));
        let loss = MeanSquared.eval(out, expected);
        mean.add(Step {
            loss: loss.loss,
            mae: mean_absolute_error(out, expected),
            accuracy: None,
        });

        if let Some((binding, scratch)) = update.as_mut() {
            binding.accumulate(|grads| {
                model.calc_gradients(grads, &mut **scratch, &loss.grads);
            });
        }
    }
    if let Some((binding, scratch)) = update {
        binding.apply(model.inverse_mut());
        scratch.reset();
    }
    mean.mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Hyperparameters;
    use crate::data::generator::tests::MemorySource;
    use crate::data::BatchGenerator;
    use crate::models::Model;
    use crate::optimizer::{Adam, AdamBuilder};

    fn trainer() -> AlternatingTrainer<Adam, MemorySource> {
        let params = Hyperparameters {
            model_inputs: 3,
            hidden: 8,
            seed: Some(21),
            ..Default::default()
        };
        let model =
            CombinedModel::new(InverseModel::new(&params), ForwardModel::new(&params)).unwrap();
        let source = || MemorySource::new(vec!["a", "b", "c"], 3);

        AlternatingTrainer::new(
            model,
            &AdamBuilder::new().build(),
            BatchGenerator::seeded(source(), 1).into_pairs(),
            BatchGenerator::seeded(source(), 2).into_pairs(),
            BatchGenerator::seeded(source(), 3).into_pairs(),
        )
        .unwrap()
    }

    fn forward_weights(trainer: &AlternatingTrainer<Adam, MemorySource>) -> Vec<Vec<f32>> {
        trainer
            .model()
            .forward()
            .parameters()
            .iter()
            .map(|p| p.raw().to_vec())
            .collect()
    }

    #[test]
    fn forward_is_frozen_outside_its_update() {
        let mut trainer = trainer();
        assert_eq!(trainer.phase(), Phase::Idle);
        assert!(!trainer.forward_trainable());

        let (labels, spectra) = trainer.train.next_pair().unwrap();
        trainer.forward_update(&labels, &spectra);
        assert!(trainer.forward_trainable());

        trainer.combined_update(&spectra);
        assert_eq!(trainer.phase(), Phase::CombinedUpdate);
        assert!(!trainer.forward_trainable());

        trainer.forward_update(&labels, &spectra);
        assert!(trainer.forward_trainable());
    }

    #[test]
    fn a_batch_ends_in_the_combined_update() {
        let mut trainer = trainer();
        let (forward, combined) = trainer.do_batch(0).unwrap();
        assert_eq!(trainer.phase(), Phase::CombinedUpdate);
        assert!(!trainer.forward_trainable());
        assert!(forward.loss.is_finite() && combined.loss.is_finite());

        trainer.freeze_forward();
        assert_eq!(trainer.phase(), Phase::FreezeForward);
        assert!(!trainer.forward_trainable());
    }

    #[test]
    fn combined_update_only_changes_inverse() {
        let mut trainer = trainer();
        let (_, spectra) = trainer.train.next_pair().unwrap();

        let forward_before = forward_weights(&trainer);
        let inverse_before = trainer.model().extract_inverse();
        trainer.combined_update(&spectra);

        assert_eq!(forward_weights(&trainer), forward_before);
        assert_ne!(
            trainer.model().inverse().parameters(),
            inverse_before.parameters()
        );
        assert!(trainer
            .scratch
            .parts()
            .iter()
            .all(|p| p.raw().iter().all(|x| *x == 0.)));
    }

    #[test]
    fn epochs_report_both_models() {
        let mut trainer = trainer().steps(2).validation_steps(1);
        let history = trainer.train(2).unwrap();

        assert_eq!(history.len(), 2);
        for name in &[
            "forward_loss",
            "forward_mae",
            "combined_loss",
            "combined_mae",
            "val_forward_mae",
            "val_combined_mae",
        ] {
            let series = history.get(name).unwrap();
            assert!(series.iter().all(|v| v.is_finite()), "{}: {:?}", name, series);
        }
    }
}
