//! Training loops.
//!
//! [Trainer] is the epoch loop used for the inverse and forward models: it drives an [Optimizer]
//! with pairs from a training generator and evaluates it on a validation generator after every
//! epoch. The combined model is trained by the [AlternatingTrainer](alternating::AlternatingTrainer).

pub mod alternating;
pub mod forward;
pub mod inverse;
pub mod logger;

pub use alternating::{AlternatingTrainer, Phase};
pub use forward::ForwardOptimizer;
pub use inverse::InverseOptimizer;
pub use logger::{EpochRecord, History, Logger, MockLogger, ProgressLogger};

use std::error::Error;
use std::fmt::{self, Display};
use std::ops::{Deref, DerefMut};

use crate::data::{BatchSource, Mode, Pairs};
use crate::error::Result;

/// Averaged metrics of a single batch.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Step {
    pub loss: f32,
    pub mae: f32,
    /// Only reported by models with a discrete output.
    pub accuracy: Option<f32>,
}

/// Running mean over the steps of an epoch.
#[derive(Clone, Copy, Debug, Default)]
pub(crate) struct StepMean {
    loss: f32,
    mae: f32,
    accuracy: Option<f32>,
    n: usize,
}

impl StepMean {
    pub fn add(&mut self, step: Step) {
        self.loss += step.loss;
        self.mae += step.mae;
        if let Some(acc) = step.accuracy {
            *self.accuracy.get_or_insert(0.) += acc;
        }
        self.n += 1;
    }

    pub fn mean(&self) -> Step {
        let n = self.n.max(1) as f32;
        Step {
            loss: self.loss / n,
            mae: self.mae / n,
            accuracy: self.accuracy.map(|a| a / n),
        }
    }
}

/// A model together with its loss functions and the optimizer bound to it.
pub trait Optimizer {
    /// The kind of pairs the model trains on.
    type Mode: Mode;

    /// Accumulates the gradients of every sample of the batch and updates the model once.
    fn train_on_batch(
        &mut self,
        input: &<Self::Mode as Mode>::Input,
        target: &<Self::Mode as Mode>::Target,
    ) -> Step;

    /// Computes the metrics of a batch without touching the model.
    fn evaluate(
        &mut self,
        input: &<Self::Mode as Mode>::Input,
        target: &<Self::Mode as Mode>::Target,
    ) -> Step;
}

/// Drives an optimizer through epochs of training and validation batches.
#[derive(Debug)]
pub struct Trainer<O: Optimizer, S> {
    optimizer: O,
    train: Pairs<S, O::Mode>,
    validation: Pairs<S, O::Mode>,
    logger: Box<dyn Logger>,
    steps: usize,
    validation_steps: usize,
    epoch: u32,
}

impl<O, S> Trainer<O, S>
where
    O: Optimizer,
    S: BatchSource,
{
    pub fn builder() -> TrainerBuilder<O, S> {
        TrainerBuilder::new()
    }

    pub fn steps(&self) -> usize {
        self.steps
    }

    pub fn validation_steps(&self) -> usize {
        self.validation_steps
    }

    /// Trains on a single batch and returns its metrics.
    pub fn do_batch(&mut self, batch: u32) -> Result<Step> {
        let (input, target) = self.train.next_pair()?;
        let step = self.optimizer.train_on_batch(&input, &target);
        self.logger.batch_loss(self.epoch, batch, step.loss);
        Ok(step)
    }

    /// Runs one epoch of training followed by validation.
    pub fn do_epoch(&mut self) -> Result<EpochRecord> {
        let mut train = StepMean::default();
        for batch in 0..self.steps {
            train.add(self.do_batch(batch as u32)?);
        }

        let mut validation = StepMean::default();
        for _ in 0..self.validation_steps {
            let (input, target) = self.validation.next_pair()?;
            validation.add(self.optimizer.evaluate(&input, &target));
        }

        let record = epoch_record(self.epoch, &train.mean(), &validation.mean());
        self.logger.epoch(&record);
        self.epoch += 1;
        Ok(record)
    }

    /// Runs `epochs` epochs and collects their records.
    pub fn train(&mut self, epochs: u32) -> Result<History> {
        let mut history = History::new();
        for _ in 0..epochs {
            history.push(&self.do_epoch()?);
        }
        Ok(history)
    }

    pub fn into_optimizer(self) -> O {
        self.optimizer
    }
}

fn epoch_record(epoch: u32, train: &Step, validation: &Step) -> EpochRecord {
    let mut record = EpochRecord::new(epoch);
    for (prefix, step) in &[("", train), ("val_", validation)] {
        record.insert(format!("{}loss", prefix), step.loss);
        record.insert(format!("{}mae", prefix), step.mae);
        if let Some(acc) = step.accuracy {
            record.insert(format!("{}accuracy", prefix), acc);
        }
    }
    record
}

impl<O: Optimizer, S> Deref for Trainer<O, S> {
    type Target = O;

    fn deref(&self) -> &Self::Target {
        &self.optimizer
    }
}

impl<O: Optimizer, S> DerefMut for Trainer<O, S> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.optimizer
    }
}

pub struct TrainerBuilder<O: Optimizer, S> {
    optimizer: Option<O>,
    train: Option<Pairs<S, O::Mode>>,
    validation: Option<Pairs<S, O::Mode>>,
    logger: Option<Box<dyn Logger>>,
    steps: Option<usize>,
    validation_steps: Option<usize>,
}

impl<O, S> TrainerBuilder<O, S>
where
    O: Optimizer,
    S: BatchSource,
{
    pub fn new() -> Self {
        Self {
            optimizer: None,
            train: None,
            validation: None,
            logger: None,
            steps: None,
            validation_steps: None,
        }
    }

    pub fn optimizer(mut self, optimizer: O) -> Self {
        self.optimizer = Some(optimizer);
        self
    }

    pub fn training(mut self, pairs: Pairs<S, O::Mode>) -> Self {
        self.train = Some(pairs);
        self
    }

    pub fn validation(mut self, pairs: Pairs<S, O::Mode>) -> Self {
        self.validation = Some(pairs);
        self
    }

    pub fn logger<L: Logger + 'static>(mut self, logger: L) -> Self {
        self.logger = Some(Box::new(logger));
        self
    }

    /// Batches per epoch. Defaults to the number of training batches.
    pub fn steps(mut self, steps: usize) -> Self {
        self.steps = Some(steps);
        self
    }

    /// Validation batches per epoch. Defaults to the number of validation batches.
    pub fn validation_steps(mut self, steps: usize) -> Self {
        self.validation_steps = Some(steps);
        self
    }

    pub fn build(self) -> std::result::Result<Trainer<O, S>, BuildError> {
        let optimizer = self.optimizer.ok_or(BuilderError::new("optimizer"))?;
        let train = self.train.ok_or(BuilderError::new("training"))?;
        let validation = self.validation.ok_or(BuilderError::new("validation"))?;

        let steps = match self.steps {
            Some(steps) => steps,
            None => train.batch_count()?,
        };
        let validation_steps = match self.validation_steps {
            Some(steps) => steps,
            None => validation.batch_count()?,
        };

        Ok(Trainer {
            optimizer,
            train,
            validation,
            logger: self.logger.unwrap_or_else(|| Box::new(MockLogger)),
            steps,
            validation_steps,
            epoch: 0,
        })
    }
}

impl<O, S> Default for TrainerBuilder<O, S>
where
    O: Optimizer,
    S: BatchSource,
{
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct BuilderError {
    missing: &'static str,
}

impl BuilderError {
    pub fn new(missing: &'static str) -> Self {
        Self { missing }
    }
}

impl Display for BuilderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Missing field '{}'", self.missing)
    }
}

impl Error for BuilderError {}

/// Building a trainer fails when a field is missing or the batch listings can't be read.
#[derive(Debug)]
pub enum BuildError {
    Missing(BuilderError),
    Data(crate::error::Error),
}

impl From<BuilderError> for BuildError {
    fn from(e: BuilderError) -> Self {
        BuildError::Missing(e)
    }
}

impl From<crate::error::Error> for BuildError {
    fn from(e: crate::error::Error) -> Self {
        BuildError::Data(e)
    }
}

impl Display for BuildError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BuildError::Missing(e) => e.fmt(f),
            BuildError::Data(e) => e.fmt(f),
        }
    }
}

impl Error for BuildError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            BuildError::Missing(e) => Some(e),
            BuildError::Data(e) => Some(e),
        }
    }
}
