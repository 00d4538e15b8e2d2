use anyhow::Context;
use clap::{Parser, ValueEnum};

use std::path::{Path, PathBuf};

use crate::config::{Hyperparameters, OptimizerKind};
use crate::data::{BatchGenerator, BatchStore};
use crate::error::Error;
use crate::models::{CombinedModel, ForwardModel, InverseModel, Model};
use crate::optimizer::{AdamBuilder, AlgBuilder, GradDescBuilder};
use crate::trainer::{
    AlternatingTrainer, ForwardOptimizer, History, InverseOptimizer, ProgressLogger, Trainer,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum ModelType {
    Inverse,
    Forward,
    Combined,
}

#[derive(Parser, Debug)]
#[command(name = "train", about = "Train the stack surrogate models on pre-generated batches")]
pub struct TrainArgs {
    /// Path the trained model is written to.
    pub model: PathBuf,
    /// Directory with `training` and `validation` batch directories.
    pub batches: PathBuf,
    /// File with the parameters the batches were generated from. Only reported.
    #[arg(short = 'p', long)]
    pub params: Option<PathBuf>,
    /// Directory the training history is saved to.
    #[arg(long, default_value = "data/logs")]
    pub log_dir: PathBuf,
    /// Train a freshly initialized model instead of continuing from `model`.
    #[arg(short = 'n', long)]
    pub new: bool,
    #[arg(long, value_enum, default_value_t = ModelType::Inverse)]
    pub model_type: ModelType,
    /// Forward model to train against in combined mode.
    #[arg(short = 'f', long, default_value = "data/models/best_forward.json")]
    pub forward_model: PathBuf,
    /// Inverse model to continue from in combined mode.
    #[arg(short = 'i', long, default_value = "data/models/best_inverse.json")]
    pub inverse_model: PathBuf,
    /// JSON file with hyperparameters, missing fields keep their defaults.
    #[arg(long)]
    pub config: Option<PathBuf>,
    #[arg(long)]
    pub epochs: Option<u32>,
    /// Seeds weight initialization and batch order.
    #[arg(long)]
    pub seed: Option<u64>,
}

impl TrainArgs {
    pub fn hyperparameters(&self) -> anyhow::Result<Hyperparameters> {
        let mut params = match &self.config {
            Some(path) => Hyperparameters::from_file(path)
                .with_context(|| format!("Failed to read config {}", path.display()))?,
            None => Hyperparameters::default(),
        };
        if let Some(epochs) = self.epochs {
            params.epochs = epochs;
        }
        if self.seed.is_some() {
            params.seed = self.seed;
        }
        params.validate()?;
        Ok(params)
    }

    /// Where the history of this run is saved.
    pub fn history_path(&self) -> PathBuf {
        let name = self
            .model
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        self.log_dir.join(format!("{}.json", name))
    }
}

fn generator(
    dir: &Path,
    params: &Hyperparameters,
    stream: u64,
) -> BatchGenerator<BatchStore> {
    let store = BatchStore::new(dir)
        .model_inputs(params.model_inputs)
        .batch_size(params.batch_size);
    BatchGenerator::with_seed(store, params.seed.map(|s| s.wrapping_add(stream)))
}

/// Trains the model selected by `args`, saves it and its history and returns the history.
pub fn run_train(args: &TrainArgs) -> anyhow::Result<History> {
    let params = args.hyperparameters()?;
    log::info!("{:?}", args);
    if let Some(path) = &args.params {
        log::info!("Batches were generated from {}", path.display());
    }

    let history = match params.optimizer {
        OptimizerKind::Adam => {
            let adam = AdamBuilder::new().l_rate(params.learning_rate).build();
            train_with(args, &params, &adam)?
        }
        OptimizerKind::GradientDescent => {
            let sgd = GradDescBuilder::new()
                .l_rate(params.learning_rate)
                .momentum(params.momentum)
                .build();
            train_with(args, &params, &sgd)?
        }
    };

    let path = args.history_path();
    log::info!("Saving history to {}", path.display());
    history.save(&path)?;
    Ok(history)
}

/// Fails unless a model maps `actual.0` values to `actual.1` like the batches require.
fn check_shape(
    name: &str,
    actual: (usize, usize),
    expected: (usize, usize),
) -> Result<(), Error> {
    if actual != expected {
        return Err(Error::config(format!(
            "The {} model maps {} values to {}, but the batches need {} to {}. \
             Start a new model with -n or change model_inputs",
            name, actual.0, actual.1, expected.0, expected.1
        )));
    }
    Ok(())
}

fn train_with<B: AlgBuilder>(
    args: &TrainArgs,
    params: &Hyperparameters,
    builder: &B,
) -> anyhow::Result<History> {
    let training = args.batches.join("training");
    let validation = args.batches.join("validation");
    let spectrum = params.spectrum_len();
    let labels = params.label_len();

    let history = match args.model_type {
        ModelType::Inverse => {
            log::info!("Training inverse model...");
            let model = if args.new {
                InverseModel::new(params)
            } else {
                InverseModel::from_file(&args.model)?
            };
            check_shape("inverse", (model.in_size(), model.out_size()), (spectrum, labels))?;

            let train = generator(&training, params, 0);
            let validate = generator(&validation, params, 1);
            let steps = train.batch_count()?;
            let validation_steps = validate.batch_count()?;
            let mut trainer = Trainer::builder()
                .optimizer(InverseOptimizer::new(model, builder))
                .training(train.into_pairs())
                .validation(validate.into_pairs())
                .steps(steps)
                .validation_steps(validation_steps)
                .logger(ProgressLogger::new(params.epochs, steps))
                .build()?;
            let history = trainer.train(params.epochs)?;

            log::info!("Saving model to {}", args.model.display());
            trainer.into_optimizer().into_model().save(&args.model)?;
            history
        }
        ModelType::Forward => {
            log::info!("Training forward model...");
            let model = if args.new {
                ForwardModel::new(params)
            } else {
                ForwardModel::from_file(&args.model)?
            };
            check_shape("forward", (model.in_size(), model.out_size()), (labels, spectrum))?;

            let train = generator(&training, params, 0);
            let validate = generator(&validation, params, 1);
            let steps = train.batch_count()?;
            let validation_steps = validate.batch_count()?;
            let mut trainer = Trainer::builder()
                .optimizer(ForwardOptimizer::new(model, builder))
                .training(train.into_pairs())
                .validation(validate.into_pairs())
                .steps(steps)
                .validation_steps(validation_steps)
                .logger(ProgressLogger::new(params.epochs, steps))
                .build()?;
            let history = trainer.train(params.epochs)?;

            log::info!("Saving model to {}", args.model.display());
            trainer.into_optimizer().into_model().save(&args.model)?;
            history
        }
        ModelType::Combined => {
            log::info!("Training combined model...");
            let forward = ForwardModel::from_file(&args.forward_model).map_err(|e| {
                Error::config(format!(
                    "Provide a forward model with -f when training in combined mode ({:#})",
                    e
                ))
            })?;
            let inverse = if args.new {
                InverseModel::new(params)
            } else {
                InverseModel::from_file(&args.inverse_model)?
            };
            check_shape("inverse", (inverse.in_size(), inverse.out_size()), (spectrum, labels))?;
            check_shape("forward", (forward.in_size(), forward.out_size()), (labels, spectrum))?;
            let model = CombinedModel::new(inverse, forward)?;

            let train = generator(&training, params, 0);
            let steps = train.batch_count()?;
            let mut trainer = AlternatingTrainer::new(
                model,
                builder,
                train.into_pairs(),
                generator(&validation, params, 1).into_pairs(),
                generator(&validation, params, 2).into_pairs(),
            )?
            .logger(ProgressLogger::new(params.epochs, steps));
            let history = trainer.train(params.epochs)?;

            log::info!("Saving inverse model to {}", args.model.display());
            trainer.into_model().into_inverse().save(&args.model)?;
            history
        }
    };
    Ok(history)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_follow_script_layout() {
        let args = TrainArgs::parse_from(["train", "data/models/inv.json", "data/batches"]);
        assert_eq!(args.model_type, ModelType::Inverse);
        assert!(!args.new);
        assert_eq!(args.log_dir, PathBuf::from("data/logs"));
        assert_eq!(args.forward_model, PathBuf::from("data/models/best_forward.json"));
        assert_eq!(args.history_path(), PathBuf::from("data/logs/inv.json"));
    }

    #[test]
    fn flags_override_config() {
        let args = TrainArgs::parse_from([
            "train",
            "m.json",
            "b",
            "-n",
            "--model-type",
            "combined",
            "-f",
            "fwd.json",
            "--epochs",
            "3",
            "--seed",
            "5",
        ]);
        assert!(args.new);
        assert_eq!(args.model_type, ModelType::Combined);
        assert_eq!(args.forward_model, PathBuf::from("fwd.json"));

        let params = args.hyperparameters().unwrap();
        assert_eq!(params.epochs, 3);
        assert_eq!(params.seed, Some(5));
        assert_eq!(params.batch_size, 128);
    }
}
