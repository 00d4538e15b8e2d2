#![allow(dead_code)]

use ndarray::{Array2, Array3};
use rand::{rngs::SmallRng, Rng, SeedableRng};
use tempfile::TempDir;

use stack_surrogate::config::{Hyperparameters, DISCRETE_OUTPUTS};
use stack_surrogate::data::{BatchStore, LayerParams, RawBatch, SpacerParams, StackParams};

use std::path::Path;

pub const POINTS: usize = 4;
pub const SAMPLES: usize = 6;

pub fn params() -> Hyperparameters {
    Hyperparameters {
        model_inputs: POINTS,
        batch_size: SAMPLES,
        hidden: 16,
        epochs: 2,
        learning_rate: 1e-2,
        seed: Some(17),
        ..Default::default()
    }
}

fn layer(rng: &mut SmallRng) -> LayerParams {
    LayerParams {
        width: rng.gen_range(0., 1.),
        length: rng.gen_range(0., 1.),
        thickness: rng.gen_range(0., 1.),
        period: rng.gen_range(0., 1.),
    }
}

/// A batch whose spectra are a fixed function of the labels, so there is something to learn.
pub fn raw_batch(seed: u64, samples: usize, points: usize) -> RawBatch {
    let mut rng = SmallRng::seed_from_u64(seed);

    let params: Vec<StackParams> = (0..samples)
        .map(|_| {
            StackParams(
                layer(&mut rng),
                layer(&mut rng),
                SpacerParams {
                    spacer_height: rng.gen_range(0., 1.),
                    angle: rng.gen_range(0., 1.),
                },
            )
        })
        .collect();

    let mut discrete = Array2::zeros((samples, DISCRETE_OUTPUTS));
    for mut row in discrete.outer_iter_mut() {
        for choice in 0..DISCRETE_OUTPUTS / 2 {
            let pick = rng.gen_range(0, 2);
            row[choice * 2 + pick] = 1.;
        }
    }

    let spectra = Array3::from_shape_fn((samples, points, 2), |(s, p, c)| {
        let columns = params[s].columns();
        0.5 * (columns[p % columns.len()] + discrete[[s, (p + c) % DISCRETE_OUTPUTS]])
    });

    RawBatch {
        spectra,
        discrete,
        params,
    }
}

/// Writes `count` batches named `b0`, `b1`, ... into `dir`.
pub fn write_batches(dir: &Path, count: usize, seed: u64) -> BatchStore {
    let store = BatchStore::new(dir);
    store.create_dirs().unwrap();
    for i in 0..count {
        store
            .write(&format!("b{}", i), &raw_batch(seed + i as u64, SAMPLES, POINTS))
            .unwrap();
    }
    store
}

/// A batch directory with `training` and `validation` stores.
pub fn batch_dir(training: usize, validation: usize) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    write_batches(&dir.path().join("training"), training, 0);
    write_batches(&dir.path().join("validation"), validation, 1000);
    dir
}
