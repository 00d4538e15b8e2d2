//! Streaming of the pre-generated training batches.
//!
//! A batch lives on disk as three files sharing an identifier: the spectra (`X`), the one-hot
//! encoded discrete labels (`Y`) and the per-sample stack parameters (`params`), from which the
//! continuous labels are unpacked. [BatchGenerator] draws batches without replacement until the
//! listing is exhausted and [Pairs] adapts them to what a model type trains on.

pub mod generator;
pub mod pool;
pub mod store;

pub use generator::{BatchGenerator, Combined, Forward, Inverse, Mode, Pairs};
pub use pool::BatchPool;
pub use store::{BatchSource, BatchStore, LayerParams, RawBatch, SpacerParams, StackParams};

use ndarray::{Array2, Array3, Axis};

/// Discrete and continuous labels of a batch, one row per sample.
#[derive(Clone, Debug, PartialEq)]
pub struct Labels {
    pub discrete: Array2<f32>,
    pub continuous: Array2<f32>,
}

impl Labels {
    pub fn len(&self) -> usize {
        self.discrete.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn discrete_row(&self, i: usize) -> &[f32] {
        row(&self.discrete, i)
    }

    pub fn continuous_row(&self, i: usize) -> &[f32] {
        row(&self.continuous, i)
    }
}

/// A decoded batch: spectra shaped `[samples, model_inputs, 2]` and their labels.
#[derive(Clone, Debug, PartialEq)]
pub struct Batch {
    pub spectra: Array3<f32>,
    pub labels: Labels,
}

impl Batch {
    pub fn len(&self) -> usize {
        self.spectra.len_of(Axis(0))
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Flattened spectrum of sample `i`, points first and channels second.
pub fn spectrum(spectra: &Array3<f32>, i: usize) -> &[f32] {
    spectra
        .index_axis(Axis(0), i)
        .to_slice()
        .expect("Batches are kept in standard layout")
}

fn row(array: &Array2<f32>, i: usize) -> &[f32] {
    array
        .row(i)
        .to_slice()
        .expect("Batches are kept in standard layout")
}
