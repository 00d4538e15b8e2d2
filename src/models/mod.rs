//! The three graphs trained by this crate and the plumbing they share.
//!
//! Every model owns its parameters as a list of [Storage](crate::storage::Storage) blocks, one per
//! network it is composed of. Optimizer [bindings](crate::optimizer::Binding) and [Gradients]
//! mirror that list, so an update can only ever touch the blocks of the model it was built for.

pub mod combined;
pub mod forward;
pub mod inverse;

pub use combined::CombinedModel;
pub use forward::ForwardModel;
pub use inverse::{Heads, InverseModel};

use anyhow::Context;
use serde::{de::DeserializeOwned, Serialize};

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use crate::initializer::{Kaiming, Xavier};
use crate::storage::{GradStorage, WeightStorage};

pub trait Model: Serialize + DeserializeOwned {
    /// The parameter blocks of the model in a fixed order.
    fn parameters(&self) -> Vec<&WeightStorage>;

    /// Same blocks and order as [parameters](Model::parameters).
    fn parameters_mut(&mut self) -> Vec<&mut WeightStorage>;

    /// Total number of scalar parameters.
    fn parameter_count(&self) -> usize {
        self.parameters().iter().map(|p| p.len()).sum()
    }

    fn save<P: AsRef<Path>>(&self, path: P) -> anyhow::Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create model file {}", path.display()))?;
        serde_json::to_writer(BufWriter::new(file), self)
            .with_context(|| format!("Failed to write model to {}", path.display()))?;
        Ok(())
    }

    fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let file = File::open(path)
            .with_context(|| format!("Failed to open model file {}", path.display()))?;
        let model = serde_json::from_reader(BufReader::new(file))
            .with_context(|| format!("Failed to load model from {}", path.display()))?;
        Ok(model)
    }
}

/// Gradient buffers laid out like the parameters of one model.
#[derive(Clone, Debug, PartialEq)]
pub struct Gradients {
    parts: Vec<GradStorage>,
}

impl Gradients {
    pub fn for_model<M: Model>(model: &M) -> Self {
        Self {
            parts: model
                .parameters()
                .iter()
                .map(|p| GradStorage::zeroed(p.len()))
                .collect(),
        }
    }

    pub fn parts(&self) -> &[GradStorage] {
        &self.parts
    }

    pub fn parts_mut(&mut self) -> &mut [GradStorage] {
        &mut self.parts
    }

    pub fn reset(&mut self) {
        self.parts.iter_mut().for_each(GradStorage::reset);
    }
}

/// Hands out initializers for the layers of a freshly built model. Seeded runs derive a distinct
/// stream for every layer so that two layers of the same shape don't start out identical.
pub(crate) struct Inits {
    seed: Option<u64>,
    layer: u64,
}

impl Inits {
    pub fn new(seed: Option<u64>) -> Self {
        Self { seed, layer: 0 }
    }

    fn next_seed(&mut self) -> Option<u64> {
        self.layer += 1;
        self.seed
            .map(|s| s.wrapping_mul(0x9E37_79B9_7F4A_7C15).wrapping_add(self.layer))
    }

    pub fn kaiming(&mut self) -> Kaiming {
        self.next_seed().map_or_else(Kaiming::new, Kaiming::with_seed)
    }

    pub fn xavier(&mut self) -> Xavier {
        self.next_seed().map_or_else(Xavier::new, Xavier::with_seed)
    }
}
