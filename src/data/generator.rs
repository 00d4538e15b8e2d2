use ndarray::Array3;

use std::marker::PhantomData;

use super::{Batch, BatchPool, BatchSource, Labels};
use crate::error::{Error, Result};

/// Draws batches from a source in random order without repeating one until every batch of the
/// current listing has been drawn.
#[derive(Debug)]
pub struct BatchGenerator<S> {
    source: S,
    pool: BatchPool,
}

impl<S: BatchSource> BatchGenerator<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            pool: BatchPool::new(),
        }
    }

    /// A generator whose draw order only depends on `seed` and the listing.
    pub fn seeded(source: S, seed: u64) -> Self {
        Self {
            source,
            pool: BatchPool::with_seed(seed),
        }
    }

    pub fn with_seed(source: S, seed: Option<u64>) -> Self {
        match seed {
            Some(seed) => Self::seeded(source, seed),
            None => Self::new(source),
        }
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    /// Number of batches in the source's current listing.
    pub fn listing_len(&self) -> Result<usize> {
        Ok(self.source.list()?.len())
    }

    /// Like [listing_len](Self::listing_len), but an empty listing is an error.
    pub fn batch_count(&self) -> Result<usize> {
        match self.listing_len()? {
            0 => Err(Error::EmptyPool {
                dir: self.source.location().to_owned(),
            }),
            n => Ok(n),
        }
    }

    /// Identifier of the next batch without loading it.
    pub fn next_id(&mut self) -> Result<String> {
        self.pool.draw(&self.source).map(str::to_owned)
    }

    pub fn next_batch(&mut self) -> Result<Batch> {
        let id = self.pool.draw(&self.source)?;
        log::trace!("Loading batch {}", id);
        self.source.load(id)
    }

    /// Adapts the generator to the pairs a model of type `M` trains on.
    pub fn into_pairs<M: Mode>(self) -> Pairs<S, M> {
        Pairs {
            inner: self,
            mode: PhantomData,
        }
    }
}

/// Shapes a decoded batch into the `(input, target)` pair of one model type.
pub trait Mode {
    type Input;
    type Target;

    fn split(batch: Batch) -> (Self::Input, Self::Target);
}

/// Spectra in, labels out.
#[derive(Clone, Copy, Debug)]
pub struct Inverse;

/// Labels in, spectra out.
#[derive(Clone, Copy, Debug)]
pub struct Forward;

/// Spectra in, the same spectra out.
#[derive(Clone, Copy, Debug)]
pub struct Combined;

impl Mode for Inverse {
    type Input = Array3<f32>;
    type Target = Labels;

    fn split(batch: Batch) -> (Self::Input, Self::Target) {
        (batch.spectra, batch.labels)
    }
}

impl Mode for Forward {
    type Input = Labels;
    type Target = Array3<f32>;

    fn split(batch: Batch) -> (Self::Input, Self::Target) {
        let (spectra, labels) = Inverse::split(batch);
        (labels, spectra)
    }
}

impl Mode for Combined {
    type Input = Array3<f32>;
    type Target = Array3<f32>;

    fn split(batch: Batch) -> (Self::Input, Self::Target) {
        (batch.spectra.clone(), batch.spectra)
    }
}

/// An endless stream of `(input, target)` pairs. Never returns `None`, errors are yielded and
/// should end the consumer's loop.
#[derive(Debug)]
pub struct Pairs<S, M> {
    inner: BatchGenerator<S>,
    mode: PhantomData<M>,
}

impl<S: BatchSource, M: Mode> Pairs<S, M> {
    pub fn next_pair(&mut self) -> Result<(M::Input, M::Target)> {
        self.inner.next_batch().map(M::split)
    }

    pub fn listing_len(&self) -> Result<usize> {
        self.inner.listing_len()
    }

    pub fn batch_count(&self) -> Result<usize> {
        self.inner.batch_count()
    }

    pub fn into_inner(self) -> BatchGenerator<S> {
        self.inner
    }
}

impl<S: BatchSource, M: Mode> Iterator for Pairs<S, M> {
    type Item = Result<(M::Input, M::Target)>;

    fn next(&mut self) -> Option<Self::Item> {
        Some(self.next_pair())
    }
}
