use rand::{rngs::SmallRng, seq::SliceRandom, SeedableRng};

use super::BatchSource;
use crate::error::{Error, Result};

/// The batch identifiers of one refill cycle in shuffled order, and how far into them we are.
///
/// When the cycle is used up the pool is refilled from a fresh listing of the source and
/// reshuffled, so batches added in the meantime are picked up and every identifier is drawn
/// exactly once per cycle.
#[derive(Debug)]
pub struct BatchPool {
    ids: Vec<String>,
    cursor: usize,
    rng: SmallRng,
}

impl BatchPool {
    pub fn new() -> Self {
        Self::with_rng(SmallRng::from_entropy())
    }

    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(SmallRng::seed_from_u64(seed))
    }

    fn with_rng(rng: SmallRng) -> Self {
        Self {
            ids: Vec::new(),
            cursor: 0,
            rng,
        }
    }

    /// Number of identifiers left before the next refill.
    pub fn remaining(&self) -> usize {
        self.ids.len() - self.cursor
    }

    /// Takes the next identifier, refilling from `source` first if the cycle is exhausted.
    pub fn draw<S: BatchSource + ?Sized>(&mut self, source: &S) -> Result<&str> {
        if self.remaining() == 0 {
            self.refill(source)?;
        }
        let id = &self.ids[self.cursor];
        self.cursor += 1;
        Ok(id)
    }

    fn refill<S: BatchSource + ?Sized>(&mut self, source: &S) -> Result<()> {
        let ids = source.list()?;
        if ids.is_empty() {
            return Err(Error::EmptyPool {
                dir: source.location().to_owned(),
            });
        }
        self.ids = ids;
        self.ids.shuffle(&mut self.rng);
        self.cursor = 0;
        log::trace!("Refilled batch pool with {} batches", self.ids.len());
        Ok(())
    }
}

impl Default for BatchPool {
    fn default() -> Self {
        Self::new()
    }
}
