use serde::{Deserialize, Serialize};

use std::fmt::Debug;

pub type WeightStorage = Storage;
pub type GradStorage = Storage;

pub use handle::Handle;
mod handle {
    use super::*;

    /// Generic handle for accesing blocks of memory stored within the matching Storage
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
    pub struct Handle {
        start: usize,
        end: usize,
    }

    impl Handle {
        pub(super) fn new(start: usize, end: usize) -> Self {
            Self { start, end }
        }

        pub fn start(&self) -> usize {
            self.start
        }

        pub fn end(&self) -> usize {
            self.end
        }

        pub fn len(&self) -> usize {
            self.end - self.start
        }

        pub fn is_empty(&self) -> bool {
            self.start == self.end
        }
    }
}

pub use allocator::Allocator;
mod allocator {
    use super::*;

    /// Hands out handles while a network is being connected and collects the initial parameter values.
    #[derive(Debug, Clone, Default)]
    pub struct Allocator {
        mem: Vec<f32>,
    }

    impl Allocator {
        pub fn new() -> Self {
            Self { mem: Vec::new() }
        }

        fn new_handle(&self, len: usize) -> Handle {
            let start = self.mem.len();
            Handle::new(start, start + len)
        }

        pub fn allocate_zeroed(&mut self, len: usize) -> Handle {
            let handle = self.new_handle(len);
            self.mem.resize(handle.end(), 0.);
            handle
        }

        pub fn allocate<I>(&mut self, len: usize, iter: I) -> Handle
        where
            I: Iterator<Item = f32>,
        {
            let len_before = self.mem.len();
            let handle = self.new_handle(len);
            self.mem.extend(iter.take(len));
            let received = self.mem.len() - len_before;
            assert_eq!(
                len, received,
                "Provided iterator did not yield enough elements. Expected: {}, Received: {}",
                len, received
            );
            handle
        }

        /// Number of floats allocated so far.
        pub fn len(&self) -> usize {
            self.mem.len()
        }

        pub fn is_empty(&self) -> bool {
            self.mem.is_empty()
        }

        pub fn finish(self) -> Storage {
            Storage::new(self.mem)
        }
    }
}

pub use storage::Storage;
mod storage {
    use super::*;

    /// Flat parameter (or gradient) buffer addressed through [Handle](super::Handle)s.
    #[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
    #[serde(transparent)]
    pub struct Storage {
        storage: Vec<f32>,
    }

    impl Storage {
        pub(super) fn new(storage: Vec<f32>) -> Self {
            Self { storage }
        }

        /// A storage of `len` zeros, used for gradient buffers matching a weight storage.
        pub fn zeroed(len: usize) -> Self {
            Self::new(vec![0.; len])
        }

        pub fn get(&self, handle: Handle) -> &[f32] {
            &self.storage[handle.start()..handle.end()]
        }

        pub fn get_mut(&mut self, handle: Handle) -> &mut [f32] {
            &mut self.storage[handle.start()..handle.end()]
        }

        /// Borrows the blocks of two handles mutably at the same time.
        /// Returns None if the handles overlap.
        pub fn get_pair_mut(&mut self, a: Handle, b: Handle) -> Option<(&mut [f32], &mut [f32])> {
            if a.end() <= b.start() {
                let (left, right) = self.storage.split_at_mut(b.start());
                Some((&mut left[a.start()..a.end()], &mut right[..b.len()]))
            } else if b.end() <= a.start() {
                let (left, right) = self.storage.split_at_mut(a.start());
                Some((&mut right[..a.len()], &mut left[b.start()..b.end()]))
            } else {
                None
            }
        }

        pub fn len(&self) -> usize {
            self.storage.len()
        }

        pub fn is_empty(&self) -> bool {
            self.storage.is_empty()
        }

        /// Overwrite the contents with zeros
        pub fn reset(&mut self) {
            self.storage.iter_mut().for_each(|f| *f = 0.);
        }

        /// Get a reference to the raw contents of the storage
        pub fn raw(&self) -> &[f32] {
            &self.storage
        }

        /// Get a mutable reference to the raw contents of the storage
        pub fn raw_mut(&mut self) -> &mut [f32] {
            &mut self.storage
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handles_are_contiguous() {
        let mut alloc = Allocator::new();
        let a = alloc.allocate(3, [1., 2., 3.].iter().copied());
        let b = alloc.allocate_zeroed(2);
        let storage = alloc.finish();

        assert_eq!(storage.get(a), &[1., 2., 3.]);
        assert_eq!(storage.get(b), &[0., 0.]);
        assert_eq!(storage.len(), 5);
    }

    #[test]
    fn pair_borrow_rejects_overlap() {
        let mut alloc = Allocator::new();
        let a = alloc.allocate_zeroed(3);
        let b = alloc.allocate_zeroed(2);
        let mut storage = alloc.finish();

        {
            let (left, right) = storage.get_pair_mut(b, a).unwrap();
            left[0] = 4.;
            right[2] = 1.;
        }
        assert_eq!(storage.raw(), &[0., 0., 1., 4., 0.]);
        assert!(storage.get_pair_mut(a, a).is_none());
    }

    #[test]
    #[should_panic]
    fn short_iterator_panics() {
        let mut alloc = Allocator::new();
        alloc.allocate(4, std::iter::once(1.));
    }
}
