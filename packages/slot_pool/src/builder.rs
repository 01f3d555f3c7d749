use std::marker::PhantomData;

use crate::pool::DEFAULT_SLAB_CAPACITY;
use crate::SlotPool;

/// Configures and constructs a [`SlotPool`].
///
/// # Example
///
/// ```rust
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::<u64>::builder().slab_capacity(8192).build();
///
/// assert_eq!(pool.slab_capacity(), 8192);
/// ```
#[derive(Debug)]
#[must_use]
pub struct SlotPoolBuilder<T> {
    slab_capacity: usize,
    _item: PhantomData<fn() -> T>,
}

impl<T> SlotPoolBuilder<T> {
    pub(crate) fn new() -> Self {
        Self {
            slab_capacity: DEFAULT_SLAB_CAPACITY,
            _item: PhantomData,
        }
    }

    /// Sets how many slots each slab holds.
    ///
    /// Larger slabs amortize growth better under sustained contention; smaller slabs
    /// waste less memory on mostly-idle pools. Zero disables the slabs entirely and
    /// routes every allocation through the global allocator.
    pub fn slab_capacity(mut self, slab_capacity: usize) -> Self {
        self.slab_capacity = slab_capacity;
        self
    }

    /// Builds the pool.
    #[must_use]
    pub fn build(self) -> SlotPool<T> {
        SlotPool::with_slab_capacity(self.slab_capacity)
    }
}
