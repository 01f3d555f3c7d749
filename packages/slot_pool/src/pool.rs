use std::fmt;
use std::ptr::NonNull;
use std::sync::atomic::{AtomicPtr, AtomicUsize, Ordering};
use std::sync::Arc;

use backoff_lock::RawBackoffLock;

use crate::handle::PoolBox;
use crate::slab::{allocate_slab, free_slab_chain, SlabHeader, Slot};
use crate::SlotPoolBuilder;

/// How many slots a slab holds when the builder is not told otherwise.
#[cfg(not(miri))]
pub(crate) const DEFAULT_SLAB_CAPACITY: usize = 4096;

// Under Miri we keep slabs small because Miri test runtime scales with memory use.
#[cfg(miri)]
pub(crate) const DEFAULT_SLAB_CAPACITY: usize = 16;

/// A multi-slab object pool handing out [`PoolBox<T>`] owning pointers.
///
/// Allocation pops a slot from a lock-free LIFO free stack; deallocation pushes it
/// back. When the stack is empty a new slab is linked into the chain under a spin
/// lock (taken once per slab, not per allocation) and its slots seed the stack.
///
/// The handle is a cheap clone ([`Arc`] internally). Every outstanding [`PoolBox`]
/// also keeps the backing storage alive, so slabs are released only when the pool
/// handle *and* all boxes are gone - there is no teardown-order hazard.
///
/// A slab capacity of zero turns the pool into a passthrough for the global
/// allocator; see the crate docs.
///
/// # Example
///
/// ```rust
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::<u32>::builder().slab_capacity(8).build();
///
/// let a = pool.insert(1);
/// let b = pool.insert(2);
///
/// assert_eq!(*a + *b, 3);
/// assert_eq!(pool.len(), 2);
/// assert_eq!(pool.capacity(), 8);
///
/// drop(a);
/// drop(b);
/// assert_eq!(pool.len(), 0);
/// ```
pub struct SlotPool<T> {
    pub(crate) core: Arc<PoolCore<T>>,
}

impl<T> SlotPool<T> {
    /// Creates a builder for configuring and constructing a [`SlotPool`].
    #[must_use]
    pub fn builder() -> SlotPoolBuilder<T> {
        SlotPoolBuilder::new()
    }

    /// Creates a pool with the default slab capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::builder().build()
    }

    pub(crate) fn with_slab_capacity(slab_capacity: usize) -> Self {
        Self {
            core: Arc::new(PoolCore {
                free_head: AtomicPtr::new(std::ptr::null_mut()),
                slab_head: AtomicPtr::new(std::ptr::null_mut()),
                grow_lock: RawBackoffLock::new(),
                slab_capacity,
                slab_count: AtomicUsize::new(0),
                live: AtomicUsize::new(0),
            }),
        }
    }

    /// Moves a value into the pool, returning an owning pointer to it.
    ///
    /// The value lives at a stable address until the returned [`PoolBox`] is dropped
    /// or consumed.
    ///
    /// # Example
    ///
    /// ```rust
    /// use slot_pool::SlotPool;
    ///
    /// let pool = SlotPool::<String>::new();
    /// let boxed = pool.insert("payload".to_string());
    ///
    /// assert_eq!(boxed.len(), 7);
    /// assert_eq!(boxed.into_inner(), "payload");
    /// ```
    #[must_use]
    pub fn insert(&self, value: T) -> PoolBox<T> {
        if self.core.slab_capacity == 0 {
            return PoolBox::from_heap(Box::new(Slot::with_value(value)));
        }

        let slot = self.core.pop_free_slot();

        // SAFETY: The slot was just popped off the free stack, so it is vacant and
        // no other thread can reach it until we publish it via the box.
        unsafe {
            slot.as_ref().write_value(value);
        }

        self.core.live.fetch_add(1, Ordering::Relaxed);

        PoolBox::from_pool(slot, self.clone())
    }

    /// The number of values currently alive in pool slots.
    ///
    /// Heap-passthrough allocations (slab capacity zero) are not counted.
    #[must_use]
    pub fn len(&self) -> usize {
        self.core.live.load(Ordering::Relaxed)
    }

    /// Whether no pool slot currently holds a value.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The total number of slots across all slabs.
    ///
    /// Grows by one slab capacity whenever the free stack runs dry; never shrinks.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.core
            .slab_count
            .load(Ordering::Relaxed)
            .saturating_mul(self.core.slab_capacity)
    }

    /// The number of slabs in the chain.
    #[must_use]
    pub fn slab_count(&self) -> usize {
        self.core.slab_count.load(Ordering::Relaxed)
    }

    /// The configured slots-per-slab count. Zero means slabs are disabled.
    #[must_use]
    pub fn slab_capacity(&self) -> usize {
        self.core.slab_capacity
    }
}

impl<T> Clone for SlotPool<T> {
    fn clone(&self) -> Self {
        Self {
            core: Arc::clone(&self.core),
        }
    }
}

impl<T> Default for SlotPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for SlotPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotPool")
            .field("slab_capacity", &self.core.slab_capacity)
            .field("slab_count", &self.slab_count())
            .field("len", &self.len())
            .finish()
    }
}

/// Shared state behind a [`SlotPool`] handle and its outstanding boxes.
pub(crate) struct PoolCore<T> {
    /// Head of the LIFO free stack, threaded through the vacant slots.
    free_head: AtomicPtr<Slot<T>>,

    /// Head of the slab chain. Written only under `grow_lock`; read during drop.
    slab_head: AtomicPtr<SlabHeader<T>>,

    /// Serializes slab-chain growth. Never taken on the allocate/deallocate hot path.
    grow_lock: RawBackoffLock,

    slab_capacity: usize,
    slab_count: AtomicUsize,
    live: AtomicUsize,
}

// SAFETY: The core owns its slabs and hands out each slot to at most one owner at a
// time; cross-thread handoff of slot contents is what requires `T: Send`.
unsafe impl<T: Send> Send for PoolCore<T> {}

// SAFETY: Shared access goes through atomics (free stack) and the grow lock; slot
// contents are only reachable through the single owning box.
unsafe impl<T: Send> Sync for PoolCore<T> {}

impl<T> PoolCore<T> {
    /// Pops a vacant slot, growing the slab chain if the free stack is empty.
    fn pop_free_slot(&self) -> NonNull<Slot<T>> {
        let mut head = self.free_head.load(Ordering::Acquire);
        loop {
            let Some(slot) = NonNull::new(head) else {
                self.grow();
                head = self.free_head.load(Ordering::Acquire);
                continue;
            };

            // A slot is removed from the stack before it can ever be pushed again, so
            // the same pointer is never on the stack twice at once and the unversioned
            // CAS suffices.
            //
            // SAFETY: Slots reachable from the free stack hold a link.
            let next = unsafe { slot.as_ref().next_free() };

            match self
                .free_head
                .compare_exchange_weak(head, next, Ordering::AcqRel, Ordering::Acquire)
            {
                Ok(_) => return slot,
                Err(actual) => head = actual,
            }
        }
    }

    /// Pushes a vacant slot onto the free stack.
    pub(crate) fn push_free_slot(&self, slot: NonNull<Slot<T>>) {
        let mut head = self.free_head.load(Ordering::Relaxed);
        loop {
            // SAFETY: The slot is vacant and exclusively ours until the CAS publishes it.
            unsafe {
                slot.as_ref().set_next_free(head);
            }

            match self.free_head.compare_exchange_weak(
                head,
                slot.as_ptr(),
                Ordering::Release,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(actual) => head = actual,
            }
        }

        self.live.fetch_sub(1, Ordering::Relaxed);
    }

    /// Links one new slab into the chain and seeds the free stack with its slots.
    #[cold]
    #[cfg_attr(test, mutants::skip)] // Mutations degenerate into unbounded memory growth or livelock.
    fn grow(&self) {
        self.grow_lock.lock();

        // Double-checked: another thread may have grown (or freed slots) while we
        // waited for the lock.
        if self.free_head.load(Ordering::Acquire).is_null() {
            let chain_head = self.slab_head.load(Ordering::Relaxed);
            let (header, first_slot, last_slot) =
                allocate_slab::<T>(self.slab_capacity, chain_head);

            self.slab_head.store(header.as_ptr(), Ordering::Relaxed);
            self.slab_count.fetch_add(1, Ordering::Relaxed);

            // Splice the pre-linked slot chain onto the shared stack. Deallocators may
            // be pushing concurrently, hence the CAS loop even under the grow lock.
            let mut head = self.free_head.load(Ordering::Relaxed);
            loop {
                // SAFETY: The new slab is unpublished, so its last slot is still ours.
                unsafe {
                    last_slot.as_ref().set_next_free(head);
                }

                match self.free_head.compare_exchange_weak(
                    head,
                    first_slot.as_ptr(),
                    Ordering::Release,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => break,
                    Err(actual) => head = actual,
                }
            }
        }

        self.grow_lock.unlock();
    }
}

impl<T> Drop for PoolCore<T> {
    fn drop(&mut self) {
        // The core drops only when the pool handle and every box are gone, so all
        // values have been dropped and every slot is vacant.
        debug_assert_eq!(self.live.load(Ordering::Relaxed), 0);

        let head = self.slab_head.load(Ordering::Relaxed);
        if !head.is_null() {
            // SAFETY: Sole owner; no live values remain in any slab.
            unsafe {
                free_slab_chain(head, self.slab_capacity);
            }
        }
    }
}
