use std::fmt;
use std::mem::ManuallyDrop;
use std::ops::{Deref, DerefMut};
use std::ptr::NonNull;

use crate::slab::Slot;
use crate::SlotPool;

/// An owning pointer to a value stored in a [`SlotPool`] slot.
///
/// Behaves like a `Box<T>`: dereferences to the value, drops it when dropped, and can
/// surrender it via [`into_inner()`](Self::into_inner). Dropping the box additionally
/// recycles its slot onto the pool's free stack.
///
/// The box holds a pool handle, so the backing slab outlives the box even if the
/// [`SlotPool`] itself is dropped first.
///
/// # Example
///
/// ```rust
/// use slot_pool::SlotPool;
///
/// let pool = SlotPool::<Vec<u32>>::new();
///
/// let mut numbers = pool.insert(vec![1, 2]);
/// numbers.push(3);
///
/// assert_eq!(numbers.into_inner(), vec![1, 2, 3]);
/// ```
pub struct PoolBox<T> {
    slot: NonNull<Slot<T>>,
    origin: Origin<T>,
}

enum Origin<T> {
    /// The slot lives in one of the pool's slabs and returns to its free stack.
    Pooled(SlotPool<T>),

    /// The slot is its own heap allocation (slab capacity zero) and is freed outright.
    Heap,
}

// SAFETY: The box is the sole owner of the slot's value; sending it just sends the value.
unsafe impl<T: Send> Send for PoolBox<T> {}

// SAFETY: Shared access to the box only yields `&T`.
unsafe impl<T: Sync> Sync for PoolBox<T> {}

impl<T> PoolBox<T> {
    pub(crate) fn from_pool(slot: NonNull<Slot<T>>, pool: SlotPool<T>) -> Self {
        Self {
            slot,
            origin: Origin::Pooled(pool),
        }
    }

    pub(crate) fn from_heap(slot: Box<Slot<T>>) -> Self {
        Self {
            slot: NonNull::from(Box::leak(slot)),
            origin: Origin::Heap,
        }
    }

    /// Moves the value out, releasing the slot.
    #[must_use]
    pub fn into_inner(self) -> T {
        let this = ManuallyDrop::new(self);

        // SAFETY: The box owns a live value; `this` is never dropped, so the value
        // cannot be touched through the slot again.
        let value = unsafe { this.slot.as_ref().take_value() };

        // SAFETY: Reading the origin out of the manually-dropped shell exactly once;
        // the shell's drop glue never runs, so this is the only owner.
        let origin = unsafe { std::ptr::read(&this.origin) };
        release_slot(this.slot, &origin);

        value
    }
}

/// Returns a now-vacant slot to wherever it came from.
fn release_slot<T>(slot: NonNull<Slot<T>>, origin: &Origin<T>) {
    match origin {
        Origin::Pooled(pool) => pool.core.push_free_slot(slot),
        Origin::Heap => {
            // SAFETY: Heap-origin slots were created via `Box::leak` and the value has
            // already been moved or dropped out of the slot, so only memory is freed
            // (the slot type carries no drop glue of its own).
            drop(unsafe { Box::from_raw(slot.as_ptr()) });
        }
    }
}

impl<T> Deref for PoolBox<T> {
    type Target = T;

    fn deref(&self) -> &T {
        // SAFETY: The box owns a live value for its entire lifetime.
        unsafe { self.slot.as_ref().value() }
    }
}

impl<T> DerefMut for PoolBox<T> {
    fn deref_mut(&mut self) -> &mut T {
        // SAFETY: The box owns a live value; `&mut self` proves exclusivity.
        unsafe { self.slot.as_ref().value_mut() }
    }
}

impl<T> Drop for PoolBox<T> {
    fn drop(&mut self) {
        // SAFETY: The box owns a live value and is being dropped, so the value is
        // dropped exactly once and the slot becomes vacant.
        unsafe {
            self.slot.as_ref().drop_value();
        }

        release_slot(self.slot, &self.origin);
    }
}

impl<T: fmt::Debug> fmt::Debug for PoolBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&**self, f)
    }
}

impl<T: fmt::Display> fmt::Display for PoolBox<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&**self, f)
    }
}
