use std::alloc::{alloc, dealloc, handle_alloc_error, Layout};
use std::cell::UnsafeCell;
use std::mem::ManuallyDrop;
use std::ptr::NonNull;

/// One pool slot: either a live `T` or a link in the free stack.
///
/// The two roles never overlap. A slot on the free stack holds only the `next_free`
/// pointer; a slot handed out via `PoolBox` holds only the value. The pool's free-stack
/// protocol (pop before publish, push after the value is dropped) is what keeps the
/// roles disjoint - the slot itself carries no discriminant.
pub(crate) struct Slot<T> {
    body: UnsafeCell<SlotBody<T>>,
}

union SlotBody<T> {
    next_free: *mut Slot<T>,
    value: ManuallyDrop<T>,
}

impl<T> Slot<T> {
    /// Creates a standalone slot holding a value, for the unpooled (heap) path.
    pub(crate) fn with_value(value: T) -> Self {
        Self {
            body: UnsafeCell::new(SlotBody {
                value: ManuallyDrop::new(value),
            }),
        }
    }

    /// Writes a value into the slot.
    ///
    /// # Safety
    ///
    /// The slot must currently be vacant (off the free stack, no live value), and the
    /// caller must have exclusive access to it.
    pub(crate) unsafe fn write_value(&self, value: T) {
        // SAFETY: Exclusive access per the caller's guarantee; the previous occupant
        // (a free-stack link) needs no destruction.
        unsafe {
            (*self.body.get()).value = ManuallyDrop::new(value);
        }
    }

    /// Returns a shared reference to the slot's value.
    ///
    /// # Safety
    ///
    /// The slot must hold a live value and no exclusive reference to it may exist.
    pub(crate) unsafe fn value(&self) -> &T {
        // SAFETY: Live value per the caller's guarantee.
        unsafe { &(*self.body.get()).value }
    }

    /// Returns an exclusive reference to the slot's value.
    ///
    /// # Safety
    ///
    /// The slot must hold a live value and the caller must have exclusive access.
    #[allow(clippy::mut_from_ref)] // The `PoolBox` owner is the exclusivity proof.
    pub(crate) unsafe fn value_mut(&self) -> &mut T {
        // SAFETY: Live value and exclusive access per the caller's guarantee.
        unsafe { &mut (*self.body.get()).value }
    }

    /// Moves the value out of the slot, leaving it vacant.
    ///
    /// # Safety
    ///
    /// The slot must hold a live value and the caller must have exclusive access.
    /// The value must not be read or dropped through this slot again.
    pub(crate) unsafe fn take_value(&self) -> T {
        // SAFETY: Live value and exclusive access per the caller's guarantee.
        unsafe { ManuallyDrop::take(&mut (*self.body.get()).value) }
    }

    /// Drops the value in place, leaving the slot vacant.
    ///
    /// # Safety
    ///
    /// Same contract as [`take_value`](Self::take_value).
    pub(crate) unsafe fn drop_value(&self) {
        // SAFETY: Live value and exclusive access per the caller's guarantee.
        unsafe {
            ManuallyDrop::drop(&mut (*self.body.get()).value);
        }
    }

    /// Stores the free-stack link.
    ///
    /// # Safety
    ///
    /// The slot must be vacant and not yet published on the free stack.
    pub(crate) unsafe fn set_next_free(&self, next: *mut Slot<T>) {
        // SAFETY: Vacant and unpublished per the caller's guarantee, so no other
        // thread can observe the slot while we write the link.
        unsafe {
            (*self.body.get()).next_free = next;
        }
    }

    /// Reads the free-stack link.
    ///
    /// # Safety
    ///
    /// The slot must be on the free stack (its body is a link, not a value).
    pub(crate) unsafe fn next_free(&self) -> *mut Slot<T> {
        // SAFETY: On-stack slots hold a link per the type's role discipline.
        unsafe { (*self.body.get()).next_free }
    }
}

/// Header of one slab allocation; the slot array follows it in the same allocation.
pub(crate) struct SlabHeader<T> {
    next: *mut SlabHeader<T>,
}

/// Computes the combined layout of a slab and the byte offset of its slot array.
fn slab_layout<T>(capacity: usize) -> (Layout, usize) {
    let header = Layout::new::<SlabHeader<T>>();
    let slots = Layout::array::<Slot<T>>(capacity).expect("slab slot array layout must be calculable");
    header
        .extend(slots)
        .expect("slab header + slot array layout must be calculable")
}

/// Allocates a slab, links it at the head of the chain and returns the new chain head
/// together with the slab's slot range, already threaded into a local free chain
/// (slot 0 links to slot 1 and so on, last slot links to null).
///
/// The caller is expected to splice the returned chain onto the shared free stack.
pub(crate) fn allocate_slab<T>(
    capacity: usize,
    chain_head: *mut SlabHeader<T>,
) -> (NonNull<SlabHeader<T>>, NonNull<Slot<T>>, NonNull<Slot<T>>) {
    debug_assert!(capacity > 0);

    let (layout, slots_offset) = slab_layout::<T>(capacity);

    // SAFETY: The layout has non-zero size: the header is a pointer and capacity > 0.
    let raw = unsafe { alloc(layout) };
    let Some(header) = NonNull::new(raw.cast::<SlabHeader<T>>()) else {
        handle_alloc_error(layout);
    };

    // SAFETY: Freshly allocated, correctly laid out for a header at offset zero.
    unsafe {
        header.as_ptr().write(SlabHeader { next: chain_head });
    }

    // SAFETY: The layout reserves `capacity` slots starting at `slots_offset`.
    let first_slot = unsafe { raw.add(slots_offset).cast::<Slot<T>>() };

    for index in 0..capacity {
        // SAFETY: `index` is within the slot array per the layout calculation.
        let slot = unsafe { first_slot.add(index) };
        let next = if index + 1 < capacity {
            // SAFETY: Still within the slot array.
            unsafe { first_slot.add(index + 1) }
        } else {
            std::ptr::null_mut()
        };

        // SAFETY: The slot is ours alone until the chain is published.
        unsafe {
            (*slot).set_next_free(next);
        }
    }

    // SAFETY: capacity > 0, so the first and last slots exist.
    let last_slot = unsafe { first_slot.add(capacity - 1) };

    (
        header,
        // SAFETY: `first_slot` came from a successful allocation, so it is non-null.
        unsafe { NonNull::new_unchecked(first_slot) },
        // SAFETY: Derived from the same non-null allocation.
        unsafe { NonNull::new_unchecked(last_slot) },
    )
}

/// Frees an entire slab chain.
///
/// # Safety
///
/// No slot in any slab of the chain may hold a live value or be reachable from the
/// free stack afterwards; the caller must be the sole owner of the chain.
pub(crate) unsafe fn free_slab_chain<T>(mut head: *mut SlabHeader<T>, capacity: usize) {
    let (layout, _) = slab_layout::<T>(capacity);

    while !head.is_null() {
        // SAFETY: Chain links are only ever written to point at live slabs, and the
        // caller owns the chain exclusively.
        let next = unsafe { (*head).next };

        // SAFETY: The slab was allocated with exactly this layout, and the caller
        // guarantees no slot is live, so nothing needs dropping first.
        unsafe {
            dealloc(head.cast::<u8>(), layout);
        }

        head = next;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slab_chain_allocate_and_free() {
        let (header, first, last) = allocate_slab::<u64>(4, std::ptr::null_mut());

        // The local free chain threads all four slots in order.
        let mut cursor = first.as_ptr();
        let mut seen = 0;
        while !cursor.is_null() {
            seen += 1;
            // SAFETY: Fresh slab; every slot holds a link.
            cursor = unsafe { (*cursor).next_free() };
        }
        assert_eq!(seen, 4);

        // SAFETY: The last slot terminates the chain.
        assert!(unsafe { last.as_ref().next_free() }.is_null());

        // SAFETY: No live values were ever written.
        unsafe { free_slab_chain::<u64>(header.as_ptr(), 4) };
    }

    #[test]
    fn chained_slabs_free_together() {
        let (first_header, ..) = allocate_slab::<String>(2, std::ptr::null_mut());
        let (second_header, ..) = allocate_slab::<String>(2, first_header.as_ptr());

        // SAFETY: Both slabs are vacant; the second header links to the first.
        unsafe { free_slab_chain::<String>(second_header.as_ptr(), 2) };
    }
}
