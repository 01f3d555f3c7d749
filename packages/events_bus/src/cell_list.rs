//! The queue's internal cell storage: an intrusive singly linked list of
//! pool-allocated cells with O(1) push, pop and splice.

use slot_pool::PoolBox;

/// One queued event: the key, the payload, and the intrusive forward link.
///
/// A cell is always reachable from exactly one place: the staging list, the free
/// list, or a local list inside an in-progress enqueue or drain.
pub(crate) struct QueueCell<K, Args> {
    pub(crate) key: K,
    pub(crate) args: Args,
    next: Option<PoolBox<QueueCell<K, Args>>>,
}

impl<K, Args> QueueCell<K, Args> {
    pub(crate) fn new(key: K, args: Args) -> Self {
        Self {
            key,
            args,
            next: None,
        }
    }
}

/// A singly linked list of cells, linked through the cells themselves.
///
/// Ownership runs through the `head` box chain; `tail` is a raw cursor to the last
/// cell for O(1) appends. The raw pointer stays valid because a [`PoolBox`] never
/// moves its pointee.
pub(crate) struct CellList<K, Args> {
    head: Option<PoolBox<QueueCell<K, Args>>>,
    tail: *mut QueueCell<K, Args>,
    len: usize,
}

// SAFETY: The raw tail pointer aliases a cell owned by `head`'s chain; the list as a
// whole is a single-owner structure, so sending it just sends the cells.
unsafe impl<K: Send, Args: Send> Send for CellList<K, Args> {}

impl<K, Args> CellList<K, Args> {
    pub(crate) const fn new() -> Self {
        Self {
            head: None,
            tail: std::ptr::null_mut(),
            len: 0,
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.len
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// Appends one cell at the tail.
    pub(crate) fn push_back(&mut self, mut cell: PoolBox<QueueCell<K, Args>>) {
        cell.next = None;
        let raw: *mut QueueCell<K, Args> = &mut *cell;

        if self.tail.is_null() {
            self.head = Some(cell);
        } else {
            // SAFETY: A non-null tail points at the chain's last cell, which is kept
            // alive (and pinned in place) by its owning box.
            unsafe {
                (*self.tail).next = Some(cell);
            }
        }

        self.tail = raw;
        self.len += 1;
    }

    /// Detaches and returns the first cell.
    pub(crate) fn pop_front(&mut self) -> Option<PoolBox<QueueCell<K, Args>>> {
        let mut cell = self.head.take()?;
        self.head = cell.next.take();
        if self.head.is_none() {
            self.tail = std::ptr::null_mut();
        }
        self.len -= 1;
        Some(cell)
    }

    /// A view of the first cell, if any.
    pub(crate) fn front(&self) -> Option<&QueueCell<K, Args>> {
        self.head.as_deref()
    }

    /// Detaches the entire list, leaving this one empty.
    pub(crate) fn take_all(&mut self) -> Self {
        std::mem::take(self)
    }

    /// Splices all of `other`'s cells onto this list's tail.
    pub(crate) fn append(&mut self, mut other: Self) {
        if other.is_empty() {
            return;
        }

        if self.tail.is_null() {
            *self = other;
            return;
        }

        // SAFETY: See `push_back`; the tail cell is alive and stable.
        unsafe {
            (*self.tail).next = other.head.take();
        }
        self.tail = other.tail;
        self.len += other.len;
    }
}

impl<K, Args> Default for CellList<K, Args> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Args> Drop for CellList<K, Args> {
    fn drop(&mut self) {
        // Detach cell by cell; dropping the head chain recursively would overflow
        // the stack on a long backlog.
        while self.pop_front().is_some() {}
    }
}

#[cfg(test)]
mod tests {
    use slot_pool::SlotPool;

    use super::*;

    fn pool() -> SlotPool<QueueCell<u32, String>> {
        SlotPool::builder().slab_capacity(8).build()
    }

    fn cell(
        pool: &SlotPool<QueueCell<u32, String>>,
        key: u32,
        payload: &str,
    ) -> PoolBox<QueueCell<u32, String>> {
        pool.insert(QueueCell::new(key, payload.to_string()))
    }

    fn keys(list: &mut CellList<u32, String>) -> Vec<u32> {
        let mut drained = Vec::new();
        while let Some(cell) = list.pop_front() {
            drained.push(cell.key);
        }
        drained
    }

    #[test]
    fn push_pop_preserves_fifo_order() {
        let pool = pool();
        let mut list = CellList::new();

        list.push_back(cell(&pool, 1, "a"));
        list.push_back(cell(&pool, 2, "b"));
        list.push_back(cell(&pool, 3, "c"));

        assert_eq!(list.len(), 3);
        assert_eq!(list.front().map(|c| c.key), Some(1));
        assert_eq!(keys(&mut list), [1, 2, 3]);
        assert!(list.is_empty());
    }

    #[test]
    fn take_all_leaves_empty_list() {
        let pool = pool();
        let mut list = CellList::new();

        list.push_back(cell(&pool, 1, "a"));
        list.push_back(cell(&pool, 2, "b"));

        let mut taken = list.take_all();

        assert!(list.is_empty());
        assert_eq!(list.len(), 0);
        assert_eq!(keys(&mut taken), [1, 2]);

        // The emptied list is immediately reusable.
        list.push_back(cell(&pool, 9, "z"));
        assert_eq!(keys(&mut list), [9]);
    }

    #[test]
    fn append_splices_in_constant_shape() {
        let pool = pool();

        let mut front = CellList::new();
        front.push_back(cell(&pool, 1, "a"));
        front.push_back(cell(&pool, 2, "b"));

        let mut back = CellList::new();
        back.push_back(cell(&pool, 3, "c"));

        front.append(back);
        assert_eq!(front.len(), 3);

        // Appending onto an empty list adopts the other list wholesale.
        let mut empty = CellList::new();
        empty.append(front.take_all());
        assert_eq!(keys(&mut empty), [1, 2, 3]);

        // Appending an empty list is a no-op.
        let mut base = CellList::new();
        base.push_back(cell(&pool, 7, "g"));
        base.append(CellList::new());
        assert_eq!(keys(&mut base), [7]);
    }

    #[test]
    fn cells_move_between_lists_without_reallocation() {
        let pool = pool();
        let mut staging = CellList::new();

        staging.push_back(cell(&pool, 1, "x"));
        let address = std::ptr::from_ref(staging.front().unwrap()) as usize;

        let mut free = CellList::new();
        free.append(staging.take_all());

        let moved = std::ptr::from_ref(free.front().unwrap()) as usize;
        assert_eq!(address, moved);
        assert_eq!(pool.len(), 1);

        drop(free);
        assert_eq!(pool.len(), 0);
    }

    #[test]
    fn long_list_drops_iteratively() {
        let pool = SlotPool::<QueueCell<u32, String>>::builder()
            .slab_capacity(1024)
            .build();
        let mut list = CellList::new();

        for i in 0..100_000 {
            list.push_back(pool.insert(QueueCell::new(i, String::new())));
        }

        drop(list);
        assert_eq!(pool.len(), 0);
    }
}
