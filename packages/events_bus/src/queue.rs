//! An asynchronous event queue: producers enqueue, a consumer drains and dispatches.

use std::fmt;
use std::mem;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{Duration, Instant};

#[cfg(debug_assertions)]
use std::sync::atomic::AtomicBool;

use crossbeam_utils::CachePadded;
use slot_pool::{PoolBox, SlotPool};

use crate::callback_list::InsertOrder;
use crate::cell_list::{CellList, QueueCell};
use crate::dispatcher::{EventDispatcher, EventHandle, FilterHandle};
use crate::keyed_map::EventKey;
use crate::locking::PolicyMutex;
use crate::policy::{DefaultPolicy, Policy};
use crate::waiter::WaitSignal;

/// Buffers events from any number of producer threads and dispatches them on the
/// consumer's thread.
///
/// The queue owns an [`EventDispatcher`]; listener registration forwards to it.
/// Producers call [`enqueue()`](Self::enqueue), which stores the key and payload
/// into a cell and appends it to the staging list. The consumer calls
/// [`process()`](Self::process) (or one of its variants), which splices the whole
/// staging list out under its lock and dispatches cell by cell with no lock held.
///
/// Drained cells are recycled through an internal free list - a steady-state
/// workload enqueues without allocating. Cell acquisition only ever *tries* the
/// free-list lock, so producers never serialize on it.
///
/// The staging lock, free-list lock, pending counter and wait signal each live on
/// their own cache line to keep producer and consumer traffic from false sharing.
///
/// # Ordering
///
/// Within one drain, cells dispatch in enqueue order across all keys. Order between
/// producers is whatever order their enqueues won the staging lock. Draining is
/// single-consumer: concurrent `process` calls on the same queue are a contract
/// violation (checked in debug builds), though memory safety is preserved.
///
/// # Payload retention
///
/// A recycled cell keeps its last key and payload until a later enqueue overwrites
/// them or the queue is dropped. Payloads holding scarce resources should release
/// them in the listener rather than rely on prompt destruction.
///
/// # Example
///
/// ```rust
/// use events_bus::EventQueue;
///
/// let queue = EventQueue::<u8, String>::new();
///
/// let mut received = Vec::new();
///
/// queue.enqueue(1, "first".to_string());
/// queue.enqueue(2, "second".to_string());
///
/// // Drain without listeners via the visitor; or register listeners and `process()`.
/// assert!(queue.process_with(|key, payload| received.push((*key, payload.clone()))));
///
/// assert_eq!(received, [(1, "first".to_string()), (2, "second".to_string())]);
/// ```
pub struct EventQueue<K: EventKey, Args, P: Policy = DefaultPolicy> {
    dispatcher: EventDispatcher<K, Args, P>,

    staging: CachePadded<P::Mutex<CellList<K, Args>>>,
    free: CachePadded<P::Mutex<CellList<K, Args>>>,

    /// Events enqueued and not yet dispatched (including cells spliced into an
    /// in-progress drain).
    pending: CachePadded<AtomicUsize>,

    signal: CachePadded<WaitSignal>,

    /// Backing storage for cells; slab capacity comes from the policy.
    pool: SlotPool<QueueCell<K, Args>>,

    #[cfg(debug_assertions)]
    draining: AtomicBool,
}

impl<K, Args, P> EventQueue<K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    /// Creates an empty queue with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            dispatcher: EventDispatcher::new(),
            staging: CachePadded::new(P::Mutex::new(CellList::new())),
            free: CachePadded::new(P::Mutex::new(CellList::new())),
            pending: CachePadded::new(AtomicUsize::new(0)),
            signal: CachePadded::new(WaitSignal::new()),
            pool: SlotPool::builder()
                .slab_capacity(P::CELL_SLAB_CAPACITY)
                .build(),
            #[cfg(debug_assertions)]
            draining: AtomicBool::new(false),
        }
    }

    /// The dispatcher this queue drains into.
    #[must_use]
    pub fn dispatcher(&self) -> &EventDispatcher<K, Args, P> {
        &self.dispatcher
    }

    /// Buffers one event for a later drain.
    ///
    /// Wait-free with respect to the free list (it is only `try_lock`ed); the only
    /// blocking is the short staging-list append. Safe to call from listeners
    /// running inside a drain of this same queue.
    pub fn enqueue(&self, key: K, args: Args) {
        let cell = self.acquire_cell(key, args);

        {
            let mut staging = self.staging.lock();
            staging.push_back(cell);
            self.pending.fetch_add(1, Ordering::AcqRel);
        }

        // After the lock release, and only if a consumer is actually blocked.
        self.signal.notify_one();
    }

    /// Dispatches every event that was enqueued before this call, in enqueue order.
    ///
    /// Returns whether anything was dispatched. If a listener panics, the panic
    /// propagates: events already dispatched stay dispatched, the not-yet-dispatched
    /// remainder of the drained batch is discarded and its cells are recycled.
    pub fn process(&self) -> bool {
        let drained = self.staging.lock().take_all();
        if drained.is_empty() {
            return false;
        }

        self.drain(drained, |key, args| self.dispatcher.dispatch(key, args));
        true
    }

    /// Dispatches the single oldest event, if any. Returns whether one was dispatched.
    pub fn process_one(&self) -> bool {
        let Some(cell) = self.staging.lock().pop_front() else {
            return false;
        };

        let mut drained = CellList::new();
        drained.push_back(cell);
        self.drain(drained, |key, args| self.dispatcher.dispatch(key, args));
        true
    }

    /// Drains every pending event into `visitor` instead of the dispatcher.
    ///
    /// This bypasses the key lookup, the dispatcher's shared lock, and the
    /// type-erased listener calls - the zero-indirection path for a consumer that
    /// wants one statically known `match` on the key. Returns whether anything was
    /// drained.
    pub fn process_with(&self, mut visitor: impl FnMut(&K, &Args)) -> bool {
        let drained = self.staging.lock().take_all();
        if drained.is_empty() {
            return false;
        }

        self.drain(drained, &mut visitor);
        true
    }

    /// Drains the single oldest event into `visitor`, if any.
    pub fn process_one_with(&self, mut visitor: impl FnMut(&K, &Args)) -> bool {
        let Some(cell) = self.staging.lock().pop_front() else {
            return false;
        };

        let mut drained = CellList::new();
        drained.push_back(cell);
        self.drain(drained, &mut visitor);
        true
    }

    /// Discards every pending event without dispatching, recycling the cells.
    pub fn clear(&self) {
        let drained = self.staging.lock().take_all();
        if drained.is_empty() {
            return;
        }

        self.pending.fetch_sub(drained.len(), Ordering::AcqRel);
        self.free.lock().append(drained);
    }

    /// The number of events enqueued and not yet dispatched.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Whether no events are waiting to be dispatched.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Blocks the calling thread until at least one event is pending.
    ///
    /// Waiting is adaptive: a bounded spin, then a bounded run of cooperative
    /// yields, then a condition-variable block. An event enqueued and drained by
    /// another consumer is not re-observed; use a single consumer.
    pub fn wait(&self) {
        let ready = self
            .signal
            .wait_until(None, || self.pending.load(Ordering::Acquire) > 0);
        debug_assert!(ready);
    }

    /// Like [`wait()`](Self::wait), but gives up after `timeout`.
    ///
    /// Returns whether an event was pending when the wait ended.
    pub fn wait_for(&self, timeout: Duration) -> bool {
        self.signal.wait_until(Some(Instant::now() + timeout), || {
            self.pending.load(Ordering::Acquire) > 0
        })
    }

    /// Registers a listener on the owned dispatcher; see
    /// [`EventDispatcher::append_listener`].
    pub fn append_listener<F>(&self, key: K, listener: F) -> EventHandle<K, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.dispatcher.append_listener(key, listener)
    }

    /// Registers a listener at the front of its key's list; see
    /// [`EventDispatcher::prepend_listener`].
    pub fn prepend_listener<F>(&self, key: K, listener: F) -> EventHandle<K, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.dispatcher.prepend_listener(key, listener)
    }

    /// Registers a listener that also receives the event key; see
    /// [`EventDispatcher::append_listener_with_key`].
    pub fn append_listener_with_key<F>(&self, key: K, listener: F) -> EventHandle<K, Args>
    where
        F: Fn(&K, &Args) + Send + Sync + 'static,
    {
        self.dispatcher.append_listener_with_key(key, listener)
    }

    /// Registers a listener next to an existing one; see
    /// [`EventDispatcher::insert_listener`].
    pub fn insert_listener<F>(
        &self,
        listener: F,
        anchor: &EventHandle<K, Args>,
        order: InsertOrder,
    ) -> EventHandle<K, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.dispatcher.insert_listener(listener, anchor, order)
    }

    /// Removes a listener; see [`EventDispatcher::remove_listener`].
    pub fn remove_listener(&self, handle: &EventHandle<K, Args>) -> bool {
        self.dispatcher.remove_listener(handle)
    }

    /// Registers a dispatch filter; see [`EventDispatcher::append_filter`].
    pub fn append_filter<F>(&self, filter: F) -> FilterHandle
    where
        F: Fn(&K, &Args) -> bool + Send + Sync + 'static,
    {
        self.dispatcher.append_filter(filter)
    }

    /// Removes a dispatch filter; see [`EventDispatcher::remove_filter`].
    pub fn remove_filter(&self, handle: &FilterHandle) -> bool {
        self.dispatcher.remove_filter(handle)
    }

    /// Dispatches synchronously through the owned dispatcher, bypassing the queue.
    pub fn dispatch(&self, key: &K, args: &Args) {
        self.dispatcher.dispatch(key, args);
    }

    /// Pops a recycled cell if the free list is uncontended and non-empty; falls
    /// back to the pool.
    fn acquire_cell(&self, key: K, args: Args) -> PoolBox<QueueCell<K, Args>> {
        if let Some(mut free) = self.free.try_lock() {
            if let Some(mut cell) = free.pop_front() {
                drop(free);
                // Overwrite in place; the recycled cell's stale key and payload are
                // dropped here, not at drain time.
                cell.key = key;
                cell.args = args;
                return cell;
            }
        }

        self.pool.insert(QueueCell::new(key, args))
    }

    /// Delivers a drained batch, recycling the cells afterwards even if `deliver`
    /// panics.
    fn drain(&self, drained: CellList<K, Args>, mut deliver: impl FnMut(&K, &Args)) {
        #[cfg(debug_assertions)]
        let _single_consumer = DrainScope::enter(&self.draining);

        let mut guard = DrainGuard {
            queue: self,
            remaining: drained,
            recycled: CellList::new(),
        };

        while let Some(cell) = guard.remaining.front() {
            // The cell stays at the head of `remaining` during delivery so that a
            // panic recycles it along with the rest of the batch.
            deliver(&cell.key, &cell.args);
            guard.consume_front();
        }
    }
}

impl<K, Args, P> Default for EventQueue<K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Args, P> fmt::Debug for EventQueue<K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventQueue")
            .field("pending", &self.len())
            .field("dispatcher", &self.dispatcher)
            .finish()
    }
}

/// Returns a drained batch to the free list when the drain ends, normally or by
/// panic, and settles the pending counter for undelivered cells.
struct DrainGuard<'q, K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    queue: &'q EventQueue<K, Args, P>,
    remaining: CellList<K, Args>,
    recycled: CellList<K, Args>,
}

impl<K, Args, P> DrainGuard<'_, K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    fn consume_front(&mut self) {
        if let Some(cell) = self.remaining.pop_front() {
            self.queue.pending.fetch_sub(1, Ordering::AcqRel);
            self.recycled.push_back(cell);
        }
    }
}

impl<K, Args, P> Drop for DrainGuard<'_, K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    fn drop(&mut self) {
        // On a panic path, undelivered cells are discarded: their events ran
        // at most once, which here means not at all.
        let undelivered = self.remaining.len();
        if undelivered > 0 {
            self.queue.pending.fetch_sub(undelivered, Ordering::AcqRel);
        }

        let mut free = self.queue.free.lock();
        free.append(mem::take(&mut self.recycled));
        free.append(mem::take(&mut self.remaining));
    }
}

/// Debug-build witness that at most one drain is in flight.
#[cfg(debug_assertions)]
struct DrainScope<'q> {
    flag: &'q AtomicBool,
}

#[cfg(debug_assertions)]
impl<'q> DrainScope<'q> {
    fn enter(flag: &'q AtomicBool) -> Self {
        assert!(
            !flag.swap(true, Ordering::Acquire),
            "EventQueue drains are single-consumer; a drain is already in progress"
        );
        Self { flag }
    }
}

#[cfg(debug_assertions)]
impl Drop for DrainScope<'_> {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::Release);
    }
}
