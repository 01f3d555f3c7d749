//! An ordered, thread-safe list of callbacks that can be mutated while it is being
//! invoked.

use std::cell::UnsafeCell;
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use crate::locking::PolicyMutex;
use crate::policy::{DefaultPolicy, Policy};

/// How many strong node references an invocation copies per lock acquisition.
///
/// Larger batches acquire the list mutex less often; smaller batches let concurrent
/// removers reclaim nodes sooner.
const TRAVERSAL_BATCH: usize = 8;

/// Global counter from which each list draws a unique identity.
///
/// Handles carry the identity of the list that issued them so that a handle applied
/// to the wrong list is caught instead of silently corrupting links.
static LIST_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Where [`CallbackList::insert`] places the new callback relative to its anchor.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InsertOrder {
    /// The new callback runs immediately before the anchor.
    Before,
    /// The new callback runs immediately after the anchor.
    After,
}

type BoxedCallback<Args> = Box<dyn Fn(&Args) + Send + Sync>;

/// One list element: the callback plus the linkage and visibility bookkeeping.
struct Node<Args> {
    callback: BoxedCallback<Args>,

    /// Insertion ticket, strictly increasing across the owning list's lifetime.
    /// An invocation only visits nodes whose ticket is at or below its horizon.
    generation: u64,

    /// Cleared on removal. A disabled node is never invoked, even if an in-flight
    /// traversal still holds a strong reference to it.
    enabled: AtomicBool,

    /// Forward link is strong, back link is weak, so the chain has no cycles and a
    /// node lives exactly as long as the list or a traversal needs it.
    ///
    /// Only ever accessed while holding the owning list's mutex; removal rewires the
    /// neighbours but deliberately leaves the removed node's own links intact so
    /// traversals parked on it can still advance.
    links: UnsafeCell<Links<Args>>,
}

struct Links<Args> {
    next: Option<Arc<Node<Args>>>,
    prev: Weak<Node<Args>>,
}

// SAFETY: The callback is `Send + Sync` by construction, the bookkeeping fields are
// atomics or immutable, and the `links` cell is only accessed under the owning list's
// mutex, which serializes all access across threads.
unsafe impl<Args> Send for Node<Args> {}

// SAFETY: See the `Send` impl; shared references only reach `links` under the mutex.
unsafe impl<Args> Sync for Node<Args> {}

impl<Args> Node<Args> {
    /// Shared view of the linkage.
    ///
    /// # Safety
    ///
    /// The owning list's mutex must be held.
    unsafe fn links(&self) -> &Links<Args> {
        // SAFETY: The mutex (held per the caller's guarantee) serializes all access.
        unsafe { &*self.links.get() }
    }

    /// Exclusive view of the linkage.
    ///
    /// # Safety
    ///
    /// The owning list's mutex must be held.
    #[allow(clippy::mut_from_ref)] // The list mutex is the exclusivity proof.
    unsafe fn links_mut(&self) -> &mut Links<Args> {
        // SAFETY: The mutex (held per the caller's guarantee) serializes all access.
        unsafe { &mut *self.links.get() }
    }
}

/// State behind the list mutex.
struct ListState<Args> {
    head: Option<Arc<Node<Args>>>,
    tail: Weak<Node<Args>>,

    /// The most recently assigned insertion ticket; the horizon of any invocation
    /// started now.
    generation: u64,

    len: usize,
}

impl<Args> ListState<Args> {
    fn new_node(&mut self, callback: BoxedCallback<Args>) -> Arc<Node<Args>> {
        self.generation += 1;
        Arc::new(Node {
            callback,
            generation: self.generation,
            enabled: AtomicBool::new(true),
            links: UnsafeCell::new(Links {
                next: None,
                prev: Weak::new(),
            }),
        })
    }

    fn push_tail(&mut self, node: Arc<Node<Args>>) {
        match self.tail.upgrade() {
            Some(tail) => {
                // SAFETY: `&mut self` proves the list mutex is held.
                unsafe { node.links_mut() }.prev = Arc::downgrade(&tail);
                self.tail = Arc::downgrade(&node);
                // SAFETY: As above.
                unsafe { tail.links_mut() }.next = Some(node);
            }
            None => {
                debug_assert!(self.head.is_none());
                self.tail = Arc::downgrade(&node);
                self.head = Some(node);
            }
        }
        self.len += 1;
    }

    fn push_head(&mut self, node: Arc<Node<Args>>) {
        match self.head.take() {
            Some(head) => {
                // SAFETY: `&mut self` proves the list mutex is held.
                unsafe { head.links_mut() }.prev = Arc::downgrade(&node);
                // SAFETY: As above.
                unsafe { node.links_mut() }.next = Some(head);
                self.head = Some(node);
            }
            None => {
                self.tail = Arc::downgrade(&node);
                self.head = Some(node);
            }
        }
        self.len += 1;
    }

    fn link_before(&mut self, anchor: &Arc<Node<Args>>, node: Arc<Node<Args>>) {
        // SAFETY: `&mut self` proves the list mutex is held.
        let prev = unsafe { anchor.links() }.prev.upgrade();
        match prev {
            Some(prev) => {
                {
                    // SAFETY: As above.
                    let links = unsafe { node.links_mut() };
                    links.prev = Arc::downgrade(&prev);
                    links.next = Some(Arc::clone(anchor));
                }
                // SAFETY: As above.
                unsafe { anchor.links_mut() }.prev = Arc::downgrade(&node);
                // SAFETY: As above.
                unsafe { prev.links_mut() }.next = Some(node);
                self.len += 1;
            }
            // No live predecessor: the anchor is the head.
            None => self.push_head(node),
        }
    }

    fn link_after(&mut self, anchor: &Arc<Node<Args>>, node: Arc<Node<Args>>) {
        // SAFETY: `&mut self` proves the list mutex is held.
        let next = unsafe { anchor.links() }.next.clone();
        match next {
            Some(next) => {
                {
                    // SAFETY: As above.
                    let links = unsafe { node.links_mut() };
                    links.prev = Arc::downgrade(anchor);
                    links.next = Some(Arc::clone(&next));
                }
                // SAFETY: As above.
                unsafe { next.links_mut() }.prev = Arc::downgrade(&node);
                // SAFETY: As above.
                unsafe { anchor.links_mut() }.next = Some(node);
                self.len += 1;
            }
            // No successor: the anchor is the tail.
            None => self.push_tail(node),
        }
    }

    /// Rewires the neighbours around a node being removed.
    ///
    /// The removed node's own links are left untouched: an in-flight traversal that
    /// buffered the node must still be able to read its `next` to reach the rest of
    /// the list.
    fn unlink(&mut self, node: &Arc<Node<Args>>) {
        // SAFETY: `&mut self` proves the list mutex is held.
        let (next, prev) = unsafe {
            let links = node.links();
            (links.next.clone(), links.prev.upgrade())
        };

        match &prev {
            // SAFETY: As above.
            Some(prev) => unsafe {
                prev.links_mut().next = next.clone();
            },
            None => self.head = next.clone(),
        }

        match &next {
            // SAFETY: As above.
            Some(next) => unsafe {
                next.links_mut().prev = prev.as_ref().map_or_else(Weak::new, Arc::downgrade);
            },
            None => self.tail = prev.as_ref().map_or_else(Weak::new, Arc::downgrade),
        }

        self.len -= 1;
    }

    /// Copies up to [`TRAVERSAL_BATCH`] strong references starting at `start`.
    fn fill_batch(&self, start: Option<Arc<Node<Args>>>, batch: &mut Vec<Arc<Node<Args>>>) {
        debug_assert!(batch.is_empty());

        let mut cursor = start;
        while let Some(node) = cursor {
            // SAFETY: `&self` only exists while the caller holds the list mutex.
            cursor = unsafe { node.links() }.next.clone();
            batch.push(node);
            if batch.len() == TRAVERSAL_BATCH {
                break;
            }
        }
    }
}

impl<Args> Default for ListState<Args> {
    fn default() -> Self {
        Self {
            head: None,
            tail: Weak::new(),
            generation: 0,
            len: 0,
        }
    }
}

/// A ticket for a callback inserted into a [`CallbackList`], usable for removal and
/// as an insertion anchor.
///
/// The handle holds only a weak reference: it does not keep the callback alive, and
/// it remains valid (as a "this is gone" witness) after the callback is removed.
pub struct CallbackHandle<Args> {
    list_id: u64,
    node: Weak<Node<Args>>,
}

impl<Args> CallbackHandle<Args> {
    /// Whether the callback this handle refers to has been removed (or the whole
    /// list dropped).
    #[must_use]
    pub fn is_expired(&self) -> bool {
        !self
            .node
            .upgrade()
            .is_some_and(|node| node.enabled.load(Ordering::Acquire))
    }
}

impl<Args> Clone for CallbackHandle<Args> {
    fn clone(&self) -> Self {
        Self {
            list_id: self.list_id,
            node: Weak::clone(&self.node),
        }
    }
}

impl<Args> fmt::Debug for CallbackHandle<Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CallbackHandle")
            .field("list_id", &self.list_id)
            .field("expired", &self.is_expired())
            .finish()
    }
}

/// An ordered, thread-safe collection of callbacks with one fixed argument type.
///
/// Callbacks are invoked in insertion order. The list may be appended to, prepended
/// to, inserted into and removed from while another thread is mid-invocation:
///
/// - callbacks added during an invocation are not seen by that invocation;
/// - callbacks removed during an invocation are skipped if not yet reached;
/// - a removed callback's node stays alive while any traversal still holds it.
///
/// Invocation copies small batches of strong node references under the list mutex
/// and runs the callbacks with the mutex released, so a slow callback never blocks
/// concurrent insertion or removal for long.
///
/// # Example
///
/// ```rust
/// use events_bus::CallbackList;
///
/// let list = CallbackList::<String>::new();
///
/// list.append(|name: &String| println!("hello, {name}"));
/// let shouty = list.append(|name: &String| println!("HELLO, {name}"));
///
/// list.invoke(&"world".to_string());
///
/// assert!(list.remove(&shouty));
/// assert_eq!(list.len(), 1);
/// ```
///
/// # Callback bounds
///
/// Callbacks are `Fn(&Args) + Send + Sync + 'static`: concurrent invocation from
/// several threads is allowed, so mutable callback state belongs behind interior
/// mutability (atomics, a mutex) inside the closure.
pub struct CallbackList<Args, P: Policy = DefaultPolicy> {
    id: u64,
    state: P::Mutex<ListState<Args>>,
}

impl<Args, P> CallbackList<Args, P>
where
    Args: 'static,
    P: Policy,
{
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self {
            id: LIST_ID_COUNTER.fetch_add(1, Ordering::Relaxed),
            state: P::Mutex::new(ListState::default()),
        }
    }

    /// Adds a callback at the end of the list.
    ///
    /// Runs after every callback inserted before it. Invocations already in progress
    /// will not see the new callback.
    pub fn append<F>(&self, callback: F) -> CallbackHandle<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let node = state.new_node(Box::new(callback));
        let handle = self.handle_for(&node);
        state.push_tail(node);
        handle
    }

    /// Adds a callback at the front of the list.
    pub fn prepend<F>(&self, callback: F) -> CallbackHandle<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let mut state = self.state.lock();
        let node = state.new_node(Box::new(callback));
        let handle = self.handle_for(&node);
        state.push_head(node);
        handle
    }

    /// Adds a callback next to an existing one.
    ///
    /// When the anchor has already been removed, the new callback is appended at the
    /// end instead, for either order.
    ///
    /// # Panics
    ///
    /// Panics if the anchor handle was issued by a different list.
    pub fn insert<F>(
        &self,
        callback: F,
        anchor: &CallbackHandle<Args>,
        order: InsertOrder,
    ) -> CallbackHandle<Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        self.check_ownership(anchor);

        let mut state = self.state.lock();
        let node = state.new_node(Box::new(callback));
        let handle = self.handle_for(&node);

        let live_anchor = anchor
            .node
            .upgrade()
            .filter(|anchor| anchor.enabled.load(Ordering::Acquire));

        match (live_anchor, order) {
            (Some(anchor), InsertOrder::Before) => state.link_before(&anchor, node),
            (Some(anchor), InsertOrder::After) => state.link_after(&anchor, node),
            (None, _) => state.push_tail(node),
        }

        handle
    }

    /// Removes the callback behind the handle.
    ///
    /// Returns `false` if it was already removed (or never finished inserting, which
    /// cannot happen with handles obtained from this API). Removal is O(1); an
    /// invocation that already buffered the node will observe the disabled flag and
    /// skip it.
    ///
    /// # Panics
    ///
    /// Panics if the handle was issued by a different list.
    pub fn remove(&self, handle: &CallbackHandle<Args>) -> bool {
        self.check_ownership(handle);

        let Some(node) = handle.node.upgrade() else {
            return false;
        };

        let mut state = self.state.lock();
        if !node.enabled.swap(false, Ordering::AcqRel) {
            return false;
        }
        state.unlink(&node);
        true
    }

    /// Invokes, in insertion order, every callback that was present when the call
    /// started and is still present when reached.
    ///
    /// Callbacks run with the list mutex released; they may freely mutate the list
    /// (including removing themselves). Callbacks inserted from inside a callback
    /// are deferred to the next invocation.
    ///
    /// A panicking callback propagates; callbacks earlier in the order have already
    /// run and are not rolled back, later ones are not reached.
    pub fn invoke(&self, args: &Args) {
        self.traverse(|node| {
            (node.callback)(args);
            true
        });
    }

    /// Walks the currently present callbacks in order, passing each one's handle to
    /// the visitor. The walk stops early when the visitor returns `false`.
    ///
    /// The visitor sees the same snapshot semantics as [`invoke()`](Self::invoke).
    pub fn for_each(&self, mut visit: impl FnMut(&CallbackHandle<Args>) -> bool) {
        self.traverse(|node| {
            let handle = CallbackHandle {
                list_id: self.id,
                node: Arc::downgrade(node),
            };
            visit(&handle)
        });
    }

    /// The number of callbacks currently in the list.
    #[must_use]
    pub fn len(&self) -> usize {
        self.state.lock().len
    }

    /// Whether the list currently holds no callbacks.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Batched traversal shared by `invoke` and `for_each`.
    ///
    /// Captures the horizon and the first batch under one mutex hold, then
    /// alternates between running `step` on the batch (mutex released) and refilling
    /// the batch through the last batched node's forward link (mutex reacquired).
    /// Stops when `step` returns `false`.
    fn traverse(&self, mut step: impl FnMut(&Arc<Node<Args>>) -> bool) {
        let mut batch: Vec<Arc<Node<Args>>> = Vec::with_capacity(TRAVERSAL_BATCH);

        let horizon = {
            let state = self.state.lock();
            let start = state.head.clone();
            state.fill_batch(start, &mut batch);
            state.generation
        };

        loop {
            let Some(last) = batch.last().cloned() else {
                return;
            };

            for node in &batch {
                // The horizon hides callbacks inserted after this traversal began;
                // the flag hides callbacks removed before we reached them.
                if node.generation <= horizon
                    && node.enabled.load(Ordering::Acquire)
                    && !step(node)
                {
                    return;
                }
            }

            batch.clear();

            let state = self.state.lock();
            // SAFETY: The guard proves the list mutex is held. Removal never clears
            // a removed node's own forward link, so advancing through `last` is safe
            // even if it was unlinked while the batch ran.
            let start = unsafe { last.links() }.next.clone();
            state.fill_batch(start, &mut batch);
        }
    }

    fn handle_for(&self, node: &Arc<Node<Args>>) -> CallbackHandle<Args> {
        CallbackHandle {
            list_id: self.id,
            node: Arc::downgrade(node),
        }
    }

    fn check_ownership(&self, handle: &CallbackHandle<Args>) {
        assert_eq!(
            handle.list_id, self.id,
            "handle was issued by a different CallbackList"
        );
    }
}

impl<Args: 'static, P: Policy> Default for CallbackList<Args, P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Args, P: Policy> Drop for CallbackList<Args, P> {
    fn drop(&mut self) {
        // Detach the chain link by link; dropping the head's `Arc` chain recursively
        // would overflow the stack on long lists.
        let mut state = self.state.lock();
        let mut cursor = state.head.take();
        state.tail = Weak::new();
        while let Some(node) = cursor {
            // SAFETY: The guard proves the list mutex is held.
            cursor = unsafe { node.links_mut() }.next.take();
        }
    }
}

impl<Args, P: Policy> fmt::Debug for CallbackList<Args, P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut s = f.debug_struct("CallbackList");
        s.field("id", &self.id);
        match self.state.try_lock() {
            Some(state) => s.field("len", &state.len),
            None => s.field("len", &"<locked>"),
        }
        .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    use static_assertions::{assert_impl_all, assert_not_impl_any};

    use super::*;
    use crate::policy::LocalPolicy;

    assert_impl_all!(CallbackList<String>: Send, Sync);
    assert_impl_all!(CallbackHandle<String>: Send, Sync);
    assert_not_impl_any!(CallbackList<String, LocalPolicy>: Sync);

    /// Collects invocation order into a shared log.
    fn recorder(log: &Arc<Mutex<Vec<&'static str>>>, tag: &'static str) -> impl Fn(&()) {
        let log = Arc::clone(log);
        move |(): &()| log.lock().unwrap().push(tag)
    }

    #[test]
    fn append_preserves_insertion_order() {
        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        list.append(recorder(&log, "A"));
        list.append(recorder(&log, "B"));
        list.append(recorder(&log, "C"));

        list.invoke(&());

        assert_eq!(*log.lock().unwrap(), ["A", "B", "C"]);
    }

    #[test]
    fn prepend_runs_first() {
        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        list.append(recorder(&log, "second"));
        list.prepend(recorder(&log, "first"));

        list.invoke(&());

        assert_eq!(*log.lock().unwrap(), ["first", "second"]);
    }

    #[test]
    fn insert_before_and_after_anchor() {
        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let anchor = list.append(recorder(&log, "anchor"));
        list.insert(recorder(&log, "before"), &anchor, InsertOrder::Before);
        list.insert(recorder(&log, "after"), &anchor, InsertOrder::After);

        list.invoke(&());

        assert_eq!(*log.lock().unwrap(), ["before", "anchor", "after"]);
    }

    #[test]
    fn insert_with_expired_anchor_appends() {
        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let anchor = list.append(recorder(&log, "anchor"));
        list.append(recorder(&log, "tail"));
        assert!(list.remove(&anchor));

        list.insert(recorder(&log, "fallback"), &anchor, InsertOrder::Before);
        list.invoke(&());

        assert_eq!(*log.lock().unwrap(), ["tail", "fallback"]);
    }

    #[test]
    fn removed_callback_is_not_invoked() {
        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let doomed = list.append(recorder(&log, "doomed"));
        list.append(recorder(&log, "keeper"));

        assert!(list.remove(&doomed));
        list.invoke(&());

        assert_eq!(*log.lock().unwrap(), ["keeper"]);
    }

    #[test]
    fn remove_twice_returns_false() {
        let list = CallbackList::<()>::new();

        let handle = list.append(|(): &()| {});

        assert!(list.remove(&handle));
        assert!(!list.remove(&handle));
        assert!(handle.is_expired());
    }

    #[test]
    #[should_panic(expected = "different CallbackList")]
    fn foreign_handle_is_rejected() {
        let issuer = CallbackList::<()>::new();
        let other = CallbackList::<()>::new();

        let handle = issuer.append(|(): &()| {});
        drop(other.remove(&handle));
    }

    #[test]
    fn reentrant_append_is_invisible_to_running_invocation() {
        let list = Arc::new(CallbackList::<()>::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        {
            let list = Arc::clone(&list);
            let log = Arc::clone(&log);
            list.clone().append(move |(): &()| {
                log.lock().unwrap().push("outer");
                let log = Arc::clone(&log);
                list.append(move |(): &()| log.lock().unwrap().push("inner"));
            });
        }

        list.invoke(&());
        assert_eq!(*log.lock().unwrap(), ["outer"]);
        assert_eq!(list.len(), 2);

        // The deferred callback participates from the next invocation on; the one
        // appended during *this* invocation is again deferred.
        log.lock().unwrap().clear();
        list.invoke(&());
        assert_eq!(*log.lock().unwrap(), ["outer", "inner"]);
        assert_eq!(list.len(), 3);
    }

    #[test]
    fn callback_can_remove_itself() {
        let list = Arc::new(CallbackList::<()>::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handle_slot: Arc<Mutex<Option<CallbackHandle<()>>>> = Arc::new(Mutex::new(None));
        let handle = {
            let list = Arc::clone(&list);
            let calls = Arc::clone(&calls);
            let handle_slot = Arc::clone(&handle_slot);
            list.clone().append(move |(): &()| {
                calls.fetch_add(1, Ordering::Relaxed);
                if let Some(own) = handle_slot.lock().unwrap().take() {
                    assert!(list.remove(&own));
                }
            })
        };
        *handle_slot.lock().unwrap() = Some(handle);

        list.invoke(&());
        list.invoke(&());

        assert_eq!(calls.load(Ordering::Relaxed), 1);
        assert!(list.is_empty());
    }

    #[test]
    fn callback_can_remove_a_later_callback_mid_invocation() {
        let list = Arc::new(CallbackList::<()>::new());
        let log = Arc::new(Mutex::new(Vec::new()));

        let victim = list.append(recorder(&log, "victim"));
        {
            let list = Arc::clone(&list);
            let log = Arc::clone(&log);
            list.clone().prepend(move |(): &()| {
                log.lock().unwrap().push("assassin");
                assert!(list.remove(&victim));
            });
        }

        list.invoke(&());

        assert_eq!(*log.lock().unwrap(), ["assassin"]);
    }

    #[test]
    fn order_holds_across_batch_boundaries() {
        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        let count = TRAVERSAL_BATCH * 3 + 1;
        for i in 0..count {
            let log = Arc::clone(&log);
            list.append(move |(): &()| log.lock().unwrap().push(i));
        }

        list.invoke(&());

        let seen = log.lock().unwrap();
        assert_eq!(seen.len(), count);
        assert!(seen.windows(2).all(|pair| pair[0] < pair[1]));
    }

    #[test]
    fn for_each_visits_in_order_and_stops_early() {
        let list = CallbackList::<()>::new();

        list.append(|(): &()| {});
        list.append(|(): &()| {});
        list.append(|(): &()| {});

        let mut visited = 0;
        list.for_each(|handle| {
            assert!(!handle.is_expired());
            visited += 1;
            visited < 2
        });

        assert_eq!(visited, 2);
    }

    #[test]
    fn for_each_handles_can_remove() {
        let list = CallbackList::<()>::new();

        list.append(|(): &()| {});
        list.append(|(): &()| {});

        let mut handles = Vec::new();
        list.for_each(|handle| {
            handles.push(handle.clone());
            true
        });

        for handle in &handles {
            assert!(list.remove(handle));
        }
        assert!(list.is_empty());
    }

    #[test]
    fn panic_in_callback_leaves_list_consistent() {
        use std::panic::{catch_unwind, AssertUnwindSafe};

        let list = CallbackList::<()>::new();
        let log = Arc::new(Mutex::new(Vec::new()));

        list.append(recorder(&log, "ran"));
        list.append(|(): &()| panic!("callback failure"));
        list.append(recorder(&log, "skipped"));

        assert!(catch_unwind(AssertUnwindSafe(|| list.invoke(&()))).is_err());

        assert_eq!(*log.lock().unwrap(), ["ran"]);
        assert_eq!(list.len(), 3);

        // The list stays fully usable after the propagated panic.
        log.lock().unwrap().clear();
        assert!(catch_unwind(AssertUnwindSafe(|| list.invoke(&()))).is_err());
        assert_eq!(*log.lock().unwrap(), ["ran"]);
    }

    #[test]
    fn long_list_drops_without_stack_overflow() {
        let list = CallbackList::<()>::new();
        for _ in 0..50_000 {
            list.append(|(): &()| {});
        }
        drop(list);
    }

    #[test]
    fn single_threaded_policy_list_works() {
        let list = CallbackList::<u32, LocalPolicy>::new();
        let seen = Arc::new(AtomicUsize::new(0));

        {
            let seen = Arc::clone(&seen);
            list.append(move |value: &u32| {
                seen.fetch_add(*value as usize, Ordering::Relaxed);
            });
        }

        list.invoke(&4);
        list.invoke(&5);

        assert_eq!(seen.load(Ordering::Relaxed), 9);
    }
}
