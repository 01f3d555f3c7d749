//! Synchronous dispatch of events to listeners registered per event key.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::callback_list::{CallbackHandle, CallbackList, InsertOrder};
use crate::keyed_map::{EventKey, KeyedMap};
use crate::locking::PolicySharedMutex;
use crate::policy::{DefaultPolicy, Policy};

type BoxedFilter<K, Args> = Box<dyn Fn(&K, &Args) -> bool + Send + Sync>;

struct FilterEntry<K, Args> {
    id: u64,
    filter: BoxedFilter<K, Args>,
}

/// A ticket for a listener registered with an [`EventDispatcher`], usable for removal.
pub struct EventHandle<K, Args> {
    key: K,
    inner: CallbackHandle<Args>,
}

impl<K: Clone, Args> Clone for EventHandle<K, Args> {
    fn clone(&self) -> Self {
        Self {
            key: self.key.clone(),
            inner: self.inner.clone(),
        }
    }
}

impl<K, Args> EventHandle<K, Args> {
    /// The event key the listener was registered under.
    #[must_use]
    pub fn key(&self) -> &K {
        &self.key
    }

    /// Whether the listener this handle refers to has been removed.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.inner.is_expired()
    }
}

impl<K: fmt::Debug, Args> fmt::Debug for EventHandle<K, Args> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventHandle")
            .field("key", &self.key)
            .field("expired", &self.is_expired())
            .finish()
    }
}

/// A ticket for a dispatch filter, usable for removal.
#[derive(Clone, Debug)]
pub struct FilterHandle {
    id: u64,
}

/// Routes dispatched events to the listeners registered for the event's key.
///
/// Each key owns a [`CallbackList`]; the key-to-list index sits behind a
/// shared/exclusive lock. Lookup and dispatch take the lock in shared mode, so
/// dispatches for different keys proceed in parallel; only registering the first
/// listener of a previously unseen key takes it exclusively. Dispatch captures a
/// shared-ownership snapshot of the target list and releases the lock *before*
/// invoking, so a slow listener never blocks registration or dispatch on other keys.
///
/// Dispatching a key with no listeners is a silent no-op.
///
/// # Example
///
/// ```rust
/// use events_bus::EventDispatcher;
///
/// #[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
/// enum Topic {
///     Connected,
///     Disconnected,
/// }
///
/// let dispatcher = EventDispatcher::<Topic, String>::new();
///
/// dispatcher.append_listener(Topic::Connected, |peer: &String| {
///     println!("connected: {peer}");
/// });
///
/// dispatcher.dispatch(&Topic::Connected, &"10.0.0.1".to_string());
/// dispatcher.dispatch(&Topic::Disconnected, &"10.0.0.1".to_string()); // no-op
/// ```
pub struct EventDispatcher<K: EventKey, Args, P: Policy = DefaultPolicy> {
    lists: P::SharedMutex<P::Map<K, Arc<CallbackList<Args, P>>>>,
    filters: P::SharedMutex<Vec<FilterEntry<K, Args>>>,
    next_filter_id: AtomicU64,
}

impl<K, Args, P> EventDispatcher<K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    /// Creates a dispatcher with no listeners.
    #[must_use]
    pub fn new() -> Self {
        Self {
            lists: P::SharedMutex::new(P::Map::default()),
            filters: P::SharedMutex::new(Vec::new()),
            next_filter_id: AtomicU64::new(1),
        }
    }

    /// Registers a listener at the end of the key's callback list.
    ///
    /// The returned handle removes exactly this registration; registering the same
    /// closure twice yields two independent handles.
    pub fn append_listener<F>(&self, key: K, listener: F) -> EventHandle<K, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let list = self.list_for_insert(&key);
        let inner = list.append(listener);
        EventHandle { key, inner }
    }

    /// Registers a listener at the front of the key's callback list.
    pub fn prepend_listener<F>(&self, key: K, listener: F) -> EventHandle<K, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let list = self.list_for_insert(&key);
        let inner = list.prepend(listener);
        EventHandle { key, inner }
    }

    /// Registers a listener that also receives the event key.
    ///
    /// The key is captured at registration time, which is equivalent to receiving
    /// the dispatched key: a listener only ever runs for the key it was registered
    /// under.
    pub fn append_listener_with_key<F>(&self, key: K, listener: F) -> EventHandle<K, Args>
    where
        F: Fn(&K, &Args) + Send + Sync + 'static,
    {
        let captured = key.clone();
        self.append_listener(key, move |args| listener(&captured, args))
    }

    /// Registers a listener next to an existing registration for the same key.
    ///
    /// Falls back to appending when the anchor has already been removed.
    pub fn insert_listener<F>(
        &self,
        listener: F,
        anchor: &EventHandle<K, Args>,
        order: InsertOrder,
    ) -> EventHandle<K, Args>
    where
        F: Fn(&Args) + Send + Sync + 'static,
    {
        let key = anchor.key.clone();
        let list = self.list_for_insert(&key);
        let inner = list.insert(listener, &anchor.inner, order);
        EventHandle { key, inner }
    }

    /// Removes a previously registered listener.
    ///
    /// Returns `false` if it was already removed.
    pub fn remove_listener(&self, handle: &EventHandle<K, Args>) -> bool {
        let list = self.list_for_key(&handle.key);
        list.is_some_and(|list| list.remove(&handle.inner))
    }

    /// Invokes every listener registered for `key`, in registration order.
    ///
    /// Runs with the index lock released: listeners may freely register and remove
    /// listeners, dispatch further events, or enqueue into a queue built on this
    /// dispatcher. A panicking listener propagates to the caller of `dispatch`.
    pub fn dispatch(&self, key: &K, args: &Args) {
        if !self.passes_filters(key, args) {
            return;
        }

        // Snapshot under the shared lock, invoke after releasing it.
        let list = self.list_for_key(key);
        if let Some(list) = list {
            list.invoke(args);
        }
    }

    /// Whether any listener is currently registered for `key`.
    #[must_use]
    pub fn has_any_listener(&self, key: &K) -> bool {
        self.list_for_key(key)
            .is_some_and(|list| !list.is_empty())
    }

    /// The number of listeners currently registered for `key`.
    #[must_use]
    pub fn listener_count(&self, key: &K) -> usize {
        self.list_for_key(key).map_or(0, |list| list.len())
    }

    /// Registers a predicate consulted before every dispatch.
    ///
    /// When any filter returns `false` the event is dropped before listener lookup.
    /// Filters run under the filter chain's shared lock, so a filter must not
    /// register or remove filters.
    pub fn append_filter<F>(&self, filter: F) -> FilterHandle
    where
        F: Fn(&K, &Args) -> bool + Send + Sync + 'static,
    {
        let id = self.next_filter_id.fetch_add(1, Ordering::Relaxed);
        self.filters.write().push(FilterEntry {
            id,
            filter: Box::new(filter),
        });
        FilterHandle { id }
    }

    /// Removes a previously registered filter.
    ///
    /// Returns `false` if it was already removed.
    pub fn remove_filter(&self, handle: &FilterHandle) -> bool {
        let mut filters = self.filters.write();
        let before = filters.len();
        filters.retain(|entry| entry.id != handle.id);
        filters.len() != before
    }

    fn passes_filters(&self, key: &K, args: &Args) -> bool {
        let filters = self.filters.read();
        filters.iter().all(|entry| (entry.filter)(key, args))
    }

    /// Shared-lock lookup of the list for a key.
    fn list_for_key(&self, key: &K) -> Option<Arc<CallbackList<Args, P>>> {
        let map = self.lists.read();
        map.get(key).map(Arc::clone)
    }

    /// Resolve-or-insert for listener registration: shared-lock fast path, then an
    /// exclusive-lock re-check on a miss.
    fn list_for_insert(&self, key: &K) -> Arc<CallbackList<Args, P>> {
        {
            let map = self.lists.read();
            if let Some(list) = map.get(key) {
                return Arc::clone(list);
            }
        }

        let mut map = self.lists.write();
        Arc::clone(map.get_or_insert_with(key.clone(), || Arc::new(CallbackList::new())))
    }
}

impl<K, Args, P> Default for EventDispatcher<K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, Args, P> fmt::Debug for EventDispatcher<K, Args, P>
where
    K: EventKey,
    Args: 'static,
    P: Policy,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EventDispatcher")
            .field("keys", &self.lists.read().len())
            .field("filters", &self.filters.read().len())
            .finish()
    }
}
