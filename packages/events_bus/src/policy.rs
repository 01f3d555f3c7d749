//! Compile-time configuration bundles for the event containers.

use std::collections::BTreeMap;

use backoff_lock::BackoffLock;

use crate::keyed_map::{EventKey, HashedMap, KeyedMap};
use crate::locking::{LocalMutex, LocalSharedMutex, PolicyMutex, PolicySharedMutex};

/// Selects the lock family, the dispatcher map variant and the queue's cell pooling
/// for a [`CallbackList`][crate::CallbackList], [`EventDispatcher`][crate::EventDispatcher]
/// or [`EventQueue`][crate::EventQueue].
///
/// Policies are zero-sized type-level bundles; picking one costs nothing at runtime.
/// The provided bundles cover the common configurations, and a custom policy is just
/// another implementation of this trait.
///
/// # Example
///
/// A custom policy combining the spin lock with an ordered map:
///
/// ```rust
/// use std::collections::BTreeMap;
///
/// use backoff_lock::BackoffLock;
/// use events_bus::{EventDispatcher, EventKey, Policy};
///
/// struct OrderedSpin;
///
/// impl Policy for OrderedSpin {
///     type Mutex<T> = BackoffLock<T>;
///     type SharedMutex<T> = parking_lot::RwLock<T>;
///     type Map<K: EventKey, V> = BTreeMap<K, V>;
///     const CELL_SLAB_CAPACITY: usize = 1024;
/// }
///
/// let dispatcher = EventDispatcher::<&'static str, u32, OrderedSpin>::new();
/// dispatcher.append_listener("tick", |count| assert_eq!(*count, 3));
/// dispatcher.dispatch(&"tick", &3);
/// ```
pub trait Policy: 'static {
    /// Exclusive lock guarding callback-list state and the queue's two cell lists.
    type Mutex<T>: PolicyMutex<T>;

    /// Shared/exclusive lock guarding the dispatcher's keyed index and filter chain.
    type SharedMutex<T>: PolicySharedMutex<T>;

    /// Keyed index mapping event keys to callback lists.
    type Map<K: EventKey, V>: KeyedMap<K, V>;

    /// Slots per slab in the queue's cell pool.
    ///
    /// Zero disables pooling: every cell allocation goes through the global allocator.
    const CELL_SLAB_CAPACITY: usize;
}

/// The thread-safe default: `parking_lot` locks, unordered (`foldhash`) map, cells
/// straight from the global allocator.
#[derive(Debug)]
pub struct DefaultPolicy;

impl Policy for DefaultPolicy {
    type Mutex<T> = parking_lot::Mutex<T>;
    type SharedMutex<T> = parking_lot::RwLock<T>;
    type Map<K: EventKey, V> = HashedMap<K, V>;
    const CELL_SLAB_CAPACITY: usize = 0;
}

/// [`DefaultPolicy`] with an ordered ([`BTreeMap`]) dispatcher map, for keys that
/// are `Ord` but awkward to hash or where deterministic key iteration matters.
#[derive(Debug)]
pub struct OrderedPolicy;

impl Policy for OrderedPolicy {
    type Mutex<T> = parking_lot::Mutex<T>;
    type SharedMutex<T> = parking_lot::RwLock<T>;
    type Map<K: EventKey, V> = BTreeMap<K, V>;
    const CELL_SLAB_CAPACITY: usize = 0;
}

/// Single-threaded bundle: `RefCell`-backed lock stubs with no atomic traffic.
///
/// Containers built with this policy are `!Sync`, so the compiler enforces the
/// single-threaded contract instead of leaving it to documentation.
#[derive(Debug)]
pub struct LocalPolicy;

impl Policy for LocalPolicy {
    type Mutex<T> = LocalMutex<T>;
    type SharedMutex<T> = LocalSharedMutex<T>;
    type Map<K: EventKey, V> = HashedMap<K, V>;
    const CELL_SLAB_CAPACITY: usize = 0;
}

/// The recommended bundle for high-contention multi-producer/single-consumer queues:
/// back-off spin locks for the short critical sections, the shared/exclusive map
/// lock, and pool-backed cells with 8192-slot slabs.
#[derive(Debug)]
pub struct HighContentionPolicy;

impl Policy for HighContentionPolicy {
    type Mutex<T> = BackoffLock<T>;
    type SharedMutex<T> = parking_lot::RwLock<T>;
    type Map<K: EventKey, V> = HashedMap<K, V>;
    const CELL_SLAB_CAPACITY: usize = 8192;
}
