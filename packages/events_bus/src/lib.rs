//! Composable in-process event primitives.
//!
//! This package provides three layers, each usable on its own:
//!
//! - [`CallbackList`] - an ordered, thread-safe collection of callbacks that can be
//!   appended, prepended, inserted and removed while it is concurrently invoked.
//! - [`EventDispatcher`] - a keyed index of callback lists with read-optimized
//!   concurrent dispatch: events go to the listeners registered for their key.
//! - [`EventQueue`] - an asynchronous buffer over a dispatcher: any number of
//!   producers enqueue, one consumer drains, with recycled cells and an adaptive
//!   wait for idle consumers.
//!
//! All three are generic over a [`Policy`] selecting the lock family (the
//! `parking_lot` locks, the [`backoff_lock`] spin lock, or single-threaded stubs),
//! the dispatcher map (hashed or ordered) and the queue's cell pooling. The
//! [`HighContentionPolicy`] bundle is the recommended configuration for
//! multi-producer/single-consumer workloads with many fast events.
//!
//! # Synchronous dispatch
//!
//! ```rust
//! use events_bus::EventDispatcher;
//!
//! let dispatcher = EventDispatcher::<u32, String>::new();
//!
//! dispatcher.append_listener(1, |name: &String| println!("hello, {name}"));
//! let handle = dispatcher.append_listener(1, |name: &String| println!("bye, {name}"));
//!
//! dispatcher.dispatch(&1, &"world".to_string()); // both listeners run, in order
//!
//! dispatcher.remove_listener(&handle);
//! dispatcher.dispatch(&1, &"world".to_string()); // only the first remains
//! ```
//!
//! # Asynchronous queue
//!
//! ```rust
//! use std::sync::atomic::{AtomicUsize, Ordering};
//! use std::sync::Arc;
//! use std::thread;
//! use std::time::Duration;
//!
//! use events_bus::{EventQueue, HighContentionPolicy};
//!
//! let queue = EventQueue::<u8, u64, HighContentionPolicy>::new();
//! let delivered = Arc::new(AtomicUsize::new(0));
//!
//! {
//!     let delivered = Arc::clone(&delivered);
//!     queue.append_listener(1, move |_value: &u64| {
//!         delivered.fetch_add(1, Ordering::Relaxed);
//!     });
//! }
//!
//! thread::scope(|s| {
//!     // Producers enqueue from any thread.
//!     for worker in 0..4_u64 {
//!         let queue = &queue;
//!         s.spawn(move || {
//!             for i in 0..100 {
//!                 queue.enqueue(1, worker * 100 + i);
//!             }
//!         });
//!     }
//!
//!     // One consumer drains until everything arrived.
//!     s.spawn(|| {
//!         while delivered.load(Ordering::Relaxed) < 400 {
//!             queue.wait_for(Duration::from_millis(10));
//!             queue.process();
//!         }
//!     });
//! });
//!
//! assert_eq!(delivered.load(Ordering::Relaxed), 400);
//! ```
//!
//! # Choosing a drain
//!
//! [`EventQueue::process`] routes every event through the dispatcher: map lookup,
//! shared lock, type-erased listener calls. [`EventQueue::process_with`] hands each
//! `(key, payload)` pair straight to one visitor closure - the zero-indirection
//! path when the consumer is a single `match` over the keys.

mod callback_list;
mod cell_list;
mod dispatcher;
mod keyed_map;
mod locking;
mod policy;
mod queue;
mod waiter;

pub use callback_list::{CallbackHandle, CallbackList, InsertOrder};
pub use dispatcher::{EventDispatcher, EventHandle, FilterHandle};
pub use keyed_map::{EventKey, HashedMap, KeyedMap};
pub use locking::{LocalMutex, LocalSharedMutex, PolicyMutex, PolicySharedMutex};
pub use policy::{DefaultPolicy, HighContentionPolicy, LocalPolicy, OrderedPolicy, Policy};
pub use queue::EventQueue;
