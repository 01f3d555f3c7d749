//! A test-and-set spin lock with exponential back-off.
//!
//! This package provides mutual exclusion for critical sections bounded by a few hundred
//! cycles, such as pushing a node onto a list or swapping a pair of pointers. For anything
//! longer, use a real mutex - a spinning waiter burns a processor without making progress.
//!
//! Two layers are exposed:
//!
//! - [`RawBackoffLock`] - the bare lock/try_lock/unlock protocol over a single atomic flag,
//!   for callers that manage their own data placement (e.g. guarding a grow path).
//! - [`BackoffLock<T>`] - the lock bundled with the data it protects, handing out RAII
//!   guards in the style of the standard library mutex.
//!
//! The lock is unfair: a newly arriving thread can overtake threads that have been
//! spinning longer. Waiters back off exponentially (doubling the number of spin-wait
//! hints per retry, up to a cap) to keep the contended cache line quiet.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use std::thread;
//!
//! use backoff_lock::BackoffLock;
//!
//! let counter = Arc::new(BackoffLock::new(0_u64));
//!
//! let mut threads = Vec::new();
//! for _ in 0..4 {
//!     let counter = Arc::clone(&counter);
//!     threads.push(thread::spawn(move || {
//!         for _ in 0..1000 {
//!             *counter.lock() += 1;
//!         }
//!     }));
//! }
//!
//! for thread in threads {
//!     thread.join().unwrap();
//! }
//!
//! assert_eq!(*counter.lock(), 4000);
//! ```

mod mutex;
mod raw;

pub use mutex::{BackoffLock, BackoffLockGuard};
pub use raw::RawBackoffLock;
