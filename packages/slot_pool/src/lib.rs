//! A multi-slab object pool with a lock-free free stack.
//!
//! [`SlotPool<T>`] hands out [`PoolBox<T>`] owning pointers backed by fixed-capacity
//! slabs of correctly sized and aligned slots. Returning a box pushes its slot onto a
//! LIFO free stack; the next allocation pops it again, so a workload that recycles
//! objects settles into a steady state with no allocator traffic at all.
//!
//! The hot paths (allocate when a free slot exists, deallocate) are lock-free: a single
//! atomic head over a free stack threaded through the vacant slots themselves. Only
//! growing the slab chain takes a lock, and that happens once per slab lifetime.
//!
//! The pool handle is cheap to clone and every [`PoolBox`] keeps the backing storage
//! alive, so the pool may be dropped while boxes are still outstanding - the slabs are
//! released when the last box returns.
//!
//! # Example
//!
//! ```rust
//! use slot_pool::SlotPool;
//!
//! let pool = SlotPool::<String>::builder().slab_capacity(64).build();
//!
//! let greeting = pool.insert("hello".to_string());
//! assert_eq!(*greeting, "hello");
//!
//! // Dropping the box recycles its slot; the next insert reuses it.
//! drop(greeting);
//! let reused = pool.insert("world".to_string());
//! assert_eq!(*reused, "world");
//! ```
//!
//! # Unpooled mode
//!
//! A slab capacity of zero disables the slabs entirely: every allocation falls through
//! to the global allocator and every deallocation frees immediately. This keeps the
//! same types and call sites while making pooling a configuration decision.
//!
//! ```rust
//! use slot_pool::SlotPool;
//!
//! let pool = SlotPool::<u64>::builder().slab_capacity(0).build();
//! let value = pool.insert(42);
//!
//! assert_eq!(*value, 42);
//! assert_eq!(pool.capacity(), 0);
//! ```

mod builder;
mod handle;
mod pool;
mod slab;

pub use builder::SlotPoolBuilder;
pub use handle::PoolBox;
pub use pool::SlotPool;
