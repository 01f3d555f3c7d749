//! The queue consumer's adaptive wait: spin, then yield, then block.

use std::hint::spin_loop;
use std::sync::atomic::{fence, AtomicUsize, Ordering};
use std::thread;
use std::time::Instant;

use parking_lot::{Condvar, Mutex};

/// Spin-hint iterations before a waiter degrades to yielding.
const SPIN_ITERATIONS: usize = 128;

/// Cooperative yields before a waiter degrades to blocking on the condition variable.
const YIELD_ITERATIONS: usize = 16;

/// Wakes a blocked consumer when work arrives, without charging producers a syscall
/// when nobody is blocked.
///
/// The blocked-waiter count gates the producer side: `notify_one` touches the
/// condition variable only when a waiter has registered. The registration/publication
/// handshake needs the two seq_cst fences below - with acquire/release alone, the
/// producer can miss the waiter count while the waiter misses the published work,
/// and the wakeup is lost.
pub(crate) struct WaitSignal {
    blocked: AtomicUsize,
    lock: Mutex<()>,
    condvar: Condvar,
}

impl WaitSignal {
    pub(crate) fn new() -> Self {
        Self {
            blocked: AtomicUsize::new(0),
            lock: Mutex::new(()),
            condvar: Condvar::new(),
        }
    }

    /// Wakes one blocked waiter, if any is registered.
    ///
    /// The caller must publish its work (counter increment, list append) before
    /// calling.
    pub(crate) fn notify_one(&self) {
        // Pairs with the fence in `wait_until`: totally orders this work
        // publication against the waiter's registration.
        fence(Ordering::SeqCst);

        if self.blocked.load(Ordering::Relaxed) == 0 {
            return;
        }

        // Taking the lock ensures the waiter is either parked (and will be woken) or
        // still holds the lock and will re-check `ready` before parking.
        drop(self.lock.lock());
        self.condvar.notify_one();
    }

    /// Waits adaptively until `ready` returns true or `deadline` passes.
    ///
    /// Returns the final observation of `ready`.
    #[cfg_attr(test, mutants::skip)] // Mutating the phase bounds degenerates into a busy loop.
    pub(crate) fn wait_until(&self, deadline: Option<Instant>, ready: impl Fn() -> bool) -> bool {
        // Fast path.
        if ready() {
            return true;
        }

        // Spin phase: cheapest reaction to work that is about to arrive.
        for _ in 0..SPIN_ITERATIONS {
            spin_loop();
            if ready() {
                return true;
            }
        }

        // Yield phase: give producers on the same processor a chance to run.
        for _ in 0..YIELD_ITERATIONS {
            thread::yield_now();
            if ready() {
                return true;
            }
        }

        // Block phase.
        self.blocked.fetch_add(1, Ordering::Relaxed);
        // Pairs with the fence in `notify_one`; see the type docs.
        fence(Ordering::SeqCst);

        let mut guard = self.lock.lock();
        let satisfied = loop {
            if ready() {
                break true;
            }
            match deadline {
                None => self.condvar.wait(&mut guard),
                Some(deadline) => {
                    if self.condvar.wait_until(&mut guard, deadline).timed_out() {
                        break ready();
                    }
                }
            }
        };
        drop(guard);

        self.blocked.fetch_sub(1, Ordering::Relaxed);
        satisfied
    }
}
