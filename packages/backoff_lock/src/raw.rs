use std::hint::spin_loop;
use std::sync::atomic::{AtomicBool, Ordering};

/// The most spin-wait hints a waiter emits between consecutive lock attempts.
///
/// Waiting starts at one hint per retry and doubles until it reaches this cap.
const MAX_BACKOFF: u32 = 64;

/// A spin lock over a single atomic flag, without any associated data.
///
/// The fast path is one acquire-ordered test-and-set. The slow path re-tests with
/// exponential back-off, emitting the platform spin-wait hint
/// ([`std::hint::spin_loop`]) between attempts. Unlocking is a release store.
///
/// There is no fairness and no poisoning. The caller is responsible for pairing
/// [`lock()`](Self::lock) with [`unlock()`](Self::unlock); when the lock guards data,
/// prefer [`BackoffLock<T>`][crate::BackoffLock], which does the pairing via a guard.
///
/// # Example
///
/// ```rust
/// use backoff_lock::RawBackoffLock;
///
/// let lock = RawBackoffLock::new();
///
/// lock.lock();
/// // ... critical section ...
/// lock.unlock();
///
/// assert!(lock.try_lock());
/// lock.unlock();
/// ```
#[derive(Debug, Default)]
pub struct RawBackoffLock {
    locked: AtomicBool,
}

impl RawBackoffLock {
    /// Creates a new unlocked instance.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            locked: AtomicBool::new(false),
        }
    }

    /// Acquires the lock, spinning until it is available.
    #[inline]
    pub fn lock(&self) {
        // Fast path: uncontended.
        if !self.locked.swap(true, Ordering::Acquire) {
            return;
        }

        self.lock_slow();
    }

    #[cold]
    #[cfg_attr(test, mutants::skip)] // Mutations here degenerate into a livelocked busy loop.
    fn lock_slow(&self) {
        let mut backoff = 1_u32;
        loop {
            for _ in 0..backoff {
                spin_loop();
            }

            // Re-read before attempting the swap so the contended cache line stays
            // shared between waiters instead of ping-ponging in exclusive state.
            if !self.locked.load(Ordering::Relaxed) && !self.locked.swap(true, Ordering::Acquire) {
                return;
            }

            if backoff < MAX_BACKOFF {
                backoff <<= 1;
            }
        }
    }

    /// Attempts to acquire the lock without spinning.
    ///
    /// Returns `true` if the lock was acquired.
    #[inline]
    pub fn try_lock(&self) -> bool {
        !self.locked.swap(true, Ordering::Acquire)
    }

    /// Releases the lock.
    ///
    /// Calling this without holding the lock makes the guarded data reachable from
    /// two threads at once; the data-carrying wrapper exists to rule that out.
    #[inline]
    pub fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use std::fmt::Debug;

    use static_assertions::assert_impl_all;

    use super::*;

    assert_impl_all!(RawBackoffLock: Send, Sync, Debug);

    #[test]
    fn lock_unlock_cycle() {
        let lock = RawBackoffLock::new();

        lock.lock();
        lock.unlock();
        lock.lock();
        lock.unlock();
    }

    #[test]
    fn try_lock_fails_while_held() {
        let lock = RawBackoffLock::new();

        assert!(lock.try_lock());
        assert!(!lock.try_lock());

        lock.unlock();
        assert!(lock.try_lock());
        lock.unlock();
    }
}
