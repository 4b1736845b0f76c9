use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Condvar as StdCondvar, MutexGuard};

/// A condition variable whose plain `wait` never returns spuriously.
///
/// The platform condition variable is allowed to wake a waiter with no
/// corresponding notification. This wrapper hides that behind a generation
/// counter: every `notify_one`/`notify_all` bumps the counter before waking,
/// and `wait` only returns once the counter has moved past the value it
/// sampled on entry. Each successful return therefore corresponds to a
/// notification issued after the wait began.
///
/// Rapid notification bursts may still coalesce: two bumps landing within a
/// single waiter cycle produce one observable wake. Callers that pace their
/// notifications (or use [`wait_while`](Condvar::wait_while)) get one wake
/// per notification.
pub struct Condvar {
    cv: StdCondvar,
    seq: AtomicUsize,
}

impl Condvar {
    pub fn new() -> Self {
        Condvar {
            cv: StdCondvar::new(),
            seq: AtomicUsize::new(0),
        }
    }

    /// Wake one parked waiter. The generation bump happens first so a waiter
    /// racing into `wait` still observes the notification.
    pub fn notify_one(&self) {
        self.seq.fetch_add(1, Ordering::Release);
        self.cv.notify_one();
    }

    /// Wake every parked waiter.
    pub fn notify_all(&self) {
        self.seq.fetch_add(1, Ordering::Release);
        self.cv.notify_all();
    }

    /// Block until notified. Unlike the platform primitive, a return from
    /// this method always means some thread called `notify_one` or
    /// `notify_all` after this call began.
    pub fn wait<'a, T>(&self, guard: MutexGuard<'a, T>) -> MutexGuard<'a, T> {
        let entry_seq = self.seq.load(Ordering::Acquire);
        // Internally the predicate form absorbs the spurious returns.
        self.cv
            .wait_while(guard, |_| self.seq.load(Ordering::Acquire) == entry_seq)
            .unwrap()
    }

    /// Block while `condition` holds. Forwards to the platform primitive:
    /// the caller's predicate already masks spurious wake-ups.
    pub fn wait_while<'a, T, F>(&self, guard: MutexGuard<'a, T>, condition: F) -> MutexGuard<'a, T>
    where
        F: FnMut(&mut T) -> bool,
    {
        self.cv.wait_while(guard, condition).unwrap()
    }
}

impl Default for Condvar {
    fn default() -> Self {
        Self::new()
    }
}
