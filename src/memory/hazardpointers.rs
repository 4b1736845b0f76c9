use std::cell::{Cell, UnsafeCell};
use std::collections::HashSet;
use std::process;
use std::ptr;
use std::sync::atomic::{AtomicPtr, AtomicU64, Ordering};
use thread_local::ThreadLocal;

/// Maximum number of threads that can hold hazard pointers at the same time.
pub const MAX_THREADS: usize = 64;
/// Hazard slots available to each thread.
pub const SLOTS_PER_THREAD: usize = 2;
/// Size of the process-wide hazard record array.
pub const MAX_HAZARD_POINTERS: usize = MAX_THREADS * SLOTS_PER_THREAD;
/// Retired-list length at which a scan is triggered.
pub const RECLAIM_THRESHOLD: usize = 64;

/// One published hazard: which thread owns the record, and which address it
/// is currently protecting. A record is owned while `owner` is non-zero and
/// protecting while `ptr` is non-null.
struct HazardRecord {
    owner: AtomicU64,
    ptr: AtomicPtr<u8>,
}

const EMPTY_RECORD: HazardRecord = HazardRecord {
    owner: AtomicU64::new(0),
    ptr: AtomicPtr::new(ptr::null_mut()),
};

static HAZARD_RECORDS: [HazardRecord; MAX_HAZARD_POINTERS] = [EMPTY_RECORD; MAX_HAZARD_POINTERS];

// Crate-assigned thread ids, since std's ThreadId cannot live in an atomic.
// Id 0 marks an unowned record.
static NEXT_THREAD_ID: AtomicU64 = AtomicU64::new(1);

thread_local! {
    static THREAD_SLOTS: ThreadSlots = ThreadSlots::new();
}

/// Per-thread cache of claimed hazard records. Repeat use of a slot is a
/// plain cache hit; the first use of each slot CASes an unowned record out of
/// the global array. Dropping the cache at thread exit hands the records back.
struct ThreadSlots {
    id: u64,
    records: Cell<[Option<&'static HazardRecord>; SLOTS_PER_THREAD]>,
}

impl ThreadSlots {
    fn new() -> Self {
        ThreadSlots {
            id: NEXT_THREAD_ID.fetch_add(1, Ordering::Relaxed),
            records: Cell::new([None; SLOTS_PER_THREAD]),
        }
    }

    fn record(&self, slot: usize) -> &'static HazardRecord {
        let mut cached = self.records.get();
        match cached[slot] {
            Some(record) => record,
            None => {
                let record = claim_record(self.id);
                cached[slot] = Some(record);
                self.records.set(cached);
                record
            }
        }
    }
}

impl Drop for ThreadSlots {
    fn drop(&mut self) {
        for record in self.records.get().iter().flatten() {
            record.ptr.store(ptr::null_mut(), Ordering::Release);
            record.owner.store(0, Ordering::Release);
        }
    }
}

fn claim_record(id: u64) -> &'static HazardRecord {
    for record in HAZARD_RECORDS.iter() {
        if record
            .owner
            .compare_exchange(0, id, Ordering::AcqRel, Ordering::Relaxed)
            .is_ok()
        {
            return record;
        }
    }
    // Saturation means the process was configured for more threads than the
    // record array can serve. Treated as misconfiguration, not a runtime error.
    eprintln!(
        "hazard pointer records exhausted ({} threads x {} slots)",
        MAX_THREADS, SLOTS_PER_THREAD
    );
    process::abort();
}

/// Hazard-pointer based reclamation manager for nodes of type `T`.
///
/// Each lock-free container owns one manager, typed over its node. The
/// manager publishes protections into the process-wide record array and keeps
/// a retired list per calling thread. Retired nodes are freed by `scan` once
/// no record in the array protects their address.
///
/// The only safe way to dereference a shared pointer `p` loaded from an
/// atomic `A` is the protect-and-recheck protocol:
///
/// ```text
/// loop {
///     p = A.load(Acquire);           // null means empty, done
///     manager.protect(p, slot);
///     if A.load(Acquire) == p { break }   // recheck, else retry
/// }
/// ```
///
/// Any retirement of `p` either happened before the protect (and the slot now
/// blocks reclamation) or the recheck fails and the reader restarts.
pub struct HpManager<T: Send> {
    thread_info: ThreadLocal<UnsafeCell<ThreadLocalInfo<T>>>,
    max_retired: usize,
}

struct ThreadLocalInfo<T> {
    retired: Vec<*mut T>,
}

unsafe impl<T> Send for ThreadLocalInfo<T> {}

impl<T: Send> HpManager<T> {
    pub fn new(max_retired: usize) -> Self {
        HpManager {
            thread_info: ThreadLocal::new(),
            max_retired,
        }
    }

    /// Publish `record` in the calling thread's hazard slot `slot`.
    pub fn protect(&self, record: *mut T, slot: usize) {
        THREAD_SLOTS.with(|slots| {
            slots.record(slot).ptr.store(record as *mut u8, Ordering::Release);
        });
    }

    /// Clear the calling thread's hazard slot `slot`.
    pub fn clear(&self, slot: usize) {
        THREAD_SLOTS.with(|slots| {
            slots.record(slot).ptr.store(ptr::null_mut(), Ordering::Release);
        });
    }

    /// Clear slot `slot` and hand `record` to the calling thread's retired
    /// list. Once the list reaches the reclamation threshold, scan it and
    /// free every entry no hazard record still protects.
    ///
    /// The caller must have unlinked `record` from the container: no new
    /// reference to it can be created after this call.
    pub fn retire(&self, record: *mut T, slot: usize) {
        self.clear(slot);
        let info = unsafe { self.get_mut_thread_info() };
        info.retired.push(record);
        if info.retired.len() >= self.max_retired {
            self.scan();
        }
    }

    /// Partition the calling thread's retired list against a snapshot of
    /// every hazard record: protected pointers are kept, the rest are freed.
    fn scan(&self) {
        let mut hazard_set: HashSet<*mut u8> = HashSet::new();
        for record in HAZARD_RECORDS.iter() {
            let p = record.ptr.load(Ordering::Acquire);
            if !p.is_null() {
                hazard_set.insert(p);
            }
        }

        let info = unsafe { self.get_mut_thread_info() };
        let mut kept: Vec<*mut T> = Vec::new();
        for p in info.retired.drain(..) {
            if hazard_set.contains(&(p as *mut u8)) {
                kept.push(p);
            } else {
                unsafe { Self::free(p) };
            }
        }
        info.retired = kept;
    }

    /// Free every retired node regardless of the hazard snapshot.
    ///
    /// Requires external quiescence: no thread may be inside a container
    /// operation. Taking `&mut self` enforces that here, since every
    /// operation path borrows the manager shared.
    pub fn force_reclaim(&mut self) {
        for cell in self.thread_info.iter_mut() {
            let info = cell.get_mut();
            for p in info.retired.drain(..) {
                unsafe { Self::free(p) };
            }
        }
    }

    unsafe fn free(garbage: *mut T) {
        // Nodes are box-allocated by the containers; letting the box go out
        // of scope runs the node's Drop.
        drop(Box::from_raw(garbage));
    }

    unsafe fn get_mut_thread_info(&self) -> &mut ThreadLocalInfo<T> {
        let cell = self
            .thread_info
            .get_or(|| UnsafeCell::new(ThreadLocalInfo { retired: Vec::new() }));
        &mut *cell.get()
    }
}

impl<T: Send> Drop for HpManager<T> {
    fn drop(&mut self) {
        // The owning container is being destroyed, so quiescence holds.
        self.force_reclaim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    struct Counted(Arc<AtomicUsize>);

    impl Drop for Counted {
        fn drop(&mut self) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn protected_node_survives_scan() {
        let drops = Arc::new(AtomicUsize::new(0));
        let manager: HpManager<Counted> = HpManager::new(2);

        let protected = Box::into_raw(Box::new(Counted(drops.clone())));
        let doomed = Box::into_raw(Box::new(Counted(drops.clone())));

        manager.protect(protected, 0);
        // Retiring on slot 1 keeps slot 0's protection in place. The second
        // retire crosses the threshold and triggers a scan.
        manager.retire(doomed, 1);
        manager.retire(Box::into_raw(Box::new(Counted(drops.clone()))), 1);

        assert_eq!(drops.load(Ordering::SeqCst), 2);

        // Once the protection is dropped, the next scan frees it too.
        manager.clear(0);
        manager.retire(protected, 0);
        manager.retire(Box::into_raw(Box::new(Counted(drops.clone()))), 1);
        assert_eq!(drops.load(Ordering::SeqCst), 4);
    }

    #[test]
    fn manager_drop_reclaims_pending() {
        let drops = Arc::new(AtomicUsize::new(0));
        {
            let manager: HpManager<Counted> = HpManager::new(1000);
            for _ in 0..10 {
                manager.retire(Box::into_raw(Box::new(Counted(drops.clone()))), 0);
            }
            // Threshold not reached; nothing freed yet.
            assert_eq!(drops.load(Ordering::SeqCst), 0);
        }
        assert_eq!(drops.load(Ordering::SeqCst), 10);
    }
}
