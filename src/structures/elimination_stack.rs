use super::ConcurrentStack;
use crate::memory::{HpManager, RECLAIM_THRESHOLD};
use rand::Rng;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::thread;

const ELIM_ARRAY_SIZE: usize = 16;
const ELIM_TRIES: usize = 4;
const CAS_THRESHOLD: usize = 4;
const SPIN_ITERS: usize = 10;

/// A Treiber stack with an elimination back-off arena.
///
/// The fast path is a plain Treiber push/pop on the central list. When an
/// operation accumulates `CAS_THRESHOLD` consecutive CAS failures it tries to
/// pair off with an opposing operation in a small arena of slots instead of
/// hammering the head: a pusher parks its node in a random slot and waits
/// briefly for a popper to take it; a popper swaps random slots hoping to
/// find a parked node. A matched pair completes both operations without ever
/// touching the central stack, which is what makes the stack scale past the
/// single-CAS bottleneck under contention.
///
/// Ownership of an offered node transfers with the slot: once a popper
/// exchanges it out, the popper destroys it; the pusher only reclaims it by
/// winning the CAS that empties its own slot.
pub struct EliminationStack<T: Send> {
    head: AtomicPtr<Node<T>>,
    arena: [AtomicPtr<Node<T>>; ELIM_ARRAY_SIZE],
    manager: HpManager<Node<T>>,
}

struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send> Send for EliminationStack<T> {}
unsafe impl<T: Send> Sync for EliminationStack<T> {}

impl<T: Send> EliminationStack<T> {
    pub fn new() -> Self {
        EliminationStack {
            head: AtomicPtr::default(),
            arena: Default::default(),
            manager: HpManager::new(RECLAIM_THRESHOLD),
        }
    }

    pub fn push(&self, val: T) {
        let mut node = Box::new(Node::new(val));
        let mut cas_failures = 0;
        loop {
            node = match self.try_push(node) {
                Ok(()) => return,
                Err(old_node) => old_node,
            };
            cas_failures += 1;
            if cas_failures >= CAS_THRESHOLD {
                node = match self.try_elim_push(node) {
                    Ok(()) => return,
                    Err(old_node) => old_node,
                };
                cas_failures = 0;
            }
        }
    }

    fn try_push(&self, node: Box<Node<T>>) -> Result<(), Box<Node<T>>> {
        let old_head = self.head.load(Ordering::Relaxed);
        node.next.store(old_head, Ordering::Relaxed);

        let node_ptr = Box::into_raw(node);
        match self
            .head
            .compare_exchange_weak(old_head, node_ptr, Ordering::Release, Ordering::Relaxed)
        {
            Ok(_) => Ok(()),
            Err(_) => unsafe { Err(Box::from_raw(node_ptr)) },
        }
    }

    /// Offer `node` to the arena and wait briefly for a pop to take it.
    /// `Ok` means the node was consumed by a matching pop; `Err` hands the
    /// node back for another round of central CAS.
    fn try_elim_push(&self, node: Box<Node<T>>) -> Result<(), Box<Node<T>>> {
        let node_ptr = Box::into_raw(node);
        for _ in 0..ELIM_TRIES {
            let slot = &self.arena[Self::random_slot()];
            if slot
                .compare_exchange(ptr::null_mut(), node_ptr, Ordering::AcqRel, Ordering::Relaxed)
                .is_err()
            {
                continue;
            }

            for _ in 0..SPIN_ITERS {
                if !ptr::eq(slot.load(Ordering::Acquire), node_ptr) {
                    // A pop took the node; it now owns and will destroy it.
                    return Ok(());
                }
                thread::yield_now();
            }

            // Timed out; try to take the offer back.
            return match slot.compare_exchange(
                node_ptr,
                ptr::null_mut(),
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => unsafe { Err(Box::from_raw(node_ptr)) },
                // A pop raced the reclaim and won: the node is consumed.
                Err(_) => Ok(()),
            };
        }
        unsafe { Err(Box::from_raw(node_ptr)) }
    }

    pub fn pop(&self) -> Option<T> {
        let mut cas_failures = 0;
        loop {
            match self.try_pop() {
                Ok(Some(val)) => return Some(val),
                // Central stack looked empty: scavenge the arena before
                // reporting empty, a parked push may still be waiting.
                Ok(None) => return self.try_elim_pop(),
                Err(()) => {
                    cas_failures += 1;
                    if cas_failures >= CAS_THRESHOLD {
                        if let Some(val) = self.try_elim_pop() {
                            return Some(val);
                        }
                        cas_failures = 0;
                    }
                }
            }
        }
    }

    fn try_pop(&self) -> Result<Option<T>, ()> {
        let old_head = self.head.load(Ordering::Acquire);
        if old_head.is_null() {
            self.manager.clear(0);
            return Ok(None);
        }
        self.manager.protect(old_head, 0);
        if !ptr::eq(old_head, self.head.load(Ordering::Acquire)) {
            return Err(());
        }
        let next = unsafe { (*old_head).next.load(Ordering::Acquire) };
        match self
            .head
            .compare_exchange_weak(old_head, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                let data = unsafe { (*old_head).value.take() };
                self.manager.retire(old_head, 0);
                Ok(data)
            }
            Err(_) => Err(()),
        }
    }

    /// Swap random arena slots looking for a parked push. Arena nodes never
    /// came from the central list, so a claimed node can be freed directly.
    fn try_elim_pop(&self) -> Option<T> {
        for _ in 0..ELIM_TRIES {
            let slot = &self.arena[Self::random_slot()];
            let node_ptr = slot.swap(ptr::null_mut(), Ordering::AcqRel);
            if !node_ptr.is_null() {
                let mut node = unsafe { Box::from_raw(node_ptr) };
                return node.value.take();
            }
        }
        None
    }

    fn random_slot() -> usize {
        rand::thread_rng().gen_range(0..ELIM_ARRAY_SIZE)
    }

    /// Advisory emptiness snapshot: central stack and arena both drained.
    pub fn is_empty(&self) -> bool {
        if !self.head.load(Ordering::Acquire).is_null() {
            return false;
        }
        self.arena
            .iter()
            .all(|slot| slot.load(Ordering::Acquire).is_null())
    }
}

impl<T: Send> Default for EliminationStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Drop for EliminationStack<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            unsafe {
                let next = (*current).next.load(Ordering::Relaxed);
                drop(Box::from_raw(current));
                current = next;
            }
        }
        // An abandoned offer is a single node; its next pointer is stale
        // central-list state, never a chain the arena owns.
        for slot in self.arena.iter() {
            let node_ptr = slot.swap(ptr::null_mut(), Ordering::Relaxed);
            if !node_ptr.is_null() {
                unsafe { drop(Box::from_raw(node_ptr)) };
            }
        }
    }
}

impl<T> Node<T> {
    fn new(val: T) -> Self {
        Node {
            value: Some(val),
            next: AtomicPtr::default(),
        }
    }
}

impl<T: Send> ConcurrentStack<T> for EliminationStack<T> {
    fn push(&self, val: T) {
        EliminationStack::push(self, val)
    }

    fn pop(&self) -> Option<T> {
        EliminationStack::pop(self)
    }

    fn is_empty(&self) -> bool {
        EliminationStack::is_empty(self)
    }
}
