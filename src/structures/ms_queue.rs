use super::ConcurrentQueue;
use crate::memory::{HpManager, RECLAIM_THRESHOLD};
use rand::Rng;
use std::cmp;
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};
use std::thread;
use std::time::Duration;

const MAX_BACKOFF: u32 = 2048;

/// A lock-free Michael-Scott queue.
///
/// This queue is an implementation of that described in [Simple, Fast, and
/// Practical Non-blocking and Blocking Concurrent Queue Algorithms](https://dl.acm.org/citation.cfm?id=248106).
/// It is a linked list of nodes headed by a dummy: `head` always points at
/// the dummy, the queue is empty iff the dummy's `next` is null, and `tail`
/// lags at most one node behind the true end of the list (any thread that
/// notices the lag helps swing it forward). Dequeued dummies are reclaimed
/// through the hazard-pointer manager.
///
/// # Examples
/// ```
/// use concourse::structures::MsQueue;
///
/// let queue: MsQueue<String> = MsQueue::new();
/// queue.enqueue("hello".to_owned());
/// assert_eq!(queue.dequeue(), Some("hello".to_owned()));
/// ```
pub struct MsQueue<T: Send> {
    head: AtomicPtr<Node<T>>,
    tail: AtomicPtr<Node<T>>,
    manager: HpManager<Node<T>>,
}

struct Node<T> {
    next: AtomicPtr<Node<T>>,
    value: Option<T>,
}

unsafe impl<T: Send> Send for MsQueue<T> {}
unsafe impl<T: Send> Sync for MsQueue<T> {}

impl<T: Send> MsQueue<T> {
    pub fn new() -> Self {
        let dummy_node = Box::into_raw(Box::new(Node::new_dummy()));
        MsQueue {
            head: AtomicPtr::new(dummy_node),
            tail: AtomicPtr::new(dummy_node),
            manager: HpManager::new(RECLAIM_THRESHOLD),
        }
    }

    fn backoff(&self, max_backoff: u32) -> u32 {
        let backoff_time = rand::thread_rng().gen_range(0..max_backoff);
        thread::sleep(Duration::new(0, backoff_time * 10));
        cmp::min(max_backoff * 2, MAX_BACKOFF)
    }

    /// Add a new element to the back of the queue.
    pub fn enqueue(&self, val: T) {
        let mut backoff = 1;
        let mut node = Box::new(Node::new(val));
        loop {
            node = match self.try_enqueue(node) {
                Ok(()) => return,
                Err(old_node) => old_node,
            };
            backoff = self.backoff(backoff);
        }
    }

    fn try_enqueue(&self, val: Box<Node<T>>) -> Result<(), Box<Node<T>>> {
        let tail = self.tail.load(Ordering::Acquire);
        self.manager.protect(tail, 0);
        // Tail must still be tail for the protection to count.
        if !ptr::eq(tail, self.tail.load(Ordering::Acquire)) {
            return Err(val);
        }
        let next = unsafe { (*tail).next.load(Ordering::Acquire) };

        // Is the tail actually the end of the list?
        if !next.is_null() {
            // It lags; help swing it forward and retry.
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Relaxed);
            return Err(val);
        }

        let node_ptr = Box::into_raw(val);
        unsafe {
            match (*tail).next.compare_exchange(
                ptr::null_mut(),
                node_ptr,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => {
                    // Linked in. Swinging the tail is best-effort: a failure
                    // means someone already helped.
                    let _ = self
                        .tail
                        .compare_exchange(tail, node_ptr, Ordering::AcqRel, Ordering::Relaxed);
                    self.manager.clear(0);
                    Ok(())
                }
                Err(_) => Err(Box::from_raw(node_ptr)),
            }
        }
    }

    /// Take the element at the front of the queue, or `None` if it is empty.
    pub fn dequeue(&self) -> Option<T> {
        let mut backoff = 1;
        loop {
            if let Ok(val) = self.try_dequeue() {
                return val;
            }
            backoff = self.backoff(backoff);
        }
    }

    fn try_dequeue(&self) -> Result<Option<T>, ()> {
        let head = self.head.load(Ordering::Acquire);
        self.manager.protect(head, 0);
        if !ptr::eq(head, self.head.load(Ordering::Acquire)) {
            return Err(());
        }

        // The payload lives in the node after the dummy, so that node needs
        // its own protection before we can touch it.
        let next = unsafe { (*head).next.load(Ordering::Acquire) };
        self.manager.protect(next, 1);
        if !ptr::eq(next, unsafe { (*head).next.load(Ordering::Acquire) }) {
            return Err(());
        }

        let tail = self.tail.load(Ordering::Acquire);

        if next.is_null() {
            self.manager.clear(0);
            self.manager.clear(1);
            return Ok(None);
        }

        if ptr::eq(head, tail) {
            // Tail is falling behind, advance it and retry.
            let _ = self
                .tail
                .compare_exchange(tail, next, Ordering::AcqRel, Ordering::Relaxed);
            return Err(());
        }

        match self
            .head
            .compare_exchange(head, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // `next` is the new dummy. Only the thread that won the head
                // CAS reads its payload, so taking it in place is exclusive,
                // and the eventual free of the node has nothing to drop.
                let data = unsafe { (*next).value.take() };
                self.manager.clear(1);
                self.manager.retire(head, 0);
                Ok(data)
            }
            Err(_) => Err(()),
        }
    }

    /// Whether `head.next` was null at the sampled instant. Advisory on a
    /// live queue; exact once the queue is quiescent.
    pub fn is_empty(&self) -> bool {
        loop {
            let head = self.head.load(Ordering::Acquire);
            self.manager.protect(head, 0);
            if !ptr::eq(head, self.head.load(Ordering::Acquire)) {
                continue;
            }
            let next = unsafe { (*head).next.load(Ordering::Acquire) };
            self.manager.clear(0);
            return next.is_null();
        }
    }
}

impl<T: Send> Default for MsQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Drop for MsQueue<T> {
    fn drop(&mut self) {
        let mut current = self.head.load(Ordering::Relaxed);
        while !current.is_null() {
            unsafe {
                let next = (*current).next.load(Ordering::Relaxed);
                drop(Box::from_raw(current));
                current = next;
            }
        }
    }
}

impl<T> Node<T> {
    fn new(value: T) -> Self {
        Node {
            next: AtomicPtr::default(),
            value: Some(value),
        }
    }

    fn new_dummy() -> Self {
        Node {
            next: AtomicPtr::default(),
            value: None,
        }
    }
}

impl<T: Send> ConcurrentQueue<T> for MsQueue<T> {
    fn enqueue(&self, val: T) {
        MsQueue::enqueue(self, val)
    }

    fn dequeue(&self) -> Option<T> {
        MsQueue::dequeue(self)
    }

    fn is_empty(&self) -> bool {
        MsQueue::is_empty(self)
    }
}
