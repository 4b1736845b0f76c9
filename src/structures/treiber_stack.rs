use super::ConcurrentStack;
use crate::memory::{HpManager, RECLAIM_THRESHOLD};
use std::ptr;
use std::sync::atomic::{AtomicPtr, Ordering};

/// A lock-free Treiber stack.
///
/// The stack is a singly-linked list of heap nodes updated through a single
/// CAS on the head pointer. Popped nodes are handed to the hazard-pointer
/// manager rather than freed in place, which also rules out the ABA problem
/// on the head CAS: a node address cannot be recycled while a pop still has
/// it protected.
///
/// # Examples
/// ```
/// use concourse::structures::TreiberStack;
///
/// let stack: TreiberStack<String> = TreiberStack::new();
/// stack.push("hello".to_owned());
/// assert_eq!(stack.pop(), Some("hello".to_owned()));
/// assert_eq!(stack.pop(), None);
/// ```
pub struct TreiberStack<T: Send> {
    head: AtomicPtr<Node<T>>,
    manager: HpManager<Node<T>>,
}

struct Node<T> {
    value: Option<T>,
    next: AtomicPtr<Node<T>>,
}

unsafe impl<T: Send> Send for TreiberStack<T> {}
unsafe impl<T: Send> Sync for TreiberStack<T> {}

impl<T: Send> TreiberStack<T> {
    pub fn new() -> Self {
        TreiberStack {
            head: AtomicPtr::default(),
            manager: HpManager::new(RECLAIM_THRESHOLD),
        }
    }

    /// Push a value onto the top of the stack.
    ///
    /// The pusher owns the new node until the CAS links it in, so no hazard
    /// protection is needed on this path.
    pub fn push(&self, val: T) {
        let mut node = Box::new(Node::new(val));
        loop {
            node = match self.try_push(node) {
                Ok(()) => return,
                Err(old_node) => old_node,
            };
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

    /// Pop the most recently pushed value, or `None` if the stack is empty.
    pub fn pop(&self) -> Option<T> {
        loop {
            if let Ok(val) = self.try_pop() {
                return val;
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
        // The protection only counts if the head is unchanged: a retirement
        // either happened before the protect (and the slot now blocks
        // reclamation) or this recheck fails and we restart.
        if !ptr::eq(old_head, self.head.load(Ordering::Acquire)) {
            return Err(());
        }
        let next = unsafe { (*old_head).next.load(Ordering::Acquire) };
        match self
            .head
            .compare_exchange_weak(old_head, next, Ordering::AcqRel, Ordering::Acquire)
        {
            Ok(_) => {
                // Winning the CAS makes this thread the only one with any
                // business reading the payload; take it in place so the
                // deferred free of the node box has nothing left to drop.
                let data = unsafe { (*old_head).value.take() };
                self.manager.retire(old_head, 0);
                Ok(data)
            }
            Err(_) => Err(()),
        }
    }

    /// Whether the stack was empty at the instant the head was sampled.
    /// Advisory only: not a linearization point.
    pub fn is_empty(&self) -> bool {
        self.head.load(Ordering::Acquire).is_null()
    }
}

impl<T: Send> Default for TreiberStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> Drop for TreiberStack<T> {
    // When drop runs the program holds no other references to the stack, so
    // we can walk the list freeing nodes directly. Retired nodes are freed
    // by the manager's own drop.
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
    fn new(val: T) -> Self {
        Node {
            value: Some(val),
            next: AtomicPtr::default(),
        }
    }
}

impl<T: Send> ConcurrentStack<T> for TreiberStack<T> {
    fn push(&self, val: T) {
        TreiberStack::push(self, val)
    }

    fn pop(&self) -> Option<T> {
        TreiberStack::pop(self)
    }

    fn is_empty(&self) -> bool {
        TreiberStack::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::TreiberStack;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lifo_single_threaded() {
        let stack: TreiberStack<u32> = TreiberStack::new();
        assert!(stack.is_empty());

        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert!(!stack.is_empty());

        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn test_drop_releases_remaining_nodes() {
        let stack: TreiberStack<String> = TreiberStack::new();
        for i in 0..100 {
            stack.push(format!("value-{}", i));
        }
        // Dropping with live nodes must walk and free them all; run under
        // a leak checker this is the interesting case.
    }

    #[test]
    fn test_tagged_stress() {
        let stack: Arc<TreiberStack<u64>> = Arc::new(TreiberStack::new());
        let threads: u64 = 4;
        let per_thread: u64 = 20000;

        let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::new();
        for id in 0..threads {
            let stack_copy = stack.clone();
            waitvec.push(thread::spawn(move || {
                for i in 0..per_thread {
                    stack_copy.push((id << 32) | i);
                }
            }));
        }
        for handle in waitvec {
            handle.join().unwrap();
        }

        let mut popped = Vec::with_capacity((threads * per_thread) as usize);
        while let Some(v) = stack.pop() {
            popped.push(v);
        }

        assert_eq!(popped.len() as u64, threads * per_thread);
        popped.sort_unstable();

        let mut expected = Vec::with_capacity((threads * per_thread) as usize);
        for id in 0..threads {
            for i in 0..per_thread {
                expected.push((id << 32) | i);
            }
        }
        expected.sort_unstable();
        assert_eq!(popped, expected);
    }

    #[test]
    fn test_concurrent_push_pop_conservation() {
        let stack: Arc<TreiberStack<u64>> = Arc::new(TreiberStack::new());
        let pairs: u64 = 4;
        let per_thread: u64 = 10000;

        let mut waitvec: Vec<thread::JoinHandle<Vec<u64>>> = Vec::new();
        for id in 0..pairs {
            let stack_copy = stack.clone();
            waitvec.push(thread::spawn(move || {
                for i in 0..per_thread {
                    stack_copy.push((id << 32) | i);
                }
                Vec::new()
            }));
        }
        for _ in 0..pairs {
            let stack_copy = stack.clone();
            waitvec.push(thread::spawn(move || {
                let mut taken = Vec::with_capacity(per_thread as usize);
                while taken.len() < per_thread as usize {
                    if let Some(v) = stack_copy.pop() {
                        taken.push(v);
                    }
                }
                taken
            }));
        }

        let mut popped: Vec<u64> = Vec::new();
        for handle in waitvec {
            popped.extend(handle.join().unwrap());
        }

        assert_eq!(stack.pop(), None);
        assert_eq!(popped.len() as u64, pairs * per_thread);

        // No duplication, no fabrication: the popped multiset is exactly
        // the pushed multiset.
        popped.sort_unstable();
        popped.dedup();
        assert_eq!(popped.len() as u64, pairs * per_thread);
        for v in &popped {
            assert!((v >> 32) < pairs && (v & 0xffff_ffff) < per_thread);
        }
    }
}
