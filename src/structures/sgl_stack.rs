use super::ConcurrentStack;
use std::sync::Mutex;

/// A LIFO stack guarded by a single global lock.
///
/// Every operation takes the mutex, inspects or mutates the underlying
/// vector, and releases it. Used as the correctness reference for the
/// lock-free stacks in property tests.
pub struct SglStack<T> {
    data: Mutex<Vec<T>>,
}

impl<T: Send> SglStack<T> {
    pub fn new() -> Self {
        SglStack {
            data: Mutex::new(Vec::new()),
        }
    }

    pub fn push(&self, val: T) {
        self.data.lock().unwrap().push(val);
    }

    pub fn pop(&self) -> Option<T> {
        self.data.lock().unwrap().pop()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

impl<T: Send> Default for SglStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStack<T> for SglStack<T> {
    fn push(&self, val: T) {
        SglStack::push(self, val)
    }

    fn pop(&self) -> Option<T> {
        SglStack::pop(self)
    }

    fn is_empty(&self) -> bool {
        SglStack::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::SglStack;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_lifo_single_threaded() {
        let stack: SglStack<u32> = SglStack::new();
        assert!(stack.is_empty());

        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.len(), 3);

        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
        assert!(stack.is_empty());
    }

    #[test]
    fn test_disjoint_ranges_multithreaded() {
        let stack: Arc<SglStack<usize>> = Arc::new(SglStack::new());
        let threads = 4;
        let per_thread = 20000;

        let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::new();
        for id in 0..threads {
            let stack_copy = stack.clone();
            waitvec.push(thread::spawn(move || {
                for i in 0..per_thread {
                    stack_copy.push(id * per_thread + i);
                }
            }));
        }
        for handle in waitvec {
            handle.join().unwrap();
        }

        let mut popped = Vec::with_capacity(threads * per_thread);
        while let Some(v) = stack.pop() {
            popped.push(v);
        }

        assert_eq!(popped.len(), threads * per_thread);
        popped.sort_unstable();
        let expected: Vec<usize> = (0..threads * per_thread).collect();
        assert_eq!(popped, expected);
    }
}
