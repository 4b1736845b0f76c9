use super::ConcurrentQueue;
use std::collections::VecDeque;
use std::sync::Mutex;

/// A FIFO queue guarded by a single global lock.
///
/// The mutexed counterpart to [`SglStack`](super::SglStack): the correctness
/// reference the lock-free queues are tested against.
pub struct SglQueue<T> {
    data: Mutex<VecDeque<T>>,
}

impl<T: Send> SglQueue<T> {
    pub fn new() -> Self {
        SglQueue {
            data: Mutex::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, val: T) {
        self.data.lock().unwrap().push_back(val);
    }

    pub fn dequeue(&self) -> Option<T> {
        self.data.lock().unwrap().pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.data.lock().unwrap().is_empty()
    }

    pub fn len(&self) -> usize {
        self.data.lock().unwrap().len()
    }
}

impl<T: Send> Default for SglQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentQueue<T> for SglQueue<T> {
    fn enqueue(&self, val: T) {
        SglQueue::enqueue(self, val)
    }

    fn dequeue(&self) -> Option<T> {
        SglQueue::dequeue(self)
    }

    fn is_empty(&self) -> bool {
        SglQueue::is_empty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::SglQueue;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_threaded() {
        let queue: SglQueue<u32> = SglQueue::new();
        assert!(queue.is_empty());

        queue.enqueue(10);
        queue.enqueue(20);
        queue.enqueue(30);
        assert_eq!(queue.len(), 3);

        assert_eq!(queue.dequeue(), Some(10));
        assert_eq!(queue.dequeue(), Some(20));
        assert_eq!(queue.dequeue(), Some(30));
        assert_eq!(queue.dequeue(), None);
    }

    #[test]
    fn test_conservation_multithreaded() {
        let queue: Arc<SglQueue<usize>> = Arc::new(SglQueue::new());
        let threads = 4;
        let per_thread = 10000;

        let mut waitvec: Vec<thread::JoinHandle<()>> = Vec::new();
        for id in 0..threads {
            let queue_copy = queue.clone();
            waitvec.push(thread::spawn(move || {
                for i in 0..per_thread {
                    queue_copy.enqueue(id * per_thread + i);
                }
            }));
        }
        for handle in waitvec {
            handle.join().unwrap();
        }

        let mut drained = Vec::with_capacity(threads * per_thread);
        while let Some(v) = queue.dequeue() {
            drained.push(v);
        }

        drained.sort_unstable();
        let expected: Vec<usize> = (0..threads * per_thread).collect();
        assert_eq!(drained, expected);
    }
}
