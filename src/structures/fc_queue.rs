use super::ConcurrentQueue;
use std::cell::UnsafeCell;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;
use thread_local::ThreadLocal;

const OP_NONE: u8 = 0;
const OP_ENQ: u8 = 1;
const OP_DEQ: u8 = 2;

/// A flat-combining queue.
///
/// The same combining discipline as [`FcStack`](super::FcStack) applied to a
/// two-ended sequence: threads publish requests into per-thread records and
/// the one thread holding the mutex drains them all against a `VecDeque`,
/// enqueueing at the back and dequeueing at the front.
pub struct FcQueue<T: Send> {
    inner: Mutex<Inner<T>>,
    registry: ThreadLocal<ReqToken<T>>,
}

struct Inner<T> {
    data: VecDeque<T>,
    requests: Vec<Box<Request<T>>>,
}

struct Request<T> {
    op: AtomicU8,
    value: UnsafeCell<Option<T>>,
    success: AtomicBool,
}

unsafe impl<T: Send> Sync for Request<T> {}

struct ReqToken<T> {
    ptr: *const Request<T>,
}

unsafe impl<T: Send> Send for ReqToken<T> {}

impl<T> Request<T> {
    fn new() -> Self {
        Request {
            op: AtomicU8::new(OP_NONE),
            value: UnsafeCell::new(None),
            success: AtomicBool::new(false),
        }
    }
}

impl<T: Send> FcQueue<T> {
    pub fn new() -> Self {
        FcQueue {
            inner: Mutex::new(Inner {
                data: VecDeque::new(),
                requests: Vec::new(),
            }),
            registry: ThreadLocal::new(),
        }
    }

    fn request(&self) -> &Request<T> {
        let token = self.registry.get_or(|| {
            let boxed = Box::new(Request::new());
            let ptr = &*boxed as *const Request<T>;
            self.inner.lock().unwrap().requests.push(boxed);
            ReqToken { ptr }
        });
        unsafe { &*token.ptr }
    }

    pub fn enqueue(&self, val: T) {
        let req = self.request();
        unsafe { *req.value.get() = Some(val) };
        req.success.store(true, Ordering::Relaxed);
        req.op.store(OP_ENQ, Ordering::Release);
        self.combine();
    }

    pub fn dequeue(&self) -> Option<T> {
        let req = self.request();
        req.success.store(false, Ordering::Relaxed);
        req.op.store(OP_DEQ, Ordering::Release);
        self.combine();
        if req.success.load(Ordering::Acquire) {
            unsafe { (*req.value.get()).take() }
        } else {
            None
        }
    }

    fn combine(&self) {
        let mut inner = self.inner.lock().unwrap();
        let Inner { data, requests } = &mut *inner;
        for req in requests.iter() {
            match req.op.load(Ordering::Acquire) {
                OP_ENQ => {
                    if let Some(val) = unsafe { (*req.value.get()).take() } {
                        data.push_back(val);
                    }
                    req.op.store(OP_NONE, Ordering::Release);
                }
                OP_DEQ => {
                    match data.pop_front() {
                        Some(val) => {
                            unsafe { *req.value.get() = Some(val) };
                            req.success.store(true, Ordering::Relaxed);
                        }
                        None => req.success.store(false, Ordering::Relaxed),
                    }
                    req.op.store(OP_NONE, Ordering::Release);
                }
                _ => {}
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.inner.lock().unwrap().data.is_empty()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().data.len()
    }
}

impl<T: Send> Default for FcQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentQueue<T> for FcQueue<T> {
    fn enqueue(&self, val: T) {
        FcQueue::enqueue(self, val)
    }

    fn dequeue(&self) -> Option<T> {
        FcQueue::dequeue(self)
    }

    fn is_empty(&self) -> bool {
        FcQueue::is_empty(self)
    }
}
