use super::ConcurrentStack;
use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicBool, AtomicU8, Ordering};
use std::sync::Mutex;
use thread_local::ThreadLocal;

const OP_NONE: u8 = 0;
const OP_PUSH: u8 = 1;
const OP_POP: u8 = 2;

/// A flat-combining stack.
///
/// Instead of every thread contending on the data structure, each thread
/// publishes its operation into a private request record and then tries to
/// take a single mutex. Whichever thread gets it (the combiner) drains every
/// published request against the sequential vector before releasing the
/// lock, so blocked threads find their operation already done when they
/// arrive. Each applied request linearizes at the point the combiner applies
/// it; the combiner runs single-threaded, so the order inside one drain is a
/// valid serial history.
pub struct FcStack<T: Send> {
    inner: Mutex<Inner<T>>,
    registry: ThreadLocal<ReqToken<T>>,
}

struct Inner<T> {
    data: Vec<T>,
    // The registry owns the request records; per-thread tokens only borrow
    // them, so a record outlives every thread that may publish into it.
    requests: Vec<Box<Request<T>>>,
}

/// One thread's published operation. `op` is the publication flag: the
/// requester stores `value`/`success` first and `op` last (release); the
/// combiner reads `op` first (acquire) and resets it to `NONE` (release)
/// after applying.
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

impl<T: Send> FcStack<T> {
    pub fn new() -> Self {
        FcStack {
            inner: Mutex::new(Inner {
                data: Vec::new(),
                requests: Vec::new(),
            }),
            registry: ThreadLocal::new(),
        }
    }

    /// This thread's request record for this stack, registering it on first
    /// use. Registration appends under the lock; later calls are a
    /// thread-local lookup.
    fn request(&self) -> &Request<T> {
        let token = self.registry.get_or(|| {
            let boxed = Box::new(Request::new());
            let ptr = &*boxed as *const Request<T>;
            self.inner.lock().unwrap().requests.push(boxed);
            ReqToken { ptr }
        });
        unsafe { &*token.ptr }
    }

    pub fn push(&self, val: T) {
        let req = self.request();
        unsafe { *req.value.get() = Some(val) };
        req.success.store(true, Ordering::Relaxed);
        req.op.store(OP_PUSH, Ordering::Release);
        self.combine();
    }

    pub fn pop(&self) -> Option<T> {
        let req = self.request();
        req.success.store(false, Ordering::Relaxed);
        req.op.store(OP_POP, Ordering::Release);
        self.combine();
        // The request is guaranteed processed once combine() returns: either
        // this thread combined it itself, or an earlier combiner holding the
        // lock did.
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
                OP_PUSH => {
                    if let Some(val) = unsafe { (*req.value.get()).take() } {
                        data.push(val);
                    }
                    req.op.store(OP_NONE, Ordering::Release);
                }
                OP_POP => {
                    match data.pop() {
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

impl<T: Send> Default for FcStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Send> ConcurrentStack<T> for FcStack<T> {
    fn push(&self, val: T) {
        FcStack::push(self, val)
    }

    fn pop(&self) -> Option<T> {
        FcStack::pop(self)
    }

    fn is_empty(&self) -> bool {
        FcStack::is_empty(self)
    }
}
