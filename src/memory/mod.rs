//! Hazard-pointer reclamation for the lock-free containers.
//!
//! The [`HpManager`] in this module lets the lock-free containers
//! defer freeing removed nodes until no other thread can still be reading
//! them. It also prevents the [ABA problem](https://en.wikipedia.org/wiki/ABA_problem):
//! a node address cannot be recycled while any thread has it published in a
//! hazard slot, so a CAS on a container head can never succeed against a
//! freed-and-reallocated node.

pub use self::hazardpointers::HpManager;
pub use self::hazardpointers::{MAX_HAZARD_POINTERS, MAX_THREADS, RECLAIM_THRESHOLD, SLOTS_PER_THREAD};

mod hazardpointers;
