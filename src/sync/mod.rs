//! Synchronization primitives built on the platform mutex and condvar.

pub use self::condvar::Condvar;

mod condvar;
