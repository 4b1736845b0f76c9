//! Concurrent LIFO and FIFO containers for Rust.
//!
//! This crate provides a family of stack and queue implementations that all
//! satisfy the same abstract contract under different synchronization
//! strategies: a coarse-locked reference pair, lock-free Treiber and
//! Michael-Scott variants built on hazard-pointer reclamation, an elimination
//! back-off stack, and flat-combining containers that drain per-thread
//! request records under a single lock. A caller picks whichever variant fits
//! its contention profile; the observable semantics are identical.

pub mod memory;
pub mod structures;
pub mod sync;
