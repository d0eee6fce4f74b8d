//! # Control-Plane Synchronization
//!
//! Each cookie conversion context carries its own lock for the page
//! descriptor bookkeeping. The lock is only ever taken by control-plane
//! code (attach, page acquire/release, detach); the completion fast path
//! reads the per-device page table without it.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

mod spin_lock;

pub use spin_lock::{SpinLock, SpinLockGuard};
