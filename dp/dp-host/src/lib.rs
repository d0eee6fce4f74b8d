//! # Hosted Backends
//!
//! Implementations of the cookie conversion hardware seams on top of the
//! host's heap, for bring-up tools and end-to-end tests:
//!
//! - [`HostDmaAlloc`]: 4 KiB-aligned zeroed pages with a configurable
//!   virtual-to-physical offset and an optional page budget.
//! - [`HostPhysMapper`]: the inverse of that offset.
//! - [`SimCmem`]: CMEM as an array of words plus a register latch.

#![allow(unsafe_code)]

mod dma;
mod sim_cmem;

pub use dma::{HostDmaAlloc, HostPhysMapper};
pub use sim_cmem::SimCmem;
