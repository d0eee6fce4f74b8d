//! # Hardware Cookie Conversion
//!
//! A network device hands completed buffers back as a compact *cookie*
//! instead of a pointer. This crate maintains the two-level table that lets
//! both the device and the host turn such a cookie back into the address of
//! the buffer-tracking descriptor in constant time.
//!
//! ```text
//!        cookie
//!   ┌──────┴───────┐
//!   │ ppt   │ slot │
//!   └──┬────┴──┬───┘
//!      │       │
//!      ▼       │        CMEM (device)                 host
//!   ┌──────────┴──┐   ┌──────────────────┐   ┌──────────────────────┐
//!   │ PPT entry   │──►│ SPT page (4 KiB) │◄──│ PageDescTable[ppt]   │
//!   │ pa >> 12    │   │ slot → desc addr │   │ SPT page VA          │
//!   └─────────────┘   └──────────────────┘   └──────────────────────┘
//! ```
//!
//! The device walks the left half (CMEM, then DDR by physical address);
//! the host resolver walks the right half (its own page table, then the
//! same SPT page by virtual address). Both land on the same slot.
//!
//! ## Pieces
//!
//! - [`cookie`]: packing and unpacking cookies.
//! - [`HwCookieConversion`]: one descriptor pool's SPT pages and lifecycle
//!   (attach, init, deinit, detach).
//! - [`Device`]: per-device state; the host page table, CMEM access,
//!   register programming and the resolver ([`Device::find`],
//!   [`Device::resolve_completion`]).
//! - [`SocCookieConversion`]: all pools of one device brought up and torn
//!   down together.
//! - [`PptWalker`]: what the device would read, for cross-checking.
//!
//! The hardware is reached only through [`DmaPageAlloc`], [`DeviceMemory`]
//! and [`PhysMapper`], so everything here runs unchanged against simulated
//! backends.
//!
//! ## Example
//!
//! ```rust,ignore
//! let mut cmem = CmemRegion::new(cmem_base, cmem_size);
//! let dev = Device::new(CcConfig::default(), hal, &mut cmem)?;
//!
//! let mut rx0 = HwCookieConversion::new(DescType::RxBuf, 0);
//! rx0.attach(&dev, &mut dma, 4096)?;
//! rx0.init(&dev)?;
//! let cookies = rx0.stamp(&descriptor_addresses)?;
//!
//! // completion interrupt
//! let desc = dev.find(cookie_from_ring);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(unsafe_code)]

extern crate alloc;

pub mod cmem;
pub mod config;
mod context;
pub mod cookie;
mod device;
pub mod dma;
mod error;
mod page_table;
pub mod pool;
mod resolver;
mod soc;
mod spt;
mod walk;

#[cfg(test)]
mod test_support;

pub use cmem::{CmemClient, CmemRegion, CmemReservation, DeviceMemory};
pub use config::{CcConfig, HwCcConfig, PptEntryWidth, WbmCcEnables};
pub use context::{CcState, HwCookieConversion, spt_pages_needed};
pub use cookie::{DescId, decode, encode};
pub use device::{Device, DeviceId};
pub use dma::{DmaPage, DmaPageAlloc, DmaPages, PhysMapper};
pub use error::CcError;
pub use page_table::PageDescTable;
pub use pool::{DescType, PoolKey};
pub use resolver::{CompletionRecord, STALE_DESC_VA_HI};
pub use soc::{PoolSizing, SocCookieConversion};
pub use spt::SptPageDesc;
pub use walk::PptWalker;
