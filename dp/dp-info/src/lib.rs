//! # Cookie Conversion Device Constants
//!
//! Compile-time geometry shared by every crate that touches the hardware
//! cookie conversion tables. Nothing in here is computed at runtime; the
//! values mirror what the device expects and are validated by `const`
//! assertions so that a bad combination fails the build instead of the
//! bring-up.
//!
//! ## Layout at a glance
//!
//! ```text
//!  cookie (u32)                       CMEM (PPT, flat array)          DDR (SPT page, 4 KiB)
//! ┌────────┬────────────┬─────────┐   ┌─────────────────────┐         ┌──────────────────┐
//! │ 31..20 │   19..9    │  8..0   │   │ entry 0             │ ──────► │ slot 0   (u64)   │
//! │ unused │ PPT index  │  slot   │──►│ entry 1             │         │ slot 1   (u64)   │
//! └────────┴────────────┴─────────┘   │ ...                 │         │ ...              │
//!                                      │ entry PPT_MAX - 1   │         │ slot 511 (u64)   │
//!                                      └─────────────────────┘         └──────────────────┘
//! ```
//!
//! - [`cookie`]: bit positions of the two cookie fields.
//! - [`cmem`]: size of the primary page table region and its entry widths.
//! - [`pools`]: descriptor pool counts and their per-pool CMEM footprint.

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod cmem;
pub mod cookie;
pub mod pools;

/// Size of one secondary page table page in bytes.
pub const SPT_PAGE_SIZE: u64 = 4096;

/// Number of descriptor slots in one secondary page table page.
pub const SPT_PAGE_MAX_ENTRIES: u32 = 512;

/// Mask selecting the slot within an SPT page.
pub const SPT_PAGE_MAX_ENTRIES_MASK: u32 = SPT_PAGE_MAX_ENTRIES - 1;

/// Bytes the device reads per SPT slot. Slots are always 64 bits wide,
/// independent of the host pointer width.
pub const SPT_SLOT_BYTES: u64 = 8;

const _: () = {
    assert!(SPT_PAGE_MAX_ENTRIES.is_power_of_two());
    assert!(SPT_PAGE_MAX_ENTRIES as u64 * SPT_SLOT_BYTES == SPT_PAGE_SIZE);
};
