//! # DMA Address Types
//!
//! Strongly typed wrappers for the two address kinds the cookie conversion
//! tables juggle:
//!
//! | Type | Seen by | Stored in |
//! |------|---------|-----------|
//! | [`PhysicalAddress`] | the device | PPT entries in CMEM |
//! | [`VirtualAddress`] | the host CPU | the per-device page table, SPT slots |
//!
//! Both are `#[repr(transparent)]` over `u64` regardless of the host pointer
//! width, because the device contract is 64-bit on every platform.
//!
//! Alignment questions are asked through a [`PageSize`] marker so the
//! granularity is always spelled out at the call site:
//!
//! ```rust
//! # use dp_addresses::*;
//! let pa = PhysicalAddress::new(0x8_1234_5000);
//! assert!(pa.is_aligned::<Size4K>());
//! assert_eq!(pa.frame_number::<Size4K>(), 0x81_2345);
//!
//! let odd = PhysicalAddress::new(0x8_1234_5010);
//! assert!(!odd.is_aligned::<Size4K>());
//! assert_eq!(odd.offset::<Size4K>(), 0x10);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

mod physical_address;
mod virtual_address;

use core::fmt;
use core::hash::Hash;

pub use physical_address::PhysicalAddress;
pub use virtual_address::VirtualAddress;

/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for supported page granularities.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + Ord + Hash + fmt::Debug
{
    /// Page size in bytes (power of two).
    const SIZE: u64;
    /// log2(SIZE), i.e. the number of low bits that must be zero.
    const SHIFT: u32;
    /// Mask of the in-page offset bits.
    const MASK: u64 = Self::SIZE - 1;
}

/// 4 KiB page (4096 bytes), the granularity of SPT pages.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size4K;
impl sealed::Sealed for Size4K {}
impl PageSize for Size4K {
    const SIZE: u64 = 4096;
    const SHIFT: u32 = 12;
}

const _: () = {
    assert!(Size4K::SIZE == 1 << Size4K::SHIFT);
};
