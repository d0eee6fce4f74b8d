//! # Cookie Codec
//!
//! A cookie (descriptor id) packs the PPT index that selects an SPT page and
//! the slot inside that page:
//!
//! | Bits   | Field       |
//! |--------|-------------|
//! | 0–8    | slot        |
//! | 9–19   | PPT index   |
//! | 20–31  | unused, 0   |
//!
//! ```rust
//! # use dp_cc::cookie::{decode, encode};
//! let cookie = encode(3, 17);
//! assert_eq!(cookie, (3 << 9) | 17);
//! assert_eq!(decode(cookie), (3, 17));
//! ```

use bitfield_struct::bitfield;
use dp_info::SPT_PAGE_MAX_ENTRIES;
use dp_info::cookie::{PPT_PAGE_OS_BITS, PPT_PAGE_OS_LSB, SPT_VA_OS_BITS};

/// Largest PPT index a cookie can carry.
pub const MAX_PPT_INDEX: u32 = (1 << PPT_PAGE_OS_BITS) - 1;

/// Largest slot a cookie can carry.
pub const MAX_SLOT: u32 = SPT_PAGE_MAX_ENTRIES - 1;

/// Typed view of a cookie.
#[bitfield(u32)]
#[derive(PartialEq, Eq, Hash)]
pub struct DescId {
    /// Slot within the SPT page.
    #[bits(9)]
    pub slot: u32,

    /// Index into the primary page table.
    #[bits(11)]
    pub ppt_index: u32,

    #[bits(12)]
    __: u32,
}

const _: () = {
    assert!(SPT_VA_OS_BITS == 9);
    assert!(PPT_PAGE_OS_LSB == 9);
    assert!(PPT_PAGE_OS_BITS == 11);
};

/// Pack `(ppt_index, slot)` into a cookie.
///
/// Both inputs must be in range (`ppt_index <= MAX_PPT_INDEX`,
/// `slot <= MAX_SLOT`); out-of-range bits are dropped.
#[inline]
#[must_use]
pub const fn encode(ppt_index: u32, slot: u32) -> u32 {
    debug_assert!(ppt_index <= MAX_PPT_INDEX);
    debug_assert!(slot <= MAX_SLOT);
    DescId::new()
        .with_ppt_index(ppt_index & MAX_PPT_INDEX)
        .with_slot(slot & MAX_SLOT)
        .into_bits()
}

/// Split a cookie into `(ppt_index, slot)`. Unused high bits are ignored.
#[inline]
#[must_use]
pub const fn decode(cookie: u32) -> (u32, u32) {
    let id = DescId::from_bits(cookie);
    (id.ppt_index(), id.slot())
}
