//! # Cookie Bit Layout

use crate::SPT_PAGE_MAX_ENTRIES;

/// Lowest bit of the in-page slot field.
pub const SPT_VA_OS_LSB: u32 = 0;

/// Highest bit of the in-page slot field. Programmed into the device as the
/// cookie offset MSB.
pub const SPT_VA_OS_MSB: u32 = 8;

/// Lowest bit of the PPT index field.
pub const PPT_PAGE_OS_LSB: u32 = 9;

/// Highest bit of the PPT index field. Programmed into the device as the
/// cookie page MSB.
pub const PPT_PAGE_OS_MSB: u32 = 19;

/// Width of the slot field in bits.
pub const SPT_VA_OS_BITS: u32 = SPT_VA_OS_MSB - SPT_VA_OS_LSB + 1;

/// Width of the PPT index field in bits.
pub const PPT_PAGE_OS_BITS: u32 = PPT_PAGE_OS_MSB - PPT_PAGE_OS_LSB + 1;

/// Mask of the slot field within a cookie.
pub const SPT_VA_OS_MASK: u32 = ((1 << SPT_VA_OS_BITS) - 1) << SPT_VA_OS_LSB;

/// Mask of the PPT index field within a cookie.
pub const PPT_PAGE_OS_MASK: u32 = ((1 << PPT_PAGE_OS_BITS) - 1) << PPT_PAGE_OS_LSB;

const _: () = {
    assert!(SPT_VA_OS_MASK == 0x1FF);
    assert!(PPT_PAGE_OS_MASK == 0xF_FE00);
    assert!(1 << SPT_VA_OS_BITS == SPT_PAGE_MAX_ENTRIES);
    assert!(SPT_VA_OS_MSB + 1 == PPT_PAGE_OS_LSB);
};
