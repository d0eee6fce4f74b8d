//! # CMEM Layout
//!
//! The primary page table lives in on-chip configuration memory (CMEM). The
//! cookie conversion client owns the first [`PPT_MEM_SIZE`] bytes; the flow
//! search table client follows it.

use crate::cookie::PPT_PAGE_OS_BITS;

/// CMEM bytes reserved for the primary page table.
#[cfg(feature = "single-pdev")]
pub const PPT_MEM_SIZE: u64 = 4096;

/// CMEM bytes reserved for the primary page table.
#[cfg(not(feature = "single-pdev"))]
pub const PPT_MEM_SIZE: u64 = 8192;

/// Offset of the cookie conversion region inside the CMEM pool.
pub const CC_MEM_OFFSET_IN_CMEM: u64 = 0;

/// Offset of the flow search table region inside the CMEM pool.
pub const FST_MEM_OFFSET_IN_CMEM: u64 = CC_MEM_OFFSET_IN_CMEM + PPT_MEM_SIZE;

/// CMEM bytes needed by the flow search table.
pub const FST_MEM_SIZE: u64 = 16384;

/// PPT entry width when every SPT page is 4 KiB aligned.
pub const PPT_ENTRY_SIZE_4K_ALIGNED: u32 = 4;

/// PPT entry width when SPT pages may be unaligned.
pub const PPT_ENTRY_SIZE_4K_UNALIGNED: u32 = 8;

/// Number of low address bits the device appends to a 4-byte PPT entry.
pub const PPT_ENTRY_HW_APPEND_BITS_4K_ALIGNED: u32 = 12;

/// Maximum number of PPT entries in 4-byte mode, and the capacity every
/// pool is sized against.
pub const PPT_MAX_ENTRIES: u32 = (PPT_MEM_SIZE / PPT_ENTRY_SIZE_4K_ALIGNED as u64) as u32;

/// Bits 39..32 of the LUT base address. Bit 36 tells the device that the
/// base refers to CMEM rather than DDR.
pub const LUT_BASE_ADDR_39_32_CMEM: u8 = 0x10;

const _: () = {
    assert!(PPT_MEM_SIZE.is_power_of_two());
    assert!(PPT_MAX_ENTRIES <= 1 << PPT_PAGE_OS_BITS);
    assert!(PPT_MEM_SIZE.is_multiple_of(PPT_ENTRY_SIZE_4K_UNALIGNED as u64));
};
