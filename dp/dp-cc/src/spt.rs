//! # Secondary Page Table Pages
//!
//! An SPT page is a 4 KiB DMA page read by the device as an array of 512
//! little-endian `u64` slots, each holding one descriptor address. The host
//! writes slots when it hands descriptors out and the resolver reads them
//! on completion, possibly on another CPU, so every slot access is atomic.

use crate::dma::DmaPage;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU64, Ordering};
use dp_addresses::PhysicalAddress;
use dp_info::{SPT_PAGE_MAX_ENTRIES, SPT_SLOT_BYTES};

/// Bookkeeping for one SPT page.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SptPageDesc {
    pub page_v_addr: NonNull<u8>,
    pub page_p_addr: PhysicalAddress,
    /// Assigned at init; meaningless before.
    pub ppt_index: u32,
}

// SAFETY: the page pointer is only dereferenced through atomic slot
// accesses while the owning pool keeps the allocation alive.
unsafe impl Send for SptPageDesc {}
unsafe impl Sync for SptPageDesc {}

impl SptPageDesc {
    #[must_use]
    pub const fn new(page: DmaPage) -> Self {
        Self {
            page_v_addr: page.virt,
            page_p_addr: page.phys,
            ppt_index: 0,
        }
    }

    /// Store `desc_addr` in `slot`.
    ///
    /// # Safety
    /// The page must still be allocated.
    pub unsafe fn write_slot(&self, slot: u32, desc_addr: u64) {
        // SAFETY: forwarded.
        unsafe { slot_ref(self.page_v_addr, slot) }.store(desc_addr.to_le(), Ordering::Release);
    }

    /// # Safety
    /// The page must still be allocated.
    #[must_use]
    pub unsafe fn read_slot(&self, slot: u32) -> u64 {
        // SAFETY: forwarded.
        unsafe { read_slot(self.page_v_addr, slot) }
    }
}

/// Read `slot` of the SPT page at `page`.
///
/// # Safety
/// `page` must point to a live, 8-byte aligned SPT page.
#[inline]
pub(crate) unsafe fn read_slot(page: NonNull<u8>, slot: u32) -> u64 {
    // SAFETY: forwarded.
    u64::from_le(unsafe { slot_ref(page, slot) }.load(Ordering::Acquire))
}

#[inline]
unsafe fn slot_ref<'a>(page: NonNull<u8>, slot: u32) -> &'a AtomicU64 {
    debug_assert!(slot < SPT_PAGE_MAX_ENTRIES);
    let slot = slot & (SPT_PAGE_MAX_ENTRIES - 1);
    #[allow(clippy::cast_possible_truncation)]
    let offset = (u64::from(slot) * SPT_SLOT_BYTES) as usize;
    // SAFETY: the slot lies within the 4 KiB page and is 8-byte aligned
    // because the page is.
    unsafe { AtomicU64::from_ptr(page.as_ptr().add(offset).cast::<u64>()) }
}
