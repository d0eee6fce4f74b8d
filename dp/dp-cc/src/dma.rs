//! DMA page allocation and physical memory access.

use alloc::vec::Vec;
use core::ptr::NonNull;
use dp_addresses::{PhysicalAddress, VirtualAddress};

/// One 4 KiB page visible to both host and device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DmaPage {
    pub virt: NonNull<u8>,
    pub phys: PhysicalAddress,
}

impl DmaPage {
    #[must_use]
    pub fn virt_addr(&self) -> VirtualAddress {
        VirtualAddress::from_nonnull(self.virt)
    }
}

/// A multi-page DMA allocation, handed out and taken back as a whole.
#[derive(Debug)]
pub struct DmaPages {
    pages: Vec<DmaPage>,
}

// SAFETY: the pages are plain memory owned by whoever holds the allocation.
unsafe impl Send for DmaPages {}
unsafe impl Sync for DmaPages {}

impl DmaPages {
    /// Wrap pages produced by an allocator.
    ///
    /// # Safety
    /// Each `virt` must be valid for reads and writes of 4096 bytes, 8-byte
    /// aligned, zeroed, and stay valid until the allocation is returned to
    /// [`DmaPageAlloc::free_pages`].
    #[must_use]
    pub const unsafe fn from_pages(pages: Vec<DmaPage>) -> Self {
        Self { pages }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    #[must_use]
    pub fn pages(&self) -> &[DmaPage] {
        &self.pages
    }

    #[must_use]
    pub fn into_pages(self) -> Vec<DmaPage> {
        self.pages
    }
}

/// Source of DMA-capable 4 KiB pages.
///
/// Returns `None` when the request cannot be satisfied; no partial
/// allocations are handed out.
pub trait DmaPageAlloc {
    fn alloc_pages(&mut self, count: usize) -> Option<DmaPages>;

    fn free_pages(&mut self, pages: DmaPages);
}

/// Converts device physical addresses into host pointers.
///
/// # Safety
/// Implementations must return a pointer that is valid for reading a `T`
/// at `pa` for as long as the underlying allocation stays alive.
pub unsafe trait PhysMapper {
    /// # Safety
    /// `pa` must refer to memory that holds a valid, suitably aligned `T`
    /// for the whole lifetime `'a`.
    unsafe fn phys_to_ref<'a, T>(&self, pa: PhysicalAddress) -> &'a T;
}
