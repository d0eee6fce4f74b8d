//! Software model of the device's two-level walk.
//!
//! The device never sees the host page table. It takes the PPT index from
//! the cookie, reads the entry from CMEM, rebuilds the SPT page's physical
//! address and reads the slot from DDR. [`PptWalker`] does exactly that,
//! through [`DeviceMemory::cmem_read`] and a [`PhysMapper`], so that the
//! host resolver can be checked against what the device would return.

use crate::cmem::DeviceMemory;
use crate::config::PptEntryWidth;
use crate::cookie::decode;
use crate::device::Device;
use core::sync::atomic::{AtomicU64, Ordering};
use dp_addresses::{PhysicalAddress, Size4K};
use dp_info::SPT_SLOT_BYTES;

pub struct PptWalker<'a, M, P> {
    device: &'a Device<M>,
    mapper: &'a P,
}

impl<'a, M: DeviceMemory, P: crate::dma::PhysMapper> PptWalker<'a, M, P> {
    #[must_use]
    pub const fn new(device: &'a Device<M>, mapper: &'a P) -> Self {
        Self { device, mapper }
    }

    /// Physical address of the SPT page behind `ppt_index`, or `None` for an
    /// out-of-range index or a cleared entry.
    ///
    /// A PPT entry has no valid bit; zero is what deinit writes. An SPT page
    /// at physical address 0 is therefore indistinguishable from a cleared
    /// entry and reads as `None` here, while [`Device::find`] still
    /// resolves it.
    #[must_use]
    pub fn spt_page(&self, ppt_index: u32) -> Option<PhysicalAddress> {
        if ppt_index >= self.device.max_ppt_entries() {
            return None;
        }

        let offset = self.device.ppt_entry_offset(ppt_index);
        let memory = self.device.memory();
        let pa = match self.device.entry_width() {
            PptEntryWidth::Aligned4K => {
                PhysicalAddress::from_frame_number::<Size4K>(u64::from(memory.cmem_read(offset)))
            }
            PptEntryWidth::Unaligned => {
                let lo = u64::from(memory.cmem_read(offset));
                let hi = u64::from(memory.cmem_read(offset + 4));
                PhysicalAddress::new((hi << 32) | lo)
            }
        };

        (pa != PhysicalAddress::zero()).then_some(pa)
    }

    /// Resolve `cookie` the way the device would.
    ///
    /// # Safety
    /// Every SPT page referenced from CMEM must still be allocated and
    /// reachable through the mapper.
    #[must_use]
    pub unsafe fn walk(&self, cookie: u32) -> Option<u64> {
        let (ppt_index, slot) = decode(cookie);
        let page = self.spt_page(ppt_index)?;
        let slot_pa = page + u64::from(slot) * SPT_SLOT_BYTES;
        // SAFETY: forwarded; slots are 8-byte aligned within the page.
        let slot = unsafe { self.mapper.phys_to_ref::<AtomicU64>(slot_pa) };
        Some(u64::from_le(slot.load(Ordering::Acquire)))
    }
}
