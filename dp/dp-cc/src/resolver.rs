//! # Descriptor Resolver
//!
//! Completion fast path: cookie in, descriptor address out. Safe to call
//! from interrupt context on any CPU while control-plane code attaches or
//! tears down other pools; it takes no lock, allocates nothing and does not
//! log.

use crate::cookie::decode;
use crate::device::Device;
use crate::spt;

/// Upper 32 bits the host writes into a consumed completion record's
/// descriptor address, so that a record seen twice is recognized.
pub const STALE_DESC_VA_HI: u32 = 0x1212_1212;

/// The cookie-related part of a completion ring entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompletionRecord {
    /// Set by the device when it converted the cookie itself.
    pub cookie_convert_done: bool,
    /// Descriptor address written by the device on conversion.
    pub desc_va: u64,
    /// The cookie as posted.
    pub desc_id: u32,
}

impl<M> Device<M> {
    /// Resolve `cookie` to the descriptor address stored in its SPT slot.
    ///
    /// `None` if the cookie's PPT index is out of range or has no page
    /// published.
    #[inline]
    #[must_use]
    pub fn find(&self, cookie: u32) -> Option<u64> {
        let (ppt_index, slot) = decode(cookie);
        let page = self.table().lookup(ppt_index)?;
        // SAFETY: a page stays allocated for as long as it is published;
        // deinit unpublishes before detach frees it.
        Some(unsafe { spt::read_slot(page, slot) })
    }

    /// Resolve a completion record.
    ///
    /// Uses the device's conversion when it reports one, the software
    /// path otherwise. A device-converted address whose upper half is
    /// [`STALE_DESC_VA_HI`] means the record was already consumed; such
    /// records resolve to `None`. Every device-converted record is marked
    /// consumed on the way out.
    #[inline]
    pub fn resolve_completion(&self, record: &mut CompletionRecord) -> Option<u64> {
        if !record.cookie_convert_done {
            return self.find(record.desc_id);
        }

        let va = record.desc_va;
        record.desc_va = (u64::from(STALE_DESC_VA_HI) << 32) | (va & 0xFFFF_FFFF);

        if va >> 32 == u64::from(STALE_DESC_VA_HI) {
            None
        } else {
            Some(va)
        }
    }
}
