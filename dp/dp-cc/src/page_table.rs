//! # Per-Device Page Table
//!
//! The host-side mirror of the PPT: one slot per PPT index holding the
//! virtual address of the SPT page the device will read for that index, or
//! null once the page is withdrawn.
//!
//! Readers are lock-free (`Acquire` loads). Writers are control-plane code
//! that has claimed a disjoint index range for its pool; the claim list is
//! kept under a lock and is never consulted on lookup.

use crate::error::CcError;
use crate::pool::PoolKey;
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ops::Range;
use core::ptr::{self, NonNull};
use core::sync::atomic::{AtomicPtr, Ordering};
use dp_sync::SpinLock;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Claim {
    range: Range<u32>,
    owner: PoolKey,
}

pub struct PageDescTable {
    entries: Box<[AtomicPtr<u8>]>,
    claims: SpinLock<Vec<Claim>>,
}

impl PageDescTable {
    /// Table with `max_entries` empty slots.
    ///
    /// # Errors
    /// [`CcError::ResourceExhausted`] if the slot array cannot be allocated.
    pub fn new(max_entries: u32) -> Result<Self, CcError> {
        let len = max_entries as usize;
        let mut entries = Vec::new();
        entries
            .try_reserve_exact(len)
            .map_err(|_| CcError::ResourceExhausted {
                what: "page descriptor table",
            })?;
        entries.resize_with(len, || AtomicPtr::new(ptr::null_mut()));

        Ok(Self {
            entries: entries.into_boxed_slice(),
            claims: SpinLock::new(Vec::new()),
        })
    }

    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub fn max_entries(&self) -> u32 {
        // constructed from a u32
        self.entries.len() as u32
    }

    /// SPT page published at `ppt_index`, if any.
    #[inline]
    #[must_use]
    pub fn lookup(&self, ppt_index: u32) -> Option<NonNull<u8>> {
        let entry = self.entries.get(ppt_index as usize)?;
        NonNull::new(entry.load(Ordering::Acquire))
    }

    /// Make `page` visible to readers at `ppt_index`.
    ///
    /// The caller must hold a claim covering `ppt_index`.
    pub(crate) fn publish(&self, ppt_index: u32, page: NonNull<u8>) {
        if let Some(entry) = self.entries.get(ppt_index as usize) {
            entry.store(page.as_ptr(), Ordering::Release);
        }
    }

    /// Tombstone `ppt_index`.
    pub(crate) fn clear(&self, ppt_index: u32) {
        if let Some(entry) = self.entries.get(ppt_index as usize) {
            entry.store(ptr::null_mut(), Ordering::Release);
        }
    }

    /// Reserve `range` for `owner`.
    ///
    /// # Errors
    /// [`CcError::ConfigurationOverflow`] naming the first offending index
    /// if the range runs past the table or overlaps another pool's claim.
    pub(crate) fn claim(&self, range: Range<u32>, owner: PoolKey) -> Result<(), CcError> {
        let max_entries = self.max_entries();
        if range.end > max_entries {
            return Err(CcError::ConfigurationOverflow {
                ppt_index: range.start.max(max_entries),
                max_entries,
            });
        }

        self.claims.with_lock(|claims| {
            if let Some(other) = claims
                .iter()
                .filter(|c| !c.range.is_empty() && !range.is_empty())
                .find(|c| c.range.start < range.end && range.start < c.range.end)
            {
                log::error!(
                    "{owner:?}: PPT range {range:?} overlaps {:?} held by {:?}",
                    other.range,
                    other.owner
                );
                return Err(CcError::ConfigurationOverflow {
                    ppt_index: range.start.max(other.range.start),
                    max_entries,
                });
            }

            claims
                .try_reserve(1)
                .map_err(|_| CcError::ResourceExhausted { what: "PPT claim" })?;
            claims.push(Claim { range, owner });
            Ok(())
        })
    }

    /// Drop `owner`'s claim.
    pub(crate) fn release(&self, owner: PoolKey) {
        self.claims.with_lock(|claims| claims.retain(|c| c.owner != owner));
    }

    /// Number of pools currently holding a range.
    #[must_use]
    pub fn claimed_pools(&self) -> usize {
        self.claims.with_lock(|claims| claims.len())
    }

    /// Number of indices currently published.
    #[must_use]
    pub fn published(&self) -> usize {
        self.entries
            .iter()
            .filter(|e| !e.load(Ordering::Relaxed).is_null())
            .count()
    }
}

impl core::fmt::Debug for PageDescTable {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("PageDescTable")
            .field("max_entries", &self.max_entries())
            .field("published", &self.published())
            .finish_non_exhaustive()
    }
}
