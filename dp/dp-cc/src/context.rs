//! # Cookie Conversion Context
//!
//! One [`HwCookieConversion`] per descriptor pool. It owns the pool's SPT
//! pages and walks them through the lifecycle
//!
//! ```text
//! Unattached ─attach─► Attached ─init─► Initialized ─deinit─► Deinitialized ─detach─► Detached
//!                         │                  ▲                     │                      │
//!                         └──────detach──────┼───────init──────────┘                      │
//!                                            │                                            │
//! Detached ─attach─► Attached ◄──────────────┴────────────────────────────────────────────┘
//! ```
//!
//! - **attach** sizes and allocates the SPT pages and checks that the
//!   device can address every one of them. Any failure releases whatever was
//!   acquired and leaves the context as it was.
//! - **init** assigns the pool's PPT range, writes the page addresses into
//!   CMEM and publishes the pages in the device's page table. A range that
//!   does not fit poisons the device; nothing is written in that case.
//! - **deinit** withdraws the pages again. The ring feeding this pool must
//!   be quiesced first.
//! - **detach** returns the pages to the allocator.

use crate::cmem::DeviceMemory;
use crate::cookie::{decode, encode};
use crate::device::{Device, DeviceId};
use crate::dma::{DmaPageAlloc, DmaPages};
use crate::error::CcError;
use crate::pool::{DescType, PoolKey};
use crate::spt::SptPageDesc;
use alloc::vec::Vec;
use core::ops::Range;
use dp_addresses::VirtualAddress;
use dp_info::SPT_PAGE_MAX_ENTRIES;
use dp_sync::SpinLock;

/// Lifecycle position of a [`HwCookieConversion`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CcState {
    #[default]
    Unattached,
    Attached,
    Initialized,
    Deinitialized,
    Detached,
}

/// Number of SPT pages for `num_descs` descriptors, capped at `max_entries`.
#[inline]
#[must_use]
pub const fn spt_pages_needed(num_descs: u32, max_entries: u32) -> u32 {
    let pages = num_descs.div_ceil(SPT_PAGE_MAX_ENTRIES);
    if pages > max_entries { max_entries } else { pages }
}

#[derive(Debug)]
pub struct HwCookieConversion {
    key: PoolKey,
    state: CcState,
    /// The device the pages were attached to.
    device: Option<DeviceId>,
    /// Byte offset of this pool's entries inside the PPT region.
    cmem_offset: u64,
    total_page_num: u32,
    max_entries: u32,
    pages: Option<DmaPages>,
    page_descs: Vec<SptPageDesc>,
    /// Local indices of page descriptors not lent out. Exists between
    /// attach and detach.
    free_pages: Option<SpinLock<Vec<u32>>>,
}

impl HwCookieConversion {
    #[must_use]
    pub const fn new(desc_type: DescType, pool_id: u32) -> Self {
        Self {
            key: PoolKey::new(desc_type, 0, pool_id),
            state: CcState::Unattached,
            device: None,
            cmem_offset: 0,
            total_page_num: 0,
            max_entries: 0,
            pages: None,
            page_descs: Vec::new(),
            free_pages: None,
        }
    }

    #[must_use]
    pub const fn key(&self) -> PoolKey {
        self.key
    }

    #[must_use]
    pub const fn state(&self) -> CcState {
        self.state
    }

    #[must_use]
    pub const fn cmem_offset(&self) -> u64 {
        self.cmem_offset
    }

    #[must_use]
    pub const fn total_page_num(&self) -> u32 {
        self.total_page_num
    }

    #[must_use]
    pub fn page_descs(&self) -> &[SptPageDesc] {
        &self.page_descs
    }

    /// PPT indices owned by this pool; only meaningful once initialized.
    #[must_use]
    pub fn ppt_range(&self) -> Range<u32> {
        let start = self.page_descs.first().map_or(0, |d| d.ppt_index);
        start..start + self.total_page_num
    }

    /// Allocate SPT pages for `num_descs` descriptors.
    ///
    /// Zero descriptors is accepted and yields a pool without pages; such a
    /// pool can be detached but not initialized.
    ///
    /// # Errors
    /// - [`CcError::InvalidState`] unless unattached or detached.
    /// - [`CcError::Poisoned`] on a poisoned device.
    /// - [`CcError::InvalidPool`] for a pool id the layout does not have.
    /// - [`CcError::ResourceExhausted`] if pages or bookkeeping cannot be
    ///   allocated.
    /// - [`CcError::InvalidAlignment`] if the device cannot address a page.
    pub fn attach<M, A>(
        &mut self,
        dev: &Device<M>,
        alloc: &mut A,
        num_descs: u32,
    ) -> Result<(), CcError>
    where
        A: DmaPageAlloc,
    {
        if !matches!(self.state, CcState::Unattached | CcState::Detached) {
            return Err(self.invalid("attach"));
        }
        dev.ensure_usable()?;

        let key = PoolKey::new(self.key.desc_type, dev.config().chip_id, self.key.pool_id);
        if !key.is_valid() {
            return Err(CcError::InvalidPool {
                desc_type: key.desc_type,
                chip_id: key.chip_id,
                pool_id: key.pool_id,
            });
        }

        let max_entries = dev.max_ppt_entries();
        let num_pages = spt_pages_needed(num_descs, max_entries);
        if num_pages < num_descs.div_ceil(SPT_PAGE_MAX_ENTRIES) {
            log::warn!(
                "{key:?}: {num_descs} descriptors need more than {max_entries} SPT pages, capping"
            );
        }

        let (pages, page_descs) = if num_pages == 0 {
            (None, Vec::new())
        } else {
            let (pages, descs) = Self::alloc_spt_pages(key, dev, alloc, num_pages)?;
            (Some(pages), descs)
        };

        let mut free = Vec::new();
        if free.try_reserve_exact(num_pages as usize).is_err() {
            if let Some(pages) = pages {
                alloc.free_pages(pages);
            }
            return Err(CcError::ResourceExhausted {
                what: "SPT page free list",
            });
        }
        free.extend(0..num_pages);

        self.key = key;
        self.cmem_offset = dev.entry_width().scale_offset(key.cmem_offset_4b());
        self.total_page_num = num_pages;
        self.max_entries = max_entries;
        self.pages = pages;
        self.page_descs = page_descs;
        self.free_pages = Some(SpinLock::new(free));
        self.device = Some(dev.id());
        self.state = CcState::Attached;
        dev.pool_attached();

        log::debug!(
            "{key:?}: attached {num_pages} SPT pages for {num_descs} descriptors, cmem offset {:#x}",
            self.cmem_offset
        );
        Ok(())
    }

    fn alloc_spt_pages<M, A: DmaPageAlloc>(
        key: PoolKey,
        dev: &Device<M>,
        alloc: &mut A,
        num_pages: u32,
    ) -> Result<(DmaPages, Vec<SptPageDesc>), CcError> {
        let count = num_pages as usize;
        let Some(pages) = alloc.alloc_pages(count) else {
            log::error!("{key:?}: failed to allocate {num_pages} SPT pages");
            return Err(CcError::ResourceExhausted { what: "SPT pages" });
        };

        if pages.len() != count {
            log::error!("{key:?}: allocator returned {} of {count} pages", pages.len());
            alloc.free_pages(pages);
            return Err(CcError::ResourceExhausted { what: "SPT pages" });
        }

        let mut descs = Vec::new();
        if descs.try_reserve_exact(count).is_err() {
            alloc.free_pages(pages);
            return Err(CcError::ResourceExhausted {
                what: "SPT page descriptors",
            });
        }

        let mut bad = None;
        for (page, dma) in (0u32..).zip(pages.pages()) {
            if dev.ppt_entry_words(dma.phys).is_none() {
                bad = Some((page, dma.phys));
                break;
            }
            descs.push(SptPageDesc::new(*dma));
        }

        if let Some((page, addr)) = bad {
            log::error!(
                "{key:?}: SPT page {page} at {addr} unusable for {:?} entries",
                dev.entry_width()
            );
            alloc.free_pages(pages);
            return Err(CcError::InvalidAlignment { page, addr });
        }

        Ok((pages, descs))
    }

    /// Publish the pool's pages to the device and the page table.
    ///
    /// # Errors
    /// - [`CcError::InvalidState`] unless attached or deinitialized, if
    ///   the pool has no pages, or if `dev` is not the device it was
    ///   attached to.
    /// - [`CcError::Poisoned`] on a poisoned device.
    /// - [`CcError::InvalidAlignment`] if `dev` cannot address a page.
    /// - [`CcError::ResourceExhausted`] if the entry list cannot be allocated.
    /// - [`CcError::ConfigurationOverflow`] if the pool's range runs past
    ///   the PPT or into another pool. The device is poisoned.
    pub fn init<M: DeviceMemory>(&mut self, dev: &Device<M>) -> Result<(), CcError> {
        if !matches!(self.state, CcState::Attached | CcState::Deinitialized) {
            return Err(self.invalid("init"));
        }
        if self.total_page_num == 0 {
            log::error!("{:?}: init without SPT pages", self.key);
            return Err(self.invalid("init"));
        }
        self.ensure_bound("init", dev)?;
        dev.ensure_usable()?;

        let width = u64::from(dev.entry_width().bytes());
        let max_entries = dev.max_ppt_entries();
        let start = u32::try_from(self.cmem_offset / width).unwrap_or(u32::MAX);
        let range = start..start.saturating_add(self.total_page_num);

        let mut entries = Vec::new();
        entries
            .try_reserve_exact(self.page_descs.len())
            .map_err(|_| CcError::ResourceExhausted { what: "PPT entries" })?;
        for (page, desc) in (0u32..).zip(&self.page_descs) {
            let Some(words) = dev.ppt_entry_words(desc.page_p_addr) else {
                log::error!(
                    "{:?}: SPT page {page} at {} unusable for {:?} entries",
                    self.key,
                    desc.page_p_addr,
                    dev.entry_width()
                );
                return Err(CcError::InvalidAlignment {
                    page,
                    addr: desc.page_p_addr,
                });
            };
            entries.push(words);
        }

        if let Err(e) = dev.table().claim(range.clone(), self.key) {
            if let CcError::ConfigurationOverflow { ppt_index, .. } = e {
                log::error!(
                    "{:?}: PPT index {ppt_index} beyond {max_entries} entries, disabling device",
                    self.key
                );
                dev.poison();
            }
            return Err(e);
        }

        let slots = range.clone().zip(self.page_descs.iter_mut());
        for ((ppt_index, desc), words) in slots.zip(entries) {
            dev.write_ppt_entry(ppt_index, words);
            desc.ppt_index = ppt_index;
            dev.table().publish(ppt_index, desc.page_v_addr);
        }

        self.state = CcState::Initialized;
        log::debug!("{:?}: published PPT indices {range:?}", self.key);
        Ok(())
    }

    /// Withdraw the pool's pages from the device and the page table.
    ///
    /// # Errors
    /// [`CcError::InvalidState`] if the pool has no pages, is not
    /// initialized, or was initialized on another device.
    pub fn deinit<M: DeviceMemory>(&mut self, dev: &Device<M>) -> Result<(), CcError> {
        if self.total_page_num == 0 {
            log::error!("{:?}: deinit without SPT pages", self.key);
            return Err(self.invalid("deinit"));
        }
        if self.state != CcState::Initialized {
            return Err(self.invalid("deinit"));
        }
        self.ensure_bound("deinit", dev)?;

        let clear = dev.config().clear_ppt_on_deinit;
        for desc in &self.page_descs {
            if clear {
                dev.clear_ppt_entry(desc.ppt_index);
            }
            dev.table().clear(desc.ppt_index);
        }
        dev.table().release(self.key);

        self.state = CcState::Deinitialized;
        log::debug!("{:?}: withdrew PPT indices {:?}", self.key, self.ppt_range());
        Ok(())
    }

    /// Return the SPT pages to `alloc` and drop the bookkeeping.
    ///
    /// # Errors
    /// [`CcError::InvalidState`] unless attached or deinitialized, if `dev`
    /// is not the device the pool was attached to, or while page
    /// descriptors are still lent out.
    pub fn detach<M, A: DmaPageAlloc>(
        &mut self,
        dev: &Device<M>,
        alloc: &mut A,
    ) -> Result<(), CcError> {
        if !matches!(self.state, CcState::Attached | CcState::Deinitialized) {
            return Err(self.invalid("detach"));
        }
        self.ensure_bound("detach", dev)?;
        let lent = (self.total_page_num as usize).saturating_sub(self.free_page_count());
        if lent != 0 {
            log::error!("{:?}: detach with {lent} SPT pages still lent out", self.key);
            return Err(self.invalid("detach"));
        }

        if let Some(pages) = self.pages.take() {
            alloc.free_pages(pages);
        }
        self.page_descs = Vec::new();
        self.free_pages = None;
        self.total_page_num = 0;
        self.device = None;
        self.state = CcState::Detached;
        dev.pool_detached();

        log::debug!("{:?}: detached", self.key);
        Ok(())
    }

    /// Store each address of `desc_addrs` in consecutive SPT slots, starting
    /// at the first slot of the first page, and return their cookies.
    ///
    /// # Errors
    /// - [`CcError::InvalidState`] unless initialized.
    /// - [`CcError::ConfigurationOverflow`] if the pool has fewer slots than
    ///   descriptors; nothing is written.
    /// - [`CcError::ResourceExhausted`] if the cookie list cannot be allocated.
    pub fn stamp(&self, desc_addrs: &[u64]) -> Result<Vec<u32>, CcError> {
        if self.state != CcState::Initialized {
            return Err(self.invalid("stamp"));
        }

        let capacity = self.total_page_num as usize * SPT_PAGE_MAX_ENTRIES as usize;
        if desc_addrs.len() > capacity {
            log::error!(
                "{:?}: insufficient secondary page tables for {} descriptors",
                self.key,
                desc_addrs.len()
            );
            return Err(CcError::ConfigurationOverflow {
                ppt_index: self.ppt_range().end,
                max_entries: self.max_entries,
            });
        }

        let mut cookies = Vec::new();
        cookies
            .try_reserve_exact(desc_addrs.len())
            .map_err(|_| CcError::ResourceExhausted { what: "cookies" })?;

        let slots = self
            .page_descs
            .iter()
            .flat_map(|d| (0..SPT_PAGE_MAX_ENTRIES).map(move |slot| (d, slot)));
        for (&addr, (desc, slot)) in desc_addrs.iter().zip(slots) {
            // SAFETY: pages stay allocated until detach, which needs `&mut self`.
            unsafe { desc.write_slot(slot, addr) };
            cookies.push(encode(desc.ppt_index, slot));
        }

        Ok(cookies)
    }

    /// Point the slot behind `cookie` at `desc_addr`.
    ///
    /// # Errors
    /// - [`CcError::InvalidState`] unless initialized.
    /// - [`CcError::ConfigurationOverflow`] if `cookie` belongs to another pool.
    pub fn update_slot(&self, cookie: u32, desc_addr: u64) -> Result<(), CcError> {
        if self.state != CcState::Initialized {
            return Err(self.invalid("update_slot"));
        }

        let (ppt_index, slot) = decode(cookie);
        let range = self.ppt_range();
        let Some(desc) = ppt_index
            .checked_sub(range.start)
            .filter(|_| range.contains(&ppt_index))
            .and_then(|local| self.page_descs.get(local as usize))
        else {
            return Err(CcError::ConfigurationOverflow {
                ppt_index,
                max_entries: self.max_entries,
            });
        };

        // SAFETY: pages stay allocated until detach, which needs `&mut self`.
        unsafe { desc.write_slot(slot, desc_addr) };
        Ok(())
    }

    /// Lend up to `count` unused page descriptors to a descriptor pool.
    /// The copies carry their final PPT index, so lending starts at init.
    ///
    /// # Errors
    /// - [`CcError::InvalidState`] unless initialized.
    /// - [`CcError::ResourceExhausted`] if the result cannot be allocated.
    pub fn acquire_pages(&self, count: usize) -> Result<Vec<SptPageDesc>, CcError> {
        let (CcState::Initialized, Some(free)) = (self.state, &self.free_pages) else {
            return Err(self.invalid("acquire_pages"));
        };

        free.with_lock(|free| {
            let n = count.min(free.len());
            let mut out = Vec::new();
            out.try_reserve_exact(n)
                .map_err(|_| CcError::ResourceExhausted {
                    what: "page descriptor list",
                })?;
            out.extend(
                free.drain(..n)
                    .filter_map(|local| self.page_descs.get(local as usize).copied()),
            );
            Ok(out)
        })
    }

    /// Take back page descriptors from [`acquire_pages`](Self::acquire_pages).
    /// Descriptors of other pools, and ones already returned, are ignored.
    ///
    /// # Errors
    /// [`CcError::InvalidState`] outside attach..detach.
    pub fn release_pages(&self, pages: &[SptPageDesc]) -> Result<(), CcError> {
        let Some(free) = &self.free_pages else {
            return Err(self.invalid("release_pages"));
        };

        free.with_lock(|free| {
            for page in pages {
                let Some(local) = (0u32..)
                    .zip(&self.page_descs)
                    .find(|(_, d)| d.page_v_addr == page.page_v_addr)
                    .map(|(i, _)| i)
                else {
                    log::warn!(
                        "{:?}: ignoring foreign SPT page {}",
                        self.key,
                        VirtualAddress::from_nonnull(page.page_v_addr)
                    );
                    continue;
                };
                if free.contains(&local) {
                    log::warn!("{:?}: SPT page {local} returned twice", self.key);
                    continue;
                }
                free.push(local);
            }
        });
        Ok(())
    }

    /// Page descriptors currently not lent out.
    #[must_use]
    pub fn free_page_count(&self) -> usize {
        self.free_pages
            .as_ref()
            .map_or(0, |free| free.with_lock(|free| free.len()))
    }

    fn ensure_bound<M>(&self, op: &'static str, dev: &Device<M>) -> Result<(), CcError> {
        if self.device == Some(dev.id()) {
            return Ok(());
        }
        log::error!(
            "{:?}: {op} on {:?}, but attached to {:?}",
            self.key,
            dev.id(),
            self.device
        );
        Err(self.invalid(op))
    }

    const fn invalid(&self, op: &'static str) -> CcError {
        CcError::InvalidState {
            op,
            state: self.state,
        }
    }
}

impl Drop for HwCookieConversion {
    fn drop(&mut self) {
        if let Some(pages) = &self.pages {
            log::warn!(
                "{:?}: dropped in {:?} still holding {} SPT pages",
                self.key,
                self.state,
                pages.len()
            );
        }
    }
}
