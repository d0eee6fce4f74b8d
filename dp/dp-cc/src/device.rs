//! # Device Instance
//!
//! Everything cookie conversion keeps per device: the CMEM slice holding
//! the PPT, the host page table mirroring it, the register configuration
//! and a poison flag. Several devices in one process never share any of
//! this; a multi-chip deployment creates one [`Device`] per chip.

use crate::cmem::{CmemClient, CmemRegion, DeviceMemory};
use crate::config::{CcConfig, HwCcConfig, PptEntryWidth};
use crate::context::CcState;
use crate::error::CcError;
use crate::page_table::PageDescTable;
use core::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use dp_addresses::{PhysicalAddress, Size4K};
use dp_info::cmem::PPT_ENTRY_HW_APPEND_BITS_4K_ALIGNED;

const _: () = assert!(PPT_ENTRY_HW_APPEND_BITS_4K_ALIGNED == 12);

static NEXT_DEVICE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a [`Device`]. Pools remember the device they
/// were attached to and refuse lifecycle calls against any other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DeviceId(u64);

impl DeviceId {
    fn next() -> Self {
        Self(NEXT_DEVICE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

pub struct Device<M> {
    id: DeviceId,
    config: CcConfig,
    cc_cmem_base: u64,
    table: PageDescTable,
    memory: M,
    poisoned: AtomicBool,
    attached_pools: AtomicUsize,
}

impl<M: DeviceMemory> Device<M> {
    /// Bring up cookie conversion state for one device, reserving its PPT
    /// region from `cmem`.
    ///
    /// # Errors
    /// - [`CcError::ResourceExhausted`] if the page table cannot be allocated.
    /// - [`CcError::CmemExhausted`] if CMEM has no room for the PPT.
    pub fn new(config: CcConfig, memory: M, cmem: &mut CmemRegion) -> Result<Self, CcError> {
        let table = PageDescTable::new(config.entry_width.max_entries())?;
        let region = cmem.reserve(CmemClient::CookieConversion)?;

        log::info!(
            "chip {}: cc cmem base {:#x}, {:?} entries, {} max",
            config.chip_id,
            region.base,
            config.entry_width,
            table.max_entries()
        );

        Ok(Self {
            id: DeviceId::next(),
            config,
            cc_cmem_base: region.base,
            table,
            memory,
            poisoned: AtomicBool::new(false),
            attached_pools: AtomicUsize::new(0),
        })
    }

    /// Write the cookie conversion registers, unless hardware conversion
    /// is disabled or the device runs in FTM mode. Returns whether the
    /// registers were written.
    pub fn program_registers(&self) -> bool {
        if !self.config.programs_registers() {
            log::info!(
                "chip {}: skipping cookie conversion registers (hw_cc {}, ftm {})",
                self.config.chip_id,
                self.config.hw_cc_enabled,
                self.config.ftm_mode
            );
            return false;
        }

        let regs = HwCcConfig::new(self.cc_cmem_base, &self.config);
        log::debug!("chip {}: {regs:?}", self.config.chip_id);
        self.memory.program_cookie_conversion(&regs);
        true
    }

    pub(crate) fn write_ppt_entry(&self, ppt_index: u32, words: (u32, Option<u32>)) {
        let offset = self.ppt_entry_offset(ppt_index);
        self.memory.cmem_write(offset, words.0);
        if let Some(hi) = words.1 {
            self.memory.cmem_write(offset + 4, hi);
        }
    }

    pub(crate) fn clear_ppt_entry(&self, ppt_index: u32) {
        let offset = self.ppt_entry_offset(ppt_index);
        self.memory.cmem_write(offset, 0);
        if self.config.entry_width == PptEntryWidth::Unaligned {
            self.memory.cmem_write(offset + 4, 0);
        }
    }
}

impl<M> Device<M> {
    /// Encode `pa` as the CMEM words of one PPT entry at the current width,
    /// or `None` if the device cannot address it.
    #[must_use]
    pub fn ppt_entry_words(&self, pa: PhysicalAddress) -> Option<(u32, Option<u32>)> {
        match self.config.entry_width {
            PptEntryWidth::Aligned4K => {
                if !pa.is_aligned::<Size4K>() {
                    return None;
                }
                u32::try_from(pa.frame_number::<Size4K>())
                    .ok()
                    .map(|frame| (frame, None))
            }
            PptEntryWidth::Unaligned => {
                if !pa.as_u64().is_multiple_of(dp_info::SPT_SLOT_BYTES) {
                    return None;
                }
                let (lo, hi) = split_u64(pa.as_u64());
                Some((lo, Some(hi)))
            }
        }
    }

    /// CMEM address of the entry for `ppt_index`.
    #[must_use]
    pub fn ppt_entry_offset(&self, ppt_index: u32) -> u64 {
        self.cc_cmem_base + u64::from(ppt_index) * u64::from(self.config.entry_width.bytes())
    }

    #[must_use]
    pub const fn id(&self) -> DeviceId {
        self.id
    }

    #[must_use]
    pub const fn config(&self) -> &CcConfig {
        &self.config
    }

    #[must_use]
    pub const fn entry_width(&self) -> PptEntryWidth {
        self.config.entry_width
    }

    #[must_use]
    pub fn max_ppt_entries(&self) -> u32 {
        self.table.max_entries()
    }

    #[must_use]
    pub const fn cc_cmem_base(&self) -> u64 {
        self.cc_cmem_base
    }

    #[must_use]
    pub const fn table(&self) -> &PageDescTable {
        &self.table
    }

    #[must_use]
    pub const fn memory(&self) -> &M {
        &self.memory
    }

    #[must_use]
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn attached_pools(&self) -> usize {
        self.attached_pools.load(Ordering::Acquire)
    }

    /// Change the PPT entry width. Only possible while no pool is attached,
    /// since attached pools were validated against the old width.
    ///
    /// # Errors
    /// - [`CcError::InvalidState`] while any pool is attached.
    /// - [`CcError::ResourceExhausted`] if the resized table cannot be allocated.
    pub fn set_entry_width(&mut self, width: PptEntryWidth) -> Result<(), CcError> {
        if self.attached_pools() != 0 {
            return Err(CcError::InvalidState {
                op: "set_entry_width",
                state: CcState::Attached,
            });
        }
        if width == self.config.entry_width {
            return Ok(());
        }

        self.table = PageDescTable::new(width.max_entries())?;
        self.config.entry_width = width;
        log::info!("chip {}: PPT entry width now {width:?}", self.config.chip_id);
        Ok(())
    }

    pub(crate) fn ensure_usable(&self) -> Result<(), CcError> {
        if self.is_poisoned() {
            Err(CcError::Poisoned)
        } else {
            Ok(())
        }
    }

    pub(crate) fn poison(&self) {
        self.poisoned.store(true, Ordering::Release);
    }

    pub(crate) fn pool_attached(&self) {
        self.attached_pools.fetch_add(1, Ordering::AcqRel);
    }

    pub(crate) fn pool_detached(&self) {
        self.attached_pools.fetch_sub(1, Ordering::AcqRel);
    }
}

impl<M> core::fmt::Debug for Device<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("Device")
            .field("id", &self.id)
            .field("config", &self.config)
            .field("cc_cmem_base", &self.cc_cmem_base)
            .field("table", &self.table)
            .field("poisoned", &self.is_poisoned())
            .finish_non_exhaustive()
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn split_u64(v: u64) -> (u32, u32) {
    (v as u32, (v >> 32) as u32)
}
