//! # Runtime Configuration
//!
//! [`CcConfig`] holds the knobs the host decides at device creation:
//! the PPT entry width, whether hardware conversion is used at all, and
//! which completion rings get converted cookies. [`HwCcConfig`] is the
//! register image derived from it.

use bitfield_struct::bitfield;
use dp_info::cmem::{
    LUT_BASE_ADDR_39_32_CMEM, PPT_ENTRY_SIZE_4K_ALIGNED, PPT_ENTRY_SIZE_4K_UNALIGNED, PPT_MEM_SIZE,
};
use dp_info::cookie::{PPT_PAGE_OS_MSB, SPT_VA_OS_MSB};

/// Width of one PPT entry in CMEM.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum PptEntryWidth {
    /// 4 bytes holding `pa >> 12`; every SPT page must be 4 KiB aligned.
    #[default]
    Aligned4K,
    /// 8 bytes holding the full physical address, low word first.
    Unaligned,
}

impl PptEntryWidth {
    #[inline]
    #[must_use]
    pub const fn bytes(self) -> u32 {
        match self {
            Self::Aligned4K => PPT_ENTRY_SIZE_4K_ALIGNED,
            Self::Unaligned => PPT_ENTRY_SIZE_4K_UNALIGNED,
        }
    }

    /// Number of entries the PPT region holds at this width.
    #[inline]
    #[must_use]
    pub const fn max_entries(self) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let n = (PPT_MEM_SIZE / self.bytes() as u64) as u32;
        n
    }

    /// Byte offset of a pool whose 4-byte layout offset is `offset_4b`.
    #[inline]
    #[must_use]
    pub const fn scale_offset(self, offset_4b: u64) -> u64 {
        offset_4b / PPT_ENTRY_SIZE_4K_ALIGNED as u64 * self.bytes() as u64
    }
}

/// Per completion ring cookie conversion enables.
///
/// Ring 1 delivers completions to firmware and never gets converted
/// cookies in the host default.
#[bitfield(u8)]
#[derive(PartialEq, Eq, Hash)]
pub struct WbmCcEnables {
    pub wbm2sw0: bool,
    pub wbm2sw1: bool,
    pub wbm2sw2: bool,
    pub wbm2sw3: bool,
    pub wbm2sw4: bool,
    pub wbm2sw5: bool,
    pub wbm2sw6: bool,
    pub wbm2fw: bool,
}

impl WbmCcEnables {
    /// Every host ring converted, firmware ring left alone.
    #[must_use]
    pub const fn host_default() -> Self {
        Self::new()
            .with_wbm2sw0(true)
            .with_wbm2sw2(true)
            .with_wbm2sw3(true)
            .with_wbm2sw4(true)
            .with_wbm2sw5(true)
            .with_wbm2sw6(true)
    }
}

/// Host-side cookie conversion settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CcConfig {
    pub entry_width: PptEntryWidth,
    /// Let the device convert cookies on completion. When off, registers
    /// are left untouched and completions take the software path.
    pub hw_cc_enabled: bool,
    /// Factory test mode; registers are not programmed.
    pub ftm_mode: bool,
    /// Zero a pool's PPT entries in CMEM on deinit.
    pub clear_ppt_on_deinit: bool,
    pub chip_id: u32,
    pub wbm_enables: WbmCcEnables,
}

impl Default for CcConfig {
    fn default() -> Self {
        Self {
            entry_width: PptEntryWidth::Aligned4K,
            hw_cc_enabled: true,
            ftm_mode: false,
            clear_ppt_on_deinit: !cfg!(feature = "single-pdev"),
            chip_id: 0,
            wbm_enables: WbmCcEnables::host_default(),
        }
    }
}

impl CcConfig {
    #[must_use]
    pub const fn with_entry_width(mut self, width: PptEntryWidth) -> Self {
        self.entry_width = width;
        self
    }

    #[must_use]
    pub const fn with_hw_cc_enabled(mut self, enabled: bool) -> Self {
        self.hw_cc_enabled = enabled;
        self
    }

    #[must_use]
    pub const fn with_ftm_mode(mut self, ftm: bool) -> Self {
        self.ftm_mode = ftm;
        self
    }

    #[must_use]
    pub const fn with_clear_ppt_on_deinit(mut self, clear: bool) -> Self {
        self.clear_ppt_on_deinit = clear;
        self
    }

    #[must_use]
    pub const fn with_chip_id(mut self, chip_id: u32) -> Self {
        self.chip_id = chip_id;
        self
    }

    #[must_use]
    pub const fn with_wbm_enables(mut self, enables: WbmCcEnables) -> Self {
        self.wbm_enables = enables;
        self
    }

    /// Whether the cookie conversion registers should be written.
    #[must_use]
    pub const fn programs_registers(&self) -> bool {
        self.hw_cc_enabled && !self.ftm_mode
    }
}

/// Register image for the device's cookie conversion block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwCcConfig {
    pub lut_base_addr_31_0: u32,
    /// `0x10` (bit 36 of the full address) marks the base as a CMEM address.
    pub lut_base_addr_39_32: u8,
    pub cc_global_en: bool,
    pub page_4k_align: bool,
    pub cookie_offset_msb: u8,
    pub cookie_page_msb: u8,
    pub error_path_cookie_conv_en: bool,
    pub release_path_cookie_conv_en: bool,
    pub wbm_enables: WbmCcEnables,
}

impl HwCcConfig {
    /// Image for a PPT at CMEM address `cc_cmem_base`.
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn new(cc_cmem_base: u64, config: &CcConfig) -> Self {
        Self {
            // the device takes bits 39..32 from the fixed CMEM tag
            lut_base_addr_31_0: cc_cmem_base as u32,
            lut_base_addr_39_32: LUT_BASE_ADDR_39_32_CMEM,
            cc_global_en: true,
            page_4k_align: matches!(config.entry_width, PptEntryWidth::Aligned4K),
            cookie_offset_msb: SPT_VA_OS_MSB as u8,
            cookie_page_msb: PPT_PAGE_OS_MSB as u8,
            error_path_cookie_conv_en: true,
            release_path_cookie_conv_en: true,
            wbm_enables: config.wbm_enables,
        }
    }
}
