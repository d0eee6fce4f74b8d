//! # Configuration Memory
//!
//! CMEM is a small on-chip region the device can read without going to
//! DDR. Clients carve it up in a fixed order: cookie conversion takes the
//! first [`PPT_MEM_SIZE`] bytes for its primary page table, the flow search
//! table follows.

use crate::config::HwCcConfig;
use crate::error::CcError;
use dp_info::cmem::{FST_MEM_SIZE, PPT_MEM_SIZE};

/// Access to the device's CMEM and cookie conversion registers.
///
/// Offsets are absolute CMEM addresses. Implementations must make each
/// 32-bit write visible to the device before returning.
pub trait DeviceMemory {
    fn cmem_write(&self, offset: u64, value: u32);

    fn cmem_read(&self, offset: u64) -> u32;

    /// Write the cookie conversion register block.
    fn program_cookie_conversion(&self, config: &HwCcConfig);
}

impl<M: DeviceMemory + ?Sized> DeviceMemory for &M {
    fn cmem_write(&self, offset: u64, value: u32) {
        (**self).cmem_write(offset, value);
    }

    fn cmem_read(&self, offset: u64) -> u32 {
        (**self).cmem_read(offset)
    }

    fn program_cookie_conversion(&self, config: &HwCcConfig) {
        (**self).program_cookie_conversion(config);
    }
}

/// CMEM consumers, in reservation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CmemClient {
    CookieConversion,
    FlowSearchTable,
}

impl CmemClient {
    #[must_use]
    pub const fn size(self) -> u64 {
        match self {
            Self::CookieConversion => PPT_MEM_SIZE,
            Self::FlowSearchTable => FST_MEM_SIZE,
        }
    }
}

/// A reserved slice of CMEM.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmemReservation {
    pub base: u64,
    pub size: u64,
}

/// CMEM as advertised by the device, with a running availability count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CmemRegion {
    base: u64,
    total_size: u64,
    avail_size: u64,
}

impl CmemRegion {
    #[must_use]
    pub const fn new(base: u64, total_size: u64) -> Self {
        Self {
            base,
            total_size,
            avail_size: total_size,
        }
    }

    #[must_use]
    pub const fn base(&self) -> u64 {
        self.base
    }

    #[must_use]
    pub const fn total_size(&self) -> u64 {
        self.total_size
    }

    #[must_use]
    pub const fn avail_size(&self) -> u64 {
        self.avail_size
    }

    /// Carve the next slice for `client`.
    ///
    /// # Errors
    /// [`CcError::CmemExhausted`] if less than the client's size is left;
    /// the region is unchanged in that case.
    pub fn reserve(&mut self, client: CmemClient) -> Result<CmemReservation, CcError> {
        let needed = client.size();
        log::info!(
            "cmem base {:#x}, total size {:#x}, avail size {:#x}",
            self.base,
            self.total_size,
            self.avail_size
        );

        if self.avail_size < needed {
            log::error!(
                "{client:?}: cmem avail {:#x} bytes < {needed:#x}",
                self.avail_size
            );
            return Err(CcError::CmemExhausted {
                needed,
                available: self.avail_size,
            });
        }

        let base = self.base + (self.total_size - self.avail_size);
        self.avail_size -= needed;
        log::info!("{client:?}: cmem base {base:#x}, avail size now {:#x}", self.avail_size);

        Ok(CmemReservation { base, size: needed })
    }
}
