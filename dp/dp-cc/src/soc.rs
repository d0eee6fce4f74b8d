//! # Soc-Level Bring-Up
//!
//! A device runs several descriptor pools at once: TX pools, RX buffer
//! pools and the PPE-DS TX pool. [`SocCookieConversion`] owns one context
//! per pool and drives them through the lifecycle together, unwinding the
//! pools it already handled when one of them fails.

use crate::cmem::DeviceMemory;
use crate::context::HwCookieConversion;
use crate::device::Device;
use crate::dma::DmaPageAlloc;
use crate::error::CcError;
use crate::pool::DescType;
use alloc::vec::Vec;
use dp_info::pools::{MAX_RXDESC_POOLS, MAX_TXDESC_POOLS};

/// Requested descriptor counts per pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolSizing {
    pub tx: [u32; MAX_TXDESC_POOLS as usize],
    pub rx: [u32; MAX_RXDESC_POOLS as usize],
    /// `None` when the PPE-DS path is not in use.
    pub ppeds_tx: Option<u32>,
}

#[derive(Debug)]
pub struct SocCookieConversion {
    pools: Vec<HwCookieConversion>,
}

impl SocCookieConversion {
    /// One context per pool the sizing asks for.
    ///
    /// # Errors
    /// [`CcError::ResourceExhausted`] if the context list cannot be allocated.
    pub fn new(sizing: &PoolSizing) -> Result<Self, CcError> {
        let mut pools = Vec::new();
        pools
            .try_reserve_exact(sizing.tx.len() + sizing.rx.len() + 1)
            .map_err(|_| CcError::ResourceExhausted {
                what: "cookie conversion contexts",
            })?;

        if sizing.ppeds_tx.is_some() {
            pools.push(HwCookieConversion::new(DescType::PpedsTx, 0));
        }
        pools.extend((0..MAX_TXDESC_POOLS).map(|id| HwCookieConversion::new(DescType::Tx, id)));
        pools.extend(
            (0..MAX_RXDESC_POOLS).map(|id| HwCookieConversion::new(DescType::RxBuf, id)),
        );

        Ok(Self { pools })
    }

    #[must_use]
    pub fn pools(&self) -> &[HwCookieConversion] {
        &self.pools
    }

    #[must_use]
    pub fn pool(&self, desc_type: DescType, pool_id: u32) -> Option<&HwCookieConversion> {
        self.pools
            .iter()
            .find(|p| p.key().desc_type == desc_type && p.key().pool_id == pool_id)
    }

    fn requested(sizing: &PoolSizing, cc: &HwCookieConversion) -> u32 {
        let id = cc.key().pool_id as usize;
        match cc.key().desc_type {
            DescType::Tx => sizing.tx.get(id).copied().unwrap_or(0),
            DescType::RxBuf => sizing.rx.get(id).copied().unwrap_or(0),
            DescType::PpedsTx => sizing.ppeds_tx.unwrap_or(0),
        }
    }

    /// Attach every pool. On failure the pools attached so far are
    /// detached again.
    ///
    /// # Errors
    /// The first error of [`HwCookieConversion::attach`].
    pub fn attach<M, A: DmaPageAlloc>(
        &mut self,
        dev: &Device<M>,
        alloc: &mut A,
        sizing: &PoolSizing,
    ) -> Result<(), CcError> {
        for i in 0..self.pools.len() {
            let num_descs = Self::requested(sizing, &self.pools[i]);
            if let Err(e) = self.pools[i].attach(dev, alloc, num_descs) {
                log::error!("{:?}: attach failed: {e}", self.pools[i].key());
                for done in self.pools[..i].iter_mut().rev() {
                    if let Err(e) = done.detach(dev, alloc) {
                        log::warn!("{:?}: detach during unwind failed: {e}", done.key());
                    }
                }
                return Err(e);
            }
        }

        log::info!("attached {} cookie conversion pools", self.pools.len());
        Ok(())
    }

    /// Initialize every pool that has pages, then program the cookie
    /// conversion registers. On failure the pools initialized so far are
    /// deinitialized again.
    ///
    /// # Errors
    /// The first error of [`HwCookieConversion::init`].
    pub fn init<M: DeviceMemory>(&mut self, dev: &Device<M>) -> Result<(), CcError> {
        for i in 0..self.pools.len() {
            if self.pools[i].total_page_num() == 0 {
                continue;
            }
            if let Err(e) = self.pools[i].init(dev) {
                log::error!("{:?}: init failed: {e}", self.pools[i].key());
                for done in self.pools[..i]
                    .iter_mut()
                    .rev()
                    .filter(|p| p.total_page_num() != 0)
                {
                    if let Err(e) = done.deinit(dev) {
                        log::warn!("{:?}: deinit during unwind failed: {e}", done.key());
                    }
                }
                return Err(e);
            }
        }

        dev.program_registers();
        Ok(())
    }

    /// Deinitialize every pool that has pages.
    ///
    /// # Errors
    /// The first error of [`HwCookieConversion::deinit`]; the remaining
    /// pools are still deinitialized.
    pub fn deinit<M: DeviceMemory>(&mut self, dev: &Device<M>) -> Result<(), CcError> {
        let mut first = Ok(());
        for cc in self.pools.iter_mut().filter(|p| p.total_page_num() != 0) {
            if let Err(e) = cc.deinit(dev) {
                log::warn!("{:?}: deinit failed: {e}", cc.key());
                first = first.and(Err(e));
            }
        }
        first
    }

    /// Detach every pool.
    ///
    /// # Errors
    /// The first error of [`HwCookieConversion::detach`]; the remaining
    /// pools are still detached.
    pub fn detach<M, A: DmaPageAlloc>(
        &mut self,
        dev: &Device<M>,
        alloc: &mut A,
    ) -> Result<(), CcError> {
        let mut first = Ok(());
        for cc in &mut self.pools {
            if let Err(e) = cc.detach(dev, alloc) {
                log::warn!("{:?}: detach failed: {e}", cc.key());
                first = first.and(Err(e));
            }
        }
        first
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cmem::CmemRegion;
    use crate::config::CcConfig;
    use crate::context::CcState;
    use crate::test_support::{ArrayCmem, BumpDma, CMEM_BASE};
    use dp_info::cmem::PPT_MEM_SIZE;

    fn device(config: CcConfig) -> Device<ArrayCmem> {
        let mut cmem = CmemRegion::new(CMEM_BASE, PPT_MEM_SIZE);
        Device::new(config, ArrayCmem::new(PPT_MEM_SIZE), &mut cmem).unwrap()
    }

    fn sizing() -> PoolSizing {
        PoolSizing {
            tx: [1024, 1024, 512, 0],
            rx: [2048, 512, 0, 0],
            ppeds_tx: Some(512),
        }
    }

    #[test]
    fn full_bring_up_and_teardown() {
        let dev = device(CcConfig::default());
        let mut dma = BumpDma::new(0x1_0000_0000, 64);
        let mut soc = SocCookieConversion::new(&sizing()).unwrap();

        soc.attach(&dev, &mut dma, &sizing()).unwrap();
        assert_eq!(dma.outstanding, 2 + 2 + 1 + 4 + 1 + 1);

        soc.init(&dev).unwrap();
        assert_eq!(dev.table().published(), 11);
        assert!(dev.memory().registers.lock().is_some());
        assert_eq!(
            soc.pool(DescType::Tx, 3).map(HwCookieConversion::state),
            Some(CcState::Attached)
        );

        soc.deinit(&dev).unwrap();
        assert_eq!(dev.table().published(), 0);
        soc.detach(&dev, &mut dma).unwrap();
        assert_eq!(dma.outstanding, 0);
        assert_eq!(dev.attached_pools(), 0);
    }

    #[test]
    fn attach_failure_unwinds_earlier_pools() {
        let dev = device(CcConfig::default());
        // enough for PPE-DS and the first TX pool only
        let mut dma = BumpDma::new(0, 3);
        let mut soc = SocCookieConversion::new(&sizing()).unwrap();

        let err = soc.attach(&dev, &mut dma, &sizing()).unwrap_err();
        assert_eq!(err, CcError::ResourceExhausted { what: "SPT pages" });
        assert_eq!(dma.outstanding, 0);
        assert_eq!(dev.attached_pools(), 0);
        assert!(soc.pools().iter().all(|p| p.total_page_num() == 0));
    }

    #[test]
    fn init_failure_unwinds_and_skips_registers() {
        let dev = device(CcConfig::default());
        let mut dma = BumpDma::new(0, 4096);
        let mut big = sizing();
        // RX pool 1 spills into RX pool 2's range and beyond the table
        big.rx[1] = dev.max_ppt_entries() * 512;
        let mut soc = SocCookieConversion::new(&big).unwrap();

        soc.attach(&dev, &mut dma, &big).unwrap();
        assert!(matches!(
            soc.init(&dev),
            Err(CcError::ConfigurationOverflow { .. })
        ));
        assert!(dev.is_poisoned());
        assert_eq!(dev.table().published(), 0);
        assert_eq!(dev.table().claimed_pools(), 0);
        assert!(dev.memory().registers.lock().is_none());
        assert!(
            soc.pools()
                .iter()
                .all(|p| p.state() != CcState::Initialized)
        );

        soc.detach(&dev, &mut dma).unwrap();
        assert_eq!(dma.outstanding, 0);
    }

    #[test]
    fn registers_left_alone_in_ftm_mode() {
        let dev = device(CcConfig::default().with_ftm_mode(true));
        let mut dma = BumpDma::new(0, 64);
        let mut soc = SocCookieConversion::new(&sizing()).unwrap();
        soc.attach(&dev, &mut dma, &sizing()).unwrap();
        soc.init(&dev).unwrap();
        assert!(dev.memory().registers.lock().is_none());
        soc.deinit(&dev).unwrap();
        soc.detach(&dev, &mut dma).unwrap();
    }
}
