//! Descriptor pool identity and its slice of the primary page table.

use dp_info::pools::{
    MAX_CHIPS, MAX_PPE_TXDESC_POOLS, MAX_RXDESC_POOLS, MAX_TXDESC_POOLS, PPEDS_TX_DESC_CMEM_OFFSET,
    RX_DESC_CMEM_OFFSET, RX_DESC_POOL_CMEM_SIZE, TX_DESC_CMEM_OFFSET, TX_DESC_POOL_CMEM_SIZE,
};

/// Kind of descriptor a pool tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DescType {
    Tx,
    RxBuf,
    PpedsTx,
}

impl DescType {
    /// Number of pools of this kind per chip.
    #[must_use]
    pub const fn max_pools(self) -> u32 {
        match self {
            Self::Tx => MAX_TXDESC_POOLS,
            Self::RxBuf => MAX_RXDESC_POOLS,
            Self::PpedsTx => MAX_PPE_TXDESC_POOLS,
        }
    }
}

/// Identifies one pool on one device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct PoolKey {
    pub desc_type: DescType,
    pub chip_id: u32,
    pub pool_id: u32,
}

impl PoolKey {
    #[must_use]
    pub const fn new(desc_type: DescType, chip_id: u32, pool_id: u32) -> Self {
        Self {
            desc_type,
            chip_id,
            pool_id,
        }
    }

    #[must_use]
    pub const fn is_valid(&self) -> bool {
        self.pool_id < self.desc_type.max_pools() && self.chip_id < MAX_CHIPS
    }

    /// Byte offset of this pool inside the PPT region, assuming 4-byte
    /// entries. Scale by the entry width for 8-byte tables.
    ///
    /// TX and PPE-DS pools are shared between chips; RX pools are laid out
    /// per chip.
    #[must_use]
    pub const fn cmem_offset_4b(&self) -> u64 {
        match self.desc_type {
            DescType::PpedsTx => PPEDS_TX_DESC_CMEM_OFFSET,
            DescType::Tx => TX_DESC_CMEM_OFFSET + self.pool_id as u64 * TX_DESC_POOL_CMEM_SIZE,
            DescType::RxBuf => {
                RX_DESC_CMEM_OFFSET
                    + (self.chip_id as u64 * MAX_RXDESC_POOLS as u64 + self.pool_id as u64)
                        * RX_DESC_POOL_CMEM_SIZE
            }
        }
    }
}
