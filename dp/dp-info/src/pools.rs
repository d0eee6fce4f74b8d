//! # Descriptor Pool Footprint
//!
//! Every descriptor pool owns a fixed slice of the primary page table. The
//! slices are sized for the largest descriptor count a pool may request, so
//! the offsets are known at compile time:
//!
//! ```text
//! CMEM offset 0
//! ├── PPE-DS TX pool          (PPEDS_TX_DESC_POOL_CMEM_SIZE)
//! ├── TX pool 0 .. TX pool N  (TX_DESC_POOL_CMEM_SIZE each)
//! └── RX pool (chip 0, pool 0) .. RX pool (chip C, pool M)
//! ```

use crate::SPT_PAGE_MAX_ENTRIES;
use crate::cmem::{PPT_ENTRY_SIZE_4K_ALIGNED, PPT_MEM_SIZE};

/// Number of TX descriptor pools per device.
pub const MAX_TXDESC_POOLS: u32 = 4;

/// Number of RX descriptor pools per device.
pub const MAX_RXDESC_POOLS: u32 = 4;

/// Number of PPE-DS TX descriptor pools per device.
pub const MAX_PPE_TXDESC_POOLS: u32 = 1;

/// Largest TX descriptor count a single pool may request.
pub const NUM_TX_DESC_MAX: u32 = 0x1_0000;

/// Largest RX software descriptor count a single pool may request.
pub const RX_SW_DESC_NUM_SIZE_MAX: u32 = 16384;

/// Largest PPE-DS TX descriptor count.
pub const NUM_PPEDS_TX_DESC_MAX: u32 = 0x8000;

/// Number of chips sharing one CMEM layout in a multi-chip deployment.
#[cfg(feature = "single-pdev")]
pub const MAX_CHIPS: u32 = 1;

/// Number of chips sharing one CMEM layout in a multi-chip deployment.
#[cfg(not(feature = "single-pdev"))]
pub const MAX_CHIPS: u32 = 2;

/// CMEM bytes a pool of `max_descs` descriptors occupies.
#[must_use]
pub const fn pool_cmem_size(max_descs: u32) -> u64 {
    (max_descs / SPT_PAGE_MAX_ENTRIES) as u64 * PPT_ENTRY_SIZE_4K_ALIGNED as u64
}

/// CMEM bytes of the PPE-DS TX pool.
pub const PPEDS_TX_DESC_POOL_CMEM_SIZE: u64 = pool_cmem_size(NUM_PPEDS_TX_DESC_MAX);

/// CMEM offset of the PPE-DS TX pool.
pub const PPEDS_TX_DESC_CMEM_OFFSET: u64 = 0;

/// CMEM bytes of one TX pool.
pub const TX_DESC_POOL_CMEM_SIZE: u64 = pool_cmem_size(NUM_TX_DESC_MAX);

/// CMEM offset of TX pool 0.
pub const TX_DESC_CMEM_OFFSET: u64 = PPEDS_TX_DESC_CMEM_OFFSET + PPEDS_TX_DESC_POOL_CMEM_SIZE;

/// CMEM bytes of one RX pool.
pub const RX_DESC_POOL_CMEM_SIZE: u64 = pool_cmem_size(RX_SW_DESC_NUM_SIZE_MAX);

/// CMEM offset of RX pool 0 on chip 0.
pub const RX_DESC_CMEM_OFFSET: u64 =
    TX_DESC_CMEM_OFFSET + MAX_TXDESC_POOLS as u64 * TX_DESC_POOL_CMEM_SIZE;

/// End of the last RX pool of the last chip.
pub const DESC_CMEM_END: u64 =
    RX_DESC_CMEM_OFFSET + (MAX_CHIPS * MAX_RXDESC_POOLS) as u64 * RX_DESC_POOL_CMEM_SIZE;

const _: () = {
    assert!(NUM_TX_DESC_MAX.is_multiple_of(SPT_PAGE_MAX_ENTRIES));
    assert!(RX_SW_DESC_NUM_SIZE_MAX.is_multiple_of(SPT_PAGE_MAX_ENTRIES));
    assert!(NUM_PPEDS_TX_DESC_MAX.is_multiple_of(SPT_PAGE_MAX_ENTRIES));
    assert!(DESC_CMEM_END <= PPT_MEM_SIZE);
};
