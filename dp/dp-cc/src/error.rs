use crate::context::CcState;
use dp_addresses::PhysicalAddress;

/// Failures of the cookie conversion control plane.
///
/// The resolver never fails; it reports an unresolved cookie as `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum CcError {
    /// An allocation needed by attach could not be satisfied. Attach has
    /// already been unwound when this is returned.
    #[error("out of memory while allocating {what}")]
    ResourceExhausted { what: &'static str },

    /// An SPT page's physical address cannot be used by the device.
    #[error("SPT page {page} has unusable physical address {addr}")]
    InvalidAlignment { page: u32, addr: PhysicalAddress },

    /// A PPT index fell outside the table, or into a range another pool
    /// already owns. Fatal for the device.
    #[error("PPT index {ppt_index} outside the {max_entries} entries available")]
    ConfigurationOverflow { ppt_index: u32, max_entries: u32 },

    #[error("{op} is not allowed while {state:?}")]
    InvalidState { op: &'static str, state: CcState },

    /// The pool id does not exist for this descriptor type or chip.
    #[error("no {desc_type:?} pool {pool_id} on chip {chip_id}")]
    InvalidPool {
        desc_type: crate::pool::DescType,
        chip_id: u32,
        pool_id: u32,
    },

    /// An earlier configuration overflow disabled this device.
    #[error("device disabled after a configuration overflow")]
    Poisoned,

    #[error("CMEM exhausted: {needed} bytes needed, {available} available")]
    CmemExhausted { needed: u64, available: u64 },
}
