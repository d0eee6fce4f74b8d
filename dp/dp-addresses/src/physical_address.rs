use crate::PageSize;
use core::fmt;
use core::ops::Add;

/// Physical (device-visible) address.
///
/// This is what the device dereferences when it walks the page tables, so it
/// is the value written into PPT entries. Use [`PhysicalAddress::is_aligned`]
/// to check the alignment contract before handing a page to the device.
#[repr(transparent)]
#[derive(Copy, Clone, Default, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PhysicalAddress(u64);

impl PhysicalAddress {
    #[inline]
    #[must_use]
    pub const fn new(v: u64) -> Self {
        Self(v)
    }

    #[inline]
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }

    /// Rebuild the base address of frame `pfn` of size `S`.
    #[inline]
    #[must_use]
    pub const fn from_frame_number<S: PageSize>(pfn: u64) -> Self {
        Self(pfn << S::SHIFT)
    }

    /// `true` if the low `S::SHIFT` bits are clear.
    #[inline]
    #[must_use]
    pub const fn is_aligned<S: PageSize>(self) -> bool {
        self.0 & S::MASK == 0
    }

    /// Byte offset within the `S`-sized frame containing this address.
    #[inline]
    #[must_use]
    pub const fn offset<S: PageSize>(self) -> u64 {
        self.0 & S::MASK
    }

    #[inline]
    #[must_use]
    pub const fn align_down<S: PageSize>(self) -> Self {
        Self(self.0 & !S::MASK)
    }

    /// The address with the in-frame bits shifted out.
    ///
    /// This is the representation 4-byte PPT entries use: the device appends
    /// the `S::SHIFT` zero bits itself.
    #[inline]
    #[must_use]
    pub const fn frame_number<S: PageSize>(self) -> u64 {
        self.0 >> S::SHIFT
    }
}

impl fmt::Debug for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PA(0x{:016X})", self.0)
    }
}

impl fmt::Display for PhysicalAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:016X}", self.0)
    }
}

impl From<u64> for PhysicalAddress {
    #[inline]
    fn from(v: u64) -> Self {
        Self::new(v)
    }
}

impl From<PhysicalAddress> for u64 {
    #[inline]
    fn from(pa: PhysicalAddress) -> Self {
        pa.as_u64()
    }
}

impl Add<u64> for PhysicalAddress {
    type Output = Self;
    #[inline]
    fn add(self, rhs: u64) -> Self::Output {
        Self(self.0 + rhs)
    }
}
