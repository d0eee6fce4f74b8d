use dp_addresses::{PhysicalAddress, Size4K};
use dp_cc::{DmaPage, DmaPageAlloc, DmaPages, PhysMapper};
use dp_info::SPT_PAGE_SIZE;
use std::alloc::{Layout, alloc_zeroed, dealloc};
use std::collections::{BTreeMap, BTreeSet};
use std::ptr::{self, NonNull};
use std::sync::{Arc, Mutex, PoisonError};

#[allow(clippy::cast_possible_truncation)]
const PAGE_BYTES: usize = SPT_PAGE_SIZE as usize;

/// Where synthesized physical frames start.
pub const DEFAULT_PHYS_BASE: u64 = 0x1_0000_0000;

fn page_layout() -> Layout {
    // SAFETY: non-zero size, power-of-two alignment.
    unsafe { Layout::from_size_align_unchecked(PAGE_BYTES, PAGE_BYTES) }
}

/// Physical page address → exposed host address.
type PageMap = Arc<Mutex<BTreeMap<u64, usize>>>;

/// Heap-backed DMA page allocator.
///
/// Host memory comes from the global allocator; physical addresses are
/// synthesized from a frame pool starting at [`DEFAULT_PHYS_BASE`]. Freed
/// frames are reused lowest first, so an identical sequence of requests
/// yields identical physical addresses. `phys_offset` is added to every
/// page's physical address to produce pages the device cannot use in
/// 4-byte PPT mode.
#[derive(Debug)]
pub struct HostDmaAlloc {
    phys_offset: u64,
    page_limit: Option<usize>,
    next_frame: u64,
    free_frames: BTreeSet<u64>,
    map: PageMap,
    outstanding: usize,
    allocations: usize,
}

impl Default for HostDmaAlloc {
    fn default() -> Self {
        Self::new()
    }
}

impl HostDmaAlloc {
    #[must_use]
    pub fn new() -> Self {
        Self {
            phys_offset: 0,
            page_limit: None,
            next_frame: DEFAULT_PHYS_BASE,
            free_frames: BTreeSet::new(),
            map: PageMap::default(),
            outstanding: 0,
            allocations: 0,
        }
    }

    #[must_use]
    pub const fn with_phys_offset(mut self, offset: u64) -> Self {
        self.phys_offset = offset;
        self
    }

    /// Refuse any request that would push the outstanding page count past
    /// `limit`.
    #[must_use]
    pub const fn with_page_limit(mut self, limit: usize) -> Self {
        self.page_limit = Some(limit);
        self
    }

    pub const fn set_page_limit(&mut self, limit: Option<usize>) {
        self.page_limit = limit;
    }

    /// Pages handed out and not yet freed.
    #[must_use]
    pub const fn outstanding(&self) -> usize {
        self.outstanding
    }

    /// Successful multi-page allocations so far.
    #[must_use]
    pub const fn allocations(&self) -> usize {
        self.allocations
    }

    /// A mapper resolving this allocator's physical addresses.
    #[must_use]
    pub fn mapper(&self) -> HostPhysMapper {
        HostPhysMapper {
            map: Arc::clone(&self.map),
        }
    }

    fn take_frame(&mut self) -> u64 {
        if let Some(frame) = self.free_frames.pop_first() {
            return frame;
        }
        let frame = self.next_frame;
        self.next_frame += SPT_PAGE_SIZE;
        frame
    }

    fn release(&mut self, pages: &[DmaPage]) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        for page in pages {
            map.remove(&page.phys.as_u64());
            let frame = page.phys.as_u64().wrapping_sub(self.phys_offset);
            self.free_frames.insert(frame);
            // SAFETY: allocated in `alloc_pages` with the same layout.
            unsafe { dealloc(page.virt.as_ptr(), page_layout()) };
        }
    }
}

impl DmaPageAlloc for HostDmaAlloc {
    fn alloc_pages(&mut self, count: usize) -> Option<DmaPages> {
        if let Some(limit) = self.page_limit
            && self.outstanding + count > limit
        {
            log::debug!(
                "refusing {count} pages: {} outstanding, limit {limit}",
                self.outstanding
            );
            return None;
        }

        let mut pages = Vec::new();
        pages.try_reserve_exact(count).ok()?;

        for _ in 0..count {
            // SAFETY: the layout has non-zero size.
            let Some(virt) = NonNull::new(unsafe { alloc_zeroed(page_layout()) }) else {
                self.release(&pages);
                return None;
            };
            let phys = self.take_frame().wrapping_add(self.phys_offset);
            self.map
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .insert(phys, virt.as_ptr().expose_provenance());
            pages.push(DmaPage {
                virt,
                phys: PhysicalAddress::new(phys),
            });
        }

        self.outstanding += count;
        self.allocations += 1;
        // SAFETY: every page is a fresh zeroed 4 KiB block that lives until
        // `free_pages`.
        Some(unsafe { DmaPages::from_pages(pages) })
    }

    fn free_pages(&mut self, pages: DmaPages) {
        self.outstanding -= pages.len();
        self.release(pages.pages());
    }
}

/// Resolves physical addresses handed out by a [`HostDmaAlloc`].
#[derive(Debug, Clone)]
pub struct HostPhysMapper {
    map: PageMap,
}

impl HostPhysMapper {
    /// Host address backing `pa`, if `pa` lies in a live page.
    #[must_use]
    pub fn host_addr(&self, pa: PhysicalAddress) -> Option<usize> {
        let map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        let (&page_pa, &host) = map.range(..=pa.as_u64()).next_back()?;
        let offset = pa.as_u64() - page_pa;
        if offset >= SPT_PAGE_SIZE {
            return None;
        }
        usize::try_from(offset).ok().map(|off| host + off)
    }
}

// SAFETY: only addresses of live pages resolve; the offset is kept within
// the page.
unsafe impl PhysMapper for HostPhysMapper {
    unsafe fn phys_to_ref<'a, T>(&self, pa: PhysicalAddress) -> &'a T {
        let addr = self.host_addr(pa).unwrap_or_else(|| {
            panic!(
                "{pa} is not backed by a live page (frame {:#x})",
                pa.frame_number::<Size4K>()
            )
        });
        // SAFETY: the caller guarantees a live `T` at `pa`; the allocator
        // exposed the provenance of every page it handed out.
        unsafe { &*ptr::with_exposed_provenance::<T>(addr) }
    }
}
