//! In-crate fakes for the hardware seams.

use crate::cmem::DeviceMemory;
use crate::config::HwCcConfig;
use crate::dma::{DmaPage, DmaPageAlloc, DmaPages, PhysMapper};
use alloc::boxed::Box;
use alloc::vec::Vec;
use core::ptr::NonNull;
use core::sync::atomic::{AtomicU32, Ordering};
use dp_addresses::PhysicalAddress;
use dp_sync::SpinLock;

pub const CMEM_BASE: u64 = 0x0030_0000;

/// A 4 KiB-aligned frame of fake DDR.
#[repr(align(4096))]
pub struct Frame([u8; 4096]);

/// Bump allocator over heap frames. Physical addresses start at
/// `phys_base` and advance by one page per frame.
pub struct BumpDma {
    frames: Vec<Box<Frame>>,
    phys_base: u64,
    /// Frames that may still be handed out.
    pub budget: usize,
    pub outstanding: usize,
    /// Added to every physical address, to fake unaligned pages.
    pub phys_skew: u64,
}

impl BumpDma {
    pub fn new(phys_base: u64, budget: usize) -> Self {
        Self {
            frames: Vec::new(),
            phys_base,
            budget,
            outstanding: 0,
            phys_skew: 0,
        }
    }
}

impl DmaPageAlloc for BumpDma {
    fn alloc_pages(&mut self, count: usize) -> Option<DmaPages> {
        if count > self.budget {
            return None;
        }
        self.budget -= count;
        self.outstanding += count;

        let mut pages = Vec::with_capacity(count);
        for _ in 0..count {
            let mut frame = Box::new(Frame([0; 4096]));
            let virt = NonNull::new(frame.0.as_mut_ptr()).unwrap();
            let phys = self.phys_base + self.frames.len() as u64 * 4096 + self.phys_skew;
            self.frames.push(frame);
            pages.push(DmaPage {
                virt,
                phys: PhysicalAddress::new(phys),
            });
        }
        Some(unsafe { DmaPages::from_pages(pages) })
    }

    fn free_pages(&mut self, pages: DmaPages) {
        self.outstanding -= pages.len();
        self.budget += pages.len();
    }
}

// SAFETY: every physical address maps back to the frame it was handed out for.
unsafe impl PhysMapper for BumpDma {
    unsafe fn phys_to_ref<'a, T>(&self, pa: PhysicalAddress) -> &'a T {
        let idx = ((pa.as_u64() - self.phys_base) >> 12) as usize;
        let off = (pa.as_u64() & 0xFFF) as usize;
        let frame = &self.frames[idx];
        unsafe { &*frame.0.as_ptr().add(off).cast::<T>() }
    }
}

/// CMEM as an array of 32-bit words starting at [`CMEM_BASE`].
pub struct ArrayCmem {
    words: Box<[AtomicU32]>,
    pub registers: SpinLock<Option<HwCcConfig>>,
    pub writes: AtomicU32,
}

impl ArrayCmem {
    pub fn new(bytes: u64) -> Self {
        Self {
            words: (0..bytes / 4).map(|_| AtomicU32::new(0)).collect(),
            registers: SpinLock::new(None),
            writes: AtomicU32::new(0),
        }
    }

    pub fn word(&self, offset: u64) -> u32 {
        self.words[((offset - CMEM_BASE) / 4) as usize].load(Ordering::Relaxed)
    }
}

impl DeviceMemory for ArrayCmem {
    fn cmem_write(&self, offset: u64, value: u32) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        self.words[((offset - CMEM_BASE) / 4) as usize].store(value, Ordering::Relaxed);
    }

    fn cmem_read(&self, offset: u64) -> u32 {
        self.word(offset)
    }

    fn program_cookie_conversion(&self, config: &HwCcConfig) {
        *self.registers.lock() = Some(*config);
    }
}
