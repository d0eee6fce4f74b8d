use dp_cc::{DeviceMemory, HwCcConfig};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};

/// Simulated CMEM: `size` bytes of 32-bit words at CMEM address `base`,
/// and a latch for the last cookie conversion register image.
#[derive(Debug)]
pub struct SimCmem {
    base: u64,
    words: Box<[AtomicU32]>,
    registers: Mutex<Option<HwCcConfig>>,
    writes: AtomicUsize,
    stray_writes: AtomicUsize,
}

impl SimCmem {
    #[must_use]
    pub fn new(base: u64, size: u64) -> Self {
        Self {
            base,
            words: (0..size / 4).map(|_| AtomicU32::new(0)).collect(),
            registers: Mutex::new(None),
            writes: AtomicUsize::new(0),
            stray_writes: AtomicUsize::new(0),
        }
    }

    fn index(&self, offset: u64) -> Option<usize> {
        let rel = offset.checked_sub(self.base)?;
        if !rel.is_multiple_of(4) {
            return None;
        }
        usize::try_from(rel / 4)
            .ok()
            .filter(|&i| i < self.words.len())
    }

    /// All words, in address order.
    #[must_use]
    pub fn snapshot(&self) -> Vec<u32> {
        self.words.iter().map(|w| w.load(Ordering::Acquire)).collect()
    }

    /// Total 32-bit writes that landed in range.
    #[must_use]
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::Relaxed)
    }

    /// Writes that fell outside the simulated region or were misaligned.
    #[must_use]
    pub fn stray_writes(&self) -> usize {
        self.stray_writes.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn registers(&self) -> Option<HwCcConfig> {
        *self.registers.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl DeviceMemory for SimCmem {
    fn cmem_write(&self, offset: u64, value: u32) {
        if let Some(i) = self.index(offset) {
            self.words[i].store(value, Ordering::Release);
            self.writes.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!("stray CMEM write {value:#x} at {offset:#x}");
            self.stray_writes.fetch_add(1, Ordering::Relaxed);
        }
    }

    fn cmem_read(&self, offset: u64) -> u32 {
        self.index(offset)
            .map_or(0, |i| self.words[i].load(Ordering::Acquire))
    }

    fn program_cookie_conversion(&self, config: &HwCcConfig) {
        *self.registers.lock().unwrap_or_else(PoisonError::into_inner) = Some(*config);
    }
}
