//! # Kernel Boot Information
//!
//! What the boot monitor tells the kernel about physical memory before the
//! translation layer takes over the MMU.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// One contiguous bank of physical RAM as reported by the boot monitor.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryBank {
    /// First byte of the bank.
    pub start: PhysicalAddress,
    /// Size of the bank in bytes.
    pub size: u32,
}

impl MemoryBank {
    #[must_use]
    pub const fn new(start: u32, size: u32) -> Self {
        Self {
            start: PhysicalAddress::new(start),
            size,
        }
    }
}

/// Information the translation layer needs at bootstrap.
#[derive(Debug, Clone)]
pub struct BootMemoryInfo<'a> {
    /// Physical RAM banks in ascending address order.
    pub banks: &'a [MemoryBank],

    /// Bytes of RAM the boot monitor leaves to the kernel.
    ///
    /// The difference to the total bank size is monitor memory at the end of
    /// the last bank.
    pub available: u32,

    /// End of the kernel text segment (page aligned down when mapped).
    pub text_end: VirtualAddress,

    /// First free kernel virtual address after the loaded kernel image.
    pub kernel_end: VirtualAddress,
}

impl BootMemoryInfo<'_> {
    /// Sum of all bank sizes.
    #[must_use]
    pub fn total_memory(&self) -> u64 {
        self.banks.iter().map(|b| u64::from(b.size)).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn total_memory_sums_every_bank() {
        let banks = [MemoryBank::new(0, 0x0040_0000), MemoryBank::new(0x0100_0000, 0x0020_0000)];
        let info = BootMemoryInfo {
            banks: &banks,
            available: 0x0050_0000,
            text_end: VirtualAddress::new(0xF804_0000),
            kernel_end: VirtualAddress::new(0xF808_0000),
        };
        assert_eq!(info.total_memory(), 0x0060_0000);
    }
}
