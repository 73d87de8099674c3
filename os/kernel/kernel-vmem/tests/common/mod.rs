#![allow(dead_code)]

use kernel_info::boot::{BootMemoryInfo, MemoryBank};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_vmem::testing::{NoInterrupts, RecordingMmu};
use kernel_vmem::{Pmap, PmapConfig};

pub type TestPmap = Pmap<RecordingMmu, NoInterrupts>;

/// Two top, four mid and eight leaf tables: small enough to run dry.
pub const SMALL: PmapConfig = PmapConfig {
    top_tables: 2,
    mid_tables: 4,
    leaf_tables: 8,
};

pub const TEXT_END: u32 = 0xF804_0000;
pub const KERNEL_END: u32 = 0xF810_0000;

/// One 4 MiB bank at physical zero, the kernel loaded at its start.
pub fn bootstrap(config: PmapConfig) -> TestPmap {
    let banks = [MemoryBank::new(0, 4 << 20)];
    let boot = BootMemoryInfo {
        banks: &banks,
        available: 4 << 20,
        text_end: VirtualAddress::new(TEXT_END),
        kernel_end: VirtualAddress::new(KERNEL_END),
    };
    Pmap::bootstrap(config, &boot, RecordingMmu::default()).expect("bootstrap")
}

pub const fn va(v: u32) -> VirtualAddress {
    VirtualAddress::new(v)
}

pub const fn pa(p: u32) -> PhysicalAddress {
    PhysicalAddress::new(p)
}

/// The `n`th managed frame used by the tests.
pub const fn frame(n: u32) -> PhysicalAddress {
    PhysicalAddress::new(0x0030_0000 + n * 0x2000)
}

/// A frame outside every bank.
pub const DEVICE: PhysicalAddress = PhysicalAddress::new(0x0100_0000);
