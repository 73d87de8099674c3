mod common;

use common::{KERNEL_END, SMALL, TEXT_END, bootstrap, va};
use kernel_alloc::bootstrap::BootstrapAllocError;
use kernel_alloc::physical_memory::PhysicalMemoryError;
use kernel_info::boot::{BootMemoryInfo, MemoryBank};
use kernel_info::memory::{KERNEL_BASE, PAGE_SIZE};
use kernel_memory_addresses::PhysicalAddress;
use kernel_vmem::testing::{HardwareCall, NoInterrupts, RecordingMmu};
use kernel_vmem::{AccessFault, Level, Pmap, PmapConfig, PmapError, SpaceId};

#[test]
fn kernel_root_is_loaded_once() {
    let pmap = bootstrap(SMALL);
    let root = pmap.root(SpaceId::KERNEL).unwrap();
    assert_eq!(
        pmap.hardware().calls(),
        [HardwareCall::LoadRoot(root), HardwareCall::FlushAll]
    );
    assert_eq!(pmap.current(), SpaceId::KERNEL);
}

#[test]
fn pools_start_free() {
    let pmap = bootstrap(SMALL);
    assert_eq!(pmap.pool_capacity(Level::Top), 2);
    assert_eq!(pmap.pool_capacity(Level::Mid), 4);
    assert_eq!(pmap.pool_capacity(Level::Leaf), 8);
    for level in Level::ALL {
        assert_eq!(pmap.free_tables(level), pmap.pool_capacity(level));
    }
}

#[test]
fn managed_memory_starts_after_the_tables() {
    let pmap = bootstrap(SMALL);
    let [first, second] = pmap.temporary_pages();
    let (avail, end) = pmap.virtual_space();

    assert!(first.as_u32() >= KERNEL_END);
    assert!(first.as_u32().is_multiple_of(PAGE_SIZE));
    assert_eq!(second, first + PAGE_SIZE);
    assert_eq!(avail, second + PAGE_SIZE);
    assert_eq!(end, va(0xFE00_0000));

    let avail_start = pmap.physical().avail_start();
    assert_eq!(avail_start, PhysicalAddress::new(first.as_u32() - KERNEL_BASE));
    assert!(pmap.physical().is_managed(avail_start));
    assert!(!pmap.physical().is_managed(PhysicalAddress::new(avail_start.as_u32() - PAGE_SIZE)));
}

#[test]
fn kernel_image_is_mapped_one_to_one() {
    let mut pmap = bootstrap(SMALL);
    let avail_start = pmap.physical().avail_start().as_u32();

    let mapped = (avail_start / PAGE_SIZE) as usize;
    assert_eq!(pmap.resident_count(SpaceId::KERNEL).unwrap(), mapped);
    assert_eq!(pmap.wired_count(SpaceId::KERNEL).unwrap(), mapped);

    let last = va(KERNEL_BASE + avail_start - PAGE_SIZE);
    assert_eq!(
        pmap.extract_kernel(last).unwrap(),
        Some(PhysicalAddress::new(avail_start - PAGE_SIZE))
    );
    assert_eq!(pmap.extract_kernel(last + PAGE_SIZE).unwrap(), None);

    // message buffer and boot stack are writable, text is not
    let text = va(KERNEL_BASE + 2 * PAGE_SIZE);
    assert!(pmap.access(SpaceId::KERNEL, va(KERNEL_BASE), true).is_ok());
    assert!(pmap.access(SpaceId::KERNEL, va(KERNEL_BASE + PAGE_SIZE), true).is_ok());
    assert_eq!(
        pmap.access(SpaceId::KERNEL, text, true),
        Err(AccessFault::WriteProtected(text))
    );
    assert_eq!(
        pmap.access(SpaceId::KERNEL, text, false),
        Ok(PhysicalAddress::new(2 * PAGE_SIZE))
    );
    assert!(pmap.access(SpaceId::KERNEL, va(TEXT_END), true).is_ok());
    // the kernel image is not managed, so nothing is chained
    assert!(pmap.mappings(PhysicalAddress::new(2 * PAGE_SIZE)).is_empty());
}

#[test]
fn window_too_small_for_the_tables() {
    let banks = [MemoryBank::new(0, 4 << 20)];
    let boot = BootMemoryInfo {
        banks: &banks,
        available: 4 << 20,
        text_end: va(0xF804_0000),
        kernel_end: va(0xF83F_E000),
    };
    let result = Pmap::<RecordingMmu, NoInterrupts>::bootstrap(SMALL, &boot, RecordingMmu::default());
    assert!(matches!(
        result.err(),
        Some(PmapError::Bootstrap(BootstrapAllocError::Exhausted { .. }))
    ));
}

#[test]
fn no_memory_banks() {
    let boot = BootMemoryInfo {
        banks: &[],
        available: 0,
        text_end: va(0xF804_0000),
        kernel_end: va(0xF808_0000),
    };
    let result = Pmap::<RecordingMmu, NoInterrupts>::bootstrap(
        PmapConfig::FIXED,
        &boot,
        RecordingMmu::default(),
    );
    assert!(matches!(
        result.err(),
        Some(PmapError::PhysicalMemory(PhysicalMemoryError::NoBanks))
    ));
}

#[test]
fn sizing_from_memory_bootstraps() {
    let pmap = bootstrap(PmapConfig::for_memory(4 << 20));
    assert_eq!(pmap.free_tables(Level::Leaf), pmap.pool_capacity(Level::Leaf));
}
