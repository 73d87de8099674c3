//! # Memory Layout and MMU Geometry

use kernel_memory_addresses::{PageSize, Size8K, Size32M, Size256K};

/// log2 of the MMU page size.
pub const PAGE_SHIFT: u32 = Size8K::SHIFT;

/// Size of one MMU page in bytes (8 KiB).
pub const PAGE_SIZE: u32 = 1 << PAGE_SHIFT;

/// Number of virtual address bits consumed below the top-level index.
///
/// Each top-level descriptor covers `1 << TOP_SHIFT` bytes (32 MiB).
pub const TOP_SHIFT: u32 = Size32M::SHIFT;

/// Number of descriptors in a top-level table (VA bits `[31:25]`).
pub const TOP_ENTRIES: usize = 128;

/// Number of virtual address bits consumed below the mid-level index.
///
/// Each mid-level descriptor covers `1 << MID_SHIFT` bytes (256 KiB).
pub const MID_SHIFT: u32 = Size256K::SHIFT;

/// Number of descriptors in a mid-level table (VA bits `[24:18]`).
pub const MID_ENTRIES: usize = 128;

/// Number of page entries in a leaf table (VA bits `[17:13]`).
pub const LEAF_ENTRIES: usize = 32;

/// Start of the kernel virtual region. Everything above is shared by every
/// address space and mapped by the static kernel tables.
pub const KERNEL_BASE: u32 = 0xF800_0000;

/// Highest kernel virtual address handed out by the VM system (exclusive).
///
/// The range above belongs to the boot monitor.
pub const KERNEL_END: u32 = 0xFE00_0000;

/// First top-level index belonging to the kernel region.
pub const KERNEL_TOP_INDEX: usize = (KERNEL_BASE >> TOP_SHIFT) as usize;

/// Number of statically allocated kernel mid-level tables.
pub const KERNEL_MID_TABLES: usize = TOP_ENTRIES - KERNEL_TOP_INDEX;

/// Number of statically allocated kernel leaf tables.
pub const KERNEL_LEAF_TABLES: usize = KERNEL_MID_TABLES * MID_ENTRIES;

/// Number of page entries in the flat kernel leaf array.
pub const KERNEL_PTES: usize = KERNEL_LEAF_TABLES * LEAF_ENTRIES;

/// Size of the linearly mapped window at [`KERNEL_BASE`] that the bootstrap
/// allocator may carve from.
pub const BOOTSTRAP_WINDOW: u32 = 4 * 1024 * 1024;

/// Physical address the kernel image is loaded at.
///
/// The kernel window is mapped linearly: `pa = va - KERNEL_BASE + KERNEL_PHYS_BASE`.
pub const KERNEL_PHYS_BASE: u32 = 0;

/// Number of temporary kernel pages reserved after bootstrap.
pub const TEMPORARY_PAGES: usize = 2;

const _: () = {
    assert!(PAGE_SIZE.is_power_of_two());
    assert!(1 << (TOP_SHIFT - MID_SHIFT) == MID_ENTRIES);
    assert!(1 << (MID_SHIFT - PAGE_SHIFT) == LEAF_ENTRIES);
    assert!((TOP_ENTRIES as u64) << TOP_SHIFT == 1 << 32);
    assert!(KERNEL_BASE.is_multiple_of(1 << TOP_SHIFT));
    assert!(KERNEL_END > KERNEL_BASE);
    assert!(KERNEL_END.is_multiple_of(PAGE_SIZE));
    assert!(BOOTSTRAP_WINDOW.is_multiple_of(PAGE_SIZE));
    assert!(KERNEL_PTES == ((0u32.wrapping_sub(KERNEL_BASE)) >> PAGE_SHIFT) as usize);
};
