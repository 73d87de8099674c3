//! # Linear Kernel Window
//!
//! The first part of the kernel region is mapped linearly onto physical memory
//! starting at [`KERNEL_PHYS_BASE`]. Everything the bootstrap allocator hands
//! out (kernel tables, table pools, reverse-map arrays) lives there, so the
//! physical address of such an object follows from its virtual address and
//! vice versa without consulting any table.
//!
//! ```rust
//! use kernel_alloc::phys_mapper::KernelWindow;
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//!
//! let va = VirtualAddress::new(0xF801_2000);
//! let pa = KernelWindow::to_physical(va);
//! assert_eq!(pa, PhysicalAddress::new(0x0001_2000));
//! assert_eq!(KernelWindow::to_virtual(pa), va);
//! ```

use kernel_info::memory::{KERNEL_BASE, KERNEL_PHYS_BASE};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};

/// Conversions for the linearly mapped kernel window.
pub struct KernelWindow;

impl KernelWindow {
    /// Physical address backing a kernel-window virtual address.
    ///
    /// ### Debug assertions
    /// - Asserts `va` lies in the kernel region.
    #[inline]
    #[must_use]
    pub const fn to_physical(va: VirtualAddress) -> PhysicalAddress {
        debug_assert!(va.as_u32() >= KERNEL_BASE);
        PhysicalAddress::new(va.as_u32() - KERNEL_BASE + KERNEL_PHYS_BASE)
    }

    /// Kernel-window virtual address of a physical address.
    #[inline]
    #[must_use]
    pub const fn to_virtual(pa: PhysicalAddress) -> VirtualAddress {
        VirtualAddress::new(pa.as_u32() - KERNEL_PHYS_BASE + KERNEL_BASE)
    }
}
