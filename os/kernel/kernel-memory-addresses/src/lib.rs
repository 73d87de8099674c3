//! # Virtual and Physical Memory Address Types
//!
//! Strongly typed wrappers for raw 32-bit memory addresses and page bases used
//! in the translation tables and the code that manages them.
//!
//! ## Overview
//!
//! This module defines a minimal set of types that prevent mixing virtual and
//! physical addresses at compile time while remaining zero-cost wrappers around
//! `u32` values.
//!
//! | Concept | Generic | Description |
//! |----------|----------|-------------|
//! | [`MemoryAddress`] | – | A raw 32-bit address, either physical or virtual. |
//! | [`MemoryPage<S>`] | [`S: PageSize`](PageSize) | A page-aligned base address of a page of size `S`. |
//! | [`MemoryAddressOffset<S>`] | [`S: PageSize`](PageSize) | An offset within a page of size `S`. |
//!
//! These are then wrapped to distinguish between virtual and physical spaces:
//!
//! | Wrapper | Meaning |
//! |----------|----------|
//! | [`VirtualAddress`] / [`VirtualPage<S>`] | Refer to virtual (table translated) memory. |
//! | [`PhysicalAddress`] / [`PhysicalPage<S>`] | Refer to physical memory. |
//!
//! ## Page Sizes
//!
//! The three granules of the MMU are available as marker types that implement
//! [`PageSize`]:
//!
//! - [`Size8K`] — 8 KiB pages, the span of one leaf entry
//! - [`Size256K`] — 256 KiB, the span of one leaf table
//! - [`Size32M`] — 32 MiB, the span of one mid-level table
//!
//! ## Typical Usage
//!
//! ```rust
//! # use kernel_memory_addresses::*;
//! let va = VirtualAddress::new(0x0123_4567);
//!
//! // Page base and in-page offset
//! assert_eq!(va.page::<Size8K>().base().as_u32(), 0x0123_4000);
//! assert_eq!(va.offset::<Size8K>().as_u32(), 0x0567);
//!
//! // Round to the granule of a leaf table
//! assert_eq!(va.align_down::<Size256K>().as_u32(), 0x0120_0000);
//! assert_eq!(va.checked_align_up::<Size256K>().unwrap().as_u32(), 0x0124_0000);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![allow(clippy::inline_always)]

mod memory_address;
mod memory_address_offset;
mod memory_page;
mod page_size;
mod physical_address;
mod physical_page;
mod virtual_address;
mod virtual_page;

pub use memory_address::MemoryAddress;
pub use memory_address_offset::MemoryAddressOffset;
pub use memory_page::MemoryPage;
pub use page_size::{PageSize, Size8K, Size32M, Size256K};
pub use physical_address::PhysicalAddress;
pub use physical_page::PhysicalPage;
pub use virtual_address::VirtualAddress;
pub use virtual_page::VirtualPage;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_and_offset_8k() {
        let a = MemoryAddress::new(0x1234_5678);
        assert_eq!(a.page::<Size8K>().base().as_u32(), 0x1234_4000);
        assert_eq!(a.offset::<Size8K>().as_u32(), 0x1678);
    }

    #[test]
    fn granule_page_numbers_are_table_indices() {
        let va = VirtualAddress::new(0x0815_4321);
        assert_eq!(va.page::<Size256K>().base().as_u32(), 0x0814_0000);
        assert_eq!(va.offset::<Size256K>().as_u32(), 0x1_4321);
        assert_eq!(va.page::<Size32M>().number(), 4);
        assert_eq!(va.page::<Size256K>().number() & 127, 5);
    }

    #[test]
    fn page_numbers() {
        let pa = PhysicalAddress::new(0x0040_2000);
        assert_eq!(pa.page::<Size8K>().number(), 0x201);
        assert_eq!(PhysicalPage::<Size8K>::from_number(0x201).base(), pa);
        assert_eq!(VirtualAddress::new(0xF800_0000).page::<Size32M>().number(), 124);
    }

    #[test]
    fn alignment_helpers() {
        let a = VirtualAddress::new(0x12345);
        assert_eq!(a.align_down::<Size8K>().as_u32(), 0x12000);
        assert_eq!(a.checked_align_up::<Size8K>(), Some(VirtualAddress::new(0x14000)));
        assert!(!a.is_aligned::<Size8K>());
        assert!(VirtualAddress::new(0x4_0000).is_aligned::<Size256K>());
    }

    #[test]
    fn align_up_at_top_of_address_space() {
        let a = VirtualAddress::new(0xFFFF_E001);
        assert_eq!(a.checked_align_up::<Size8K>(), None);
        let b = VirtualAddress::new(0xFFFF_E000);
        assert_eq!(b.checked_align_up::<Size8K>(), Some(b));
    }

    #[test]
    fn distances() {
        let a = PhysicalAddress::new(0x8000);
        let b = a + 0x6000;
        assert_eq!(b - a, 0x6000);
        assert_eq!(VirtualAddress::new(0x10) - VirtualAddress::zero(), 0x10);
    }
}
