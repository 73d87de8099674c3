//! # Short-Format Descriptors
//!
//! The MMU walks two descriptor shapes, both 32 bits wide:
//!
//! - [`TableDescriptor`]: a top- or mid-level slot pointing at the next table.
//! - [`PageEntry`]: a leaf slot mapping one 8 KiB page.
//!
//! ### Bit layout of a page entry
//!
//! | Bits   | Name | Meaning |
//! |--------|------|---------|
//! | 0–1    | `DT` | Descriptor type, `1` = valid page |
//! | 2      | `WP` | Write protected |
//! | 3      | `U`  | Used (referenced), set by the MMU |
//! | 4      | `M`  | Modified, set by the MMU on writes |
//! | 6      | `CI` | Cache inhibited |
//! | 8      | –    | Wired (software, ignored by the MMU) |
//! | 13–31  | –    | Physical frame bits `[31:13]` |
//!
//! ### Bit layout of a table descriptor
//!
//! | Bits   | Name | Meaning |
//! |--------|------|---------|
//! | 0–1    | `DT` | Descriptor type, `2` = short table pointer |
//! | 2      | `WP` | Write protect everything below |
//! | 3      | `U`  | Used, set by the MMU |
//! | 4–31   | –    | Physical address bits `[31:4]` of the child table |

use bitfield_struct::bitfield;
use kernel_memory_addresses::{PhysicalAddress, PhysicalPage, Size8K};

/// Descriptor type of an invalid slot.
const DT_INVALID: u8 = 0;

/// Descriptor type of a page entry.
const DT_PAGE: u8 = 1;

/// Descriptor type of a table descriptor pointing at a short-format table.
const DT_SHORT_TABLE: u8 = 2;

/// Tables are 16-byte aligned; a descriptor keeps address bits `[31:4]`.
const TABLE_ALIGN_SHIFT: u32 = 4;

/// A leaf-table entry mapping one 8 KiB page.
///
/// ### Example
/// ```rust
/// # use kernel_vmem::descriptor::PageEntry;
/// # use kernel_memory_addresses::PhysicalAddress;
/// let e = PageEntry::page(PhysicalAddress::new(0x0004_2000)).with_write_protected(true);
/// assert!(e.is_valid());
/// assert_eq!(e.frame_address().as_u32(), 0x0004_2000);
/// ```
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct PageEntry {
    #[bits(2)]
    descriptor_type: u8,

    /// Writes fault when set.
    pub write_protected: bool,

    /// Set by the MMU on the first access through this entry.
    pub used: bool,

    /// Set by the MMU on the first write through this entry.
    pub modified: bool,

    #[bits(1)]
    __lock: u8,

    /// The page bypasses the data cache.
    pub cache_inhibited: bool,

    #[bits(1)]
    __unused: u8,

    /// Software bit: the mapping may never be evicted and keeps its table alive.
    pub wired: bool,

    #[bits(4)]
    __reserved: u8,

    #[bits(19)]
    frame: u32,
}

impl PageEntry {
    /// The invalid entry.
    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self::new().with_descriptor_type(DT_INVALID)
    }

    /// A valid entry mapping the page containing `pa`, all other bits clear.
    #[inline]
    #[must_use]
    pub const fn page(pa: PhysicalAddress) -> Self {
        Self::new()
            .with_descriptor_type(DT_PAGE)
            .with_frame(pa.page::<Size8K>().number())
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.descriptor_type() == DT_PAGE
    }

    /// The mapped frame.
    #[inline]
    #[must_use]
    pub const fn frame_page(self) -> PhysicalPage<Size8K> {
        PhysicalPage::from_number(self.frame())
    }

    /// Base address of the mapped frame.
    #[inline]
    #[must_use]
    pub const fn frame_address(self) -> PhysicalAddress {
        self.frame_page().base()
    }
}

/// A top- or mid-level slot pointing at a child table.
#[bitfield(u32)]
#[derive(PartialEq, Eq)]
pub struct TableDescriptor {
    #[bits(2)]
    descriptor_type: u8,

    /// Write protects every page below this slot.
    pub write_protected: bool,

    /// Set by the MMU when the table search passes this slot.
    pub used: bool,

    #[bits(28)]
    table_number: u32,
}

impl TableDescriptor {
    /// The invalid descriptor.
    #[inline]
    #[must_use]
    pub const fn invalid() -> Self {
        Self::new().with_descriptor_type(DT_INVALID)
    }

    /// A valid descriptor pointing at the table at `pa`.
    ///
    /// ### Debug assertions
    /// - `pa` must be 16-byte aligned.
    #[inline]
    #[must_use]
    pub const fn table(pa: PhysicalAddress) -> Self {
        debug_assert!(pa.as_u32().trailing_zeros() >= TABLE_ALIGN_SHIFT);
        Self::new()
            .with_descriptor_type(DT_SHORT_TABLE)
            .with_table_number(pa.as_u32() >> TABLE_ALIGN_SHIFT)
    }

    #[inline]
    #[must_use]
    pub const fn is_valid(self) -> bool {
        self.descriptor_type() == DT_SHORT_TABLE
    }

    /// Physical address of the child table.
    #[inline]
    #[must_use]
    pub const fn table_address(self) -> PhysicalAddress {
        PhysicalAddress::new(self.table_number() << TABLE_ALIGN_SHIFT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_entry_layout() {
        let e = PageEntry::page(PhysicalAddress::new(0x00AB_C000))
            .with_write_protected(true)
            .with_cache_inhibited(true)
            .with_wired(true);
        assert_eq!(e.into_bits(), 0x00AB_C000 | 0x100 | 0x40 | 0x4 | 0x1);
        assert_eq!(e.frame_address(), PhysicalAddress::new(0x00AB_C000));
    }

    #[test]
    fn last_physical_frame_fits_the_entry() {
        let e = PageEntry::page(PhysicalAddress::new(0xFFFF_F123));
        assert_eq!(e.frame_page().number(), 0x7_FFFF);
        assert_eq!(e.frame_address(), PhysicalAddress::new(0xFFFF_E000));
        assert_eq!(e.into_bits() & 0x1FFF, 0x1);
    }

    #[test]
    fn invalid_entry_is_all_zero() {
        assert_eq!(PageEntry::invalid().into_bits(), 0);
        assert!(!PageEntry::invalid().is_valid());
        assert!(!PageEntry::invalid().with_modified(true).is_valid());
    }

    #[test]
    fn table_descriptor_round_trips_address() {
        let d = TableDescriptor::table(PhysicalAddress::new(0x0012_3480));
        assert!(d.is_valid());
        assert_eq!(d.into_bits(), 0x0012_3482);
        assert_eq!(d.table_address(), PhysicalAddress::new(0x0012_3480));
        assert!(!TableDescriptor::invalid().is_valid());
    }
}
