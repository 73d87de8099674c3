//! # Table Levels
//!
//! The three levels of the table tree, coarsest first. Everything that only
//! differs by shift and fan-out between levels is expressed through [`Level`]
//! so range walks can be written once.

use core::fmt;
use kernel_info::memory::{LEAF_ENTRIES, MID_ENTRIES, TOP_ENTRIES};
use kernel_memory_addresses::{PageSize, Size8K, Size32M, Size256K, VirtualAddress};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub enum Level {
    /// Root table, one per address space. Index = VA bits `[31:25]`.
    Top,
    /// Index = VA bits `[24:18]`.
    Mid,
    /// Holds page entries. Index = VA bits `[17:13]`.
    Leaf,
}

impl Level {
    pub const ALL: [Self; 3] = [Self::Top, Self::Mid, Self::Leaf];

    /// Number of slots in a table of this level.
    #[inline]
    #[must_use]
    pub const fn entries(self) -> usize {
        match self {
            Self::Top => TOP_ENTRIES,
            Self::Mid => MID_ENTRIES,
            Self::Leaf => LEAF_ENTRIES,
        }
    }

    /// Bytes of virtual address space covered by one slot.
    #[inline]
    #[must_use]
    pub const fn granule(self) -> u32 {
        match self {
            Self::Top => Size32M::SIZE,
            Self::Mid => Size256K::SIZE,
            Self::Leaf => Size8K::SIZE,
        }
    }

    /// Slot index of `va` in a table of this level: the number of the
    /// granule containing `va`, modulo the table size.
    #[inline]
    #[must_use]
    pub const fn index(self, va: VirtualAddress) -> usize {
        let granule = match self {
            Self::Top => va.page::<Size32M>().number(),
            Self::Mid => va.page::<Size256K>().number(),
            Self::Leaf => va.page::<Size8K>().number(),
        };
        granule as usize & (self.entries() - 1)
    }

    /// Size of one table of this level in bytes.
    #[inline]
    #[must_use]
    pub const fn table_bytes(self) -> u32 {
        (self.entries() * 4) as u32
    }

    /// The level below, `None` for leaves.
    #[inline]
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::Top => Some(Self::Mid),
            Self::Mid => Some(Self::Leaf),
            Self::Leaf => None,
        }
    }

    /// The level above, `None` for the root.
    #[inline]
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::Top => None,
            Self::Mid => Some(Self::Top),
            Self::Leaf => Some(Self::Mid),
        }
    }

    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Top => "top",
            Self::Mid => "mid",
            Self::Leaf => "leaf",
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_partition_the_address() {
        let va = VirtualAddress::new(0x1234_5678);
        let top = Level::Top.index(va);
        let mid = Level::Mid.index(va);
        let leaf = Level::Leaf.index(va);
        let rebuilt = (top << 25) | (mid << 18) | (leaf << 13);
        assert_eq!(rebuilt as u32, va.as_u32() & !0x1FFF);
    }

    #[test]
    fn kernel_base_is_top_index_124() {
        assert_eq!(Level::Top.index(VirtualAddress::new(0xF800_0000)), 124);
        assert_eq!(Level::Top.index(VirtualAddress::new(0xFFFF_FFFF)), 127);
    }

    #[test]
    fn parent_and_child_are_inverse() {
        for level in Level::ALL {
            if let Some(child) = level.child() {
                assert_eq!(child.parent(), Some(level));
                assert_eq!(level.granule(), child.granule() * child.entries() as u32);
            }
        }
    }
}
