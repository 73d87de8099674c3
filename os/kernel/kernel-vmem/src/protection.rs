//! Access rights and mapping options.

use bitflags::bitflags;

bitflags! {
    /// Access rights requested for a mapping.
    ///
    /// The MMU only distinguishes read-only from read-write; execute rides
    /// along with read.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct VmProt: u8 {
        const READ = 1 << 0;
        const WRITE = 1 << 1;
        const EXECUTE = 1 << 2;

        const READ_EXECUTE = Self::READ.bits() | Self::EXECUTE.bits();
        const ALL = Self::READ.bits() | Self::WRITE.bits() | Self::EXECUTE.bits();
    }
}

impl VmProt {
    /// No access at all. Removes mappings where it is applied.
    pub const NONE: Self = Self::empty();

    /// Whether the mapping must be write protected.
    #[inline]
    #[must_use]
    pub const fn is_read_only(self) -> bool {
        !self.contains(Self::WRITE)
    }
}

bitflags! {
    /// Options for entering a mapping.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct MapFlags: u8 {
        /// The mapping may not be evicted or stolen until unwired.
        const WIRED = 1 << 0;
        /// Bypass the data cache even for managed memory.
        const NO_CACHE = 1 << 1;
    }
}
