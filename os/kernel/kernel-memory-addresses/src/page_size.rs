use core::fmt;
use core::hash::Hash;

/// Sealed trait pattern to restrict `PageSize` impls to our markers.
mod sealed {
    pub trait Sealed {}
}

/// Marker trait for the granule sizes of the three-level MMU.
pub trait PageSize:
    sealed::Sealed + Clone + Copy + Eq + PartialEq + Ord + PartialOrd + Hash + fmt::Display + fmt::Debug
{
    /// Granule size in bytes (power of two).
    const SIZE: u32;
    /// log2(SIZE), i.e., number of low bits used for the offset.
    const SHIFT: u32;

    fn as_str() -> &'static str;
}

/// 8 KiB page (8192 bytes), the span of one leaf entry.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size8K;
impl sealed::Sealed for Size8K {}
impl PageSize for Size8K {
    const SIZE: u32 = 8 * 1024;
    const SHIFT: u32 = 13;

    fn as_str() -> &'static str {
        "8K"
    }
}

/// 256 KiB granule (`262_144` bytes), the span of one mid-level descriptor
/// and therefore of one leaf table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size256K;
impl sealed::Sealed for Size256K {}
impl PageSize for Size256K {
    const SIZE: u32 = 256 * 1024;
    const SHIFT: u32 = 18;

    fn as_str() -> &'static str {
        "256K"
    }
}

/// 32 MiB granule (`33_554_432` bytes), the span of one top-level descriptor
/// and therefore of one mid-level table.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct Size32M;
impl sealed::Sealed for Size32M {}
impl PageSize for Size32M {
    const SIZE: u32 = 32 * 1024 * 1024;
    const SHIFT: u32 = 25;

    fn as_str() -> &'static str {
        "32M"
    }
}

impl fmt::Display for Size8K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Display for Size256K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Display for Size32M {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(Self::as_str())
    }
}

impl fmt::Debug for Size8K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl fmt::Debug for Size256K {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}

impl fmt::Debug for Size32M {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        fmt::Display::fmt(&self, f)
    }
}
