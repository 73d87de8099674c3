//! Runtime sizing of the table pools.

use kernel_info::memory::{LEAF_ENTRIES, PAGE_SIZE};

/// Smallest pool the layer will run with: one table in use, one to steal.
const MIN_TABLES: usize = 2;

/// Number of pool tables per level.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PmapConfig {
    pub top_tables: usize,
    pub mid_tables: usize,
    pub leaf_tables: usize,
}

impl PmapConfig {
    /// Fixed sizing used with the `fixed-ntables` feature.
    pub const FIXED: Self = Self {
        top_tables: 16,
        mid_tables: 32,
        leaf_tables: 64,
    };

    /// Sizes the pools for a machine with `total_memory` bytes of RAM.
    ///
    /// The leaf pool can map four times the physical memory; each level above
    /// has half as many tables as the one below. With the `fixed-ntables`
    /// feature the memory size is ignored and [`FIXED`](Self::FIXED) is used.
    ///
    /// ### Example
    /// ```rust
    /// # use kernel_vmem::PmapConfig;
    /// let c = PmapConfig::for_memory(16 * 1024 * 1024);
    /// # #[cfg(not(feature = "fixed-ntables"))]
    /// assert_eq!((c.top_tables, c.mid_tables, c.leaf_tables), (64, 128, 256));
    /// ```
    #[must_use]
    #[allow(clippy::cast_possible_truncation)]
    pub const fn for_memory(total_memory: u64) -> Self {
        if cfg!(feature = "fixed-ntables") {
            return Self::FIXED;
        }

        let leaf = (total_memory * 4 / (LEAF_ENTRIES as u64 * PAGE_SIZE as u64)) as usize;
        let mid = leaf / 2;
        let top = mid / 2;
        Self {
            top_tables: max(top, MIN_TABLES),
            mid_tables: max(mid, MIN_TABLES),
            leaf_tables: max(leaf, MIN_TABLES),
        }
    }
}

const fn max(a: usize, b: usize) -> usize {
    if a > b { a } else { b }
}
