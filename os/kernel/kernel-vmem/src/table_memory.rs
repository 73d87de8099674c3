//! # Raw Table Storage
//!
//! Every translation table lives in memory carved by the bootstrap allocator
//! out of the linearly mapped kernel window. Descriptors refer to child
//! tables by physical address, so each table array remembers where it
//! starts and converts between physical addresses and table numbers.
//!
//! ```text
//!  kernel top │ kernel mid ×4 │ kernel leaf ×512 │ user leaf ×C │ user mid ×B │ user top ×A
//!             │               │◄──── one flat page entry array ────►│
//! ```
//!
//! Page entries of the kernel leaf tables and of the user leaf tables are one
//! contiguous array, so a [`PteIndex`] names any leaf slot in the system:
//! kernel slots come first, user leaf table `i` occupies
//! `KERNEL_PTES + 32 * i ..`.

use crate::descriptor::{PageEntry, TableDescriptor};
use crate::level::Level;
use crate::reverse_map::PteIndex;
use alloc::vec;
use alloc::vec::Vec;
use kernel_info::memory::{
    KERNEL_BASE, KERNEL_LEAF_TABLES, KERNEL_MID_TABLES, KERNEL_PTES, KERNEL_TOP_INDEX,
    LEAF_ENTRIES,
};
use kernel_memory_addresses::{PhysicalAddress, Size8K, VirtualAddress, VirtualPage};

/// Page number of [`KERNEL_BASE`], the page mapped by kernel slot 0.
const KERNEL_BASE_PAGE: u32 = VirtualAddress::new(KERNEL_BASE).page::<Size8K>().number();

/// Physical placement of the table arrays, as allocated during bootstrap.
#[derive(Debug, Copy, Clone)]
pub(crate) struct TableLayout {
    pub kernel_top: PhysicalAddress,
    pub kernel_mid: PhysicalAddress,
    /// Kernel leaf tables immediately followed by the user leaf tables.
    pub leaves: PhysicalAddress,
    pub user_mid: PhysicalAddress,
    pub user_top: PhysicalAddress,
    pub top_tables: usize,
    pub mid_tables: usize,
    pub leaf_tables: usize,
}

/// A run of equally sized descriptor tables at one level.
#[derive(Debug)]
struct DescriptorTables {
    level: Level,
    base: PhysicalAddress,
    slots: Vec<TableDescriptor>,
}

impl DescriptorTables {
    fn new(level: Level, base: PhysicalAddress, count: usize) -> Self {
        Self {
            level,
            base,
            slots: vec![TableDescriptor::invalid(); count * level.entries()],
        }
    }

    const fn count(&self) -> usize {
        self.slots.len() / self.level.entries()
    }

    #[allow(clippy::cast_possible_truncation)]
    fn address(&self, table: usize) -> PhysicalAddress {
        self.base + table as u32 * self.level.table_bytes()
    }

    fn table_at(&self, pa: PhysicalAddress) -> Option<usize> {
        let offset = pa.as_u32().checked_sub(self.base.as_u32())?;
        if !offset.is_multiple_of(self.level.table_bytes()) {
            return None;
        }
        let table = (offset / self.level.table_bytes()) as usize;
        (table < self.count()).then_some(table)
    }

    fn table(&self, table: usize) -> &[TableDescriptor] {
        let n = self.level.entries();
        &self.slots[table * n..(table + 1) * n]
    }

    fn table_mut(&mut self, table: usize) -> &mut [TableDescriptor] {
        let n = self.level.entries();
        &mut self.slots[table * n..(table + 1) * n]
    }
}

/// Storage of every table in the system.
#[derive(Debug)]
pub(crate) struct TableMemory {
    kernel_top: DescriptorTables,
    kernel_mid: DescriptorTables,
    user_top: DescriptorTables,
    user_mid: DescriptorTables,
    leaves_base: PhysicalAddress,
    entries: Vec<PageEntry>,
}

impl TableMemory {
    /// Creates the arrays and links the static kernel tables: the kernel top
    /// table points at the kernel mid tables, which point at the kernel leaf
    /// tables in order. Every user top table starts with a copy of the kernel
    /// slots.
    pub fn new(layout: &TableLayout) -> Self {
        let mut memory = Self {
            kernel_top: DescriptorTables::new(Level::Top, layout.kernel_top, 1),
            kernel_mid: DescriptorTables::new(Level::Mid, layout.kernel_mid, KERNEL_MID_TABLES),
            user_top: DescriptorTables::new(Level::Top, layout.user_top, layout.top_tables),
            user_mid: DescriptorTables::new(Level::Mid, layout.user_mid, layout.mid_tables),
            leaves_base: layout.leaves,
            entries: vec![
                PageEntry::invalid();
                (KERNEL_LEAF_TABLES + layout.leaf_tables) * LEAF_ENTRIES
            ],
        };

        for mid in 0..KERNEL_MID_TABLES {
            let mid_address = memory.kernel_mid.address(mid);
            memory.kernel_top.table_mut(0)[KERNEL_TOP_INDEX + mid] =
                TableDescriptor::table(mid_address);

            for slot in 0..Level::Mid.entries() {
                let leaf = memory.leaf_address(mid * Level::Mid.entries() + slot);
                memory.kernel_mid.table_mut(mid)[slot] = TableDescriptor::table(leaf);
            }
        }

        let kernel_slots = memory.kernel_top.table(0)[KERNEL_TOP_INDEX..].to_vec();
        for top in 0..layout.top_tables {
            memory.user_top.table_mut(top)[KERNEL_TOP_INDEX..].copy_from_slice(&kernel_slots);
        }

        memory
    }

    /// Physical address of the kernel top table.
    pub fn kernel_top_address(&self) -> PhysicalAddress {
        self.kernel_top.address(0)
    }

    /// Physical address of leaf table `table`, counting kernel leaf tables first.
    #[allow(clippy::cast_possible_truncation)]
    fn leaf_address(&self, table: usize) -> PhysicalAddress {
        self.leaves_base + table as u32 * Level::Leaf.table_bytes()
    }

    fn leaf_table_at(&self, pa: PhysicalAddress) -> Option<usize> {
        let offset = pa.as_u32().checked_sub(self.leaves_base.as_u32())?;
        if !offset.is_multiple_of(Level::Leaf.table_bytes()) {
            return None;
        }
        let table = (offset / Level::Leaf.table_bytes()) as usize;
        (table < self.entries.len() / LEAF_ENTRIES).then_some(table)
    }

    /// Physical address of pool table `index` at `level`.
    pub fn table_address(&self, level: Level, index: usize) -> PhysicalAddress {
        match level {
            Level::Top => self.user_top.address(index),
            Level::Mid => self.user_mid.address(index),
            Level::Leaf => self.leaf_address(KERNEL_LEAF_TABLES + index),
        }
    }

    /// Pool index of the table at `pa`, if `pa` is a pool table of `level`.
    pub fn pool_index(&self, level: Level, pa: PhysicalAddress) -> Option<usize> {
        match level {
            Level::Top => self.user_top.table_at(pa),
            Level::Mid => self.user_mid.table_at(pa),
            Level::Leaf => self
                .leaf_table_at(pa)
                .and_then(|t| t.checked_sub(KERNEL_LEAF_TABLES)),
        }
    }

    /// Descriptors of pool table `index`.
    ///
    /// # Panics
    /// Panics on leaf tables, which hold page entries.
    pub fn descriptors(&self, level: Level, index: usize) -> &[TableDescriptor] {
        match level {
            Level::Top => self.user_top.table(index),
            Level::Mid => self.user_mid.table(index),
            Level::Leaf => panic!("BUG: leaf tables hold page entries"),
        }
    }

    /// # Panics
    /// Panics on leaf tables, which hold page entries.
    pub fn descriptors_mut(&mut self, level: Level, index: usize) -> &mut [TableDescriptor] {
        match level {
            Level::Top => self.user_top.table_mut(index),
            Level::Mid => self.user_mid.table_mut(index),
            Level::Leaf => panic!("BUG: leaf tables hold page entries"),
        }
    }

    /// Pool index of the child table installed in `slot` of pool table
    /// `index`, if the slot is valid.
    pub fn child(&self, level: Level, index: usize, slot: usize) -> Option<usize> {
        let child = level.child()?;
        let descriptor = self.descriptors(level, index)[slot];
        if !descriptor.is_valid() {
            return None;
        }
        self.pool_index(child, descriptor.table_address())
    }

    /// Global index of `slot` in pool leaf table `index`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn leaf_slot(index: usize, slot: usize) -> PteIndex {
        PteIndex::new((KERNEL_PTES + index * LEAF_ENTRIES + slot) as u32)
    }

    /// Global index of the kernel page entry mapping `va`.
    ///
    /// `va` must lie at or above [`KERNEL_BASE`].
    pub const fn kernel_slot(va: VirtualAddress) -> PteIndex {
        PteIndex::new(va.page::<Size8K>().number() - KERNEL_BASE_PAGE)
    }

    /// The kernel page mapped by kernel slot `idx`.
    #[allow(clippy::cast_possible_truncation)]
    pub const fn kernel_page(idx: PteIndex) -> VirtualPage<Size8K> {
        VirtualPage::from_number(KERNEL_BASE_PAGE + idx.as_usize() as u32)
    }

    /// Splits a user slot index into pool leaf table and slot. `None` for
    /// kernel slots.
    pub const fn user_leaf(idx: PteIndex) -> Option<(usize, usize)> {
        match idx.as_usize().checked_sub(KERNEL_PTES) {
            Some(user) => Some((user / LEAF_ENTRIES, user % LEAF_ENTRIES)),
            None => None,
        }
    }

    #[inline]
    pub fn entry(&self, idx: PteIndex) -> PageEntry {
        self.entries[idx.as_usize()]
    }

    #[inline]
    pub fn entry_mut(&mut self, idx: PteIndex) -> &mut PageEntry {
        &mut self.entries[idx.as_usize()]
    }

    /// Descriptors of the top table at `pa`: the kernel top table or a pool
    /// top table.
    pub fn top_at(&self, pa: PhysicalAddress) -> Option<&[TableDescriptor]> {
        if pa == self.kernel_top_address() {
            return Some(self.kernel_top.table(0));
        }
        self.user_top.table_at(pa).map(|t| self.user_top.table(t))
    }

    /// Descriptors of the mid table at `pa`, kernel or pool.
    pub fn mid_at(&self, pa: PhysicalAddress) -> Option<&[TableDescriptor]> {
        if let Some(t) = self.kernel_mid.table_at(pa) {
            return Some(self.kernel_mid.table(t));
        }
        self.user_mid.table_at(pa).map(|t| self.user_mid.table(t))
    }

    /// First slot of the leaf table at `pa`, kernel or pool.
    #[allow(clippy::cast_possible_truncation)]
    pub fn leaf_at(&self, pa: PhysicalAddress) -> Option<PteIndex> {
        self.leaf_table_at(pa)
            .map(|t| PteIndex::new((t * LEAF_ENTRIES) as u32))
    }
}
