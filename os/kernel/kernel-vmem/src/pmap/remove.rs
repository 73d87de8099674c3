//! Removing ranges of mappings.
//!
//! A user range is removed top down. At every level the range is split into
//! a head fragment, whole granules and a tail fragment:
//!
//! ```text
//!   start   nstart                         nend     end
//!     │ head  │  whole  │  whole  │  whole  │  tail  │
//!   ──┼───────┼─────────┼─────────┼─────────┼────────┼──
//!      one level down   freed in bulk        one level down
//! ```
//!
//! A range inside a single granule has no whole granule and only one
//! fragment. Tables left without valid slots are returned to their pools.

use super::Pmap;
use super::enter::check_kernel;
use crate::PmapError;
use crate::level::Level;
use crate::space::SpaceId;
use crate::table_memory::TableMemory;
use crate::translation_cache::MmuHardware;
use kernel_info::memory::{KERNEL_BASE, PAGE_SIZE};
use kernel_memory_addresses::{Size8K, VirtualAddress};
use kernel_sync::irq::InterruptControl;
use log::trace;

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Unmaps every page of `id` in `[start, end)`.
    ///
    /// Unmapped pages are skipped. User ranges are clipped at the kernel
    /// region. Wired entries are removed too.
    ///
    /// # Errors
    /// - [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    /// - [`PmapError::OutsideKernelRange`] if `start` lies below the kernel
    ///   region of the kernel space.
    pub fn remove(
        &mut self,
        id: SpaceId,
        start: VirtualAddress,
        end: VirtualAddress,
    ) -> Result<(), PmapError> {
        if id.is_kernel() {
            return self.remove_kernel(start, end);
        }

        let _spl = Self::spl();
        let Some(top) = self.space(id)?.top else {
            return Ok(());
        };

        let start = start.align_down::<Size8K>().as_u32();
        let end = end.as_u32().min(KERNEL_BASE);
        if start >= end {
            return Ok(());
        }
        trace!("remove {id:?} {start:#010x}..{end:#010x}");

        // Releasing the top table of the loaded space switches to the kernel
        // root, which flushes on its own.
        if self.remove_range(Level::Top, top, start, end) {
            self.release_top(id, top);
        } else if self.current == id {
            self.atc.flush_user();
        }
        Ok(())
    }

    /// Removes `[start, end)` from table `index` at `level`. The range lies
    /// inside the span of the table. Returns whether the table is left
    /// without valid slots.
    fn remove_range(&mut self, level: Level, index: usize, start: u32, end: u32) -> bool {
        if level == Level::Leaf {
            self.remove_entries(index, start, end);
            return self.leaf_pool.manager(index).valid == 0;
        }

        let granule = level.granule();
        let nstart = start.next_multiple_of(granule);
        let nend = end & !(granule - 1);

        if nstart > nend {
            self.remove_fragment(level, index, start, end);
        } else {
            if start < nstart {
                self.remove_fragment(level, index, start, nstart);
            }
            let mut va = nstart;
            while va < nend {
                let slot = level.index(VirtualAddress::new(va));
                if let Some(child) = self.memory.child(level, index, slot) {
                    self.release_child(level, index, slot, child);
                }
                va += granule;
            }
            if nend < end {
                self.remove_fragment(level, index, nend, end);
            }
        }

        self.pool(level).manager(index).valid == 0
    }

    /// Removes `[start, end)`, which lies inside one slot of table `index`,
    /// from the child table in that slot.
    fn remove_fragment(&mut self, level: Level, index: usize, start: u32, end: u32) {
        let slot = level.index(VirtualAddress::new(start));
        let Some(child) = self.memory.child(level, index, slot) else {
            return;
        };
        let Some(child_level) = level.child() else {
            return;
        };
        if self.remove_range(child_level, child, start, end) {
            self.release_child(level, index, slot, child);
        }
    }

    /// Retires the valid entries of leaf table `leaf` in `[start, end)`.
    fn remove_entries(&mut self, leaf: usize, start: u32, end: u32) {
        let mut va = start;
        while va < end {
            let idx = TableMemory::leaf_slot(leaf, Level::Leaf.index(VirtualAddress::new(va)));
            let entry = self.memory.entry(idx);
            if entry.is_valid() {
                self.retire_entry(idx);
                self.leaf_pool.manager_mut(leaf).valid -= 1;
                if entry.wired() {
                    self.remove_wired_credit(Level::Leaf, leaf);
                }
            }
            va += PAGE_SIZE;
        }
    }

    /// Unmaps every kernel page in `[start, end)`, flushing each one.
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if `start` lies below the kernel region.
    pub fn remove_kernel(
        &mut self,
        start: VirtualAddress,
        end: VirtualAddress,
    ) -> Result<(), PmapError> {
        check_kernel(start)?;
        let _spl = Self::spl();
        let mut va = start.align_down::<Size8K>();
        while va < end {
            let idx = TableMemory::kernel_slot(va);
            if self.memory.entry(idx).is_valid() {
                self.retire_entry(idx);
                self.atc.flush_address(va);
            }
            match va.checked_add(PAGE_SIZE) {
                Some(next) => va = next,
                None => break,
            }
        }
        Ok(())
    }
}
