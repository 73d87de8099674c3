//! Translations, counters and the emulated table search.

use super::Pmap;
use super::enter::check_kernel;
use crate::error::AccessFault;
use crate::level::Level;
use crate::pool::TableHandle;
use crate::reverse_map::PteIndex;
use crate::space::SpaceId;
use crate::table_memory::TableMemory;
use crate::translation_cache::MmuHardware;
use crate::PmapError;
use kernel_info::memory::{KERNEL_BASE, KERNEL_PTES};
use kernel_memory_addresses::{PhysicalAddress, Size8K, VirtualAddress};
use kernel_sync::irq::InterruptControl;
use log::trace;

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Pool index of the leaf table covering `va` below top table `top`.
    /// On a missing table, the level whose slot is invalid.
    pub(super) fn lookup_leaf(&self, top: usize, va: VirtualAddress) -> Result<usize, Level> {
        let mid = self
            .memory
            .child(Level::Top, top, Level::Top.index(va))
            .ok_or(Level::Top)?;
        self.memory
            .child(Level::Mid, mid, Level::Mid.index(va))
            .ok_or(Level::Mid)
    }

    /// The physical address `va` translates to in `id`, `None` if unmapped.
    ///
    /// Addresses in the kernel region are translated through the kernel
    /// tables, whichever space is named.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn extract(
        &self,
        id: SpaceId,
        va: VirtualAddress,
    ) -> Result<Option<PhysicalAddress>, PmapError> {
        let top = self.space(id)?.top;
        if va.as_u32() >= KERNEL_BASE {
            return self.extract_kernel(va);
        }
        let Some(top) = top else {
            return Ok(None);
        };
        let Ok(leaf) = self.lookup_leaf(top, va) else {
            return Ok(None);
        };
        let entry = self
            .memory
            .entry(TableMemory::leaf_slot(leaf, Level::Leaf.index(va)));
        Ok(entry
            .is_valid()
            .then(|| entry.frame_address() + va.offset::<Size8K>().as_u32()))
    }

    /// The physical address the kernel address `va` translates to.
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if `va` lies below the kernel region.
    pub fn extract_kernel(&self, va: VirtualAddress) -> Result<Option<PhysicalAddress>, PmapError> {
        check_kernel(va)?;
        let entry = self.memory.entry(TableMemory::kernel_slot(va));
        Ok(entry
            .is_valid()
            .then(|| entry.frame_address() + va.offset::<Size8K>().as_u32()))
    }

    /// Number of pages mapped in `id`.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn resident_count(&self, id: SpaceId) -> Result<usize, PmapError> {
        self.space(id)?;
        if id.is_kernel() {
            return Ok(self.kernel_resident());
        }
        Ok(self.owned_leaves(id).map(|leaf| self.leaf_pool.manager(leaf).valid).sum())
    }

    /// Number of wired pages in `id`. Every kernel mapping is wired.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn wired_count(&self, id: SpaceId) -> Result<usize, PmapError> {
        self.space(id)?;
        if id.is_kernel() {
            return Ok(self.kernel_resident());
        }
        Ok(self.owned_leaves(id).map(|leaf| self.leaf_pool.manager(leaf).wired).sum())
    }

    fn kernel_resident(&self) -> usize {
        (0..KERNEL_PTES)
            .filter(|&i| {
                #[allow(clippy::cast_possible_truncation)]
                let idx = PteIndex::new(i as u32);
                self.memory.entry(idx).is_valid()
            })
            .count()
    }

    /// Pool indices of the in-use leaf tables mapping for `id`.
    fn owned_leaves(&self, id: SpaceId) -> impl Iterator<Item = usize> + '_ {
        (0..self.leaf_pool.capacity()).filter(move |&leaf| {
            let manager = self.leaf_pool.manager(leaf);
            manager.in_use() && manager.owner == Some(id)
        })
    }

    /// The pool table of `level` that `va` is translated through in `id`.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn table_for(
        &self,
        id: SpaceId,
        va: VirtualAddress,
        level: Level,
    ) -> Result<Option<TableHandle>, PmapError> {
        let Some(top) = self.space(id)?.top else {
            return Ok(None);
        };
        if va.as_u32() >= KERNEL_BASE {
            return Ok(None);
        }
        let index = match level {
            Level::Top => Some(top),
            Level::Mid => self.memory.child(Level::Top, top, Level::Top.index(va)),
            Level::Leaf => self.lookup_leaf(top, va).ok(),
        };
        Ok(index.map(|i| self.pool(level).handle(i)))
    }

    /// Loads `id` and performs the table search the MMU performs for an
    /// access to `va`, starting from the loaded root.
    ///
    /// A successful access sets the entry's used bit, and its modified bit
    /// if `write` is set, the way the hardware does.
    ///
    /// # Errors
    /// - [`AccessFault::Invalid`] if a descriptor on the way is invalid.
    /// - [`AccessFault::WriteProtected`] for a write to a write-protected page.
    /// - [`AccessFault::Pmap`] if `id` is stale.
    pub fn access(
        &mut self,
        id: SpaceId,
        va: VirtualAddress,
        write: bool,
    ) -> Result<PhysicalAddress, AccessFault> {
        self.activate(id)?;
        let idx = self.search(va).ok_or(AccessFault::Invalid(va))?;

        let entry = self.memory.entry_mut(idx);
        if write && entry.write_protected() {
            return Err(AccessFault::WriteProtected(va));
        }
        entry.set_used(true);
        if write {
            entry.set_modified(true);
        }
        trace!("access {va} write={write} via {idx:?}");
        Ok(entry.frame_address() + va.offset::<Size8K>().as_u32())
    }

    /// Slot of the valid page entry for `va` reached from the loaded root.
    fn search(&self, va: VirtualAddress) -> Option<PteIndex> {
        let top = self.memory.top_at(self.atc.root())?[Level::Top.index(va)];
        if !top.is_valid() {
            return None;
        }
        let mid = self.memory.mid_at(top.table_address())?[Level::Mid.index(va)];
        if !mid.is_valid() {
            return None;
        }
        let first = self.memory.leaf_at(mid.table_address())?;
        #[allow(clippy::cast_possible_truncation)]
        let idx = PteIndex::new(
            first.as_usize() as u32 + Level::Leaf.index(va) as u32,
        );
        self.memory.entry(idx).is_valid().then_some(idx)
    }
}
