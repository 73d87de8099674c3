//! Entering mappings.

use super::Pmap;
use crate::PmapError;
use crate::descriptor::{PageEntry, TableDescriptor};
use crate::level::Level;
use crate::pool::Parent;
use crate::protection::{MapFlags, VmProt};
use crate::space::SpaceId;
use crate::table_memory::TableMemory;
use crate::translation_cache::MmuHardware;
use kernel_info::memory::{KERNEL_BASE, PAGE_SIZE};
use kernel_memory_addresses::{PhysicalAddress, Size8K, VirtualAddress};
use kernel_sync::irq::InterruptControl;
use log::trace;

/// Rejects addresses below the kernel region.
pub(super) const fn check_kernel(va: VirtualAddress) -> Result<(), PmapError> {
    if va.as_u32() < KERNEL_BASE {
        Err(PmapError::OutsideKernelRange(va))
    } else {
        Ok(())
    }
}

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Maps the page at `va` in `id` to the frame containing `pa`.
    ///
    /// Missing tables are allocated on the way down, stealing from other
    /// spaces if a pool has no free table. Re-entering the frame already
    /// mapped only changes protection and wiring and keeps the page's
    /// modified and referenced bits. Entering a different frame evicts the
    /// old one first. Frames outside managed memory are mapped cache
    /// inhibited and are not tracked in the reverse map.
    ///
    /// A wired entry stays wired when re-entered without
    /// [`MapFlags::WIRED`]; only [`unwire`](Self::unwire) unwires.
    ///
    /// Kernel mappings are delegated to [`enter_kernel`](Self::enter_kernel).
    ///
    /// # Errors
    /// - [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    /// - [`PmapError::OutsideUserRange`] if `va` lies in the kernel region
    ///   of a user space.
    /// - [`PmapError::OutsideKernelRange`] if `va` lies below the kernel
    ///   region of the kernel space.
    pub fn enter(
        &mut self,
        id: SpaceId,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: VmProt,
        flags: MapFlags,
    ) -> Result<(), PmapError> {
        if id.is_kernel() {
            return self.enter_kernel(va, pa, prot, flags);
        }
        if va.as_u32() >= KERNEL_BASE {
            return Err(PmapError::OutsideUserRange(va));
        }

        let _spl = Self::spl();
        let owned_top = self.space(id)?.top;
        let wired = flags.contains(MapFlags::WIRED);
        let page = self.managed_page(pa);

        // Tables allocated here stay off their queues until the entry is
        // written, so the walk cannot steal them.
        let mut fresh: [Option<usize>; 3] = [None; 3];

        let top = if let Some(top) = owned_top {
            top
        } else {
            let top = self.get_table(Level::Top);
            let manager = self.top_pool.manager_mut(top);
            manager.parent = Parent::Space(id);
            manager.owner = Some(id);

            let root = self.memory.table_address(Level::Top, top);
            let space = self.space_mut(id)?;
            space.top = Some(top);
            space.root = root;
            if self.current == id {
                self.atc.reload(root);
            }
            fresh[Level::Top as usize] = Some(top);
            top
        };

        let mid = self.walk_or_allocate(id, Level::Top, top, va, &mut fresh);
        let leaf = self.walk_or_allocate(id, Level::Mid, mid, va, &mut fresh);

        let idx = TableMemory::leaf_slot(leaf, Level::Leaf.index(va));
        let old = self.memory.entry(idx);
        let mut entry = PageEntry::page(pa);
        let mut insert = true;

        if old.is_valid() {
            if old.frame_page() == entry.frame_page() {
                insert = false;
                entry = entry.with_used(old.used()).with_modified(old.modified());
            } else {
                self.retire_entry(idx);
            }
            self.atc.flush_address(va);
        } else {
            self.leaf_pool.manager_mut(leaf).valid += 1;
        }

        let was_wired = old.is_valid() && old.wired();
        entry.set_wired(was_wired || wired);
        entry.set_write_protected(prot.is_read_only());
        entry.set_cache_inhibited(page.is_none() || flags.contains(MapFlags::NO_CACHE));
        *self.memory.entry_mut(idx) = entry;

        if wired && !was_wired {
            self.add_wired_credit(Level::Leaf, leaf);
        }

        if insert && let Some(page) = page {
            self.pv.push(page, idx);
        }

        for (level, index) in Level::ALL.into_iter().zip(fresh) {
            if let Some(index) = index
                && self.pool(level).manager(index).wired == 0
            {
                self.pool_mut(level).push_back(index);
            }
        }

        trace!("enter {id:?} {va} -> {pa} {prot:?} {flags:?}");
        Ok(())
    }

    /// Follows `va`'s slot in table `index` at `level`, installing a new
    /// child table if the slot is invalid. Returns the child's pool index.
    fn walk_or_allocate(
        &mut self,
        id: SpaceId,
        level: Level,
        index: usize,
        va: VirtualAddress,
        fresh: &mut [Option<usize>; 3],
    ) -> usize {
        let slot = level.index(va);
        if let Some(child) = self.memory.child(level, index, slot) {
            return child;
        }

        let Some(child_level) = level.child() else {
            panic!("BUG: walked below the leaf level");
        };
        let child = self.get_table(child_level);
        let address = self.memory.table_address(child_level, child);
        self.memory.descriptors_mut(level, index)[slot] = TableDescriptor::table(address);
        self.pool_mut(level).manager_mut(index).valid += 1;

        let manager = self.pool_mut(child_level).manager_mut(child);
        manager.parent = Parent::Table { index, slot };
        manager.owner = Some(id);
        manager.base = VirtualAddress::new(va.as_u32() & !(level.granule() - 1));
        fresh[child_level as usize] = Some(child);
        child
    }

    /// Maps the kernel page at `va` to the frame containing `pa`.
    ///
    /// The kernel leaf tables are static; this indexes the flat kernel
    /// entry array directly. Kernel mappings are implicitly wired, so
    /// [`MapFlags::WIRED`] is ignored. The page is cache inhibited only with
    /// [`MapFlags::NO_CACHE`].
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if `va` lies below the kernel region.
    pub fn enter_kernel(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: VmProt,
        flags: MapFlags,
    ) -> Result<(), PmapError> {
        check_kernel(va)?;
        let _spl = Self::spl();
        self.enter_kernel_entry(va, pa, prot, flags);
        Ok(())
    }

    pub(super) fn enter_kernel_entry(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: VmProt,
        flags: MapFlags,
    ) {
        let idx = TableMemory::kernel_slot(va);
        let old = self.memory.entry(idx);
        let mut entry = PageEntry::page(pa);
        let mut page = self.managed_page(pa);

        if old.is_valid() {
            if old.frame_page() == entry.frame_page() {
                page = None;
                entry = entry.with_used(old.used()).with_modified(old.modified());
            } else {
                self.retire_entry(idx);
            }
        }

        entry.set_write_protected(prot.is_read_only());
        entry.set_cache_inhibited(flags.contains(MapFlags::NO_CACHE));
        *self.memory.entry_mut(idx) = entry;

        if old.is_valid() {
            self.atc.flush_address(va);
        }
        if let Some(page) = page {
            self.pv.push(page, idx);
        }
        trace!("enter kernel {va} -> {pa} {prot:?}");
    }

    /// Maps an unmanaged kernel page without reverse-map tracking.
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if `va` lies below the kernel region.
    ///
    /// # Panics
    /// Panics if `va` is already mapped.
    pub fn kenter_pa(
        &mut self,
        va: VirtualAddress,
        pa: PhysicalAddress,
        prot: VmProt,
    ) -> Result<(), PmapError> {
        check_kernel(va)?;
        let _spl = Self::spl();
        let idx = TableMemory::kernel_slot(va);
        assert!(
            !self.memory.entry(idx).is_valid(),
            "BUG: kenter_pa over the live mapping at {va}"
        );
        *self.memory.entry_mut(idx) =
            PageEntry::page(pa).with_write_protected(prot.is_read_only());
        Ok(())
    }

    /// Unmaps `len` bytes of kernel pages entered with
    /// [`kenter_pa`](Self::kenter_pa), flushing each page.
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if the range leaves the kernel region.
    pub fn kremove(&mut self, va: VirtualAddress, len: u32) -> Result<(), PmapError> {
        check_kernel(va)?;
        let end = va
            .checked_add(len)
            .ok_or(PmapError::OutsideKernelRange(va))?;
        let _spl = Self::spl();
        let mut page = va.align_down::<Size8K>();
        while page < end {
            *self.memory.entry_mut(TableMemory::kernel_slot(page)) = PageEntry::invalid();
            self.atc.flush_address(page);
            match page.checked_add(PAGE_SIZE) {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Maps the physical range `[start, end)` at `va` in the kernel and
    /// returns the first virtual address after it. At least one page is
    /// mapped.
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if the range leaves the kernel region.
    pub fn map(
        &mut self,
        va: VirtualAddress,
        start: PhysicalAddress,
        end: PhysicalAddress,
        prot: VmProt,
    ) -> Result<VirtualAddress, PmapError> {
        check_kernel(va)?;
        let _spl = Self::spl();
        let (mut va, mut pa) = (va, start);
        loop {
            self.enter_kernel_entry(va, pa, prot, MapFlags::empty());
            va = va
                .checked_add(PAGE_SIZE)
                .ok_or(PmapError::OutsideKernelRange(va))?;
            match pa.checked_add(PAGE_SIZE) {
                Some(next) if next < end => pa = next,
                _ => return Ok(va),
            }
        }
    }
}
