//! Reducing protection and unwiring.

use super::Pmap;
use super::enter::check_kernel;
use crate::PmapError;
use crate::level::Level;
use crate::protection::VmProt;
use crate::space::SpaceId;
use crate::table_memory::TableMemory;
use crate::translation_cache::MmuHardware;
use kernel_info::memory::{KERNEL_BASE, PAGE_SIZE};
use kernel_memory_addresses::{Size8K, VirtualAddress};
use kernel_sync::irq::InterruptControl;
use log::trace;

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Reduces the protection of `id`'s pages in `[start, end)`.
    ///
    /// Protection can only be taken away: a `prot` allowing writes leaves
    /// the range untouched, [`VmProt::NONE`] removes the range, anything
    /// else write protects every mapped page.
    ///
    /// # Errors
    /// - [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    /// - [`PmapError::OutsideKernelRange`] if `start` lies below the kernel
    ///   region of the kernel space.
    pub fn protect(
        &mut self,
        id: SpaceId,
        start: VirtualAddress,
        end: VirtualAddress,
        prot: VmProt,
    ) -> Result<(), PmapError> {
        if id.is_kernel() {
            return self.protect_kernel(start, end, prot);
        }
        if prot.contains(VmProt::WRITE) {
            return Ok(());
        }
        if prot == VmProt::NONE {
            return self.remove(id, start, end);
        }

        let _spl = Self::spl();
        let Some(top) = self.space(id)?.top else {
            return Ok(());
        };
        let loaded = self.current == id;
        let end = end.as_u32().min(KERNEL_BASE);
        let mut va = start.align_down::<Size8K>().as_u32();

        while va < end {
            let address = VirtualAddress::new(va);
            let leaf = match self.lookup_leaf(top, address) {
                Ok(leaf) => leaf,
                Err(level) => {
                    // Nothing mapped in the rest of this granule.
                    va = (va & !(level.granule() - 1)).saturating_add(level.granule());
                    continue;
                }
            };
            let entry = self
                .memory
                .entry_mut(TableMemory::leaf_slot(leaf, Level::Leaf.index(address)));
            if entry.is_valid() {
                entry.set_write_protected(true);
                if loaded {
                    self.atc.flush_address(address);
                }
            }
            va += PAGE_SIZE;
        }

        trace!("protect {id:?} {start}..{} {prot:?}", VirtualAddress::new(end));
        Ok(())
    }

    /// Changes the protection of kernel pages in `[start, end)`.
    ///
    /// Read-only protections write protect each page, [`VmProt::NONE`]
    /// unmaps it, protections allowing writes leave it alone. Every mapped
    /// page is flushed.
    ///
    /// # Errors
    /// [`PmapError::OutsideKernelRange`] if `start` lies below the kernel region.
    pub fn protect_kernel(
        &mut self,
        start: VirtualAddress,
        end: VirtualAddress,
        prot: VmProt,
    ) -> Result<(), PmapError> {
        check_kernel(start)?;
        let _spl = Self::spl();
        let mut va = start.align_down::<Size8K>();
        while va < end {
            let idx = TableMemory::kernel_slot(va);
            if self.memory.entry(idx).is_valid() {
                if prot == VmProt::NONE {
                    self.retire_entry(idx);
                } else if prot.is_read_only() {
                    self.memory.entry_mut(idx).set_write_protected(true);
                }
                self.atc.flush_address(va);
            }
            match va.checked_add(PAGE_SIZE) {
                Some(next) => va = next,
                None => break,
            }
        }
        Ok(())
    }

    /// Clears the wired bit of the entry mapping `va` in `id`.
    ///
    /// Tables left without wired entries become eligible for stealing
    /// again. Kernel mappings stay wired; unmapped or unwired pages are
    /// ignored.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn unwire(&mut self, id: SpaceId, va: VirtualAddress) -> Result<(), PmapError> {
        if id.is_kernel() {
            return Ok(());
        }
        let _spl = Self::spl();
        let Some(top) = self.space(id)?.top else {
            return Ok(());
        };
        if va.as_u32() >= KERNEL_BASE {
            return Ok(());
        }
        let Ok(leaf) = self.lookup_leaf(top, va) else {
            return Ok(());
        };

        let entry = self
            .memory
            .entry_mut(TableMemory::leaf_slot(leaf, Level::Leaf.index(va)));
        if entry.is_valid() && entry.wired() {
            entry.set_wired(false);
            self.remove_wired_credit(Level::Leaf, leaf);
            trace!("unwire {id:?} {va}");
        }
        Ok(())
    }
}
