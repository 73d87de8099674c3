//! Physical page operations for the pager, driven by the reverse map.

use super::Pmap;
use crate::descriptor::PageEntry;
use crate::level::Level;
use crate::protection::VmProt;
use crate::reverse_map::PvFlags;
use crate::space::SpaceId;
use crate::table_memory::TableMemory;
use crate::translation_cache::MmuHardware;
use alloc::vec::Vec;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::irq::InterruptControl;
use log::trace;

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Whether the page at `pa` was written through any mapping, past or
    /// present. Unmanaged pages are never modified.
    #[must_use]
    pub fn is_modified(&self, pa: PhysicalAddress) -> bool {
        self.test_flag(pa, PvFlags::MODIFIED)
    }

    /// Whether the page at `pa` was accessed through any mapping, past or
    /// present. Unmanaged pages are never referenced.
    #[must_use]
    pub fn is_referenced(&self, pa: PhysicalAddress) -> bool {
        self.test_flag(pa, PvFlags::REFERENCED)
    }

    fn test_flag(&self, pa: PhysicalAddress, flag: PvFlags) -> bool {
        let Some(page) = self.managed_page(pa) else {
            return false;
        };
        if self.pv.flags(page).contains(flag) {
            return true;
        }
        self.pv
            .chain(page)
            .any(|idx| flag.any_in(self.memory.entry(idx)))
    }

    /// Clears the modified state of `pa` and returns what it was.
    pub fn clear_modify(&mut self, pa: PhysicalAddress) -> bool {
        let was = self.is_modified(pa);
        self.clear(pa, PvFlags::MODIFIED);
        was
    }

    /// Clears the referenced state of `pa` and returns what it was.
    pub fn clear_reference(&mut self, pa: PhysicalAddress) -> bool {
        let was = self.is_referenced(pa);
        self.clear(pa, PvFlags::REFERENCED);
        was
    }

    /// Clears `flags` from the page's history and from the hardware bits of
    /// every entry mapping it. Each mapping is flushed, whichever space is
    /// loaded, so the MMU sets the bits again on the next access.
    pub fn clear(&mut self, pa: PhysicalAddress, flags: PvFlags) {
        let Some(page) = self.managed_page(pa) else {
            return;
        };
        let _spl = Self::spl();
        self.pv.remove_flags(page, flags);

        for idx in self.pv.chain(page) {
            flags.clear_in(self.memory.entry_mut(idx));
            let (_, va) = self.pte_info(idx);
            self.atc.flush_address(va);
        }
    }

    /// Lowers the protection of every mapping of the page at `pa`.
    ///
    /// [`VmProt::NONE`] unmaps the page everywhere, releasing tables that
    /// are left empty; read-only protections write protect every mapping;
    /// protections allowing writes change nothing.
    pub fn page_protect(&mut self, pa: PhysicalAddress, prot: VmProt) {
        if prot.contains(VmProt::WRITE) {
            return;
        }
        let Some(page) = self.managed_page(pa) else {
            return;
        };
        let _spl = Self::spl();

        if prot != VmProt::NONE {
            for idx in self.pv.chain(page) {
                self.memory.entry_mut(idx).set_write_protected(true);
                let (owner, va) = self.pte_info(idx);
                if owner == self.current || owner.is_kernel() {
                    self.atc.flush_address(va);
                }
            }
            return;
        }

        for idx in self.pv.take(page) {
            let entry = self.memory.entry(idx);
            let (owner, va) = self.pte_info(idx);
            self.pv.insert_flags(page, PvFlags::from_entry(entry));
            *self.memory.entry_mut(idx) = PageEntry::invalid();
            trace!("page_protect {pa}: unmapped {va} in {owner:?}");

            let Some((leaf, _)) = TableMemory::user_leaf(idx) else {
                self.atc.flush_address(va);
                continue;
            };
            if entry.wired() {
                self.remove_wired_credit(Level::Leaf, leaf);
            }
            self.leaf_pool.manager_mut(leaf).valid -= 1;
            if owner == self.current {
                self.atc.flush_address(va);
            }
            self.release_if_empty(Level::Leaf, leaf);
        }
    }

    /// Every `(address space, virtual address)` the page at `pa` is mapped
    /// at, most recent mapping first. Empty for unmanaged pages.
    #[must_use]
    pub fn mappings(&self, pa: PhysicalAddress) -> Vec<(SpaceId, VirtualAddress)> {
        self.managed_page(pa).map_or_else(Vec::new, |page| {
            self.pv.chain(page).map(|idx| self.pte_info(idx)).collect()
        })
    }
}
