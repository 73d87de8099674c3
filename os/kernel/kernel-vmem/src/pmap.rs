//! # The Translation Layer
//!
//! [`Pmap`] owns every table, pool and registry of the translation layer and
//! implements the machine-independent VM interface on top of them. It is
//! created once by [`Pmap::bootstrap`]; afterwards every operation is a
//! method on it.
//!
//! ## Ownership
//!
//! ```text
//!                      ┌────────────── Pmap ──────────────┐
//!   SpaceId ──────────►│ spaces ─► top table (pool index) │
//!                      │ pools[top|mid|leaf] ─► managers  │
//!   PhysicalAddress ──►│ physical ─► pv heads ─► slots    │
//!                      │ memory (raw tables)              │
//!                      │ atc ─► MmuHardware               │
//!                      └──────────────────────────────────┘
//! ```
//!
//! Tables refer to their parent by pool index and slot; address spaces refer
//! to their top table by pool index. Public handles ([`SpaceId`],
//! [`TableHandle`]) are generation checked.
//!
//! ## Interrupts
//!
//! Every operation that edits tables or chains runs with the interrupt
//! priority raised to [`PriorityLevel::VM`] for its whole duration.

mod bootstrap;
mod enter;
mod pages;
mod protect;
mod query;
mod remove;
mod tables;

use crate::PmapError;
use crate::level::Level;
use crate::pool::{Parent, TableHandle, TableInfo, TablePool};
use crate::reverse_map::{PteIndex, ReverseMap};
use crate::space::{AddressSpace, SpaceArena, SpaceId};
use crate::table_memory::TableMemory;
use crate::translation_cache::{MmuHardware, TranslationCache};
use core::marker::PhantomData;
use kernel_alloc::physical_memory::PhysicalMemoryRegistry;
use kernel_info::memory::{PAGE_SIZE, TEMPORARY_PAGES};
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::irq::{InterruptControl, PriorityLevel, SplGuard};
use log::{debug, warn};

/// The translation layer.
///
/// `H` is the MMU, `C` the processor's interrupt mask.
pub struct Pmap<H: MmuHardware, C: InterruptControl> {
    memory: TableMemory,
    top_pool: TablePool,
    mid_pool: TablePool,
    leaf_pool: TablePool,
    pv: ReverseMap,
    physical: PhysicalMemoryRegistry,
    spaces: SpaceArena,
    atc: TranslationCache<H>,
    /// The space whose root is loaded.
    current: SpaceId,
    virtual_avail: VirtualAddress,
    virtual_end: VirtualAddress,
    temporary: [VirtualAddress; TEMPORARY_PAGES],
    _interrupts: PhantomData<fn() -> C>,
}

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    #[inline]
    fn spl() -> SplGuard<C> {
        SplGuard::raise(PriorityLevel::VM)
    }

    const fn pool(&self, level: Level) -> &TablePool {
        match level {
            Level::Top => &self.top_pool,
            Level::Mid => &self.mid_pool,
            Level::Leaf => &self.leaf_pool,
        }
    }

    const fn pool_mut(&mut self, level: Level) -> &mut TablePool {
        match level {
            Level::Top => &mut self.top_pool,
            Level::Mid => &mut self.mid_pool,
            Level::Leaf => &mut self.leaf_pool,
        }
    }

    fn space(&self, id: SpaceId) -> Result<&AddressSpace, PmapError> {
        self.spaces
            .get(id)
            .ok_or(PmapError::NoSuchAddressSpace(id))
    }

    fn space_mut(&mut self, id: SpaceId) -> Result<&mut AddressSpace, PmapError> {
        self.spaces
            .get_mut(id)
            .ok_or(PmapError::NoSuchAddressSpace(id))
    }

    #[inline]
    fn kernel_root(&self) -> PhysicalAddress {
        self.memory.kernel_top_address()
    }

    /// Reverse-map slot of `pa` if the page is managed.
    fn managed_page(&self, pa: PhysicalAddress) -> Option<usize> {
        if !self.physical.is_managed(pa) {
            return None;
        }
        self.physical.reverse_map_slot(pa)
    }

    /// The address space and virtual address a leaf slot maps.
    ///
    /// # Panics
    /// Panics if `idx` lies in a leaf table that is not in use.
    #[allow(clippy::cast_possible_truncation)]
    fn pte_info(&self, idx: PteIndex) -> (SpaceId, VirtualAddress) {
        match TableMemory::user_leaf(idx) {
            None => (SpaceId::KERNEL, TableMemory::kernel_page(idx).base()),
            Some((leaf, slot)) => {
                let manager = self.leaf_pool.manager(leaf);
                let Some(owner) = manager.owner else {
                    panic!("BUG: {idx:?} lies in a free leaf table");
                };
                (owner, manager.base + slot as u32 * PAGE_SIZE)
            }
        }
    }

    /// Creates an empty address space with one reference.
    pub fn create(&mut self) -> SpaceId {
        let _spl = Self::spl();
        let id = self.spaces.insert(AddressSpace::new(self.kernel_root()));
        debug!("created {id:?}");
        id
    }

    /// Adds a reference to `id`.
    ///
    /// # Errors
    /// - [`PmapError::KernelAddressSpace`] for the kernel space, which is not
    ///   reference counted.
    /// - [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn reference(&mut self, id: SpaceId) -> Result<(), PmapError> {
        if id.is_kernel() {
            return Err(PmapError::KernelAddressSpace);
        }
        let _spl = Self::spl();
        self.space_mut(id)?.refs += 1;
        Ok(())
    }

    /// Drops a reference to `id`, releasing the space when it was the last.
    ///
    /// A released space that is still loaded is replaced by the kernel
    /// space. Any mappings left are torn down with their tables.
    ///
    /// # Errors
    /// - [`PmapError::KernelAddressSpace`] for the kernel space.
    /// - [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn destroy(&mut self, id: SpaceId) -> Result<(), PmapError> {
        if id.is_kernel() {
            return Err(PmapError::KernelAddressSpace);
        }
        let _spl = Self::spl();
        let space = self.space_mut(id)?;
        space.refs -= 1;
        if space.refs > 0 {
            return Ok(());
        }

        if self.current == id {
            self.current = SpaceId::KERNEL;
            let root = self.kernel_root();
            self.atc.switch(root);
        }

        if let Some(top) = self.space(id)?.top {
            warn!("releasing {id:?} with live mappings");
            self.free_table(Level::Top, top, true);
        }
        self.spaces.remove(id);
        debug!("released {id:?}");
        Ok(())
    }

    /// Makes `id` the loaded address space.
    ///
    /// The root pointer is reloaded, and user translations flushed, only if
    /// the root actually changes.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn activate(&mut self, id: SpaceId) -> Result<(), PmapError> {
        let _spl = Self::spl();
        let root = self.space(id)?.root;
        self.current = id;
        self.atc.switch(root);
        Ok(())
    }

    /// The loaded address space.
    #[inline]
    #[must_use]
    pub const fn current(&self) -> SpaceId {
        self.current
    }

    /// Whether `id` names a live address space.
    #[must_use]
    pub fn contains(&self, id: SpaceId) -> bool {
        self.spaces.get(id).is_some()
    }

    /// Number of live address spaces, the kernel included.
    #[must_use]
    pub fn space_count(&self) -> usize {
        self.spaces.len()
    }

    /// The root pointer value of `id`: its top table, or the kernel top
    /// table while it owns none.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn root(&self, id: SpaceId) -> Result<PhysicalAddress, PmapError> {
        Ok(self.space(id)?.root)
    }

    /// The top table owned by `id`, if any.
    ///
    /// # Errors
    /// [`PmapError::NoSuchAddressSpace`] if `id` is stale.
    pub fn top_table(&self, id: SpaceId) -> Result<Option<TableHandle>, PmapError> {
        Ok(self.space(id)?.top.map(|t| self.top_pool.handle(t)))
    }

    /// First and last-plus-one kernel virtual addresses left to the VM system.
    #[inline]
    #[must_use]
    pub const fn virtual_space(&self) -> (VirtualAddress, VirtualAddress) {
        (self.virtual_avail, self.virtual_end)
    }

    /// Kernel pages reserved for short-lived mappings of physical pages.
    #[inline]
    #[must_use]
    pub const fn temporary_pages(&self) -> [VirtualAddress; TEMPORARY_PAGES] {
        self.temporary
    }

    #[inline]
    #[must_use]
    pub const fn physical(&self) -> &PhysicalMemoryRegistry {
        &self.physical
    }

    /// The registry, for handing out free pages to the VM system.
    #[inline]
    pub const fn physical_mut(&mut self) -> &mut PhysicalMemoryRegistry {
        &mut self.physical
    }

    #[inline]
    #[must_use]
    pub const fn hardware(&self) -> &H {
        self.atc.hardware()
    }

    #[inline]
    pub const fn hardware_mut(&mut self) -> &mut H {
        self.atc.hardware_mut()
    }

    /// Number of pool tables of `level` that are free.
    #[must_use]
    pub fn free_tables(&self, level: Level) -> usize {
        self.pool(level).free_count()
    }

    /// Number of pool tables of `level`.
    #[must_use]
    pub fn pool_capacity(&self, level: Level) -> usize {
        self.pool(level).capacity()
    }

    /// Whether the table is on its pool queue, `None` for stale handles.
    #[must_use]
    pub fn is_queued(&self, handle: TableHandle) -> Option<bool> {
        let pool = self.pool(handle.level());
        pool.resolve(handle).map(|i| pool.is_queued(i))
    }

    /// State of a pool table, `None` for stale handles.
    #[must_use]
    pub fn table_info(&self, handle: TableHandle) -> Option<TableInfo> {
        let level = handle.level();
        let pool = self.pool(level);
        let index = pool.resolve(handle)?;
        let manager = pool.manager(index);
        let parent = match (manager.parent, level.parent()) {
            (Parent::Table { index, slot }, Some(up)) => Some((self.pool(up).handle(index), slot)),
            _ => None,
        };
        Some(TableInfo {
            level,
            valid_entries: manager.valid,
            wired_entries: manager.wired,
            queued: pool.is_queued(index),
            owner: manager.owner,
            parent,
            base: manager.base,
        })
    }
}
