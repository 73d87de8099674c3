//! Bootstrap of the translation layer.

use super::Pmap;
use crate::config::PmapConfig;
use crate::level::Level;
use crate::pool::{TableManager, TablePool};
use crate::protection::{MapFlags, VmProt};
use crate::reverse_map::ReverseMap;
use crate::space::{SpaceArena, SpaceId};
use crate::table_memory::{TableLayout, TableMemory};
use crate::translation_cache::{MmuHardware, TranslationCache};
use crate::PmapError;
use core::marker::PhantomData;
use core::mem::size_of;
use kernel_alloc::bootstrap::{BootstrapAllocError, BootstrapAllocator};
use kernel_alloc::phys_mapper::KernelWindow;
use kernel_alloc::physical_memory::PhysicalMemoryRegistry;
use kernel_info::boot::BootMemoryInfo;
use kernel_info::memory::{
    KERNEL_BASE, KERNEL_END, KERNEL_LEAF_TABLES, KERNEL_MID_TABLES, KERNEL_PHYS_BASE, LEAF_ENTRIES,
    PAGE_SIZE, TEMPORARY_PAGES,
};
use kernel_memory_addresses::{PhysicalAddress, Size8K, VirtualAddress};
use kernel_sync::irq::InterruptControl;
use log::debug;

/// Alignment the MMU requires of every table.
const TABLE_ALIGN: u32 = 16;

/// Reserves `bytes` from the bootstrap window.
fn reserve(boot: &mut BootstrapAllocator, bytes: usize) -> Result<VirtualAddress, BootstrapAllocError> {
    boot.alloc(u32::try_from(bytes).unwrap_or(u32::MAX))
}

/// Reserves `count` tables of `level` and returns their physical base.
fn reserve_tables(
    boot: &mut BootstrapAllocator,
    level: Level,
    count: usize,
) -> Result<PhysicalAddress, BootstrapAllocError> {
    boot.align(TABLE_ALIGN)?;
    let va = reserve(boot, count * level.table_bytes() as usize)?;
    Ok(KernelWindow::to_physical(va))
}

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Sets up the translation layer for the kernel.
    ///
    /// Allocates, from the window following the kernel image, the kernel
    /// tables, the pool tables, their managers and the reverse map. Then
    /// ends the bootstrap phase, reserves the temporary pages, maps the
    /// kernel image and loads the kernel root.
    ///
    /// ### Kernel image mapping
    ///
    /// | Page(s)                       | Protection |
    /// |-------------------------------|------------|
    /// | first page (message buffer)   | read/write, cache inhibited |
    /// | second page (boot stack)      | read/write |
    /// | up to the last full text page | read/execute |
    /// | up to the first managed page  | read/write |
    ///
    /// # Errors
    /// - [`PmapError::PhysicalMemory`] if the bank list is unusable.
    /// - [`PmapError::Bootstrap`] if the window cannot hold the tables. The
    ///   kernel cannot continue in either case.
    pub fn bootstrap(
        config: PmapConfig,
        boot: &BootMemoryInfo<'_>,
        hardware: H,
    ) -> Result<Self, PmapError> {
        let _spl = Self::spl();

        let reserved = boot
            .total_memory()
            .saturating_sub(u64::from(boot.available));
        let mut physical =
            PhysicalMemoryRegistry::new(boot.banks, u32::try_from(reserved).unwrap_or(u32::MAX))?;

        let mut window = BootstrapAllocator::after_kernel(boot.kernel_end)?;

        // The leaf tables are one allocation so that slot indices are global.
        let kernel_top = reserve_tables(&mut window, Level::Top, 1)?;
        let kernel_mid = reserve_tables(&mut window, Level::Mid, KERNEL_MID_TABLES)?;
        let leaves = reserve_tables(
            &mut window,
            Level::Leaf,
            KERNEL_LEAF_TABLES + config.leaf_tables,
        )?;
        let user_mid = reserve_tables(&mut window, Level::Mid, config.mid_tables)?;
        let user_top = reserve_tables(&mut window, Level::Top, config.top_tables)?;

        let tables = config.top_tables + config.mid_tables + config.leaf_tables;
        reserve(&mut window, tables * size_of::<TableManager>())?;

        let slots = (KERNEL_LEAF_TABLES + config.leaf_tables) * LEAF_ENTRIES;
        let pages = physical.total_pages();
        reserve(&mut window, ReverseMap::footprint(pages, slots))?;

        window.align(PAGE_SIZE)?;
        window.disable();

        let mut virtual_avail = window.next();
        physical.set_avail_start(KernelWindow::to_physical(virtual_avail));

        let mut temporary = [VirtualAddress::zero(); TEMPORARY_PAGES];
        for page in &mut temporary {
            *page = virtual_avail;
            virtual_avail += PAGE_SIZE;
        }

        let memory = TableMemory::new(&TableLayout {
            kernel_top,
            kernel_mid,
            leaves,
            user_mid,
            user_top,
            top_tables: config.top_tables,
            mid_tables: config.mid_tables,
            leaf_tables: config.leaf_tables,
        });
        let kernel_root = memory.kernel_top_address();

        debug!(
            "pmap: {} top, {} mid, {} leaf tables; kernel root {kernel_root}; {} pages managed from {}",
            config.top_tables,
            config.mid_tables,
            config.leaf_tables,
            physical.free_page_count(),
            physical.avail_start(),
        );

        let mut pmap = Self {
            memory,
            top_pool: TablePool::new(Level::Top, config.top_tables),
            mid_pool: TablePool::new(Level::Mid, config.mid_tables),
            leaf_pool: TablePool::new(Level::Leaf, config.leaf_tables),
            pv: ReverseMap::new(pages, slots),
            physical,
            spaces: SpaceArena::new(kernel_root),
            atc: TranslationCache::new(hardware, kernel_root),
            current: SpaceId::KERNEL,
            virtual_avail,
            virtual_end: VirtualAddress::new(KERNEL_END),
            temporary,
            _interrupts: PhantomData,
        };
        pmap.map_kernel_image(boot.text_end);
        Ok(pmap)
    }

    fn map_kernel_image(&mut self, text_end: VirtualAddress) {
        let mut va = VirtualAddress::new(KERNEL_BASE);
        let mut pa = PhysicalAddress::new(KERNEL_PHYS_BASE);

        self.enter_kernel_entry(va, pa, VmProt::ALL, MapFlags::NO_CACHE);
        va += PAGE_SIZE;
        pa += PAGE_SIZE;

        self.enter_kernel_entry(va, pa, VmProt::ALL, MapFlags::empty());
        va += PAGE_SIZE;
        pa += PAGE_SIZE;

        // The last text page is shared with data and stays writable.
        let text_end = text_end.align_down::<Size8K>();
        while va < text_end {
            self.enter_kernel_entry(va, pa, VmProt::READ_EXECUTE, MapFlags::empty());
            va += PAGE_SIZE;
            pa += PAGE_SIZE;
        }

        let avail_start = self.physical.avail_start();
        while pa < avail_start {
            self.enter_kernel_entry(va, pa, VmProt::READ | VmProt::WRITE, MapFlags::empty());
            va += PAGE_SIZE;
            pa += PAGE_SIZE;
        }

        debug!("pmap: kernel image mapped up to {va}");
    }
}
