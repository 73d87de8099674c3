//! Getting, freeing and stealing pool tables, and the wiring credits that
//! keep tables off their pool queue.

use super::Pmap;
use crate::descriptor::{PageEntry, TableDescriptor};
use crate::level::Level;
use crate::pool::Parent;
use crate::reverse_map::{PteIndex, PvFlags};
use crate::space::SpaceId;
use crate::table_memory::TableMemory;
use crate::translation_cache::MmuHardware;
use kernel_info::memory::KERNEL_TOP_INDEX;
use kernel_memory_addresses::VirtualAddress;
use kernel_sync::irq::InterruptControl;
use log::{debug, trace};

impl<H: MmuHardware, C: InterruptControl> Pmap<H, C> {
    /// Takes the table at the head of `level`'s queue.
    ///
    /// A table still linked to a parent is stolen: its parent slot is
    /// invalidated and its contents are freed. A stolen top table is taken
    /// away from its address space, which falls back to the kernel root.
    ///
    /// The returned table is off the queue with zeroed counts and a new
    /// generation; the caller links it and queues it when done.
    ///
    /// # Panics
    /// Panics if every table of `level` is wired.
    pub(super) fn get_table(&mut self, level: Level) -> usize {
        let Some(index) = self.pool_mut(level).pop_front() else {
            panic!("BUG: every {level} table is wired");
        };

        let manager = self.pool(level).manager(index);
        let (parent, owner) = (manager.parent, manager.owner);
        match parent {
            Parent::None => {}
            Parent::Table { index: parent, slot } => {
                debug!("stealing {level} table {index} from {owner:?}");
                let Some(up) = level.parent() else {
                    panic!("BUG: top table {index} linked to a table");
                };
                self.memory.descriptors_mut(up, parent)[slot] = TableDescriptor::invalid();
                self.pool_mut(up).manager_mut(parent).valid -= 1;
                self.free_table(level, index, false);
                if owner.is_some_and(|o| o == self.current) {
                    self.atc.flush_user();
                }
            }
            Parent::Space(id) => {
                debug!("stealing top table {index} from {id:?}");
                self.free_table(level, index, false);
                self.detach_top(id);
            }
        }

        let manager = self.pool_mut(level).manager_mut(index);
        manager.parent = Parent::None;
        manager.owner = None;
        manager.base = VirtualAddress::zero();
        manager.valid = 0;
        manager.wired = 0;
        manager.generation = manager.generation.wrapping_add(1);
        index
    }

    /// Tears down everything table `index` maps and zeroes its counts.
    ///
    /// Valid leaf entries are retired so the page history survives. Child
    /// tables are freed recursively and pushed at the head of their pools. A
    /// top table's kernel slots are left alone. With `relink`, the table is
    /// unlinked from its parent and pushed at the head of its own pool.
    pub(super) fn free_table(&mut self, level: Level, index: usize, relink: bool) {
        match level.child() {
            None => {
                for slot in 0..level.entries() {
                    self.retire_entry(TableMemory::leaf_slot(index, slot));
                }
            }
            Some(child_level) => {
                let slots = if level == Level::Top {
                    KERNEL_TOP_INDEX
                } else {
                    level.entries()
                };
                for slot in 0..slots {
                    if let Some(child) = self.memory.child(level, index, slot) {
                        self.memory.descriptors_mut(level, index)[slot] =
                            TableDescriptor::invalid();
                        self.free_table(child_level, child, true);
                    }
                }
            }
        }

        let pool = self.pool_mut(level);
        let manager = pool.manager_mut(index);
        manager.valid = 0;
        manager.wired = 0;
        if relink {
            manager.parent = Parent::None;
            manager.owner = None;
            pool.push_front(index);
        }
    }

    /// Takes the top table away from `id`; the space's root reverts to the
    /// kernel top table, reloaded right away if `id` is loaded.
    fn detach_top(&mut self, id: SpaceId) {
        let kernel_root = self.kernel_root();
        if let Some(space) = self.spaces.get_mut(id) {
            space.top = None;
            space.root = kernel_root;
        }
        if self.current == id {
            self.atc.switch(kernel_root);
        }
    }

    /// Frees the top table of `id` and detaches it from the space.
    pub(super) fn release_top(&mut self, id: SpaceId, top: usize) {
        trace!("releasing top table {top} of {id:?}");
        self.free_table(Level::Top, top, true);
        self.detach_top(id);
    }

    /// Invalidates `slot` of table `index` at `level` and frees the child
    /// table it pointed at.
    pub(super) fn release_child(&mut self, level: Level, index: usize, slot: usize, child: usize) {
        let Some(child_level) = level.child() else {
            return;
        };
        self.memory.descriptors_mut(level, index)[slot] = TableDescriptor::invalid();
        self.pool_mut(level).manager_mut(index).valid -= 1;
        if self.pool(child_level).manager(child).wired > 0 {
            self.remove_wired_credit(level, index);
        }
        self.free_table(child_level, child, true);
    }

    /// Returns table `index` to its pool if it holds no valid slot, and its
    /// ancestors if that leaves them empty too. An emptied top table is
    /// released from its space.
    pub(super) fn release_if_empty(&mut self, level: Level, index: usize) {
        let (mut level, mut index) = (level, index);
        loop {
            let manager = self.pool(level).manager(index);
            if manager.valid != 0 {
                return;
            }
            match (manager.parent, level.parent()) {
                (Parent::Table { index: parent, slot }, Some(up)) => {
                    self.release_child(up, parent, slot, index);
                    level = up;
                    index = parent;
                }
                (Parent::Space(id), _) => {
                    self.release_top(id, index);
                    return;
                }
                _ => return,
            }
        }
    }

    /// Adds one wired credit to table `index`. On the table's first credit
    /// it leaves its queue and credits its parent in turn.
    pub(super) fn add_wired_credit(&mut self, level: Level, index: usize) {
        let (mut level, mut index) = (level, index);
        loop {
            let pool = self.pool_mut(level);
            let manager = pool.manager_mut(index);
            manager.wired += 1;
            if manager.wired != 1 {
                return;
            }
            let parent = manager.parent;
            pool.unlink(index);
            match (parent, level.parent()) {
                (Parent::Table { index: p, .. }, Some(up)) => {
                    level = up;
                    index = p;
                }
                _ => return,
            }
        }
    }

    /// Removes one wired credit from table `index`. On the table's last
    /// credit it rejoins its queue at the tail and its parent loses a credit
    /// in turn.
    pub(super) fn remove_wired_credit(&mut self, level: Level, index: usize) {
        let (mut level, mut index) = (level, index);
        loop {
            let pool = self.pool_mut(level);
            let manager = pool.manager_mut(index);
            debug_assert!(manager.wired > 0, "BUG: {level} table {index} has no wired credit");
            manager.wired = manager.wired.saturating_sub(1);
            if manager.wired != 0 {
                return;
            }
            let parent = manager.parent;
            if manager.in_use() {
                pool.push_back(index);
            }
            match (parent, level.parent()) {
                (Parent::Table { index: p, .. }, Some(up)) => {
                    level = up;
                    index = p;
                }
                _ => return,
            }
        }
    }

    /// Invalidates the entry at `idx`, unlinking it from its page's chain
    /// and folding its hardware bits into the page's sticky flags.
    ///
    /// Table counts and the translation cache are left to the caller.
    pub(super) fn retire_entry(&mut self, idx: PteIndex) {
        let entry = self.memory.entry(idx);
        if !entry.is_valid() {
            return;
        }
        if let Some(page) = self.managed_page(entry.frame_address()) {
            self.pv.unlink(page, idx);
            self.pv.insert_flags(page, PvFlags::from_entry(entry));
        }
        *self.memory.entry_mut(idx) = PageEntry::invalid();
    }
}
