//! # Table Manager Pools
//!
//! Each level has a fixed number of pool tables, each described by a
//! [`TableManager`]. Managers whose table holds no wired entry sit on their
//! pool's queue:
//!
//! ```text
//!   head                                                tail
//!   ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐    ┌──────┐
//!   │ free │◄──►│ free │◄──►│ used │◄──►│ used │◄──►│ used │
//!   └──────┘    └──────┘    └──────┘    └──────┘    └──────┘
//! ```
//!
//! Freed tables are pushed at the head, freshly used ones at the tail. Taking
//! from the head therefore yields a free table while one exists and the least
//! recently allocated in-use table otherwise; that table is then stolen from
//! its owner. Wired tables are off the queue and never stolen.
//!
//! The queue is intrusive: the links live in the managers, which live in an
//! arena indexed by the table's pool index.

use crate::level::Level;
use crate::space::SpaceId;
use alloc::vec::Vec;
use kernel_memory_addresses::VirtualAddress;

/// Generation-checked handle of a pool table.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TableHandle {
    level: Level,
    index: u32,
    generation: u32,
}

impl TableHandle {
    #[inline]
    #[must_use]
    pub const fn level(self) -> Level {
        self.level
    }

    /// Pool index of the table.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.index as usize
    }

    #[inline]
    #[must_use]
    pub const fn generation(self) -> u32 {
        self.generation
    }
}

/// What a pool table hangs off.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) enum Parent {
    /// Free.
    None,
    /// A top table owned by an address space.
    Space(SpaceId),
    /// A mid or leaf table installed in `slot` of pool table `index` one
    /// level up.
    Table { index: usize, slot: usize },
}

#[derive(Copy, Clone, Debug, Default)]
struct Link {
    prev: Option<usize>,
    next: Option<usize>,
    queued: bool,
}

#[derive(Debug, Clone)]
pub(crate) struct TableManager {
    pub parent: Parent,
    /// Address space the table maps for. Kept on leaf tables so a leaf slot
    /// can be turned back into a virtual address.
    pub owner: Option<SpaceId>,
    /// First virtual address covered by the table.
    pub base: VirtualAddress,
    /// Number of valid slots.
    pub valid: usize,
    /// Wired entries for a leaf table, children holding wired entries above.
    pub wired: usize,
    pub generation: u32,
    link: Link,
}

impl TableManager {
    const fn new() -> Self {
        Self {
            parent: Parent::None,
            owner: None,
            base: VirtualAddress::zero(),
            valid: 0,
            wired: 0,
            generation: 0,
            link: Link {
                prev: None,
                next: None,
                queued: false,
            },
        }
    }

    /// Whether the table is linked to a parent or space.
    #[inline]
    pub const fn in_use(&self) -> bool {
        !matches!(self.parent, Parent::None)
    }
}

/// Observable state of a pool table.
#[derive(Debug, Clone, Eq, PartialEq)]
pub struct TableInfo {
    pub level: Level,
    pub valid_entries: usize,
    pub wired_entries: usize,
    /// On the pool queue, i.e. eligible for reuse or stealing.
    pub queued: bool,
    /// The address space owning the top table of the tree this table is in.
    pub owner: Option<SpaceId>,
    /// The parent table and the slot this table is installed in.
    pub parent: Option<(TableHandle, usize)>,
    pub base: VirtualAddress,
}

/// One pool of table managers.
#[derive(Debug)]
pub(crate) struct TablePool {
    level: Level,
    managers: Vec<TableManager>,
    head: Option<usize>,
    tail: Option<usize>,
}

impl TablePool {
    /// Creates `count` free managers, queued in index order.
    pub fn new(level: Level, count: usize) -> Self {
        let mut pool = Self {
            level,
            managers: (0..count).map(|_| TableManager::new()).collect(),
            head: None,
            tail: None,
        };
        for index in 0..count {
            pool.push_back(index);
        }
        pool
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.managers.len()
    }

    #[inline]
    pub fn manager(&self, index: usize) -> &TableManager {
        &self.managers[index]
    }

    #[inline]
    pub fn manager_mut(&mut self, index: usize) -> &mut TableManager {
        &mut self.managers[index]
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn handle(&self, index: usize) -> TableHandle {
        TableHandle {
            level: self.level,
            index: index as u32,
            generation: self.managers[index].generation,
        }
    }

    /// Pool index of `handle`, if it is of this pool and still current.
    pub fn resolve(&self, handle: TableHandle) -> Option<usize> {
        if handle.level != self.level {
            return None;
        }
        let manager = self.managers.get(handle.index())?;
        (manager.generation == handle.generation).then_some(handle.index())
    }

    #[inline]
    pub fn is_queued(&self, index: usize) -> bool {
        self.managers[index].link.queued
    }

    /// Removes and returns the manager at the head of the queue.
    pub fn pop_front(&mut self) -> Option<usize> {
        let index = self.head?;
        self.unlink(index);
        Some(index)
    }

    /// Queues `index` at the head, where it is reused first.
    pub fn push_front(&mut self, index: usize) {
        self.unlink(index);
        let old = self.head;
        self.managers[index].link = Link {
            prev: None,
            next: old,
            queued: true,
        };
        match old {
            Some(old) => self.managers[old].link.prev = Some(index),
            None => self.tail = Some(index),
        }
        self.head = Some(index);
    }

    /// Queues `index` at the tail, where it is stolen last.
    pub fn push_back(&mut self, index: usize) {
        self.unlink(index);
        let old = self.tail;
        self.managers[index].link = Link {
            prev: old,
            next: None,
            queued: true,
        };
        match old {
            Some(old) => self.managers[old].link.next = Some(index),
            None => self.head = Some(index),
        }
        self.tail = Some(index);
    }

    /// Takes `index` off the queue. No-op if it is not queued.
    pub fn unlink(&mut self, index: usize) {
        let link = self.managers[index].link;
        if !link.queued {
            return;
        }
        match link.prev {
            Some(prev) => self.managers[prev].link.next = link.next,
            None => self.head = link.next,
        }
        match link.next {
            Some(next) => self.managers[next].link.prev = link.prev,
            None => self.tail = link.prev,
        }
        self.managers[index].link = Link::default();
    }

    /// Iterates the queue from head to tail.
    pub fn queue(&self) -> impl Iterator<Item = usize> + '_ {
        core::iter::successors(self.head, |&i| self.managers[i].link.next)
    }

    /// Number of queued managers that are not in use.
    pub fn free_count(&self) -> usize {
        self.queue()
            .filter(|&i| !self.managers[i].in_use())
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn order(pool: &TablePool) -> Vec<usize> {
        pool.queue().collect()
    }

    #[test]
    fn starts_with_everything_queued_in_order() {
        let pool = TablePool::new(Level::Mid, 4);
        assert_eq!(order(&pool), [0, 1, 2, 3]);
        assert_eq!(pool.free_count(), 4);
    }

    #[test]
    fn front_and_back() {
        let mut pool = TablePool::new(Level::Leaf, 4);
        assert_eq!(pool.pop_front(), Some(0));
        assert_eq!(pool.pop_front(), Some(1));
        pool.push_back(0);
        pool.push_front(1);
        assert_eq!(order(&pool), [1, 2, 3, 0]);
        assert!(pool.is_queued(0));
    }

    #[test]
    fn unlink_from_the_middle() {
        let mut pool = TablePool::new(Level::Top, 3);
        pool.unlink(1);
        assert_eq!(order(&pool), [0, 2]);
        assert!(!pool.is_queued(1));
        pool.unlink(1);
        assert_eq!(order(&pool), [0, 2]);
        pool.unlink(0);
        pool.unlink(2);
        assert_eq!(pool.pop_front(), None);
        pool.push_front(2);
        assert_eq!(order(&pool), [2]);
    }

    #[test]
    fn requeueing_moves_the_manager() {
        let mut pool = TablePool::new(Level::Leaf, 3);
        pool.push_back(0);
        assert_eq!(order(&pool), [1, 2, 0]);
        pool.push_front(2);
        assert_eq!(order(&pool), [2, 1, 0]);
    }

    #[test]
    fn stale_handles_do_not_resolve() {
        let mut pool = TablePool::new(Level::Mid, 2);
        let h = pool.handle(1);
        assert_eq!(pool.resolve(h), Some(1));
        pool.manager_mut(1).generation += 1;
        assert_eq!(pool.resolve(h), None);
        assert_eq!(TablePool::new(Level::Leaf, 2).resolve(pool.handle(0)), None);
    }
}
