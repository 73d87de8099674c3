//! # Address Spaces
//!
//! An address space owns at most one top table, allocated on its first
//! mapping. Until then (and after its last mapping is gone) its root is the
//! kernel top table, which maps nothing below [`KERNEL_BASE`](kernel_info::memory::KERNEL_BASE).
//!
//! Spaces live in an arena addressed by generation-checked [`SpaceId`]s. Slot
//! `0` is the kernel space, which is never released.

use alloc::vec;
use alloc::vec::Vec;
use core::fmt;
use kernel_memory_addresses::PhysicalAddress;

/// Handle of an address space.
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct SpaceId {
    index: u32,
    generation: u32,
}

impl SpaceId {
    /// The kernel address space.
    pub const KERNEL: Self = Self {
        index: 0,
        generation: 0,
    };

    #[inline]
    #[must_use]
    pub const fn is_kernel(self) -> bool {
        self.index == 0
    }

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

impl fmt::Debug for SpaceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_kernel() {
            f.write_str("space(kernel)")
        } else {
            write!(f, "space({}v{})", self.index, self.generation)
        }
    }
}

#[derive(Debug, Clone)]
pub(crate) struct AddressSpace {
    /// Pool index of the owned top table.
    pub top: Option<usize>,
    /// Physical address loaded into the root pointer for this space.
    pub root: PhysicalAddress,
    pub refs: u32,
}

impl AddressSpace {
    pub const fn new(kernel_root: PhysicalAddress) -> Self {
        Self {
            top: None,
            root: kernel_root,
            refs: 1,
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    space: Option<AddressSpace>,
}

/// Arena of address spaces.
#[derive(Debug)]
pub(crate) struct SpaceArena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl SpaceArena {
    /// Creates the arena holding only the kernel space.
    pub fn new(kernel_root: PhysicalAddress) -> Self {
        Self {
            slots: vec![Slot {
                generation: 0,
                space: Some(AddressSpace::new(kernel_root)),
            }],
            free: Vec::new(),
        }
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn insert(&mut self, space: AddressSpace) -> SpaceId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            slot.space = Some(space);
            return SpaceId {
                index,
                generation: slot.generation,
            };
        }

        let index = self.slots.len() as u32;
        self.slots.push(Slot {
            generation: 0,
            space: Some(space),
        });
        SpaceId {
            index,
            generation: 0,
        }
    }

    pub fn get(&self, id: SpaceId) -> Option<&AddressSpace> {
        self.slots
            .get(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.space.as_ref())
    }

    pub fn get_mut(&mut self, id: SpaceId) -> Option<&mut AddressSpace> {
        self.slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)
            .and_then(|s| s.space.as_mut())
    }

    /// Releases `id` and invalidates every handle to it.
    pub fn remove(&mut self, id: SpaceId) -> Option<AddressSpace> {
        debug_assert!(!id.is_kernel(), "BUG: the kernel space is never released");
        let slot = self
            .slots
            .get_mut(id.index())
            .filter(|s| s.generation == id.generation)?;
        let space = slot.space.take()?;
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        Some(space)
    }

    /// Number of live spaces, the kernel included.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.space.is_some()).count()
    }
}
