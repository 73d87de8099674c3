//! # Reverse Map
//!
//! One head per managed physical page and one link per leaf slot. A page's
//! chain threads through the links of every slot currently mapping it, so
//! the registry never allocates after bootstrap.
//!
//! ```text
//!   heads[page]            links[pte]
//!  ┌─────────────┐       ┌──────────┐     ┌──────────┐
//!  │ first ──────┼──────►│ 17 next ─┼────►│ 4242 ∅   │
//!  │ M R         │       └──────────┘     └──────────┘
//!  └─────────────┘
//! ```
//!
//! The head also keeps the sticky modified and referenced flags: hardware
//! bits of entries that were removed are folded in so the page's history
//! survives unmapping.

use crate::descriptor::PageEntry;
use alloc::vec;
use alloc::vec::Vec;
use bitflags::bitflags;
use core::fmt;
use core::mem::size_of;
use log::warn;

/// Global index of a leaf slot, kernel slots first.
#[repr(transparent)]
#[derive(Copy, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct PteIndex(u32);

impl PteIndex {
    #[inline]
    #[must_use]
    pub const fn new(index: u32) -> Self {
        Self(index)
    }

    #[inline]
    #[must_use]
    pub const fn as_usize(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Debug for PteIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "pte#{}", self.0)
    }
}

bitflags! {
    /// Page history kept by the reverse map.
    #[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Hash)]
    pub struct PvFlags: u8 {
        /// The page was written through some mapping.
        const MODIFIED = 1 << 0;
        /// The page was accessed through some mapping.
        const REFERENCED = 1 << 1;
    }
}

impl PvFlags {
    /// The history recorded in a page entry's hardware bits.
    #[inline]
    #[must_use]
    pub const fn from_entry(entry: PageEntry) -> Self {
        let mut bits = 0;
        if entry.modified() {
            bits |= Self::MODIFIED.bits();
        }
        if entry.used() {
            bits |= Self::REFERENCED.bits();
        }
        Self::from_bits_truncate(bits)
    }

    /// Clears the matching hardware bits of `entry`.
    #[inline]
    pub const fn clear_in(self, entry: &mut PageEntry) {
        if self.contains(Self::MODIFIED) {
            entry.set_modified(false);
        }
        if self.contains(Self::REFERENCED) {
            entry.set_used(false);
        }
    }

    /// Whether `entry` has any of these hardware bits set.
    #[inline]
    #[must_use]
    pub const fn any_in(self, entry: PageEntry) -> bool {
        Self::from_entry(entry).intersects(self)
    }
}

#[derive(Debug, Copy, Clone, Default)]
struct PvHead {
    first: Option<PteIndex>,
    flags: PvFlags,
}

/// Chains of leaf slots per physical page.
#[derive(Debug)]
pub(crate) struct ReverseMap {
    heads: Vec<PvHead>,
    links: Vec<Option<PteIndex>>,
}

impl ReverseMap {
    /// Creates `pages` empty chains over `slots` leaf slots.
    pub fn new(pages: usize, slots: usize) -> Self {
        Self {
            heads: vec![PvHead::default(); pages],
            links: vec![None; slots],
        }
    }

    /// Bytes of memory the registry occupies for `pages` pages and `slots`
    /// leaf slots.
    pub const fn footprint(pages: usize, slots: usize) -> usize {
        pages * size_of::<PvHead>() + slots * size_of::<Option<PteIndex>>()
    }

    /// Splices `idx` onto the front of `page`'s chain.
    pub fn push(&mut self, page: usize, idx: PteIndex) {
        let head = &mut self.heads[page];
        self.links[idx.as_usize()] = head.first;
        head.first = Some(idx);
    }

    /// Removes `idx` from `page`'s chain. Returns `false` if it was not on it.
    pub fn unlink(&mut self, page: usize, idx: PteIndex) -> bool {
        let next = self.links[idx.as_usize()];
        let head = &mut self.heads[page];
        if head.first == Some(idx) {
            head.first = next;
            self.links[idx.as_usize()] = None;
            return true;
        }

        let mut cursor = head.first;
        while let Some(current) = cursor {
            let link = self.links[current.as_usize()];
            if link == Some(idx) {
                self.links[current.as_usize()] = next;
                self.links[idx.as_usize()] = None;
                return true;
            }
            cursor = link;
        }

        warn!("reverse map: {idx:?} not found on the chain of page {page}");
        false
    }

    /// Empties `page`'s chain and returns its former members.
    pub fn take(&mut self, page: usize) -> Vec<PteIndex> {
        let members: Vec<_> = self.chain(page).collect();
        for idx in &members {
            self.links[idx.as_usize()] = None;
        }
        self.heads[page].first = None;
        members
    }

    /// Iterates `page`'s chain, most recent mapping first.
    pub fn chain(&self, page: usize) -> Chain<'_> {
        Chain {
            links: &self.links,
            next: self.heads[page].first,
        }
    }

    #[inline]
    pub fn flags(&self, page: usize) -> PvFlags {
        self.heads[page].flags
    }

    #[inline]
    pub fn insert_flags(&mut self, page: usize, flags: PvFlags) {
        self.heads[page].flags.insert(flags);
    }

    #[inline]
    pub fn remove_flags(&mut self, page: usize, flags: PvFlags) {
        self.heads[page].flags.remove(flags);
    }
}

/// Iterator over one page's chain.
pub(crate) struct Chain<'a> {
    links: &'a [Option<PteIndex>],
    next: Option<PteIndex>,
}

impl Iterator for Chain<'_> {
    type Item = PteIndex;

    fn next(&mut self) -> Option<Self::Item> {
        let current = self.next?;
        self.next = self.links[current.as_usize()];
        Some(current)
    }
}
