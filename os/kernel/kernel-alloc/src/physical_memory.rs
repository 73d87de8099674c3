//! # Physical Memory Registry
//!
//! Ordered list of the disjoint physical RAM banks, the managed range
//! `[avail_start, avail_end)` inside them and a running cursor used to hand
//! out free pages to the VM system.
//!
//! Every page of every bank has a slot in the reverse map. Slots are numbered
//! consecutively across banks, so [`PhysicalMemoryRegistry::reverse_map_slot`]
//! is a bank lookup plus a page offset.
//!
//! ```text
//!  bank 0                       hole      bank 1
//! ┌───────────────────────────┐ ░░░░░░░ ┌──────────────────────┐
//! │ kernel │ tables │ managed │ ░░░░░░░ │ managed │ monitor    │
//! └───────────────────────────┘ ░░░░░░░ └──────────────────────┘
//!          avail_start ^                     avail_end ^
//! ```

use alloc::vec::Vec;
use kernel_info::boot::MemoryBank;
use kernel_info::memory::PAGE_SIZE;
use kernel_memory_addresses::{PhysicalAddress, Size8K};
use log::debug;

/// One bank of physical RAM.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct PhysicalBank {
    start: PhysicalAddress,
    /// First byte after the bank.
    end: PhysicalAddress,
    /// Reverse-map slot of the bank's first page.
    base_index: usize,
}

impl PhysicalBank {
    #[inline]
    #[must_use]
    pub const fn start(&self) -> PhysicalAddress {
        self.start
    }

    #[inline]
    #[must_use]
    pub const fn end(&self) -> PhysicalAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn base_index(&self) -> usize {
        self.base_index
    }

    #[inline]
    #[must_use]
    pub const fn contains(&self, pa: PhysicalAddress) -> bool {
        self.start.as_u32() <= pa.as_u32() && pa.as_u32() < self.end.as_u32()
    }

    #[inline]
    #[must_use]
    pub const fn pages(&self) -> usize {
        ((self.end.as_u32() - self.start.as_u32()) / PAGE_SIZE) as usize
    }
}

/// Registry of physical RAM banks.
#[derive(Debug)]
pub struct PhysicalMemoryRegistry {
    banks: Vec<PhysicalBank>,
    avail_start: PhysicalAddress,
    avail_end: PhysicalAddress,
    /// Next page [`next_free_page`](Self::next_free_page) hands out, with its bank.
    cursor: Option<(usize, PhysicalAddress)>,
}

impl PhysicalMemoryRegistry {
    /// Builds the registry from the banks reported at boot.
    ///
    /// `reserved_tail` bytes at the end of the last bank belong to the boot
    /// monitor; the amount is rounded up to a page and excluded from the
    /// managed range.
    ///
    /// # Errors
    /// - [`PhysicalMemoryError::NoBanks`] for an empty bank list.
    /// - [`PhysicalMemoryError::UnalignedBank`] if a bank does not start and
    ///   end on a page boundary.
    /// - [`PhysicalMemoryError::OverlappingBanks`] if banks overlap or are not
    ///   in ascending order.
    /// - [`PhysicalMemoryError::ReservedTooLarge`] if the monitor reservation
    ///   exceeds the last bank.
    pub fn new(banks: &[MemoryBank], reserved_tail: u32) -> Result<Self, PhysicalMemoryError> {
        if banks.is_empty() {
            return Err(PhysicalMemoryError::NoBanks);
        }

        let mut list = Vec::with_capacity(banks.len());
        let mut base_index = 0;
        for bank in banks {
            let start = bank.start;
            if !start.is_aligned::<Size8K>() || !bank.size.is_multiple_of(PAGE_SIZE) || bank.size == 0 {
                return Err(PhysicalMemoryError::UnalignedBank(start));
            }
            let end = start
                .checked_add(bank.size)
                .ok_or(PhysicalMemoryError::OverlappingBanks(start))?;
            if let Some(prev) = list.last().map(|b: &PhysicalBank| b.end)
                && start < prev
            {
                return Err(PhysicalMemoryError::OverlappingBanks(start));
            }

            let bank = PhysicalBank {
                start,
                end,
                base_index,
            };
            base_index += bank.pages();
            list.push(bank);
        }

        let reserved = reserved_tail.div_ceil(PAGE_SIZE) * PAGE_SIZE;
        let last = list[list.len() - 1];
        if reserved > last.end - last.start {
            return Err(PhysicalMemoryError::ReservedTooLarge(reserved));
        }

        let avail_start = list[0].start;
        let avail_end = PhysicalAddress::new(last.end.as_u32() - reserved);

        debug!(
            "physical memory: {} bank(s), {} pages, managed {avail_start}..{avail_end}",
            list.len(),
            base_index
        );

        Ok(Self {
            cursor: Some((0, avail_start)),
            banks: list,
            avail_start,
            avail_end,
        })
    }

    /// Fixes the first managed page once bootstrap allocations are done and
    /// restarts the free-page cursor there.
    ///
    /// # Panics
    /// Panics if `pa` is not page aligned.
    pub fn set_avail_start(&mut self, pa: PhysicalAddress) {
        assert!(pa.is_aligned::<Size8K>(), "avail_start must be page aligned");
        self.avail_start = pa;
        self.cursor = self
            .banks
            .iter()
            .position(|b| b.end > pa)
            .map(|i| (i, pa.max(self.banks[i].start)));
        debug!("physical memory: managed range now {pa}..{}", self.avail_end);
    }

    /// First managed physical address.
    #[inline]
    #[must_use]
    pub const fn avail_start(&self) -> PhysicalAddress {
        self.avail_start
    }

    /// End of the managed range (exclusive).
    #[inline]
    #[must_use]
    pub const fn avail_end(&self) -> PhysicalAddress {
        self.avail_end
    }

    /// Iterates the banks in address order.
    pub fn banks(&self) -> impl Iterator<Item = &PhysicalBank> {
        self.banks.iter()
    }

    /// Total number of pages over all banks; also the number of reverse-map
    /// slots.
    #[must_use]
    pub fn total_pages(&self) -> usize {
        self.banks.iter().map(PhysicalBank::pages).sum()
    }

    /// Whether `pa` is a page the VM system manages.
    ///
    /// Pages in the hole between two banks are never managed.
    #[must_use]
    pub fn is_managed(&self, pa: PhysicalAddress) -> bool {
        self.avail_start <= pa && pa < self.avail_end && self.bank_of(pa).is_some()
    }

    /// Whether `pa` lies in any bank of RAM at all.
    #[must_use]
    pub fn page_exists(&self, pa: PhysicalAddress) -> bool {
        self.bank_of(pa).is_some()
    }

    /// Reverse-map slot of the page containing `pa`, or `None` outside RAM.
    #[must_use]
    pub fn reverse_map_slot(&self, pa: PhysicalAddress) -> Option<usize> {
        let bank = self.bank_of(pa)?;
        Some(bank.base_index + ((pa - bank.start) / PAGE_SIZE) as usize)
    }

    fn bank_of(&self, pa: PhysicalAddress) -> Option<&PhysicalBank> {
        self.banks.iter().find(|b| b.contains(pa))
    }

    /// Hands out the next free managed page, skipping inter-bank holes.
    ///
    /// Returns `None` once the cursor reaches `avail_end`.
    pub fn next_free_page(&mut self) -> Option<PhysicalAddress> {
        let (mut bank, mut pa) = self.cursor?;
        loop {
            if pa >= self.avail_end {
                self.cursor = None;
                return None;
            }
            if pa < self.banks[bank].end {
                break;
            }
            bank += 1;
            let Some(next) = self.banks.get(bank) else {
                self.cursor = None;
                return None;
            };
            pa = next.start;
        }
        self.cursor = Some((bank, pa + PAGE_SIZE));
        Some(pa)
    }

    /// Number of pages [`next_free_page`](Self::next_free_page) can still hand out.
    #[must_use]
    pub fn free_page_count(&self) -> usize {
        let Some((_, from)) = self.cursor else {
            return 0;
        };
        self.clipped(from, self.avail_end)
            .map(|(s, e)| ((e - s) / PAGE_SIZE) as usize)
            .sum()
    }

    /// Managed `[start, end)` ranges per bank, in address order.
    ///
    /// This is the page upload handed to the VM system after bootstrap.
    pub fn managed_ranges(&self) -> impl Iterator<Item = (PhysicalAddress, PhysicalAddress)> + '_ {
        self.clipped(self.avail_start, self.avail_end)
    }

    fn clipped(
        &self,
        from: PhysicalAddress,
        to: PhysicalAddress,
    ) -> impl Iterator<Item = (PhysicalAddress, PhysicalAddress)> + '_ {
        self.banks.iter().filter_map(move |b| {
            let start = b.start.max(from);
            let end = b.end.min(to);
            (start < end).then_some((start, end))
        })
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum PhysicalMemoryError {
    #[error("no physical memory banks")]
    NoBanks,
    #[error("memory bank at {0} is not page aligned")]
    UnalignedBank(PhysicalAddress),
    #[error("memory bank at {0} overlaps its predecessor")]
    OverlappingBanks(PhysicalAddress),
    #[error("monitor reservation of {0:#x} bytes exceeds the last bank")]
    ReservedTooLarge(u32),
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: u32 = PAGE_SIZE;

    /// Two banks with a hole, like a machine with two SIMM groups.
    fn two_banks() -> PhysicalMemoryRegistry {
        let banks = [
            MemoryBank::new(0x0000_0000, 8 * PAGE),
            MemoryBank::new(0x0100_0000, 4 * PAGE),
        ];
        PhysicalMemoryRegistry::new(&banks, PAGE).unwrap()
    }

    #[test]
    fn computes_slots_across_banks() {
        let r = two_banks();
        assert_eq!(r.total_pages(), 12);
        assert_eq!(r.reverse_map_slot(PhysicalAddress::new(0)), Some(0));
        assert_eq!(r.reverse_map_slot(PhysicalAddress::new(7 * PAGE + 5)), Some(7));
        assert_eq!(r.reverse_map_slot(PhysicalAddress::new(0x0100_0000)), Some(8));
        assert_eq!(r.reverse_map_slot(PhysicalAddress::new(0x0100_0000 + 3 * PAGE)), Some(11));
        assert_eq!(r.reverse_map_slot(PhysicalAddress::new(0x0080_0000)), None);
    }

    #[test]
    fn managed_range_excludes_bootstrap_and_monitor() {
        let mut r = two_banks();
        r.set_avail_start(PhysicalAddress::new(3 * PAGE));
        assert!(!r.is_managed(PhysicalAddress::new(2 * PAGE)));
        assert!(r.is_managed(PhysicalAddress::new(3 * PAGE)));
        assert!(r.is_managed(PhysicalAddress::new(0x0100_0000 + 2 * PAGE)));
        // last page belongs to the monitor
        assert!(!r.is_managed(PhysicalAddress::new(0x0100_0000 + 3 * PAGE)));
        assert!(r.page_exists(PhysicalAddress::new(0x0100_0000 + 3 * PAGE)));
        // the hole is neither
        assert!(!r.is_managed(PhysicalAddress::new(0x0080_0000)));
        assert!(!r.page_exists(PhysicalAddress::new(0x0080_0000)));
    }

    #[test]
    fn next_free_page_skips_holes() {
        let mut r = two_banks();
        r.set_avail_start(PhysicalAddress::new(6 * PAGE));
        assert_eq!(r.free_page_count(), 5);

        let pages: Vec<_> = core::iter::from_fn(|| r.next_free_page()).collect();
        assert_eq!(
            pages,
            [
                PhysicalAddress::new(6 * PAGE),
                PhysicalAddress::new(7 * PAGE),
                PhysicalAddress::new(0x0100_0000),
                PhysicalAddress::new(0x0100_0000 + PAGE),
                PhysicalAddress::new(0x0100_0000 + 2 * PAGE),
            ]
        );
        assert_eq!(r.free_page_count(), 0);
        assert_eq!(r.next_free_page(), None);
    }

    #[test]
    fn managed_ranges_per_bank() {
        let mut r = two_banks();
        r.set_avail_start(PhysicalAddress::new(2 * PAGE));
        let ranges: Vec<_> = r.managed_ranges().collect();
        assert_eq!(
            ranges,
            [
                (PhysicalAddress::new(2 * PAGE), PhysicalAddress::new(8 * PAGE)),
                (
                    PhysicalAddress::new(0x0100_0000),
                    PhysicalAddress::new(0x0100_0000 + 3 * PAGE)
                ),
            ]
        );
    }

    #[test]
    fn rejects_bad_layouts() {
        assert_eq!(
            PhysicalMemoryRegistry::new(&[], 0).unwrap_err(),
            PhysicalMemoryError::NoBanks
        );
        assert_eq!(
            PhysicalMemoryRegistry::new(&[MemoryBank::new(0x100, PAGE)], 0).unwrap_err(),
            PhysicalMemoryError::UnalignedBank(PhysicalAddress::new(0x100))
        );
        let overlapping = [MemoryBank::new(0, 4 * PAGE), MemoryBank::new(2 * PAGE, 4 * PAGE)];
        assert_eq!(
            PhysicalMemoryRegistry::new(&overlapping, 0).unwrap_err(),
            PhysicalMemoryError::OverlappingBanks(PhysicalAddress::new(2 * PAGE))
        );
        assert_eq!(
            PhysicalMemoryRegistry::new(&[MemoryBank::new(0, PAGE)], PAGE + 1).unwrap_err(),
            PhysicalMemoryError::ReservedTooLarge(2 * PAGE)
        );
    }

    #[test]
    fn monitor_reservation_is_page_rounded() {
        let r = PhysicalMemoryRegistry::new(&[MemoryBank::new(0, 8 * PAGE)], 100).unwrap();
        assert_eq!(r.avail_end(), PhysicalAddress::new(7 * PAGE));
    }
}
