//! Test doubles for the hardware seams.

use crate::translation_cache::MmuHardware;
use alloc::vec::Vec;
use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use kernel_sync::irq::{InterruptControl, PriorityLevel};

/// One call into [`MmuHardware`].
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum HardwareCall {
    LoadRoot(PhysicalAddress),
    FlushAddress(VirtualAddress),
    FlushAll,
    FlushUser,
}

/// MMU double that records every call in order.
#[derive(Debug, Default)]
pub struct RecordingMmu {
    calls: Vec<HardwareCall>,
}

impl RecordingMmu {
    #[must_use]
    pub fn calls(&self) -> &[HardwareCall] {
        &self.calls
    }

    pub fn clear(&mut self) {
        self.calls.clear();
    }

    /// Whether `va` was flushed individually since the last [`clear`](Self::clear).
    #[must_use]
    pub fn flushed(&self, va: VirtualAddress) -> bool {
        self.calls.contains(&HardwareCall::FlushAddress(va))
    }

    /// Number of user cache flushes since the last [`clear`](Self::clear).
    #[must_use]
    pub fn user_flushes(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| **c == HardwareCall::FlushUser)
            .count()
    }

    /// The root loaded last, if any.
    #[must_use]
    pub fn last_root(&self) -> Option<PhysicalAddress> {
        self.calls.iter().rev().find_map(|c| match c {
            HardwareCall::LoadRoot(pa) => Some(*pa),
            _ => None,
        })
    }
}

impl MmuHardware for RecordingMmu {
    fn load_root(&mut self, table: PhysicalAddress) {
        self.calls.push(HardwareCall::LoadRoot(table));
    }

    fn flush_address(&mut self, va: VirtualAddress) {
        self.calls.push(HardwareCall::FlushAddress(va));
    }

    fn flush_all(&mut self) {
        self.calls.push(HardwareCall::FlushAll);
    }

    fn flush_user(&mut self) {
        self.calls.push(HardwareCall::FlushUser);
    }
}

/// Interrupt controller for hosts without interrupts.
#[derive(Debug)]
pub struct NoInterrupts;

impl InterruptControl for NoInterrupts {
    fn raise(_level: PriorityLevel) -> PriorityLevel {
        PriorityLevel::NONE
    }

    fn restore(_previous: PriorityLevel) {}
}
