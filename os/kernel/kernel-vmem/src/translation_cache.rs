//! # Translation Cache Control
//!
//! The MMU caches recent translations in its address translation cache
//! (ATC). Table edits are invisible to the hardware until the matching cache
//! entries are invalidated, and loading a new root pointer does not flush
//! anything by itself.

use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
use log::trace;

/// The MMU operations the translation layer needs.
pub trait MmuHardware {
    /// Loads the CPU root pointer with the top table at `table`.
    fn load_root(&mut self, table: PhysicalAddress);

    /// Invalidates the cached translation of `va` in every address space.
    fn flush_address(&mut self, va: VirtualAddress);

    /// Invalidates every cached translation.
    fn flush_all(&mut self);

    /// Invalidates every cached user-mode translation.
    fn flush_user(&mut self);
}

/// Tracks the loaded root pointer and forwards invalidations to the hardware.
#[derive(Debug)]
pub(crate) struct TranslationCache<H> {
    hardware: H,
    root: PhysicalAddress,
}

impl<H: MmuHardware> TranslationCache<H> {
    /// Loads `root` and flushes everything.
    pub fn new(mut hardware: H, root: PhysicalAddress) -> Self {
        hardware.load_root(root);
        hardware.flush_all();
        Self { hardware, root }
    }

    /// The root pointer currently loaded.
    #[inline]
    pub const fn root(&self) -> PhysicalAddress {
        self.root
    }

    /// Loads `root` and flushes user translations, unless it is already
    /// loaded. Returns whether the root changed.
    pub fn switch(&mut self, root: PhysicalAddress) -> bool {
        if self.root == root {
            return false;
        }
        trace!("atc: switch root {} -> {}", self.root, root);
        self.root = root;
        self.hardware.load_root(root);
        self.hardware.flush_user();
        true
    }

    /// Reloads the root pointer without flushing. Used when the loaded space
    /// gets its first top table, which maps nothing cached yet.
    pub fn reload(&mut self, root: PhysicalAddress) {
        trace!("atc: reload root {root}");
        self.root = root;
        self.hardware.load_root(root);
    }

    #[inline]
    pub fn flush_address(&mut self, va: VirtualAddress) {
        self.hardware.flush_address(va);
    }

    #[inline]
    pub fn flush_user(&mut self) {
        self.hardware.flush_user();
    }

    #[inline]
    pub const fn hardware(&self) -> &H {
        &self.hardware
    }

    #[inline]
    pub const fn hardware_mut(&mut self) -> &mut H {
        &mut self.hardware
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{HardwareCall, RecordingMmu};

    #[test]
    fn switch_only_when_root_changes() {
        let root = PhysicalAddress::new(0x1000);
        let mut atc = TranslationCache::new(RecordingMmu::default(), root);
        atc.hardware_mut().clear();

        assert!(!atc.switch(root));
        assert!(atc.hardware().calls().is_empty());

        let other = PhysicalAddress::new(0x2000);
        assert!(atc.switch(other));
        assert_eq!(
            atc.hardware().calls(),
            [HardwareCall::LoadRoot(other), HardwareCall::FlushUser]
        );
        assert_eq!(atc.root(), other);
    }

    #[test]
    fn reload_does_not_flush() {
        let mut atc = TranslationCache::new(RecordingMmu::default(), PhysicalAddress::new(0x1000));
        atc.hardware_mut().clear();
        atc.reload(PhysicalAddress::new(0x3000));
        assert_eq!(
            atc.hardware().calls(),
            [HardwareCall::LoadRoot(PhysicalAddress::new(0x3000))]
        );
    }
}
