//! # Bootstrap-Only Allocator
//!
//! A bump allocator carving kernel virtual memory out of the linearly mapped
//! window that follows the loaded kernel image.
//!
//! ## WARNING
//!
//! - **Do not use this allocator after the table pools are initialized.**
//!   [`BootstrapAllocator::disable`] ends the bootstrap phase; any later
//!   allocation is a bug and panics.
//! - Memory handed out here is never freed.

use kernel_info::memory::{BOOTSTRAP_WINDOW, KERNEL_BASE};
use kernel_memory_addresses::{Size8K, VirtualAddress};
use log::trace;

/// Bump allocator over `[next, end)` in the kernel window.
///
/// # Example
/// ```rust
/// use kernel_alloc::bootstrap::BootstrapAllocator;
/// use kernel_memory_addresses::VirtualAddress;
///
/// let mut boot = BootstrapAllocator::new(
///     VirtualAddress::new(0xF810_0000),
///     VirtualAddress::new(0xF820_0000),
/// );
/// let a = boot.alloc(100).unwrap();
/// boot.align(16).unwrap();
/// let b = boot.alloc(16).unwrap();
/// assert_eq!(a.as_u32(), 0xF810_0000);
/// assert_eq!(b.as_u32(), 0xF810_0070);
/// ```
#[derive(Debug)]
pub struct BootstrapAllocator {
    /// The next address handed out (`virtual_avail`).
    next: VirtualAddress,
    /// End of the linearly mapped window (exclusive).
    end: VirtualAddress,
    /// Cleared by [`disable`](Self::disable).
    enabled: bool,
}

impl BootstrapAllocator {
    /// Creates an allocator over `[start, end)`.
    #[must_use]
    pub const fn new(start: VirtualAddress, end: VirtualAddress) -> Self {
        Self {
            next: start,
            end,
            enabled: true,
        }
    }

    /// Creates the allocator for the window following the kernel image.
    ///
    /// The window starts at `kernel_end` rounded up to a page and ends
    /// [`BOOTSTRAP_WINDOW`] bytes above [`KERNEL_BASE`].
    ///
    /// # Errors
    /// [`BootstrapAllocError::Exhausted`] if the kernel image already fills
    /// the window.
    pub fn after_kernel(kernel_end: VirtualAddress) -> Result<Self, BootstrapAllocError> {
        let end = VirtualAddress::new(KERNEL_BASE + BOOTSTRAP_WINDOW);
        match kernel_end.checked_align_up::<Size8K>() {
            Some(start) if start <= end => Ok(Self::new(start, end)),
            _ => Err(BootstrapAllocError::Exhausted {
                requested: 0,
                remaining: 0,
            }),
        }
    }

    /// Hands out `size` bytes at the current bump pointer.
    ///
    /// # Errors
    /// [`BootstrapAllocError::Exhausted`] if the window cannot hold `size`
    /// more bytes. Initialization cannot continue in that case.
    ///
    /// # Panics
    /// Panics if called after [`disable`](Self::disable).
    pub fn alloc(&mut self, size: u32) -> Result<VirtualAddress, BootstrapAllocError> {
        assert!(
            self.enabled,
            "BUG: bootstrap allocator used after the bootstrap phase ended"
        );

        let start = self.next;
        match start.checked_add(size) {
            Some(next) if next <= self.end => {
                self.next = next;
                trace!("bootstrap alloc: {size:#x} bytes at {start}");
                Ok(start)
            }
            _ => Err(BootstrapAllocError::Exhausted {
                requested: size,
                remaining: self.remaining(),
            }),
        }
    }

    /// Wastes bytes until the bump pointer is a multiple of `align`.
    ///
    /// # Errors
    /// [`BootstrapAllocError::Exhausted`] if padding would leave the window.
    ///
    /// # Panics
    /// Panics if `align` is not a power of two or after [`disable`](Self::disable).
    pub fn align(&mut self, align: u32) -> Result<(), BootstrapAllocError> {
        assert!(align.is_power_of_two(), "alignment must be a power of two");
        let pad = self.next.as_u32().wrapping_neg() & (align - 1);
        if pad != 0 {
            self.alloc(pad)?;
        }
        Ok(())
    }

    /// Ends the bootstrap phase.
    pub fn disable(&mut self) {
        trace!("bootstrap allocator disabled at {}", self.next);
        self.enabled = false;
    }

    /// The current bump pointer.
    #[inline]
    #[must_use]
    pub const fn next(&self) -> VirtualAddress {
        self.next
    }

    /// End of the window (exclusive).
    #[inline]
    #[must_use]
    pub const fn end(&self) -> VirtualAddress {
        self.end
    }

    #[inline]
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// Bytes left in the window.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> u32 {
        self.end - self.next
    }
}

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum BootstrapAllocError {
    #[error("bootstrap window exhausted: requested {requested:#x} bytes, {remaining:#x} left")]
    Exhausted { requested: u32, remaining: u32 },
}
