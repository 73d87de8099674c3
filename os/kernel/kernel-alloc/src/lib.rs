//! # Kernel Physical Memory Bookkeeping
//!
//! This crate provides the memory bookkeeping the translation layer needs
//! before and alongside the table pools: the bootstrap bump allocator, the
//! linear kernel window, and the registry of physical RAM banks.
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │            Bootstrap Allocator                      │
//! │    • Bump allocation in the kernel window           │
//! │    • Kernel tables, pools, reverse-map arrays       │
//! │    • Disabled once the pools exist                  │
//! └─────────────────┬───────────────────────────────────┘
//!                   │ virtual_avail → avail_start
//! ┌─────────────────▼───────────────────────────────────┐
//! │          Physical Memory Registry                   │
//! │    • Ordered RAM banks with holes                   │
//! │    • Managed range and reverse-map slots            │
//! │    • Free page cursor and page upload               │
//! └─────────────────────────────────────────────────────┘
//! ```
//!
//! ## Core Components
//!
//! ### Bootstrap Allocator ([`bootstrap`])
//!
//! Single-threaded bump allocator over the linearly mapped window following
//! the kernel image. Never frees. Any use after
//! [`disable`](bootstrap::BootstrapAllocator::disable) is a bug.
//!
//! ### Kernel Window ([`phys_mapper`])
//!
//! Converts between virtual and physical addresses inside the linearly mapped
//! part of the kernel region, which is where every table lives.
//!
//! ### Physical Memory Registry ([`physical_memory`])
//!
//! Answers "is this address managed", hands out free pages across bank holes
//! and maps a physical page to its reverse-map slot.
//!
//! ## Usage
//!
//! ```rust
//! use kernel_alloc::bootstrap::BootstrapAllocator;
//! use kernel_alloc::phys_mapper::KernelWindow;
//! use kernel_alloc::physical_memory::PhysicalMemoryRegistry;
//! use kernel_info::boot::MemoryBank;
//! use kernel_memory_addresses::VirtualAddress;
//!
//! let banks = [MemoryBank::new(0, 4 * 1024 * 1024)];
//! let mut physical = PhysicalMemoryRegistry::new(&banks, 0).unwrap();
//!
//! let mut boot = BootstrapAllocator::after_kernel(VirtualAddress::new(0xF810_0000)).unwrap();
//! let _table = boot.alloc(512).unwrap();
//! boot.align(8192).unwrap();
//! boot.disable();
//!
//! physical.set_avail_start(KernelWindow::to_physical(boot.next()));
//! assert!(physical.free_page_count() > 0);
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

pub mod bootstrap;
pub mod phys_mapper;
pub mod physical_memory;
