//! # Kernel Configuration and Boot Interface
//!
//! This crate defines the memory layout constants and the boot-time memory
//! description shared by the translation layer and the rest of the kernel.
//!
//! ## Architecture
//!
//! ### Boot Information ([`boot`])
//! * **Memory Banks**: The physical RAM banks reported by the boot monitor
//! * **Monitor Reservation**: How much RAM at the end of the last bank the monitor keeps
//! * **Kernel Image**: Where the loaded kernel ends in the kernel window
//!
//! ### Memory Layout ([`memory`])
//! * **MMU Geometry**: Page size and the shape of the three table levels
//! * **Kernel Region**: The shared upper region served by static kernel tables
//! * **Bootstrap Window**: The linearly mapped range early allocations come from
//!
//! ## Virtual Memory Architecture
//!
//! ```text
//! Virtual Address Space Layout (32-bit):
//!
//! 0x0000_0000 ┌─────────────────────────────────┐
//!             │                                 │
//!             │           User Space            │
//!             │  (per address space, pooled     │
//!             │   top/mid/leaf tables)          │
//!             │                                 │
//! KERNEL_BASE ├─────────────────────────────────┤ 0xF800_0000
//!             │  Kernel image, bootstrap data   │
//!             │  (linear: pa = va - KERNEL_BASE)│
//!             ├─────────────────────────────────┤ KERNEL_BASE + BOOTSTRAP_WINDOW
//!             │      Kernel virtual space       │
//! KERNEL_END  ├─────────────────────────────────┤ 0xFE00_0000
//!             │          Boot monitor           │
//! 0xFFFF_FFFF └─────────────────────────────────┘
//! ```
//!
//! A virtual address splits into three table indices and a page offset:
//!
//! ```text
//! | 31‒25 | 24‒18 | 17‒13 | 12‒0   |
//! |  Top  |  Mid  |  Leaf | Offset |
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]
#![deny(unsafe_code)]

pub mod boot;
pub mod memory;
