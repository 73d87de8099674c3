//! # Virtual Memory Support
//!
//! The translation layer of a 32-bit kernel running on a software-managed,
//! three-level MMU: 8 KiB pages, tables walked by the hardware, table memory
//! and translation-cache coherence managed entirely in software.
//!
//! ## Virtual Address → Physical Address Walk
//!
//! ```text
//! | 31‒25 | 24‒18 | 17‒13 | 12‒0   |
//! |  Top  |  Mid  |  Leaf | Offset |
//! ```
//!
//! ```text
//!  root ─► Top (128) ─► Mid (128) ─► Leaf (32) ─► 8 KiB page
//!           32 MiB       256 KiB      8 KiB       per slot
//! ```
//!
//! The upper 128 MiB (top slots 124..128) belong to the kernel. They are
//! served by static kernel tables that every top table shares, so the kernel
//! is mapped in every address space. User tables come from three bounded
//! pools; when a pool runs dry the least recently allocated table
//! is stolen from whoever owns it.
//!
//! ## What you get
//! - [`Pmap`]: the system object. Bootstrap, address spaces, enter, remove,
//!   protect, extract, and the pager's page-level queries.
//! - [`descriptor`]: the bit layouts of table descriptors and page entries.
//! - [`MmuHardware`]: the seam to the root pointer and translation cache.
//! - [`PmapConfig`]: pool sizing.
//!
//! ### Example
//! ```rust
//! use kernel_info::boot::{BootMemoryInfo, MemoryBank};
//! use kernel_memory_addresses::{PhysicalAddress, VirtualAddress};
//! use kernel_sync::irq::{InterruptControl, PriorityLevel};
//! use kernel_vmem::{MapFlags, MmuHardware, Pmap, PmapConfig, VmProt};
//!
//! struct Mmu;
//! impl MmuHardware for Mmu {
//!     fn load_root(&mut self, _table: PhysicalAddress) {}
//!     fn flush_address(&mut self, _va: VirtualAddress) {}
//!     fn flush_all(&mut self) {}
//!     fn flush_user(&mut self) {}
//! }
//!
//! struct Spl;
//! impl InterruptControl for Spl {
//!     fn raise(_level: PriorityLevel) -> PriorityLevel {
//!         PriorityLevel::NONE
//!     }
//!     fn restore(_previous: PriorityLevel) {}
//! }
//!
//! let banks = [MemoryBank::new(0, 4 << 20)];
//! let boot = BootMemoryInfo {
//!     banks: &banks,
//!     available: 4 << 20,
//!     text_end: VirtualAddress::new(0xF804_0000),
//!     kernel_end: VirtualAddress::new(0xF808_0000),
//! };
//! let mut pmap: Pmap<Mmu, Spl> = Pmap::bootstrap(PmapConfig::FIXED, &boot, Mmu).unwrap();
//!
//! let space = pmap.create();
//! let (va, pa) = (VirtualAddress::new(0x0040_2000), PhysicalAddress::new(0x0030_0000));
//! pmap.enter(space, va, pa, VmProt::ALL, MapFlags::empty()).unwrap();
//! assert_eq!(pmap.extract(space, va + 0x10).unwrap(), Some(pa + 0x10));
//! ```

#![cfg_attr(not(any(test, doctest)), no_std)]

extern crate alloc;

mod config;
pub mod descriptor;
mod error;
mod level;
mod pmap;
mod pool;
mod protection;
mod reverse_map;
mod space;
mod table_memory;
mod translation_cache;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use config::PmapConfig;
pub use error::{AccessFault, PmapError};
pub use level::Level;
pub use pmap::Pmap;
pub use pool::{TableHandle, TableInfo};
pub use protection::{MapFlags, VmProt};
pub use reverse_map::{PteIndex, PvFlags};
pub use space::SpaceId;
pub use translation_cache::MmuHardware;
