use crate::space::SpaceId;
use kernel_alloc::bootstrap::BootstrapAllocError;
use kernel_alloc::physical_memory::PhysicalMemoryError;
use kernel_memory_addresses::VirtualAddress;

#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum PmapError {
    #[error("no such address space: {0:?}")]
    NoSuchAddressSpace(SpaceId),
    #[error("operation not permitted on the kernel address space")]
    KernelAddressSpace,
    #[error("address {0} is outside the kernel range")]
    OutsideKernelRange(VirtualAddress),
    #[error("address {0} is outside the user range")]
    OutsideUserRange(VirtualAddress),
    #[error(transparent)]
    Bootstrap(#[from] BootstrapAllocError),
    #[error(transparent)]
    PhysicalMemory(#[from] PhysicalMemoryError),
}

/// A fault raised by the emulated table search of [`Pmap::access`](crate::Pmap::access).
#[derive(Debug, Clone, Copy, Eq, PartialEq, thiserror::Error)]
pub enum AccessFault {
    #[error("no valid translation for {0}")]
    Invalid(VirtualAddress),
    #[error("write to write-protected page at {0}")]
    WriteProtected(VirtualAddress),
    #[error(transparent)]
    Pmap(#[from] PmapError),
}
