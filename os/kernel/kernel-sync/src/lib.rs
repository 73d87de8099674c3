//! # Kernel synchronization primitives
//!
//! The target is a single processor; exclusion is obtained by raising the
//! interrupt priority level around code that interrupt handlers may also run.

#![cfg_attr(not(any(test, doctest)), no_std)]

pub mod irq;

pub use irq::{InterruptControl, PriorityLevel, SplGuard};
