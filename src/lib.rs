//! Flash translation layer core: page-mapped random writes with garbage
//! collection, ZNS-style zones, and the IZC/TL-open copy engines.
//!
//! The host SATA command surface, raw NAND primitives, DRAM accessors, UART
//! logging, interrupt glue and firmware boot are external collaborators; this
//! crate is generic over the [`hal::NandDevice`] and [`hal::HostIo`] traits
//! instead of talking to hardware directly, so it runs equally under `std`
//! test doubles or a real no_std target.
#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod allocator;
pub mod config;
pub mod copy;
pub mod dispatch;
pub mod dram;
pub mod error;
mod format;
mod ftl;
pub mod hal;
pub mod host;
mod metadata;
mod random;
pub mod stats;
pub mod zone;
mod zns;

pub use dispatch::ZoneDescriptor;
pub use error::{FtlError, ProtocolViolation};
pub use ftl::Ftl;
pub use host::HostCommand;
