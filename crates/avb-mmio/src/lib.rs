//! Low-level register primitives: MMIO mapping, ordered 32-bit access, PCI
//! configuration space access, and the bounded MDIO indirect-access poll.
//!
//! This crate knows nothing about Intel register offsets or adapter state;
//! it is the platform layer every family implementation and the generic
//! core build on (§4.F).

pub mod mapping;
pub mod mdio;
pub mod pciconfig;
pub mod register;

pub use mapping::{MmioBackend, MmioError, MmioMapping};
pub use mdio::{mdio_transact, MdioError, MdioOp};
pub use pciconfig::{PciConfigAccess, PciConfigError};
pub use register::{MappedRegisters, RegisterIo};
