//! Shared types for the Intel AVB/TSN filter core.
//!
//! Mirrors the split the driver layer uses elsewhere in this workspace:
//! small, dependency-light types that both the generic core and the
//! per-family device implementations need, kept in one crate so neither
//! side depends on the other's internals.

#![forbid(unsafe_code)]

pub mod capability;
pub mod config;
pub mod error;
pub mod family;
pub mod ops;
pub mod pci;
pub mod state;

pub use capability::Capabilities;
pub use config::{FpConfig, PtmConfig, TasConfig};
pub use error::AvbError;
pub use family::Family;
pub use ops::DeviceOps;
pub use pci::{PciAddress, PciDeviceId};
pub use state::HwState;
