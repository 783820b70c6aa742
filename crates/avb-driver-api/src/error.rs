//! Error taxonomy shared by the generic core and every family implementation.

use core::fmt;

/// Failure modes surfaced across the discovery, HAL, PTP, TSN, and request
/// layers. Every fallible primitive in this workspace returns one of these
/// instead of unwinding.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AvbError {
    /// Caller violated a precondition: malformed field, inconsistent gate
    /// durations, buffer too small for the declared payload.
    InvalidParameter,
    /// Output buffer capacity is smaller than the opcode's declared size.
    BufferTooSmall,
    /// Hardware state is insufficient for the request and could not be
    /// advanced by an opportunistic bring-up attempt.
    NotReady,
    /// Family lacks the capability bit, or the vtable entry, for the
    /// requested operation.
    Unsupported,
    /// Adapter lookup by `(vendor_id, device_id)` or by handle failed.
    NotFound,
    /// MMIO read returned `0xFFFF_FFFF` on a register known to be valid,
    /// an MDIO timeout or bus error occurred, or PCI discovery failed.
    HardwareError,
    /// The hardware accepted the programming sequence but did not latch
    /// the requested mode (TAS enable bit absent, FP enable rejected by
    /// the link partner).
    ActivationFailed,
    /// Out of non-pageable memory, or a request exceeded a hard-coded
    /// resource cap (e.g. the 1 MiB ring limit).
    ResourceExhausted,
}

impl fmt::Display for AvbError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            AvbError::InvalidParameter => "invalid parameter",
            AvbError::BufferTooSmall => "output buffer too small",
            AvbError::NotReady => "hardware not ready",
            AvbError::Unsupported => "operation unsupported on this family",
            AvbError::NotFound => "adapter not found",
            AvbError::HardwareError => "hardware error",
            AvbError::ActivationFailed => "hardware did not latch requested mode",
            AvbError::ResourceExhausted => "resource exhausted",
        };
        f.write_str(msg)
    }
}

impl std::error::Error for AvbError {}

/// Result alias used throughout the core.
pub type AvbResult<T> = Result<T, AvbError>;
