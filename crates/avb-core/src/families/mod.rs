//! Per-family `DeviceOps` vtable registry (§4.E).
//!
//! The generic core never matches on [`Family`] itself past this lookup;
//! everything downstream goes through the trait object.

pub mod i210;
pub mod i217;
pub mod i219;
pub mod i225;
pub mod i226;

use avb_driver_api::error::AvbResult;
use avb_driver_api::{AvbError, DeviceOps, Family};

static I210_OPS: i210::I210Ops = i210::I210Ops;
static I217_OPS: i217::I217Ops = i217::I217Ops;
static I219_OPS: i219::I219Ops = i219::I219Ops;
static I225_OPS: i225::I225Ops = i225::I225Ops;
static I226_OPS: i226::I226Ops = i226::I226Ops;

/// Vtable for `Family::Unknown`: every device-specific operation is
/// unsupported, since nothing is known about the device beyond its vendor
/// id. Used so the generic core never has to special-case a missing
/// vtable entry.
struct UnknownOps;

impl DeviceOps for UnknownOps {
    fn device_name(&self) -> &'static str {
        "Unknown Intel device"
    }

    fn init(&self, _regs: &dyn avb_mmio::RegisterIo) -> AvbResult<()> {
        Ok(())
    }

    fn cleanup(&self, _regs: &dyn avb_mmio::RegisterIo) {}

    fn get_info(&self, _regs: &dyn avb_mmio::RegisterIo, out: &mut [u8]) -> AvbResult<usize> {
        write_basic_info(self.device_name(), out)
    }

    fn set_systime(&self, _regs: &dyn avb_mmio::RegisterIo, _value: u64) -> AvbResult<()> {
        Err(AvbError::Unsupported)
    }

    fn get_systime(&self, _regs: &dyn avb_mmio::RegisterIo) -> AvbResult<u64> {
        Err(AvbError::Unsupported)
    }

    fn init_ptp(&self, _regs: &dyn avb_mmio::RegisterIo) -> AvbResult<bool> {
        Ok(false)
    }
}

static UNKNOWN_OPS: UnknownOps = UnknownOps;

/// Look up the static vtable for `family`. `Unknown` gets a vtable whose
/// device-specific operations all report `Unsupported`, rather than `None`,
/// so the generic core never special-cases a missing entry.
pub fn ops_for(family: Family) -> &'static dyn DeviceOps {
    match family {
        Family::I210 => &I210_OPS,
        Family::I217 => &I217_OPS,
        Family::I219 => &I219_OPS,
        Family::I225 => &I225_OPS,
        Family::I226 => &I226_OPS,
        Family::Unknown => &UNKNOWN_OPS,
    }
}

/// Shared `get_info` formatting: every family reports the same small
/// identity blob unless it has richer info to add.
pub(crate) fn write_basic_info(name: &str, out: &mut [u8]) -> avb_driver_api::error::AvbResult<usize> {
    let bytes = name.as_bytes();
    if out.len() < bytes.len() {
        return Err(avb_driver_api::AvbError::BufferTooSmall);
    }
    out[..bytes.len()].copy_from_slice(bytes);
    Ok(bytes.len())
}
