//! I225 family operations: basic PTP plus the TSN engine (TAS, Frame
//! Preemption). No MDIO; PTM is driven separately (see [`crate::tsn::ptm`]),
//! not through this vtable.

use avb_driver_api::error::AvbResult;
use avb_driver_api::{DeviceOps, FpConfig, TasConfig};
use avb_mmio::RegisterIo;

use crate::families::write_basic_info;
use crate::ptp;
use crate::registers::{SYSTIML, SYSTIMH};
use crate::tsn::{fp, tas};

pub struct I225Ops;

impl DeviceOps for I225Ops {
    fn device_name(&self) -> &'static str {
        "Intel I225"
    }

    fn init(&self, _regs: &dyn RegisterIo) -> AvbResult<()> {
        Ok(())
    }

    fn cleanup(&self, _regs: &dyn RegisterIo) {}

    fn get_info(&self, _regs: &dyn RegisterIo, out: &mut [u8]) -> AvbResult<usize> {
        write_basic_info(self.device_name(), out)
    }

    fn set_systime(&self, regs: &dyn RegisterIo, value: u64) -> AvbResult<()> {
        regs.write32(SYSTIML, value as u32)
            .map_err(|_| avb_driver_api::AvbError::HardwareError)?;
        regs.write32(SYSTIMH, (value >> 32) as u32)
            .map_err(|_| avb_driver_api::AvbError::HardwareError)
    }

    fn get_systime(&self, regs: &dyn RegisterIo) -> AvbResult<u64> {
        let lo = regs.read32(SYSTIML).map_err(|_| avb_driver_api::AvbError::HardwareError)?;
        let hi = regs.read32(SYSTIMH).map_err(|_| avb_driver_api::AvbError::HardwareError)?;
        Ok(((hi as u64) << 32) | lo as u64)
    }

    fn init_ptp(&self, regs: &dyn RegisterIo) -> AvbResult<bool> {
        ptp::prime(regs).map_err(|_| avb_driver_api::AvbError::HardwareError)
    }

    fn setup_tas(&self, regs: &dyn RegisterIo, cfg: &TasConfig) -> AvbResult<()> {
        tas::activate(regs, cfg, false)
    }

    fn setup_frame_preemption(&self, regs: &dyn RegisterIo, cfg: &FpConfig) -> AvbResult<()> {
        fp::activate(regs, cfg)
    }
}
