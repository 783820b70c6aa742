//! I226 family operations: same shape as I225, but [`tas::activate`] is
//! invoked with the `FUTSCDDIS` errata quirk enabled for an initial
//! schedule load. Capability baseline additionally carries EEE (§4.C), no
//! behavior here changes for that.

use avb_driver_api::error::AvbResult;
use avb_driver_api::{DeviceOps, FpConfig, TasConfig};
use avb_mmio::RegisterIo;

use crate::families::write_basic_info;
use crate::ptp;
use crate::registers::{SYSTIML, SYSTIMH};
use crate::tsn::{fp, tas};

pub struct I226Ops;

impl DeviceOps for I226Ops {
    fn device_name(&self) -> &'static str {
        "Intel I226"
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
        tas::activate(regs, cfg, true)
    }

    fn setup_frame_preemption(&self, regs: &dyn RegisterIo, cfg: &FpConfig) -> AvbResult<()> {
        fp::activate(regs, cfg)
    }
}
