//! I210 family operations.
//!
//! The I210 PHC can come out of reset stuck at zero; §4.G documents the
//! "stuck-at-zero" recovery this vtable's `init_ptp` runs instead of the
//! generic prime.

use std::thread;
use std::time::Duration;

use avb_driver_api::error::AvbResult;
use avb_driver_api::DeviceOps;
use avb_mmio::RegisterIo;

use crate::families::write_basic_info;
use crate::ptp::clock_is_advancing;
use crate::registers::{SYSTIML, TIMINCA, TIMINCA_DEFAULT, TSAUXC, TSAUXC_DISABLE_SYSTIME};

const STABILISE_DELAY: Duration = Duration::from_millis(50);
const POLL_INTERVAL: Duration = Duration::from_millis(100);
const POLL_ATTEMPTS: u32 = 8;

pub struct I210Ops;

impl DeviceOps for I210Ops {
    fn device_name(&self) -> &'static str {
        "Intel I210"
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
        regs.write32(crate::registers::SYSTIMH, (value >> 32) as u32)
            .map_err(|_| avb_driver_api::AvbError::HardwareError)
    }

    fn get_systime(&self, regs: &dyn RegisterIo) -> AvbResult<u64> {
        let lo = regs
            .read32(SYSTIML)
            .map_err(|_| avb_driver_api::AvbError::HardwareError)?;
        let hi = regs
            .read32(crate::registers::SYSTIMH)
            .map_err(|_| avb_driver_api::AvbError::HardwareError)?;
        Ok(((hi as u64) << 32) | lo as u64)
    }

    fn init_ptp(&self, regs: &dyn RegisterIo) -> AvbResult<bool> {
        let map_err = |_| avb_driver_api::AvbError::HardwareError;

        // Disable, clear, stabilise.
        let tsauxc = regs.read32(TSAUXC).map_err(map_err)?;
        regs.write32(TSAUXC, tsauxc | TSAUXC_DISABLE_SYSTIME)
            .map_err(map_err)?;
        regs.write32(TIMINCA, 0).map_err(map_err)?;
        thread::sleep(STABILISE_DELAY);

        // Programme TIMINCA, re-enable, seed a non-zero initial value.
        regs.write32(TIMINCA, TIMINCA_DEFAULT).map_err(map_err)?;
        let tsauxc = regs.read32(TSAUXC).map_err(map_err)?;
        regs.write32(TSAUXC, tsauxc & !TSAUXC_DISABLE_SYSTIME)
            .map_err(map_err)?;
        regs.write32(SYSTIML, 1).map_err(map_err)?;

        for _ in 0..POLL_ATTEMPTS {
            if clock_is_advancing(regs, POLL_INTERVAL).map_err(map_err)? {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn mdio_read(&self, _regs: &dyn RegisterIo, _phy: u8, _reg: u8) -> AvbResult<u16> {
        Err(avb_driver_api::AvbError::Unsupported)
    }

    fn mdio_write(&self, _regs: &dyn RegisterIo, _phy: u8, _reg: u8, _value: u16) -> AvbResult<()> {
        Err(avb_driver_api::AvbError::Unsupported)
    }
}
