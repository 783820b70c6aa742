//! I217 family operations: basic PTP plus MDIO, no enhanced timestamp.

use avb_driver_api::error::AvbResult;
use avb_driver_api::DeviceOps;
use avb_mmio::mdio::mdio_transact;
use avb_mmio::RegisterIo;

use crate::families::write_basic_info;
use crate::ptp;
use crate::registers::{SYSTIML, SYSTIMH};

/// MDI Control register — common `MDIC` layout, I217 bit positions.
const MDIC: u32 = 0x0020;
const MDIC_DATA_MASK: u32 = 0x0000_FFFF;
const MDIC_REG_SHIFT: u32 = 16;
const MDIC_PHY_SHIFT: u32 = 21;
const MDIC_OP_WRITE: u32 = 0x1 << 26;
const MDIC_OP_READ: u32 = 0x2 << 26;
const MDIC_INTERRUPT_ENABLE: u32 = 1 << 29;
const MDIC_READY: u32 = 1 << 28;
const MDIC_ERROR: u32 = 1 << 30;
const MDIC_MAX_ATTEMPTS: u32 = 2000;

fn command_word(phy: u8, reg: u8, op: u32, data: u16) -> u32 {
    ((phy as u32) << MDIC_PHY_SHIFT)
        | ((reg as u32) << MDIC_REG_SHIFT)
        | op
        | MDIC_INTERRUPT_ENABLE
        | data as u32
}

pub struct I217Ops;

impl DeviceOps for I217Ops {
    fn device_name(&self) -> &'static str {
        "Intel I217"
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

    fn mdio_read(&self, regs: &dyn RegisterIo, phy: u8, reg: u8) -> AvbResult<u16> {
        let v = mdio_transact(
            regs,
            MDIC,
            command_word(phy, reg, MDIC_OP_READ, 0),
            MDIC_READY,
            MDIC_ERROR,
            MDIC_MAX_ATTEMPTS,
        )
        .map_err(map_mdio_err)?;
        Ok((v & MDIC_DATA_MASK) as u16)
    }

    fn mdio_write(&self, regs: &dyn RegisterIo, phy: u8, reg: u8, value: u16) -> AvbResult<()> {
        mdio_transact(
            regs,
            MDIC,
            command_word(phy, reg, MDIC_OP_WRITE, value),
            MDIC_READY,
            MDIC_ERROR,
            MDIC_MAX_ATTEMPTS,
        )
        .map_err(map_mdio_err)?;
        Ok(())
    }
}

fn map_mdio_err(e: avb_mmio::mdio::MdioError) -> avb_driver_api::AvbError {
    match e {
        avb_mmio::mdio::MdioError::Timeout => avb_driver_api::AvbError::HardwareError,
        avb_mmio::mdio::MdioError::Error => avb_driver_api::AvbError::HardwareError,
        avb_mmio::mdio::MdioError::IoError => avb_driver_api::AvbError::HardwareError,
    }
}
