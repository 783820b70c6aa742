//! Per-family operation vtable (§4.E).
//!
//! The generic core dispatches every hardware operation through this
//! trait; it never hard-codes a family-specific offset or bit mask itself.
//! Operations a family doesn't implement default to [`AvbError::Unsupported`]
//! so the vtable can stay a single object-safe trait instead of an
//! `Option<fn>` table.

use avb_mmio::RegisterIo;

use crate::config::{FpConfig, PtmConfig, TasConfig};
use crate::error::{AvbError, AvbResult};

pub trait DeviceOps: Send + Sync {
    fn device_name(&self) -> &'static str;

    fn init(&self, regs: &dyn RegisterIo) -> AvbResult<()>;
    fn cleanup(&self, regs: &dyn RegisterIo);

    fn get_info(&self, regs: &dyn RegisterIo, out: &mut [u8]) -> AvbResult<usize>;

    fn set_systime(&self, regs: &dyn RegisterIo, value: u64) -> AvbResult<()>;
    fn get_systime(&self, regs: &dyn RegisterIo) -> AvbResult<u64>;
    fn init_ptp(&self, regs: &dyn RegisterIo) -> AvbResult<bool>;

    fn setup_tas(&self, _regs: &dyn RegisterIo, _cfg: &TasConfig) -> AvbResult<()> {
        Err(AvbError::Unsupported)
    }

    fn setup_frame_preemption(&self, _regs: &dyn RegisterIo, _cfg: &FpConfig) -> AvbResult<()> {
        Err(AvbError::Unsupported)
    }

    fn setup_ptm(&self, _regs: &dyn RegisterIo, _cfg: &PtmConfig) -> AvbResult<()> {
        Err(AvbError::Unsupported)
    }

    fn mdio_read(&self, _regs: &dyn RegisterIo, _phy: u8, _reg: u8) -> AvbResult<u16> {
        Err(AvbError::Unsupported)
    }

    fn mdio_write(&self, _regs: &dyn RegisterIo, _phy: u8, _reg: u8, _value: u16) -> AvbResult<()> {
        Err(AvbError::Unsupported)
    }
}
