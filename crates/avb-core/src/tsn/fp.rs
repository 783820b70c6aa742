//! IEEE 802.1Qbu Frame Preemption activation (§4.H).

use avb_driver_api::error::AvbResult;
use avb_driver_api::{AvbError, FpConfig};
use avb_mmio::RegisterIo;

use crate::registers::{
    FP_CONFIG, FP_CONFIG_ENABLE, FP_CONFIG_FRAG_MASK, FP_CONFIG_FRAG_SHIFT,
    FP_CONFIG_PREEMPTABLE_SHIFT, FP_CONFIG_VERIFY_EN, STATUS, STATUS_LU,
};

fn map_hw_err<T>(r: Result<T, avb_mmio::MmioError>) -> AvbResult<T> {
    r.map_err(|_| AvbError::HardwareError)
}

/// Program Frame Preemption per the config. Requires link-up; otherwise
/// the hardware ignores the write and readback would never show `ENABLE`
/// set, so this checks `STATUS_LU` up front rather than waiting on that.
pub fn activate(regs: &dyn RegisterIo, cfg: &FpConfig) -> AvbResult<()> {
    let status = map_hw_err(regs.read32(STATUS))?;
    if status & STATUS_LU == 0 {
        return Err(AvbError::NotReady);
    }

    // Step 1: clear before reprogramming.
    map_hw_err(regs.write32(FP_CONFIG, 0))?;

    // Step 2: build the config value.
    let mut value = (cfg.preemptable_queues as u32) << FP_CONFIG_PREEMPTABLE_SHIFT;
    value |= (cfg.min_fragment_size as u32) << FP_CONFIG_FRAG_SHIFT & FP_CONFIG_FRAG_MASK;
    if !cfg.verify_disable {
        value |= FP_CONFIG_VERIFY_EN;
    }
    value |= FP_CONFIG_ENABLE;

    // Step 3.
    map_hw_err(regs.write32(FP_CONFIG, value))?;

    // Step 4: readback verification.
    let readback = map_hw_err(regs.read32(FP_CONFIG))?;
    if readback & FP_CONFIG_ENABLE == 0 {
        log::warn!("Frame Preemption readback did not show ENABLE set");
        return Err(AvbError::ActivationFailed);
    }
    log::info!("Frame Preemption active, preemptable_queues={:#04b}", cfg.preemptable_queues);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use avb_mmio::mapping::fake::FakeMmioBackend;
    use avb_mmio::register::MappedRegisters;
    use avb_mmio::MmioMapping;

    fn link_up(regs: &impl RegisterIo) {
        regs.write32(STATUS, STATUS_LU).unwrap();
    }

    fn cfg() -> FpConfig {
        FpConfig {
            preemptable_queues: 0b0000_0110,
            min_fragment_size: 64,
            verify_disable: false,
        }
    }

    #[test]
    fn rejects_when_link_is_down() {
        let backend = FakeMmioBackend::new(0x10000);
        let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
        let regs = MappedRegisters::new(&mapping);
        assert_eq!(activate(&regs, &cfg()), Err(AvbError::NotReady));
    }

    #[test]
    fn programs_and_verifies_enable_bit_when_link_is_up() {
        let backend = FakeMmioBackend::new(0x10000);
        let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
        let regs = MappedRegisters::new(&mapping);
        link_up(&regs);
        activate(&regs, &cfg()).unwrap();
        let value = regs.read32(FP_CONFIG).unwrap();
        assert_ne!(value & FP_CONFIG_ENABLE, 0);
        assert_ne!(value & FP_CONFIG_VERIFY_EN, 0);
        assert_eq!((value >> FP_CONFIG_PREEMPTABLE_SHIFT) & 0xFF, 0b0000_0110);
    }

    #[test]
    fn verify_disable_clears_verify_en_bit() {
        let backend = FakeMmioBackend::new(0x10000);
        let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
        let regs = MappedRegisters::new(&mapping);
        link_up(&regs);
        let mut c = cfg();
        c.verify_disable = true;
        activate(&regs, &c).unwrap();
        let value = regs.read32(FP_CONFIG).unwrap();
        assert_eq!(value & FP_CONFIG_VERIFY_EN, 0);
    }
}
