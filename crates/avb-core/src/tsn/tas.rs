//! IEEE 802.1Qbv Time-Aware Shaper activation (§4.H).

use std::thread;
use std::time::Duration;

use avb_driver_api::error::AvbResult;
use avb_driver_api::{AvbError, TasConfig};
use avb_mmio::RegisterIo;

use crate::ptp::clock_is_advancing;
use crate::registers::*;

const BASE_TIME_SAFETY_MARGIN_NS: u64 = 500_000_000;
const MAX_CYCLE_NS: u64 = 1_000_000_000;

fn map_hw_err<T>(r: Result<T, avb_mmio::MmioError>) -> AvbResult<T> {
    r.map_err(|_| AvbError::HardwareError)
}

fn systim_now(regs: &dyn RegisterIo) -> AvbResult<u64> {
    let lo = map_hw_err(regs.read32(SYSTIML))?;
    let hi = map_hw_err(regs.read32(SYSTIMH))?;
    Ok(((hi as u64) << 32) | lo as u64)
}

/// Roll `now + BASE_TIME_SAFETY_MARGIN_NS` forward to the next multiple of
/// `cycle_ns` after `now` (§4.H step 5).
fn compute_base_time(now: u64, cycle_ns: u64) -> u64 {
    let earliest = now + BASE_TIME_SAFETY_MARGIN_NS;
    let delta = earliest - now;
    let cycles = delta.div_ceil(cycle_ns);
    now + cycles * cycle_ns
}

/// Run the full activation sequence for I225 (`is_i226 = false`) or I226
/// (`is_i226 = true`, applies the `FUTSCDDIS` two-write quirk when loading
/// an initial schedule).
pub fn activate(regs: &dyn RegisterIo, cfg: &TasConfig, is_i226: bool) -> AvbResult<()> {
    if cfg.cycle_time_ns == 0 || cfg.cycle_time_ns as u64 > MAX_CYCLE_NS {
        return Err(AvbError::InvalidParameter);
    }
    if !cfg.is_internally_consistent() {
        return Err(AvbError::InvalidParameter);
    }

    // Prerequisite: PHC re-verified advancing on entry.
    if !clock_is_advancing(regs, crate::ptp::ADVANCEMENT_WAIT).map_err(|_| AvbError::HardwareError)? {
        return Err(AvbError::NotReady);
    }

    // Step 1: observe whether a schedule is currently running.
    let baset_h = map_hw_err(regs.read32(BASET_H))?;
    let baset_l = map_hw_err(regs.read32(BASET_L))?;
    let schedule_running = !(baset_h == 0 && baset_l == 0);

    // Step 2.
    let mut tqavctrl = map_hw_err(regs.read32(TQAVCTRL))?;
    tqavctrl |= TQAVCTRL_TRANSMIT_MODE_TSN | TQAVCTRL_ENHANCED_QAV;
    let apply_futscddis = is_i226 && !schedule_running;
    if apply_futscddis {
        tqavctrl |= TQAVCTRL_FUTSCDDIS;
    }
    map_hw_err(regs.write32(TQAVCTRL, tqavctrl))?;

    // Steps 3-4.
    map_hw_err(regs.write32(QBVCYCLET_S, cfg.cycle_time_ns))?;
    map_hw_err(regs.write32(QBVCYCLET, cfg.cycle_time_ns))?;

    // Step 5.
    let now = systim_now(regs)?;
    let base = compute_base_time(now, cfg.cycle_time_ns as u64);
    if base <= now {
        return Err(AvbError::HardwareError);
    }

    // Step 6.
    map_hw_err(regs.write32(BASET_H, (base / 1_000_000_000) as u32))?;

    // Step 7: mandatory two-write quirk on I226 for an initial load.
    let base_l = (base % 1_000_000_000) as u32;
    if apply_futscddis {
        map_hw_err(regs.write32(BASET_L, 0))?;
    }
    map_hw_err(regs.write32(BASET_L, base_l))?;

    // Step 8: per-queue windows. Simple case: queue 0 gets the full cycle,
    // every other queue gets a zero window.
    for queue in 0..4u32 {
        let duration = cfg.gate_durations.get(queue as usize).copied().unwrap_or(0);
        let mut txqctl_val = map_hw_err(regs.read32(txqctl(queue)))?;
        if duration > 0 {
            txqctl_val |= TXQCTL_QUEUE_MODE_LAUNCHT;
        } else {
            txqctl_val &= !TXQCTL_QUEUE_MODE_LAUNCHT;
        }
        map_hw_err(regs.write32(txqctl(queue), txqctl_val))?;
        map_hw_err(regs.write32(stqt(queue), 0))?;
        let window = if queue == 0 { cfg.cycle_time_ns } else { 0 };
        map_hw_err(regs.write32(endqt(queue), window))?;
    }

    // Step 9: readback verification.
    let tqavctrl_rb = map_hw_err(regs.read32(TQAVCTRL))?;
    let qbvcyclet_rb = map_hw_err(regs.read32(QBVCYCLET))?;
    let qbvcyclet_s_rb = map_hw_err(regs.read32(QBVCYCLET_S))?;
    let baset_h_rb = map_hw_err(regs.read32(BASET_H))?;
    let baset_l_rb = map_hw_err(regs.read32(BASET_L))?;
    let txqctl0_rb = map_hw_err(regs.read32(txqctl(0)))?;

    let verified = tqavctrl_rb & TQAVCTRL_TRANSMIT_MODE_TSN != 0
        && qbvcyclet_rb == cfg.cycle_time_ns
        && qbvcyclet_s_rb == cfg.cycle_time_ns
        && !(baset_h_rb == 0 && baset_l_rb == 0)
        && txqctl0_rb & TXQCTL_QUEUE_MODE_LAUNCHT != 0;

    if !verified {
        log::warn!("TAS activation readback mismatch, cycle_ns={}", cfg.cycle_time_ns);
        return Err(AvbError::ActivationFailed);
    }

    // Step 10: wait until SYSTIM reaches BASET, then one to two cycles.
    wait_for_base_time(regs, base, cfg.cycle_time_ns as u64)?;

    let final_tqavctrl = map_hw_err(regs.read32(TQAVCTRL))?;
    if final_tqavctrl & TQAVCTRL_TRANSMIT_MODE_TSN == 0 {
        log::warn!("TAS schedule did not take effect after settle wait");
        return Err(AvbError::ActivationFailed);
    }
    log::info!("TAS active, base_time_ns={}, cycle_ns={}", base, cfg.cycle_time_ns);
    Ok(())
}

fn wait_for_base_time(regs: &dyn RegisterIo, base: u64, cycle_ns: u64) -> AvbResult<()> {
    const POLL: Duration = Duration::from_millis(1);
    const MAX_POLLS: u32 = 600; // bounded: ~600ms, covers the 500ms margin.

    for _ in 0..MAX_POLLS {
        if systim_now(regs)? >= base {
            break;
        }
        thread::sleep(POLL);
    }
    // One to two cycles of settle time, bounded by construction: cycle_ns
    // is capped at 1e9 (1 second) by the prerequisite check above.
    thread::sleep(Duration::from_nanos(cycle_ns.min(2 * cycle_ns)));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use avb_mmio::mapping::fake::FakeMmioBackend;
    use avb_mmio::register::MappedRegisters;
    use avb_mmio::MmioMapping;

    fn valid_cfg() -> TasConfig {
        TasConfig {
            base_time_s: 0,
            base_time_ns: 0,
            cycle_time_s: 0,
            cycle_time_ns: 1_000_000,
            gate_states: [0xFF, 0, 0, 0, 0, 0, 0, 0],
            gate_durations: [1_000_000, 0, 0, 0, 0, 0, 0, 0],
        }
    }

    fn prime_clock(regs: &impl RegisterIo) {
        // Seed SYSTIML so clock_is_advancing's paired reads differ: the
        // fake backend is static, so this test exercises the invalid-clock
        // (NotReady) path rather than a live-advancing one.
        regs.write32(SYSTIML, 100).unwrap();
    }

    #[test]
    fn rejects_inconsistent_gate_durations() {
        let backend = FakeMmioBackend::new(0x10000);
        let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
        let regs = MappedRegisters::new(&mapping);
        let mut cfg = valid_cfg();
        cfg.gate_durations[0] = 500_000;
        assert_eq!(activate(&regs, &cfg, true), Err(AvbError::InvalidParameter));
    }

    #[test]
    fn reports_not_ready_when_clock_is_not_advancing() {
        let backend = FakeMmioBackend::new(0x10000);
        let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
        let regs = MappedRegisters::new(&mapping);
        prime_clock(&regs);
        assert_eq!(activate(&regs, &valid_cfg(), true), Err(AvbError::NotReady));
    }

    #[test]
    fn compute_base_time_is_strictly_in_the_future_and_cycle_aligned() {
        let now = 1_000_000_000u64;
        let cycle = 1_000_000u64;
        let base = compute_base_time(now, cycle);
        assert!(base > now);
        assert_eq!((base - now) % cycle, 0);
    }
}
