//! PCIe Precision Time Measurement activation (§4.H).
//!
//! Unlike the rest of the TSN engine this is driven through PCI
//! configuration space, not MMIO, so it does not go through
//! [`avb_driver_api::DeviceOps`] — callers invoke [`activate`] directly
//! against the same [`PciConfigAccess`] backend [`crate::discovery`] used.

use avb_driver_api::error::AvbResult;
use avb_driver_api::{AvbError, PciAddress, PtmConfig};
use avb_mmio::pciconfig::PciConfigAccess;

/// PCIe extended configuration space starts here; capability headers form
/// a singly linked list from this offset.
const EXTENDED_CAP_BASE: u16 = 0x100;
/// Bounded walk: a well-formed chain is short, this just guards against a
/// malformed `next` pointer cycling forever.
const MAX_CAP_WALK: u32 = 64;

const PCIE_EXT_CAP_ID_PTM: u32 = 0x001F;

/// PTM Control Register, relative to the capability header.
const PTM_CONTROL_OFFSET: u16 = 0x08;
const PTM_CONTROL_ENABLE: u32 = 1 << 0;
const PTM_CONTROL_ROOT_SELECT: u32 = 1 << 1;
const PTM_CONTROL_GRANULARITY_SHIFT: u32 = 8;

fn map_cfg_err<T>(r: Result<T, avb_mmio::pciconfig::PciConfigError>) -> AvbResult<T> {
    r.map_err(|_| AvbError::HardwareError)
}

/// Walk the PCIe extended capability list looking for the PTM capability
/// (ID `0x001F`); returns the capability header's offset.
fn find_ptm_capability(
    pci: &dyn PciConfigAccess,
    bus: u8,
    devfn: u8,
) -> AvbResult<Option<u16>> {
    let mut offset = EXTENDED_CAP_BASE;
    for _ in 0..MAX_CAP_WALK {
        if offset == 0 {
            return Ok(None);
        }
        let header = map_cfg_err(pci.read32(bus, devfn, offset))?;
        if header == 0 || header == 0xFFFF_FFFF {
            return Ok(None);
        }
        let cap_id = header & 0xFFFF;
        if cap_id == PCIE_EXT_CAP_ID_PTM {
            return Ok(Some(offset));
        }
        let next = ((header >> 20) & 0xFFF) as u16;
        if next == offset {
            return Ok(None);
        }
        offset = next;
    }
    Ok(None)
}

/// Enable (or disable) PTM and program the effective granularity, per the
/// PTM capability found in the device's extended config space.
pub fn activate(pci: &dyn PciConfigAccess, addr: PciAddress, cfg: &PtmConfig) -> AvbResult<()> {
    let devfn = addr.devfn();
    let cap_offset = find_ptm_capability(pci, addr.bus, devfn)?
        .ok_or(AvbError::Unsupported)?;
    let control_offset = cap_offset + PTM_CONTROL_OFFSET;

    let mut value = map_cfg_err(pci.read32(addr.bus, devfn, control_offset))?;
    value &= !(PTM_CONTROL_ENABLE | PTM_CONTROL_ROOT_SELECT | (0xFF << PTM_CONTROL_GRANULARITY_SHIFT));
    if cfg.enabled {
        value |= PTM_CONTROL_ENABLE;
        value |= (cfg.clock_granularity as u32) << PTM_CONTROL_GRANULARITY_SHIFT;
    }
    map_cfg_err(pci.write32(addr.bus, devfn, control_offset, value))?;

    if cfg.enabled {
        let readback = map_cfg_err(pci.read32(addr.bus, devfn, control_offset))?;
        if readback & PTM_CONTROL_ENABLE == 0 {
            log::warn!("PTM control readback did not show ENABLE set at {:?}", addr);
            return Err(AvbError::ActivationFailed);
        }
    }
    log::info!("PTM {} at {:?}, granularity={}", if cfg.enabled { "enabled" } else { "disabled" }, addr, cfg.clock_granularity);
    Ok(())
}
