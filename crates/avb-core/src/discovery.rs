//! Resource Discoverer (§4.A): binding → `{bus, device, function}` →
//! BAR0 physical base and length.

use avb_driver_api::PciAddress;
use avb_mmio::pciconfig::{extract_bar_physical_base, BarKind, PciConfigAccess};

pub const INTEL_VENDOR_ID: u16 = 0x8086;

const OFFSET_VENDOR_DEVICE: u16 = 0x00;
const OFFSET_BAR0: u16 = 0x10;
const OFFSET_BAR1: u16 = 0x14;

/// All currently supported families map a 128 KiB BAR0.
pub const BAR0_LENGTH: usize = 0x2_0000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryError {
    NoDevice,
    NotIntel,
    IoBar,
    ConfigRead,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DiscoveredBar {
    pub bar0_physical_base: u64,
    pub bar0_length: usize,
    pub vendor_id: u16,
    pub device_id: u16,
}

/// Read config space at `addr` through `pci` and compute BAR0's physical
/// base and length.
pub fn discover(
    pci: &dyn PciConfigAccess,
    addr: PciAddress,
) -> Result<DiscoveredBar, DiscoveryError> {
    let devfn = addr.devfn();

    let id_word = pci
        .read32(addr.bus, devfn, OFFSET_VENDOR_DEVICE)
        .map_err(|_| DiscoveryError::ConfigRead)?;
    if id_word == 0xFFFF_FFFF {
        return Err(DiscoveryError::NoDevice);
    }
    let vendor_id = (id_word & 0xFFFF) as u16;
    let device_id = (id_word >> 16) as u16;
    if vendor_id != INTEL_VENDOR_ID {
        return Err(DiscoveryError::NotIntel);
    }

    let bar0_lo = pci
        .read32(addr.bus, devfn, OFFSET_BAR0)
        .map_err(|_| DiscoveryError::ConfigRead)?;

    match BarKind::from_bar_low(bar0_lo) {
        BarKind::Io => return Err(DiscoveryError::IoBar),
        BarKind::Memory64 => {
            let bar1 = pci
                .read32(addr.bus, devfn, OFFSET_BAR1)
                .map_err(|_| DiscoveryError::ConfigRead)?;
            let base = extract_bar_physical_base(bar0_lo, Some(bar1));
            Ok(DiscoveredBar {
                bar0_physical_base: base,
                bar0_length: BAR0_LENGTH,
                vendor_id,
                device_id,
            })
        }
        BarKind::Memory32 => {
            let base = extract_bar_physical_base(bar0_lo, None);
            Ok(DiscoveredBar {
                bar0_physical_base: base,
                bar0_length: BAR0_LENGTH,
                vendor_id,
                device_id,
            })
        }
    }
}
