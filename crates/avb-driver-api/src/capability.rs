//! Per-family capability bitset.

use bitflags::bitflags;

use crate::family::Family;

bitflags! {
    /// Baseline capabilities a family reports the moment its context
    /// reaches [`HwState::Bound`](crate::state::HwState::Bound). Never
    /// cleared until the adapter context is destroyed; successful BAR
    /// mapping and PTP prime only ever add bits on top of the baseline.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct Capabilities: u32 {
        const MMIO               = 1 << 0;
        const MDIO                = 1 << 1;
        const BASIC_PTP           = 1 << 2;
        const ENHANCED_TIMESTAMP  = 1 << 3;
        const TSN_TAS             = 1 << 4;
        const TSN_FP              = 1 << 5;
        const PCIE_PTM            = 1 << 6;
        const RATE_2_5G           = 1 << 7;
        const EEE                 = 1 << 8;
    }
}

impl Capabilities {
    /// Authoritative per-family baseline table (§4.C).
    pub fn baseline(family: Family) -> Capabilities {
        match family {
            Family::I210 => {
                Capabilities::BASIC_PTP | Capabilities::ENHANCED_TIMESTAMP | Capabilities::MMIO
            }
            Family::I217 => Capabilities::BASIC_PTP | Capabilities::MMIO | Capabilities::MDIO,
            Family::I219 => {
                Capabilities::BASIC_PTP
                    | Capabilities::ENHANCED_TIMESTAMP
                    | Capabilities::MMIO
                    | Capabilities::MDIO
            }
            Family::I225 => {
                Capabilities::BASIC_PTP
                    | Capabilities::ENHANCED_TIMESTAMP
                    | Capabilities::TSN_TAS
                    | Capabilities::TSN_FP
                    | Capabilities::PCIE_PTM
                    | Capabilities::RATE_2_5G
                    | Capabilities::MMIO
            }
            Family::I226 => Capabilities::baseline(Family::I225) | Capabilities::EEE,
            Family::Unknown => Capabilities::MMIO,
        }
    }
}
