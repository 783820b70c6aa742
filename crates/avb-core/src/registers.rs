//! Well-known register offsets the generic core knows about (§4.E, §6).
//!
//! Everything else — MDIO command-word layout, PHY-specific quirks, the
//! I210 stuck-at-zero recovery sequence — lives behind the per-family
//! [`avb_driver_api::DeviceOps`] vtable.

/// Device Control Register. Identical offset across every supported family.
pub const CTRL: u32 = 0x0000;
/// Device Status Register; used for the post-mapping liveness check.
pub const STATUS: u32 = 0x0008;

/// PTP Hardware Clock block — identical across every supported family.
pub const SYSTIML: u32 = 0x0B600;
pub const SYSTIMH: u32 = 0x0B604;
pub const TIMINCA: u32 = 0x0B608;
pub const TSAUXC: u32 = 0x0B640;

/// `TSAUXC` bit 31: DisableSystime.
pub const TSAUXC_DISABLE_SYSTIME: u32 = 1 << 31;

/// Family-neutral "reasonable" 25 MHz increment used as the initial
/// `TIMINCA` value when the register reads zero (§4.G step 2).
pub const TIMINCA_DEFAULT: u32 = 0x1800_0000;

/// TSN register block (I225/I226 only; §4.H, §6).
pub const TQAVCTRL: u32 = 0x3570;
pub const BASET_L: u32 = 0x3314;
pub const BASET_H: u32 = 0x3318;
pub const QBVCYCLET: u32 = 0x331C;
pub const QBVCYCLET_S: u32 = 0x3320;

pub fn txqctl(queue: u32) -> u32 {
    0x3300 + 4 * queue
}

pub fn stqt(queue: u32) -> u32 {
    0x3340 + 4 * queue
}

pub fn endqt(queue: u32) -> u32 {
    0x3380 + 4 * queue
}

/// `TQAVCTRL` bits.
pub const TQAVCTRL_TRANSMIT_MODE_TSN: u32 = 0x1;
pub const TQAVCTRL_ENHANCED_QAV: u32 = 0x8;
pub const TQAVCTRL_FUTSCDDIS: u32 = 0x0080_0000;

/// `TXQCTL(i)` bits.
pub const TXQCTL_QUEUE_MODE_LAUNCHT: u32 = 0x1;

/// Frame Preemption configuration register and bit layout (§4.H). Offset is
/// shared across the I225/I226 TSN block.
pub const FP_CONFIG: u32 = 0x3390;
pub const FP_CONFIG_PREEMPTABLE_SHIFT: u32 = 0;
pub const FP_CONFIG_FRAG_MASK: u32 = 0x0000_0F00;
pub const FP_CONFIG_FRAG_SHIFT: u32 = 8;
pub const FP_CONFIG_VERIFY_EN: u32 = 1 << 12;
pub const FP_CONFIG_ENABLE: u32 = 1 << 13;

/// `STATUS` link-up bit, checked before programming Frame Preemption.
pub const STATUS_LU: u32 = 1 << 1;
