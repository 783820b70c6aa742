//! Bounded MDIO indirect-access poll (§4.F, §5).
//!
//! The `MDIC`-style command/ready/error bit layout differs across
//! families, so this module only owns the generic "write command, poll
//! ready bit, bounded by count and wall clock" shape. Callers (the
//! per-family `mdio_read`/`mdio_write`) supply the already-built command
//! word and the bit masks for their register layout.

use core::time::Duration;

use crate::mapping::MmioError;
use crate::register::RegisterIo;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MdioError {
    Timeout,
    Error,
    IoError,
}

impl From<MmioError> for MdioError {
    fn from(_: MmioError) -> Self {
        MdioError::IoError
    }
}

pub enum MdioOp {
    Read,
    Write,
}

/// Minimum attempts and per-iteration delay mandated by §5: at least 1000
/// attempts, at least 10 microseconds apart.
pub const MIN_ATTEMPTS: u32 = 1000;
pub const MIN_ATTEMPT_SPACING: Duration = Duration::from_micros(10);

/// Write `command_word` to `mdic_offset`, then poll until `ready_bit` is
/// set in the readback, bounded by `max_attempts` (>= [`MIN_ATTEMPTS`]) at
/// >= [`MIN_ATTEMPT_SPACING`] apart. Returns the raw register value on
/// success so the caller can mask out the data field itself.
pub fn mdio_transact(
    regs: &impl RegisterIo,
    mdic_offset: u32,
    command_word: u32,
    ready_bit: u32,
    error_bit: u32,
    max_attempts: u32,
) -> Result<u32, MdioError> {
    let max_attempts = max_attempts.max(MIN_ATTEMPTS);
    regs.write32(mdic_offset, command_word)?;

    for _ in 0..max_attempts {
        let v = regs.read32(mdic_offset)?;
        if v & ready_bit != 0 {
            if v & error_bit != 0 {
                return Err(MdioError::Error);
            }
            return Ok(v);
        }
        std::thread::sleep(MIN_ATTEMPT_SPACING);
    }
    Err(MdioError::Timeout)
}
