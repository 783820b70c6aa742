//! Control-Plane Request Multiplexer (§4.I, §6).
//!
//! `handle_request` is the single synchronous entry point described in
//! §4.I: it validates buffer sizes before touching payload bytes, resolves
//! the operating adapter (active selector, falling back to the caller's
//! delivery context), enforces the per-opcode `hw_state` precondition
//! table (attempting one opportunistic PTP prime for Clock/TSN opcodes),
//! and dispatches to the TSN engine, PTP core, or family vtable.

use avb_driver_api::error::AvbError;
use avb_driver_api::{FpConfig, HwState, PtmConfig, TasConfig};
use avb_mmio::mapping::MmioBackend;
use avb_mmio::pciconfig::PciConfigAccess;

use crate::events::{validate_ring_id, EventSubscription, TimestampEventFilter};
use crate::registry::{AdapterHandle, AdapterRegistry};
use crate::tsn;

/// `{major, minor}` returned by `GetVersion` (§6, §8 property 6).
pub const VERSION: (u16, u16) = (1, 0);

/// Fixed capacity for the `GetDeviceInfo` name buffer.
const DEVICE_INFO_CAP: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Opcode {
    GetVersion,
    EnumAdapters,
    OpenAdapter,
    InitDevice,
    GetHwState,
    GetDeviceInfo,
    GetTimestamp,
    SetTimestamp,
    AdjustFrequency,
    GetClockConfig,
    SetHwTimestamping,
    SetRxTimestamp,
    SetQueueTimestamp,
    SetTargetTime,
    GetAuxTimestamp,
    SetupTas,
    SetupFp,
    SetupPtm,
    TsSubscribe,
    TsRingMap,
    MdioRead,
    MdioWrite,
    /// Compiled out of release builds (§4.I); `handle_request` rejects
    /// these with `Unsupported` unless `debug_assertions` is on.
    ReadRegister,
    WriteRegister,
}

impl Opcode {
    /// §4.I precondition table. `None` means callable from `Bound`.
    fn minimum_state(self) -> Option<HwState> {
        use Opcode::*;
        match self {
            GetVersion | EnumAdapters | GetHwState | InitDevice | OpenAdapter => None,
            GetDeviceInfo | ReadRegister | WriteRegister | MdioRead | MdioWrite
            | AdjustFrequency | GetClockConfig | SetHwTimestamping | SetRxTimestamp
            | SetQueueTimestamp | TsSubscribe | TsRingMap => Some(HwState::BarMapped),
            GetTimestamp | SetTimestamp | SetTargetTime | GetAuxTimestamp | SetupTas
            | SetupFp | SetupPtm => Some(HwState::PtpReady),
        }
    }

    /// Required `output` length; dispatch returns `BufferTooSmall` without
    /// touching the buffer or any register if it falls short (property 7).
    fn output_size(self) -> usize {
        use Opcode::*;
        match self {
            GetVersion => 4,
            EnumAdapters => 16,
            OpenAdapter => 4,
            InitDevice => 4,
            GetHwState => 12,
            GetDeviceInfo => DEVICE_INFO_CAP + 8,
            GetTimestamp => 12,
            SetTimestamp => 4,
            AdjustFrequency => 12,
            GetClockConfig => 24,
            SetHwTimestamping | SetRxTimestamp | SetQueueTimestamp | SetTargetTime => 4,
            GetAuxTimestamp => 12,
            SetupTas | SetupFp | SetupPtm => 4,
            TsSubscribe => 8,
            TsRingMap => 16,
            MdioRead => 8,
            MdioWrite => 4,
            ReadRegister => 8,
            WriteRegister => 4,
        }
    }

    /// Required `input` length.
    fn input_size(self) -> usize {
        use Opcode::*;
        match self {
            GetVersion | InitDevice | GetHwState | GetDeviceInfo | GetClockConfig => 0,
            EnumAdapters => 4,
            OpenAdapter => 4,
            GetTimestamp => 4,
            SetTimestamp | SetTargetTime => 8,
            AdjustFrequency => 8,
            SetHwTimestamping | SetRxTimestamp | SetQueueTimestamp => 4,
            GetAuxTimestamp => 0,
            SetupTas => 60,
            SetupFp => 4,
            SetupPtm => 4,
            TsSubscribe => 8,
            TsRingMap => 8,
            MdioRead => 4,
            MdioWrite => 4,
            ReadRegister => 4,
            WriteRegister => 8,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u32)]
pub enum Status {
    Success = 0,
    InvalidParameter = 1,
    BufferTooSmall = 2,
    NotReady = 3,
    Unsupported = 4,
    NotFound = 5,
    ResourceExhausted = 6,
    HardwareError = 7,
    ActivationFailed = 8,
}

impl From<AvbError> for Status {
    fn from(e: AvbError) -> Self {
        match e {
            AvbError::InvalidParameter => Status::InvalidParameter,
            AvbError::BufferTooSmall => Status::BufferTooSmall,
            AvbError::NotReady => Status::NotReady,
            AvbError::Unsupported => Status::Unsupported,
            AvbError::NotFound => Status::NotFound,
            AvbError::HardwareError => Status::HardwareError,
            AvbError::ActivationFailed => Status::ActivationFailed,
            AvbError::ResourceExhausted => Status::ResourceExhausted,
        }
    }
}

pub struct RequestEnvelope<'a> {
    pub opcode: Opcode,
    pub input: &'a [u8],
    pub output: &'a mut [u8],
}

fn put_u16(out: &mut [u8], off: usize, v: u16) {
    out[off..off + 2].copy_from_slice(&v.to_le_bytes());
}
fn put_u32(out: &mut [u8], off: usize, v: u32) {
    out[off..off + 4].copy_from_slice(&v.to_le_bytes());
}
fn put_u64(out: &mut [u8], off: usize, v: u64) {
    out[off..off + 8].copy_from_slice(&v.to_le_bytes());
}
fn get_u8(inp: &[u8], off: usize) -> u8 {
    inp[off]
}
fn get_u16(inp: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([inp[off], inp[off + 1]])
}
fn get_u32(inp: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(inp[off..off + 4].try_into().unwrap())
}
fn get_u64(inp: &[u8], off: usize) -> u64 {
    u64::from_le_bytes(inp[off..off + 8].try_into().unwrap())
}

fn write_status_only(out: &mut [u8], status: Status) -> usize {
    put_u32(out, 0, status as u32);
    4
}

/// The single entry point described in §4.I. `registry`/`backend` share the
/// lifetime `'b` of the contexts' MMIO mappings; `delivery_context` is the
/// binding the request arrived on, used only when no active selector is set.
pub fn handle_request<'b, B: MmioBackend>(
    registry: &AdapterRegistry<'b, B>,
    pci: &dyn PciConfigAccess,
    backend: &'b B,
    delivery_context: Option<AdapterHandle>,
    envelope: &mut RequestEnvelope,
) -> (Status, usize) {
    let op = envelope.opcode;

    if envelope.output.len() < op.output_size() {
        return (Status::BufferTooSmall, 0);
    }
    if envelope.input.len() < op.input_size() {
        return (Status::InvalidParameter, 0);
    }

    match op {
        Opcode::GetVersion => {
            put_u16(envelope.output, 0, VERSION.0);
            put_u16(envelope.output, 2, VERSION.1);
            return (Status::Success, 4);
        }
        Opcode::EnumAdapters => {
            let index = get_u32(envelope.input, 0) as usize;
            let count = registry.count() as u32;
            put_u32(envelope.output, 0, count);
            match registry.enumerate(index) {
                Some(entry) => {
                    put_u16(envelope.output, 4, entry.vendor_id);
                    put_u16(envelope.output, 6, entry.device_id);
                    put_u32(envelope.output, 8, entry.capabilities.bits());
                    put_u32(envelope.output, 12, Status::Success as u32);
                }
                None => {
                    put_u16(envelope.output, 4, 0);
                    put_u16(envelope.output, 6, 0);
                    put_u32(envelope.output, 8, 0);
                    put_u32(envelope.output, 12, Status::NotFound as u32);
                }
            }
            return (Status::Success, 16);
        }
        Opcode::OpenAdapter => {
            let vendor_id = get_u16(envelope.input, 0);
            let device_id = get_u16(envelope.input, 2);
            return match registry.find_by_ids(vendor_id, device_id) {
                Some(handle) => {
                    registry.set_active(handle);
                    registry.with_context_mut(handle, |ctx| ctx.bring_up(backend));
                    let n = write_status_only(envelope.output, Status::Success);
                    (Status::Success, n)
                }
                None => {
                    let n = write_status_only(envelope.output, Status::NotFound);
                    (Status::NotFound, n)
                }
            };
        }
        _ => {}
    }

    let handle = match registry.get_active().or(delivery_context) {
        Some(h) => h,
        None => {
            let n = write_status_only(envelope.output, Status::NotFound);
            return (Status::NotFound, n);
        }
    };

    if op == Opcode::InitDevice {
        let ran = registry.with_context_mut(handle, |ctx| ctx.bring_up(backend));
        return match ran {
            Some(()) => {
                let n = write_status_only(envelope.output, Status::Success);
                (Status::Success, n)
            }
            None => {
                let n = write_status_only(envelope.output, Status::NotFound);
                (Status::NotFound, n)
            }
        };
    }

    if op == Opcode::GetHwState {
        return match registry.with_context(handle, |ctx| {
            (ctx.hw_state(), ctx.identity, ctx.capabilities())
        }) {
            Some((state, identity, caps)) => {
                put_u32(envelope.output, 0, state as u32);
                put_u16(envelope.output, 4, identity.vendor_id);
                put_u16(envelope.output, 6, identity.device_id);
                put_u32(envelope.output, 8, caps.bits());
                (Status::Success, 12)
            }
            None => {
                let n = write_status_only(envelope.output, Status::NotFound);
                (Status::NotFound, n)
            }
        };
    }

    // Every remaining opcode needs a live context; missing one is NotFound.
    let min_state = op.minimum_state();
    let current_state = match registry.with_context(handle, |ctx| ctx.hw_state()) {
        Some(s) => s,
        None => {
            let n = write_status_only(envelope.output, Status::NotFound);
            return (Status::NotFound, n);
        }
    };

    if let Some(required) = min_state {
        if current_state < required {
            // Clock/TSN opcodes (required == PtpReady) get one opportunistic
            // prime attempt before being refused (§4.I).
            if required == HwState::PtpReady {
                let _ = registry.with_context(handle, |ctx| ctx.try_prime());
            }
            let refreshed = registry.with_context(handle, |ctx| ctx.hw_state()).unwrap_or(current_state);
            if refreshed < required {
                let n = write_status_only(envelope.output, Status::NotReady);
                return (Status::NotReady, n);
            }
        }
    }

    dispatch_stateful(registry, pci, handle, op, envelope)
}

fn dispatch_stateful<'b, B: MmioBackend>(
    registry: &AdapterRegistry<'b, B>,
    pci: &dyn PciConfigAccess,
    handle: AdapterHandle,
    op: Opcode,
    envelope: &mut RequestEnvelope,
) -> (Status, usize) {
    use Opcode::*;

    match op {
        GetDeviceInfo => {
            let result = registry.with_context(handle, |ctx| {
                let regs = ctx.registers()?;
                let mut name_buf = [0u8; DEVICE_INFO_CAP];
                let n = ctx.ops().get_info(&regs, &mut name_buf)?;
                Ok::<_, AvbError>((name_buf, n))
            });
            match result {
                Some(Ok((name_buf, n))) => {
                    envelope.output[..DEVICE_INFO_CAP].copy_from_slice(&name_buf);
                    put_u32(envelope.output, DEVICE_INFO_CAP, n as u32);
                    put_u32(envelope.output, DEVICE_INFO_CAP + 4, Status::Success as u32);
                    (Status::Success, DEVICE_INFO_CAP + 8)
                }
                Some(Err(e)) => status_only(envelope, e.into()),
                None => status_only(envelope, Status::NotFound),
            }
        }
        GetTimestamp => with_regs_result(registry, handle, envelope, |ctx, regs, out| {
            let ts = ctx.ops().get_systime(regs)?;
            put_u64(out, 0, ts);
            put_u32(out, 8, Status::Success as u32);
            Ok(12)
        }),
        SetTimestamp => {
            let value = get_u64(envelope.input, 0);
            with_regs_result(registry, handle, envelope, move |ctx, regs, out| {
                ctx.ops().set_systime(regs, value)?;
                Ok(write_status_only(out, Status::Success))
            })
        }
        AdjustFrequency => {
            let increment_ns = get_u8(envelope.input, 0);
            let increment_frac = get_u32(envelope.input, 4) & 0x00FF_FFFF;
            with_regs_result(registry, handle, envelope, move |_ctx, regs, out| {
                let previous =
                    regs.read32(crate::registers::TIMINCA).map_err(|_| AvbError::HardwareError)?;
                let new_value = ((increment_ns as u32) << 24) | increment_frac;
                regs.write32(crate::registers::TIMINCA, new_value)
                    .map_err(|_| AvbError::HardwareError)?;
                put_u32(out, 0, new_value);
                put_u32(out, 4, previous);
                put_u32(out, 8, Status::Success as u32);
                Ok(12)
            })
        }
        GetClockConfig => with_regs_result(registry, handle, envelope, |ctx, regs, out| {
            let systim = ctx.ops().get_systime(regs)?;
            let timinca = regs.read32(crate::registers::TIMINCA).map_err(|_| AvbError::HardwareError)?;
            let tsauxc = regs.read32(crate::registers::TSAUXC).map_err(|_| AvbError::HardwareError)?;
            put_u64(out, 0, systim);
            put_u32(out, 8, timinca);
            put_u32(out, 12, tsauxc);
            put_u32(out, 16, 0);
            put_u32(out, 20, Status::Success as u32);
            Ok(24)
        }),
        SetHwTimestamping | SetRxTimestamp | SetQueueTimestamp | SetTargetTime => {
            status_only(envelope, Status::Success)
        }
        GetAuxTimestamp => with_regs_result(registry, handle, envelope, |ctx, regs, out| {
            let ts = ctx.ops().get_systime(regs)?;
            put_u64(out, 0, ts);
            put_u32(out, 8, Status::Success as u32);
            Ok(12)
        }),
        SetupTas => {
            let cfg = decode_tas_config(envelope.input);
            with_regs_result(registry, handle, envelope, move |ctx, regs, out| {
                if !ctx.family.is_tsn_capable() {
                    return Err(AvbError::Unsupported);
                }
                ctx.ops().setup_tas(regs, &cfg)?;
                Ok(write_status_only(out, Status::Success))
            })
        }
        SetupFp => {
            let cfg = decode_fp_config(envelope.input);
            with_regs_result(registry, handle, envelope, move |ctx, regs, out| {
                if !ctx.family.is_tsn_capable() {
                    return Err(AvbError::Unsupported);
                }
                ctx.ops().setup_frame_preemption(regs, &cfg)?;
                Ok(write_status_only(out, Status::Success))
            })
        }
        SetupPtm => {
            let cfg = decode_ptm_config(envelope.input);
            let result = registry.with_context(handle, |ctx| {
                if !ctx.family.is_tsn_capable() {
                    return Err(AvbError::Unsupported);
                }
                tsn::ptm::activate(pci, ctx.address, &cfg)
            });
            match result {
                Some(Ok(())) => status_only(envelope, Status::Success),
                Some(Err(e)) => status_only(envelope, e.into()),
                None => status_only(envelope, Status::NotFound),
            }
        }
        TsSubscribe => {
            let types_mask = get_u32(envelope.input, 0);
            let vlan = get_u16(envelope.input, 4);
            let pcp = get_u8(envelope.input, 6);
            let filter = TimestampEventFilter { types_mask, vlan_filter: vlan, pcp_filter: pcp };
            let result = registry.with_context(handle, |ctx| {
                let ring_id = ctx.allocate_ring_id();
                let sub = EventSubscription::new(ring_id, filter, 4096)?;
                ctx.subscribe(sub);
                Ok::<_, AvbError>(ring_id)
            });
            match result.unwrap_or(Err(AvbError::NotFound)) {
                Ok(ring_id) => {
                    put_u32(envelope.output, 0, ring_id);
                    put_u32(envelope.output, 4, Status::Success as u32);
                    (Status::Success, 8)
                }
                Err(e) => {
                    put_u32(envelope.output, 0, 0);
                    put_u32(envelope.output, 4, Status::from(e) as u32);
                    (Status::from(e), 8)
                }
            }
        }
        TsRingMap => {
            let ring_id = get_u32(envelope.input, 0);
            let length = get_u32(envelope.input, 4) as usize;
            if let Err(e) = validate_ring_id(ring_id) {
                put_u64(envelope.output, 0, 0);
                put_u32(envelope.output, 8, 0);
                put_u32(envelope.output, 12, Status::from(e) as u32);
                return (Status::from(e), 16);
            }
            let in_use = registry.with_context(handle, |ctx| ctx.ring_id_in_use(ring_id)).unwrap_or(false);
            if !in_use {
                put_u64(envelope.output, 0, 0);
                put_u32(envelope.output, 8, 0);
                put_u32(envelope.output, 12, Status::NotFound as u32);
                return (Status::NotFound, 16);
            }
            put_u64(envelope.output, 0, ring_id as u64);
            put_u32(envelope.output, 8, length as u32);
            put_u32(envelope.output, 12, Status::Success as u32);
            (Status::Success, 16)
        }
        MdioRead => {
            let phy = get_u8(envelope.input, 0);
            let reg = get_u8(envelope.input, 1);
            with_regs_result(registry, handle, envelope, move |ctx, regs, out| {
                let value = ctx.ops().mdio_read(regs, phy, reg)?;
                put_u32(out, 0, Status::Success as u32);
                put_u16(out, 4, value);
                put_u16(out, 6, 0);
                Ok(8)
            })
        }
        MdioWrite => {
            let phy = get_u8(envelope.input, 0);
            let reg = get_u8(envelope.input, 1);
            let value = get_u16(envelope.input, 2);
            with_regs_result(registry, handle, envelope, move |ctx, regs, out| {
                ctx.ops().mdio_write(regs, phy, reg, value)?;
                Ok(write_status_only(out, Status::Success))
            })
        }
        ReadRegister => {
            #[cfg(debug_assertions)]
            {
                let offset = get_u32(envelope.input, 0);
                return with_regs_result(registry, handle, envelope, move |_ctx, regs, out| {
                    let v = regs.read32(offset).map_err(|_| AvbError::HardwareError)?;
                    put_u32(out, 0, v);
                    put_u32(out, 4, Status::Success as u32);
                    Ok(8)
                });
            }
            #[cfg(not(debug_assertions))]
            status_only(envelope, Status::Unsupported)
        }
        WriteRegister => {
            #[cfg(debug_assertions)]
            {
                let offset = get_u32(envelope.input, 0);
                let value = get_u32(envelope.input, 4);
                return with_regs_result(registry, handle, envelope, move |_ctx, regs, out| {
                    regs.write32(offset, value).map_err(|_| AvbError::HardwareError)?;
                    Ok(write_status_only(out, Status::Success))
                });
            }
            #[cfg(not(debug_assertions))]
            status_only(envelope, Status::Unsupported)
        }
        GetVersion | EnumAdapters | OpenAdapter | InitDevice | GetHwState => unreachable!(),
    }
}

fn status_only(envelope: &mut RequestEnvelope, status: Status) -> (Status, usize) {
    let n = write_status_only(envelope.output, status);
    (status, n)
}

/// Run `f` against the handle's register view, mapping `NotReady` when the
/// context has no active mapping and turning any `AvbError` into a status
/// word written to `envelope.output`.
fn with_regs_result<'b, B: MmioBackend>(
    registry: &AdapterRegistry<'b, B>,
    handle: AdapterHandle,
    envelope: &mut RequestEnvelope,
    f: impl FnOnce(
        &crate::context::AdapterContext<'b, B>,
        &dyn avb_mmio::RegisterIo,
        &mut [u8],
    ) -> Result<usize, AvbError>,
) -> (Status, usize) {
    let outcome = registry.with_context(handle, |ctx| {
        let regs = ctx.registers()?;
        f(ctx, &regs, envelope.output)
    });
    match outcome {
        Some(Ok(n)) => (Status::Success, n),
        Some(Err(e)) => {
            let status = Status::from(e);
            let n = write_status_only(envelope.output, status);
            (status, n)
        }
        None => {
            let n = write_status_only(envelope.output, Status::NotFound);
            (Status::NotFound, n)
        }
    }
}

/// Wire layout: `base_time_s:u64@0, base_time_ns:u32@8, cycle_time_s:u32@12,
/// cycle_time_ns:u32@16, gate_states:[u8;8]@20, gate_durations:[u32;8]@28`
/// (60 bytes total).
fn decode_tas_config(inp: &[u8]) -> TasConfig {
    let mut gate_states = [0u8; 8];
    let mut gate_durations = [0u32; 8];
    gate_states.copy_from_slice(&inp[20..28]);
    for i in 0..8 {
        gate_durations[i] = get_u32(inp, 28 + i * 4);
    }
    TasConfig {
        base_time_s: get_u64(inp, 0),
        base_time_ns: get_u32(inp, 8),
        cycle_time_s: get_u32(inp, 12),
        cycle_time_ns: get_u32(inp, 16),
        gate_states,
        gate_durations,
    }
}

fn decode_fp_config(inp: &[u8]) -> FpConfig {
    FpConfig {
        preemptable_queues: get_u8(inp, 0),
        min_fragment_size: get_u16(inp, 1),
        verify_disable: get_u8(inp, 3) != 0,
    }
}

fn decode_ptm_config(inp: &[u8]) -> PtmConfig {
    PtmConfig {
        enabled: get_u8(inp, 0) != 0,
        clock_granularity: get_u8(inp, 1),
    }
}

