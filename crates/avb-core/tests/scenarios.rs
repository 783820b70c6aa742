//! End-to-end scenarios and cross-cutting property checks for the request
//! multiplexer, the TSN engine, and the adapter lifecycle (§8).
//!
//! Scenarios that need a genuinely advancing PTP clock to reach
//! `PtpReady` (S3, S5) cannot be driven through [`handle_request`] against
//! [`FakeMmioBackend`], whose backing buffer never changes on its own
//! between two reads. Those two are exercised one layer down, directly
//! against [`tsn::tas::activate`] / the family `DeviceOps` vtable, using a
//! small local `RegisterIo` that fabricates an advancing `SYSTIML`.
//! Everything else runs through the full `handle_request` stack.

use std::sync::atomic::{AtomicU32, Ordering};

use avb_core::families;
use avb_core::registry::AdapterRegistry;
use avb_core::request::{handle_request, Opcode, RequestEnvelope, Status};
use avb_core::tsn;
use avb_core::AdapterContext;
use avb_driver_api::{Capabilities, DeviceOps, PciAddress, TasConfig};
use avb_mmio::mapping::fake::FakeMmioBackend;
use avb_mmio::pciconfig::fake::FakePciConfig;
use avb_mmio::register::{MappedRegisters, RegisterIo};
use avb_mmio::{MmioError, MmioMapping};

fn seed_device(pci: &FakePciConfig, devfn: u8, device_id: u16) {
    let id_word = 0x8086u32 | ((device_id as u32) << 16);
    pci.set(0, devfn, 0x00, id_word);
    pci.set(0, devfn, 0x10, 0xF000_0004);
    pci.set(0, devfn, 0x14, 0x1);
}

fn get_u16(buf: &[u8], off: usize) -> u16 {
    u16::from_le_bytes([buf[off], buf[off + 1]])
}
fn get_u32(buf: &[u8], off: usize) -> u32 {
    u32::from_le_bytes(buf[off..off + 4].try_into().unwrap())
}
fn put_u32(buf: &mut [u8], off: usize, v: u32) {
    buf[off..off + 4].copy_from_slice(&v.to_le_bytes());
}

// ---------------------------------------------------------------------
// S1: enumeration reports the full I226 capability set.
// ---------------------------------------------------------------------
#[test]
fn s1_enumerates_i226_with_full_capability_set() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    registry.insert(ctx);
    let backend = FakeMmioBackend::new(0x20000);

    let index_input = 0u32.to_le_bytes();
    let mut output = [0u8; 16];
    let mut envelope = RequestEnvelope { opcode: Opcode::EnumAdapters, input: &index_input, output: &mut output };
    let (status, n) = handle_request(&registry, &pci, &backend, None, &mut envelope);

    assert_eq!(status, Status::Success);
    assert_eq!(n, 16);
    assert_eq!(get_u32(&output, 0), 1);
    assert_eq!(get_u16(&output, 4), 0x8086);
    assert_eq!(get_u16(&output, 6), 0x125C);
    let caps = Capabilities::from_bits_truncate(get_u32(&output, 8));
    let expected = Capabilities::BASIC_PTP
        | Capabilities::ENHANCED_TIMESTAMP
        | Capabilities::TSN_TAS
        | Capabilities::TSN_FP
        | Capabilities::PCIE_PTM
        | Capabilities::RATE_2_5G
        | Capabilities::MMIO
        | Capabilities::EEE;
    assert_eq!(caps, expected);
    assert_eq!(get_u32(&output, 12), Status::Success as u32);
}

// ---------------------------------------------------------------------
// S2: InitDevice reaches BarMapped against the static fake (clock never
// advances), and GetTimestamp on a BarMapped-only adapter is NotReady.
// ---------------------------------------------------------------------
#[test]
fn s2_init_device_reaches_bar_mapped_and_get_timestamp_is_not_ready() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let handle = registry.insert(ctx);
    registry.set_active(handle);
    let backend = FakeMmioBackend::new(0x20000);

    let mut out = [0u8; 4];
    let mut envelope = RequestEnvelope { opcode: Opcode::InitDevice, input: &[], output: &mut out };
    let (status, _) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status, Status::Success);

    let mut hw_out = [0u8; 12];
    let mut envelope = RequestEnvelope { opcode: Opcode::GetHwState, input: &[], output: &mut hw_out };
    let (status, _) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status, Status::Success);
    assert_eq!(get_u32(&hw_out, 0), avb_driver_api::HwState::BarMapped as u32);

    let ts_input = 0u32.to_le_bytes();
    let mut ts_out = [0u8; 12];
    let mut envelope = RequestEnvelope {
        opcode: Opcode::GetTimestamp,
        input: &ts_input,
        output: &mut ts_out,
    };
    let (status, n) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status, Status::NotReady);
    assert_eq!(get_u32(&ts_out, 0), Status::NotReady as u32);
    assert_eq!(n, 4);
}

/// A `RegisterIo` wrapping a real fake-backed mapping, except `SYSTIML`
/// advances by a large step on every read. Large enough that
/// `tas::wait_for_base_time`'s bounded 1ms poll loop catches up to the
/// computed base time in a handful of iterations instead of needing real
/// wall-clock time to pass.
struct AdvancingClockRegs<'m, 'b> {
    inner: MappedRegisters<'m, 'b, FakeMmioBackend>,
    systiml: AtomicU32,
}

impl<'m, 'b> AdvancingClockRegs<'m, 'b> {
    fn new(inner: MappedRegisters<'m, 'b, FakeMmioBackend>) -> Self {
        Self { inner, systiml: AtomicU32::new(0) }
    }
}

impl RegisterIo for AdvancingClockRegs<'_, '_> {
    fn read32(&self, offset: u32) -> Result<u32, MmioError> {
        if offset == avb_core::registers::SYSTIML {
            Ok(self.systiml.fetch_add(300_000_000, Ordering::Relaxed))
        } else {
            self.inner.read32(offset)
        }
    }

    fn write32(&self, offset: u32, value: u32) -> Result<(), MmioError> {
        self.inner.write32(offset, value)
    }
}

fn valid_tas_cfg() -> TasConfig {
    TasConfig {
        base_time_s: 0,
        base_time_ns: 0,
        cycle_time_s: 0,
        cycle_time_ns: 1_000_000,
        gate_states: [0xFF, 0, 0, 0, 0, 0, 0, 0],
        gate_durations: [1_000_000, 0, 0, 0, 0, 0, 0, 0],
    }
}

// ---------------------------------------------------------------------
// S3: a valid TAS config activates successfully once the clock is
// observed advancing.
// ---------------------------------------------------------------------
#[test]
fn s3_valid_tas_config_activates_successfully() {
    let backend = FakeMmioBackend::new(0x10000);
    let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
    let regs = AdvancingClockRegs::new(MappedRegisters::new(&mapping));

    let result = tsn::tas::activate(&regs, &valid_tas_cfg(), true);
    assert_eq!(result, Ok(()));

    let tqavctrl = regs.read32(avb_core::registers::TQAVCTRL).unwrap();
    assert_ne!(tqavctrl & avb_core::registers::TQAVCTRL_TRANSMIT_MODE_TSN, 0);
}

// ---------------------------------------------------------------------
// S4: an internally inconsistent TAS config is rejected before any
// register is touched, independent of clock state.
// ---------------------------------------------------------------------
#[test]
fn s4_invalid_tas_config_is_rejected() {
    let backend = FakeMmioBackend::new(0x10000);
    let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
    let regs = MappedRegisters::new(&mapping);

    let mut cfg = valid_tas_cfg();
    cfg.gate_durations[0] = 500_000; // falls short of cycle_time_ns

    let result = tsn::tas::activate(&regs, &cfg, true);
    assert_eq!(result, Err(avb_driver_api::AvbError::InvalidParameter));
    assert_eq!(regs.read32(avb_core::registers::TQAVCTRL).unwrap(), 0);
}

// ---------------------------------------------------------------------
// S5: I217 has no TSN block; SetupTas is Unsupported and touches nothing.
// ---------------------------------------------------------------------
#[test]
fn s5_i217_setup_tas_is_unsupported() {
    let backend = FakeMmioBackend::new(0x10000);
    let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
    let regs = MappedRegisters::new(&mapping);

    let ops = families::i217::I217Ops;
    let result = ops.setup_tas(&regs, &valid_tas_cfg());
    assert_eq!(result, Err(avb_driver_api::AvbError::Unsupported));
    assert_eq!(regs.read32(avb_core::registers::TQAVCTRL).unwrap(), 0);
}

// ---------------------------------------------------------------------
// S6: two subscriptions get distinct positive ring ids; mapping a
// reserved sentinel ring id is rejected.
// ---------------------------------------------------------------------
#[test]
fn s6_ts_subscribe_allocates_distinct_ring_ids_and_rejects_reserved_map() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let handle = registry.insert(ctx);
    registry.set_active(handle);
    let backend = FakeMmioBackend::new(0x20000);

    let mut out = [0u8; 4];
    let mut envelope = RequestEnvelope { opcode: Opcode::InitDevice, input: &[], output: &mut out };
    handle_request(&registry, &pci, &backend, None, &mut envelope);

    let mut subscribe_input = [0u8; 8];
    put_u32(&mut subscribe_input, 0, 0x1); // types_mask

    let mut out1 = [0u8; 8];
    let mut envelope = RequestEnvelope { opcode: Opcode::TsSubscribe, input: &subscribe_input, output: &mut out1 };
    let (status1, _) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status1, Status::Success);
    let ring_id_1 = get_u32(&out1, 0);

    let mut out2 = [0u8; 8];
    let mut envelope = RequestEnvelope { opcode: Opcode::TsSubscribe, input: &subscribe_input, output: &mut out2 };
    let (status2, _) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status2, Status::Success);
    let ring_id_2 = get_u32(&out2, 0);

    assert!(ring_id_1 > 0 && ring_id_2 > 0);
    assert_ne!(ring_id_1, ring_id_2);

    let mut map_input = [0u8; 8];
    put_u32(&mut map_input, 0, 0xFFFF_FFFF);
    put_u32(&mut map_input, 4, 4096);
    let mut map_out = [0u8; 16];
    let mut envelope = RequestEnvelope { opcode: Opcode::TsRingMap, input: &map_input, output: &mut map_out };
    let (status, _) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status, Status::InvalidParameter);
}

// ---------------------------------------------------------------------
// S7: GetVersion on a freshly attached (Bound) adapter reports {1, 0}.
// ---------------------------------------------------------------------
#[test]
fn s7_get_version_on_bound_adapter_reports_one_zero() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();
    assert_eq!(ctx.hw_state(), avb_driver_api::HwState::Bound);

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let handle = registry.insert(ctx);
    let backend = FakeMmioBackend::new(0x20000);

    let mut out = [0u8; 4];
    let mut envelope = RequestEnvelope { opcode: Opcode::GetVersion, input: &[], output: &mut out };
    let (status, n) = handle_request(&registry, &pci, &backend, Some(handle), &mut envelope);
    assert_eq!(status, Status::Success);
    assert_eq!(n, 4);
    assert_eq!(get_u16(&out, 0), 1);
    assert_eq!(get_u16(&out, 2), 0);
}

// ---------------------------------------------------------------------
// Property 1: hw_state never regresses across repeated InitDevice calls.
// ---------------------------------------------------------------------
#[test]
fn property_hw_state_is_monotonic_across_repeated_init_device() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let handle = registry.insert(ctx);
    registry.set_active(handle);
    let backend = FakeMmioBackend::new(0x20000);

    let mut last = avb_driver_api::HwState::Bound;
    for _ in 0..3 {
        let mut out = [0u8; 4];
        let mut envelope = RequestEnvelope { opcode: Opcode::InitDevice, input: &[], output: &mut out };
        handle_request(&registry, &pci, &backend, None, &mut envelope);
        let current = registry.with_context(handle, |c| c.hw_state()).unwrap();
        assert!(current >= last);
        last = current;
    }
}

// ---------------------------------------------------------------------
// Property 2: reported capabilities are identical in Bound and BarMapped.
// ---------------------------------------------------------------------
#[test]
fn property_capabilities_are_stable_across_state_transitions() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();
    let before = ctx.capabilities();

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let handle = registry.insert(ctx);
    registry.set_active(handle);
    let backend = FakeMmioBackend::new(0x20000);

    let mut out = [0u8; 4];
    let mut envelope = RequestEnvelope { opcode: Opcode::InitDevice, input: &[], output: &mut out };
    handle_request(&registry, &pci, &backend, None, &mut envelope);
    let after = registry.with_context(handle, |c| c.capabilities()).unwrap();
    assert_eq!(before, after);
}

// ---------------------------------------------------------------------
// Property 6: GetVersion is stable regardless of registry contents.
// ---------------------------------------------------------------------
#[test]
fn property_get_version_is_stable_with_an_empty_registry() {
    let pci = FakePciConfig::new();
    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let backend = FakeMmioBackend::new(0x20000);

    for _ in 0..2 {
        let mut out = [0u8; 4];
        let mut envelope = RequestEnvelope { opcode: Opcode::GetVersion, input: &[], output: &mut out };
        let (status, _) = handle_request(&registry, &pci, &backend, None, &mut envelope);
        assert_eq!(status, Status::Success);
        assert_eq!(get_u16(&out, 0), 1);
        assert_eq!(get_u16(&out, 2), 0);
    }
}

// ---------------------------------------------------------------------
// Property 7: undersized buffers are rejected before any adapter lookup,
// and the output buffer given is left untouched (no partial write).
// ---------------------------------------------------------------------
#[test]
fn property_undersized_output_buffer_is_rejected_before_dispatch() {
    let pci = FakePciConfig::new();
    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let backend = FakeMmioBackend::new(0x20000);

    let mut out = [0xAAu8; 4]; // GetDeviceInfo needs 72 bytes
    let mut envelope = RequestEnvelope { opcode: Opcode::GetDeviceInfo, input: &[], output: &mut out };
    let (status, n) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status, Status::BufferTooSmall);
    assert_eq!(n, 0);
    assert_eq!(out, [0xAA; 4]); // untouched
}

#[test]
fn property_undersized_input_buffer_is_rejected_as_invalid_parameter() {
    let pci = FakePciConfig::new();
    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let backend = FakeMmioBackend::new(0x20000);

    let mut out = [0u8; 4];
    // SetupTas needs a 60-byte input.
    let mut envelope = RequestEnvelope { opcode: Opcode::SetupTas, input: &[0u8; 8], output: &mut out };
    let (status, n) = handle_request(&registry, &pci, &backend, None, &mut envelope);
    assert_eq!(status, Status::InvalidParameter);
    assert_eq!(n, 0);
}

// ---------------------------------------------------------------------
// Property 9: a poisoned (all-ones) BAR never advances past Bound.
// ---------------------------------------------------------------------
#[test]
fn property_liveness_check_keeps_adapter_at_bound_when_bar_reads_all_ones() {
    let pci = FakePciConfig::new();
    let addr = PciAddress::new(0, 0, 0);
    seed_device(&pci, addr.devfn(), 0x125C);
    let ctx: AdapterContext<'_, FakeMmioBackend> = AdapterContext::attach(&pci, addr).unwrap();

    let registry: AdapterRegistry<'_, FakeMmioBackend> = AdapterRegistry::new();
    let handle = registry.insert(ctx);
    registry.set_active(handle);
    let backend = FakeMmioBackend::new(0x20000);

    {
        let mapping = MmioMapping::map(&backend, 0, 0x20000).unwrap();
        let regs = MappedRegisters::new(&mapping);
        regs.write32(avb_core::registers::CTRL, 0xFFFF_FFFF).unwrap();
        regs.write32(avb_core::registers::STATUS, 0xFFFF_FFFF).unwrap();
    }

    let mut out = [0u8; 4];
    let mut envelope = RequestEnvelope { opcode: Opcode::InitDevice, input: &[], output: &mut out };
    handle_request(&registry, &pci, &backend, None, &mut envelope);

    let state = registry.with_context(handle, |c| c.hw_state()).unwrap();
    assert_eq!(state, avb_driver_api::HwState::Bound);
}

// ---------------------------------------------------------------------
// Property 10: reprogramming the same TAS schedule twice is idempotent.
// ---------------------------------------------------------------------
#[test]
fn property_reprogramming_same_tas_schedule_is_idempotent() {
    let backend = FakeMmioBackend::new(0x10000);
    let mapping = MmioMapping::map(&backend, 0, 0x10000).unwrap();
    let regs = AdvancingClockRegs::new(MappedRegisters::new(&mapping));

    let cfg = valid_tas_cfg();
    assert_eq!(tsn::tas::activate(&regs, &cfg, true), Ok(()));
    let first = regs.read32(avb_core::registers::QBVCYCLET).unwrap();
    assert_eq!(tsn::tas::activate(&regs, &cfg, true), Ok(()));
    let second = regs.read32(avb_core::registers::QBVCYCLET).unwrap();
    assert_eq!(first, second);
}
