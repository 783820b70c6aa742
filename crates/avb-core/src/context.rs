//! Adapter Context & State Machine (§3, §4.C).

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use avb_driver_api::error::{AvbError, AvbResult};
use avb_driver_api::{Capabilities, DeviceOps, Family, HwState, PciAddress, PciDeviceId};
use avb_mmio::mapping::{MmioBackend, MmioMapping};
use avb_mmio::pciconfig::PciConfigAccess;
use avb_mmio::register::{MappedRegisters, RegisterIo};

use crate::discovery::{self, DiscoveryError};
use crate::events::EventSubscription;
use crate::families;
use crate::registers::{CTRL, STATUS};

fn hw_state_from_u32(v: u32) -> HwState {
    match v {
        0 => HwState::Bound,
        1 => HwState::BarMapped,
        _ => HwState::PtpReady,
    }
}

/// One per bound network adapter (§3). Generic over the `MmioBackend` so
/// tests can run the full bring-up sequence against [`avb_mmio::mapping::fake::FakeMmioBackend`]
/// instead of real device memory.
pub struct AdapterContext<'b, B: MmioBackend> {
    pub identity: PciDeviceId,
    pub address: PciAddress,
    pub family: Family,
    capabilities: Capabilities,
    hw_state: AtomicU32,
    bar0_physical_base: u64,
    bar0_length: usize,
    mapping: Option<MmioMapping<'b, B>>,
    ops: &'static dyn DeviceOps,
    subscriptions: Mutex<Vec<EventSubscription>>,
    next_ring_id: AtomicU32,
}

impl<'b, B: MmioBackend> AdapterContext<'b, B> {
    /// §4.C step 1: discover `{vendor_id, device_id}` and classify the
    /// family. Publishes the baseline capability set and enters `Bound`.
    /// Does not map MMIO yet — that is deferred bring-up, step 2.
    pub fn attach(pci: &dyn PciConfigAccess, address: PciAddress) -> Result<Self, DiscoveryError> {
        let bar = discovery::discover(pci, address)?;
        let family = Family::classify(bar.vendor_id, bar.device_id);
        let ops = families::ops_for(family);
        Ok(Self {
            identity: PciDeviceId { vendor_id: bar.vendor_id, device_id: bar.device_id },
            address,
            family,
            capabilities: Capabilities::baseline(family),
            hw_state: AtomicU32::new(HwState::Bound.as_u32()),
            bar0_physical_base: bar.bar0_physical_base,
            bar0_length: bar.bar0_length,
            mapping: None,
            ops,
            subscriptions: Mutex::new(Vec::new()),
            next_ring_id: AtomicU32::new(1),
        })
    }

    pub fn hw_state(&self) -> HwState {
        hw_state_from_u32(self.hw_state.load(Ordering::Acquire))
    }

    pub fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    /// Monotonic advance: never lets `hw_state` regress even if called
    /// with a lower value than already observed (§3 invariant, property 1).
    fn advance_to(&self, target: HwState) {
        let target_v = target.as_u32();
        let mut current = self.hw_state.load(Ordering::Acquire);
        while current < target_v {
            match self.hw_state.compare_exchange_weak(
                current,
                target_v,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }
    }

    /// Produce a `RegisterIo` view over the active mapping, if any.
    pub fn registers(&self) -> AvbResult<MappedRegisters<'_, 'b, B>> {
        match &self.mapping {
            Some(m) => Ok(MappedRegisters::new(m)),
            None => Err(AvbError::NotReady),
        }
    }

    pub fn ops(&self) -> &'static dyn DeviceOps {
        self.ops
    }

    /// §4.C step 2: `A → B`; on success, map BAR0, run the liveness check
    /// (property 9), invoke family init, then attempt PTP prime. Any stage
    /// failing simply leaves the context at its highest achieved state —
    /// bring-up failure is non-fatal (§4.C step 3).
    pub fn bring_up(&mut self, backend: &'b B) {
        if self.mapping.is_none() {
            let mapping = match MmioMapping::map(backend, self.bar0_physical_base, self.bar0_length) {
                Ok(m) => m,
                Err(e) => {
                    log::warn!("{:?}: BAR0 map failed: {:?}", self.identity, e);
                    return;
                }
            };
            self.mapping = Some(mapping);
        }

        let regs = match self.registers() {
            Ok(r) => r,
            Err(_) => return,
        };

        // Property 9: a CTRL/STATUS read of all-ones means the BAR is not
        // actually live; do not advance past `Bound` in that case.
        if regs.read32_live(CTRL).is_err() || regs.read32_live(STATUS).is_err() {
            log::warn!("{:?}: MMIO not live after mapping, staying at Bound", self.identity);
            self.mapping = None;
            return;
        }

        self.advance_to(HwState::BarMapped);
        log::info!("{:?}: BarMapped ({})", self.identity, self.ops.device_name());

        if let Err(e) = self.ops.init(&regs) {
            log::warn!("{:?}: family init failed: {:?}", self.identity, e);
            return;
        }

        match self.ops.init_ptp(&regs) {
            Ok(true) => {
                self.advance_to(HwState::PtpReady);
                log::info!("{:?}: PtpReady", self.identity);
            }
            Ok(false) => log::debug!("{:?}: PTP not advancing yet", self.identity),
            Err(e) => log::debug!("{:?}: PTP prime failed: {:?}", self.identity, e),
        }
    }

    /// Opportunistic re-prime used by the request multiplexer before any
    /// clock/TSN opcode when `hw_state < PtpReady` (§4.I).
    pub fn try_prime(&self) -> AvbResult<bool> {
        let regs = self.registers()?;
        match self.ops.init_ptp(&regs) {
            Ok(true) => {
                self.advance_to(HwState::PtpReady);
                Ok(true)
            }
            Ok(false) => Ok(false),
            Err(e) => Err(e),
        }
    }

    pub fn subscribe(&self, sub: EventSubscription) {
        self.subscriptions.lock().unwrap().push(sub);
    }

    pub fn unsubscribe(&self, ring_id: u32) -> bool {
        let mut subs = self.subscriptions.lock().unwrap();
        let len_before = subs.len();
        subs.retain(|s| s.ring_id != ring_id);
        subs.len() != len_before
    }

    pub fn ring_id_in_use(&self, ring_id: u32) -> bool {
        self.subscriptions.lock().unwrap().iter().any(|s| s.ring_id == ring_id)
    }

    /// Allocate the next monotonic `ring_id` for this context (§4.J,
    /// property 8). Never returns the reserved sentinels because it never
    /// wraps back through them in any realistic subscription lifetime.
    pub fn allocate_ring_id(&self) -> u32 {
        self.next_ring_id.fetch_add(1, Ordering::AcqRel)
    }
}
