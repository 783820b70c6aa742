//! Adapter Registry (§4.D).
//!
//! A process-wide list of bound adapters plus the coarse, single
//! `active_adapter` selector the request multiplexer resolves against.
//! Mutation (`insert`/`remove`/`set_active`) takes the write lock;
//! `find_by_ids`/`enumerate`/`count` only ever read-lock.

use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::RwLock;

use avb_driver_api::Capabilities;
use avb_mmio::mapping::MmioBackend;

use crate::context::AdapterContext;

/// Opaque index into the registry. Stable for the lifetime of the slot —
/// removal leaves a hole rather than shifting later handles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AdapterHandle(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EnumeratedAdapter {
    pub vendor_id: u16,
    pub device_id: u16,
    pub capabilities: Capabilities,
}

pub struct AdapterRegistry<'b, B: MmioBackend> {
    contexts: RwLock<Vec<Option<AdapterContext<'b, B>>>>,
    active: AtomicI64,
}

impl<'b, B: MmioBackend> AdapterRegistry<'b, B> {
    pub fn new() -> Self {
        Self {
            contexts: RwLock::new(Vec::new()),
            active: AtomicI64::new(-1),
        }
    }

    /// Write-locked: publish a context allocated by filter attach.
    pub fn insert(&self, ctx: AdapterContext<'b, B>) -> AdapterHandle {
        let mut contexts = self.contexts.write().unwrap();
        contexts.push(Some(ctx));
        AdapterHandle(contexts.len() - 1)
    }

    /// Write-locked: destroy a context on filter detach. Clears the active
    /// selector if it pointed at this handle.
    pub fn remove(&self, handle: AdapterHandle) -> bool {
        let mut contexts = self.contexts.write().unwrap();
        let removed = match contexts.get_mut(handle.0) {
            Some(slot) => slot.take().is_some(),
            None => false,
        };
        if removed && self.active.load(Ordering::Acquire) == handle.0 as i64 {
            self.active.store(-1, Ordering::Release);
        }
        removed
    }

    /// Read-locked.
    pub fn find_by_ids(&self, vendor_id: u16, device_id: u16) -> Option<AdapterHandle> {
        let contexts = self.contexts.read().unwrap();
        contexts.iter().enumerate().find_map(|(i, slot)| {
            slot.as_ref()
                .filter(|c| c.identity.vendor_id == vendor_id && c.identity.device_id == device_id)
                .map(|_| AdapterHandle(i))
        })
    }

    /// Read-locked.
    pub fn enumerate(&self, index: usize) -> Option<EnumeratedAdapter> {
        let contexts = self.contexts.read().unwrap();
        contexts.get(index).and_then(|slot| slot.as_ref()).map(|c| EnumeratedAdapter {
            vendor_id: c.identity.vendor_id,
            device_id: c.identity.device_id,
            capabilities: c.capabilities(),
        })
    }

    /// Read-locked: count of live (non-removed) slots.
    pub fn count(&self) -> usize {
        self.contexts.read().unwrap().iter().filter(|s| s.is_some()).count()
    }

    pub fn set_active(&self, handle: AdapterHandle) {
        self.active.store(handle.0 as i64, Ordering::Release);
    }

    pub fn get_active(&self) -> Option<AdapterHandle> {
        let v = self.active.load(Ordering::Acquire);
        if v < 0 {
            None
        } else {
            Some(AdapterHandle(v as usize))
        }
    }

    pub fn with_context<R>(
        &self,
        handle: AdapterHandle,
        f: impl FnOnce(&AdapterContext<'b, B>) -> R,
    ) -> Option<R> {
        let contexts = self.contexts.read().unwrap();
        contexts.get(handle.0).and_then(|slot| slot.as_ref()).map(f)
    }

    pub fn with_context_mut<R>(
        &self,
        handle: AdapterHandle,
        f: impl FnOnce(&mut AdapterContext<'b, B>) -> R,
    ) -> Option<R> {
        let mut contexts = self.contexts.write().unwrap();
        contexts.get_mut(handle.0).and_then(|slot| slot.as_mut()).map(f)
    }
}

impl<'b, B: MmioBackend> Default for AdapterRegistry<'b, B> {
    fn default() -> Self {
        Self::new()
    }
}
