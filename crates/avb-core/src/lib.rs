//! Adapter lifecycle, hardware-abstraction dispatch, PTP/TSN engine, and
//! request multiplexer for the Intel AVB/TSN filter driver core.
//!
//! Layering mirrors [`avb_driver_api`] and [`avb_mmio`]: this crate owns
//! the parts of the system that are stateful (the adapter registry, the
//! per-adapter bring-up state machine, event subscriptions) or that
//! sequence several register writes into one hardware operation (the PTP
//! core, the TSN programming engine). Everything here is generic over
//! [`avb_mmio::mapping::MmioBackend`] so it runs the same way against real
//! device memory and against the in-memory fakes used in tests.

pub mod context;
pub mod discovery;
pub mod events;
pub mod families;
pub mod ptp;
pub mod registers;
pub mod registry;
pub mod request;
pub mod tsn;

pub use context::AdapterContext;
pub use events::{EventSubscription, TimestampEventFilter, TimestampRecord};
pub use registry::{AdapterHandle, AdapterRegistry, EnumeratedAdapter};
pub use request::{handle_request, Opcode, RequestEnvelope, Status};
