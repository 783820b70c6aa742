//! Event Subscription & Ring (§4.J).
//!
//! The ring's record format is not specified by the source (§9 open
//! question); this picks a fixed 24-byte record — sequence number,
//! timestamp, event type, and filter-match data — consistent with the
//! single-producer/single-consumer sequence-fencing semantics described.

use std::sync::atomic::{AtomicU64, Ordering};

use avb_driver_api::error::{AvbError, AvbResult};
use zerocopy::{AsBytes, FromBytes};

/// Hard cap on ring length (§4.J).
pub const MAX_RING_BYTES: usize = 1 << 20;

/// `ring_id` values a caller may never legitimately use: `0` means
/// "unused", the other two are sentinels reserved by the wire protocol.
pub const RESERVED_RING_IDS: [u32; 3] = [0, 0xDEAD_BEEF, 0xFFFF_FFFF];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimestampEventFilter {
    pub types_mask: u32,
    pub vlan_filter: u16,
    pub pcp_filter: u8,
}

/// One ring record: the producer writes the body, then stores
/// `sequence` last (with `Release` ordering) so a consumer reading with
/// `Acquire` never observes a torn write.
#[derive(Debug, Clone, Copy, FromBytes, AsBytes)]
#[repr(C)]
pub struct TimestampRecord {
    pub sequence: u64,
    pub timestamp_ns: u64,
    pub event_type: u32,
    pub match_data: u32,
}

const RECORD_SIZE: usize = std::mem::size_of::<TimestampRecord>();

pub fn validate_ring_id(ring_id: u32) -> AvbResult<()> {
    if RESERVED_RING_IDS.contains(&ring_id) {
        return Err(AvbError::InvalidParameter);
    }
    Ok(())
}

/// A single timestamp-event subscription, owned exclusively by its
/// subscribing session (§5).
pub struct EventSubscription {
    pub ring_id: u32,
    pub filter: TimestampEventFilter,
    pub user_mapping: Option<u64>,
    ring_buffer: Vec<u8>,
    sequence_counter: AtomicU64,
}

impl EventSubscription {
    /// `types_mask == 0` ⇒ `InvalidParameter`; `length > 1 MiB` ⇒
    /// `ResourceExhausted` (§4.J rejected-input list).
    pub fn new(ring_id: u32, filter: TimestampEventFilter, length: usize) -> AvbResult<Self> {
        if filter.types_mask == 0 {
            return Err(AvbError::InvalidParameter);
        }
        if length > MAX_RING_BYTES {
            return Err(AvbError::ResourceExhausted);
        }
        Ok(Self {
            ring_id,
            filter,
            user_mapping: None,
            ring_buffer: vec![0u8; length.max(RECORD_SIZE)],
            sequence_counter: AtomicU64::new(0),
        })
    }

    pub fn length(&self) -> usize {
        self.ring_buffer.len()
    }

    pub fn sequence(&self) -> u64 {
        self.sequence_counter.load(Ordering::Acquire)
    }

    fn slot_count(&self) -> usize {
        self.ring_buffer.len() / RECORD_SIZE
    }

    /// Write one record into the next ring slot and publish it by bumping
    /// the sequence counter last.
    pub fn push_record(&mut self, timestamp_ns: u64, event_type: u32, match_data: u32) {
        let slots = self.slot_count().max(1);
        let next_seq = self.sequence_counter.load(Ordering::Relaxed) + 1;
        let record = TimestampRecord {
            sequence: next_seq,
            timestamp_ns,
            event_type,
            match_data,
        };
        let slot = ((next_seq - 1) as usize % slots) * RECORD_SIZE;
        if slot + RECORD_SIZE <= self.ring_buffer.len() {
            self.ring_buffer[slot..slot + RECORD_SIZE].copy_from_slice(record.as_bytes());
        }
        self.sequence_counter.store(next_seq, Ordering::Release);
    }

    /// Read the record most recently published at `slot`, for tests that
    /// exercise the producer side without a real consumer.
    pub fn read_slot(&self, slot_index: usize) -> Option<TimestampRecord> {
        let start = slot_index.checked_mul(RECORD_SIZE)?;
        let bytes = self.ring_buffer.get(start..start + RECORD_SIZE)?;
        TimestampRecord::read_from(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn filter() -> TimestampEventFilter {
        TimestampEventFilter { types_mask: 0x1, vlan_filter: 0, pcp_filter: 0 }
    }

    #[test]
    fn rejects_zero_types_mask() {
        let f = TimestampEventFilter { types_mask: 0, ..filter() };
        let result = EventSubscription::new(1, f, 4096);
        assert!(matches!(result, Err(AvbError::InvalidParameter)));
    }

    #[test]
    fn rejects_length_over_one_mebibyte() {
        let result = EventSubscription::new(1, filter(), MAX_RING_BYTES + 1);
        assert!(matches!(result, Err(AvbError::ResourceExhausted)));
    }

    #[test]
    fn reserved_ring_ids_are_rejected() {
        for id in RESERVED_RING_IDS {
            assert_eq!(validate_ring_id(id), Err(AvbError::InvalidParameter));
        }
        assert!(validate_ring_id(1).is_ok());
    }

    #[test]
    fn pushed_record_round_trips_and_bumps_sequence() {
        let mut sub = EventSubscription::new(1, filter(), 4096).unwrap();
        sub.push_record(1_000, 1, 7);
        assert_eq!(sub.sequence(), 1);
        let rec = sub.read_slot(0).unwrap();
        assert_eq!(rec.sequence, 1);
        assert_eq!(rec.timestamp_ns, 1_000);
        assert_eq!(rec.match_data, 7);
    }
}
