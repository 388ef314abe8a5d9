//! Bounded lock-free telemetry channel between the packet fast path and an
//! out-of-band observer.
//!
//! Producers follow a reserve/populate/publish protocol per slot: a position
//! is claimed, the record bytes are written, and only then does the slot's
//! sequence word advance to make it readable. The consumer can therefore
//! never observe a reserved-but-uncommitted slot, and records drain in
//! publish order, whole or not at all. Nothing on either side blocks.

use std::cell::UnsafeCell;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crossbeam_utils::CachePadded;
use flowgate_common::FlowRecord;
use thiserror::Error;

/// Default channel budget, 1 MiB.
pub const DEFAULT_RING_BYTES: usize = 1 << 20;

/// No slot is free; the caller discards the event and moves on.
///
/// Telemetry is best-effort: this is counted, never waited out, and it
/// must not influence the admission verdict.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("telemetry channel full")]
pub struct ChannelFull;

/// One ring slot: a sequence word plus the encoded record payload.
///
/// The sequence drives the slot protocol. For position `pos`, the slot is
/// free while `seq == pos`; the producer that claims `pos` stores
/// `pos + 1` only after the payload is fully written, and the consumer
/// recycles the slot one lap ahead (`pos + capacity`) after copying it out.
struct Slot {
    seq: AtomicUsize,
    payload: UnsafeCell<[u8; FlowRecord::WIRE_LEN]>,
}

struct Shared {
    slots: Box<[Slot]>,
    mask: usize,
    /// Next position a producer will try to reserve.
    head: CachePadded<AtomicUsize>,
    /// Next position the consumer will try to drain.
    tail: CachePadded<AtomicUsize>,
}

// SAFETY: a slot's payload is only written by the producer that reserved
// the position (before its Release publish) and only read by the consumer
// after an Acquire load observes that publish; the sequence word hands the
// cell back and forth with those fences in place.
unsafe impl Send for Shared {}
unsafe impl Sync for Shared {}

/// Create a telemetry channel with a power-of-two byte budget.
///
/// The budget is an upper bound on the ring's memory: the slot count is
/// `byte_budget / slot stride`, rounded down to a power of two so positions
/// can be masked.
///
/// # Panics
///
/// Panics when `byte_budget` is not a power of two or is too small to hold
/// two slots. The budget comes from startup configuration, so a bad value
/// fails the process before any packet is seen.
pub fn telemetry_channel(byte_budget: usize) -> (TelemetryEmitter, TelemetryDrain) {
    assert!(
        byte_budget.is_power_of_two(),
        "ring byte budget must be a power of two"
    );
    let mut capacity = byte_budget / std::mem::size_of::<Slot>();
    if !capacity.is_power_of_two() {
        capacity = capacity.next_power_of_two() >> 1;
    }
    assert!(capacity >= 2, "ring byte budget too small");

    let slots = (0..capacity)
        .map(|pos| Slot {
            seq: AtomicUsize::new(pos),
            payload: UnsafeCell::new([0u8; FlowRecord::WIRE_LEN]),
        })
        .collect();

    let shared = Arc::new(Shared {
        slots,
        mask: capacity - 1,
        head: CachePadded::new(AtomicUsize::new(0)),
        tail: CachePadded::new(AtomicUsize::new(0)),
    });

    (
        TelemetryEmitter {
            shared: Arc::clone(&shared),
        },
        TelemetryDrain { shared },
    )
}

/// Producer handle for the packet fast path.
///
/// Clone one per worker; `emit` never blocks and never spins unbounded.
#[derive(Clone)]
pub struct TelemetryEmitter {
    shared: Arc<Shared>,
}

impl TelemetryEmitter {
    /// Push one record, or report [`ChannelFull`] immediately.
    pub fn emit(&self, record: &FlowRecord) -> Result<(), ChannelFull> {
        let bytes = record.encode();
        let ring = &*self.shared;
        let mut head = ring.head.load(Ordering::Relaxed);
        loop {
            let slot = &ring.slots[head & ring.mask];
            let seq = slot.seq.load(Ordering::Acquire);
            let dif = seq as isize - head as isize;
            if dif == 0 {
                // Reserve: claim this position against rival producers.
                match ring.head.compare_exchange_weak(
                    head,
                    head.wrapping_add(1),
                    Ordering::Relaxed,
                    Ordering::Relaxed,
                ) {
                    Ok(_) => {
                        // Populate, then publish. The Release store is what
                        // makes the payload visible; until then the slot
                        // reads as unwritten.
                        unsafe { *slot.payload.get() = bytes };
                        slot.seq.store(head.wrapping_add(1), Ordering::Release);
                        return Ok(());
                    }
                    Err(current) => head = current,
                }
            } else if dif < 0 {
                // Slot still holds a record from one lap ago.
                return Err(ChannelFull);
            } else {
                // Another producer claimed this position; move up.
                head = ring.head.load(Ordering::Relaxed);
            }
        }
    }

    /// Number of records the channel can hold.
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }
}

/// Consumer handle. Exactly one exists per channel and it is not `Clone`;
/// draining is single-consumer by construction.
pub struct TelemetryDrain {
    shared: Arc<Shared>,
}

impl TelemetryDrain {
    /// Pop the oldest published record's raw wire bytes, if any.
    ///
    /// A reservation still being populated is invisible here: the slot at
    /// the tail only becomes readable once its producer has published.
    pub fn try_next_raw(&mut self) -> Option<[u8; FlowRecord::WIRE_LEN]> {
        let ring = &*self.shared;
        let tail = ring.tail.load(Ordering::Relaxed);
        let slot = &ring.slots[tail & ring.mask];
        let seq = slot.seq.load(Ordering::Acquire);
        if seq != tail.wrapping_add(1) {
            return None;
        }
        let bytes = unsafe { *slot.payload.get() };
        ring.tail.store(tail.wrapping_add(1), Ordering::Relaxed);
        // Recycle the slot for the producers' next lap.
        slot.seq
            .store(tail.wrapping_add(ring.mask).wrapping_add(1), Ordering::Release);
        Some(bytes)
    }

    /// Pop and decode the oldest published record, if any.
    pub fn try_next(&mut self) -> Option<FlowRecord> {
        self.try_next_raw()
            .and_then(|bytes| FlowRecord::decode(&bytes))
    }

    /// Number of records the channel can hold.
    pub fn capacity(&self) -> usize {
        self.shared.mask + 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::thread;

    fn record(src_addr: u32) -> FlowRecord {
        FlowRecord {
            src_addr,
            dst_addr: src_addr ^ 0xDEAD_BEEF,
            pkt_len: 64,
            ingress_if: 1,
            src_port: 443,
            dst_port: 51000,
        }
    }

    #[test]
    fn test_capacity_from_byte_budget() {
        let (emitter, _drain) = telemetry_channel(1024);
        // 1024 bytes over 32-byte slots.
        assert_eq!(emitter.capacity(), 1024 / std::mem::size_of::<Slot>());
        assert!(emitter.capacity().is_power_of_two());
    }

    #[test]
    #[should_panic(expected = "power of two")]
    fn test_rejects_non_power_of_two_budget() {
        let _ = telemetry_channel(1000);
    }

    #[test]
    fn test_drains_in_publish_order() {
        let (emitter, mut drain) = telemetry_channel(4096);
        for i in 0..10 {
            emitter.emit(&record(i)).unwrap();
        }
        for i in 0..10 {
            assert_eq!(drain.try_next().unwrap().src_addr, i);
        }
        assert_eq!(drain.try_next(), None);
    }

    #[test]
    fn test_full_channel_reports_without_blocking() {
        let (emitter, mut drain) = telemetry_channel(128);
        let capacity = emitter.capacity();

        for i in 0..capacity as u32 {
            emitter.emit(&record(i)).unwrap();
        }
        assert_eq!(emitter.emit(&record(999)), Err(ChannelFull));

        // Draining one slot makes room for exactly one more record.
        assert_eq!(drain.try_next().unwrap().src_addr, 0);
        emitter.emit(&record(1000)).unwrap();
        assert_eq!(emitter.emit(&record(1001)), Err(ChannelFull));
    }

    #[test]
    fn test_ring_wraps_across_many_laps() {
        let (emitter, mut drain) = telemetry_channel(128);
        let capacity = emitter.capacity() as u32;
        for i in 0..capacity * 5 {
            emitter.emit(&record(i)).unwrap();
            assert_eq!(drain.try_next().unwrap().src_addr, i);
        }
    }

    #[test]
    fn test_concurrent_producers_no_torn_records() {
        const PRODUCERS: u32 = 4;
        const PER_PRODUCER: u32 = 5000;

        let (emitter, mut drain) = telemetry_channel(4096);

        let producers: Vec<_> = (0..PRODUCERS)
            .map(|tid| {
                let emitter = emitter.clone();
                thread::spawn(move || {
                    let mut full = 0u32;
                    for seq in 0..PER_PRODUCER {
                        if emitter.emit(&record((tid << 24) | seq)).is_err() {
                            full += 1;
                        }
                    }
                    full
                })
            })
            .collect();

        fn check(rec: &FlowRecord, seen: &mut HashSet<u32>, drained: &mut u32) {
            // A torn or duplicated record breaks one of these.
            assert_eq!(rec.dst_addr, rec.src_addr ^ 0xDEAD_BEEF);
            assert!(seen.insert(rec.src_addr), "duplicate record");
            *drained += 1;
        }

        let mut seen = HashSet::new();
        let mut drained = 0u32;
        loop {
            if let Some(rec) = drain.try_next() {
                check(&rec, &mut seen, &mut drained);
                continue;
            }
            if producers.iter().all(|h| h.is_finished()) {
                // Producers are done; one last sweep empties the channel.
                while let Some(rec) = drain.try_next() {
                    check(&rec, &mut seen, &mut drained);
                }
                break;
            }
            thread::yield_now();
        }

        let full: u32 = producers.into_iter().map(|h| h.join().unwrap()).sum();
        assert_eq!(drained + full, PRODUCERS * PER_PRODUCER);
    }
}
