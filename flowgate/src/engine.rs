//! Per-packet admission: parse, emit telemetry, consult the allow-list,
//! decide.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::allowlist::AllowList;
use crate::parser::{parse, ParseResult};
use crate::ring::TelemetryEmitter;

/// Admission decision for one packet. Ephemeral; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Drop,
}

/// Running totals across all workers sharing one engine.
#[derive(Debug, Default)]
pub struct EngineStats {
    pub passed: AtomicU64,
    pub dropped: AtomicU64,
    pub malformed: AtomicU64,
    pub non_tcp: AtomicU64,
    /// Telemetry events discarded because the channel had no room.
    pub telemetry_full: AtomicU64,
}

/// Orchestrates the pipeline for one packet at a time.
///
/// `admit` keeps no cross-packet state and never blocks, loops, or retries;
/// any number of worker threads may share one engine, with the allow-list
/// and the telemetry channel as the only shared structures.
pub struct AdmissionEngine {
    allow: Arc<AllowList>,
    telemetry: TelemetryEmitter,
    stats: EngineStats,
}

impl AdmissionEngine {
    pub fn new(allow: Arc<AllowList>, telemetry: TelemetryEmitter) -> Self {
        Self {
            allow,
            telemetry,
            stats: EngineStats::default(),
        }
    }

    /// Decide one packet.
    ///
    /// `ingress_if` identifies the arrival interface and is carried into
    /// the telemetry record verbatim. The buffer is only borrowed for the
    /// duration of the call.
    pub fn admit(&self, packet: &[u8], ingress_if: u32) -> Verdict {
        match parse(packet, ingress_if) {
            ParseResult::Malformed => {
                // Fail closed: an unparseable frame is never passed.
                tracing::trace!(pkt_len = packet.len(), "dropping malformed frame");
                self.stats.malformed.fetch_add(1, Ordering::Relaxed);
                self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                Verdict::Drop
            }
            ParseResult::NonTcp => {
                // Only TCP is policed; everything else is out of mandate.
                self.stats.non_tcp.fetch_add(1, Ordering::Relaxed);
                self.stats.passed.fetch_add(1, Ordering::Relaxed);
                Verdict::Pass
            }
            ParseResult::Tcp(record) => {
                // Telemetry is best-effort; a full channel must not change
                // the verdict.
                if self.telemetry.emit(&record).is_err() {
                    self.stats.telemetry_full.fetch_add(1, Ordering::Relaxed);
                }
                if self.allow.lookup(record.src_addr) {
                    self.stats.passed.fetch_add(1, Ordering::Relaxed);
                    Verdict::Pass
                } else {
                    // Default deny: no allow-list hit, no admission.
                    tracing::trace!(src_addr = record.src_addr, "dropping unlisted source");
                    self.stats.dropped.fetch_add(1, Ordering::Relaxed);
                    Verdict::Drop
                }
            }
        }
    }

    pub fn stats(&self) -> &EngineStats {
        &self.stats
    }
}
