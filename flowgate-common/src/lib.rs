#![no_std]

/// Flow summary for one successfully parsed TCP/IPv4 packet, pushed from the
/// packet fast path to the out-of-band observer.
///
/// Kept intentionally small: one record is written per packet on the hot
/// path, so the layout is a fixed 20 bytes with no pointers and no padding.
/// All multi-byte fields are host byte order, normalized once when the
/// parser builds the record from the wire.
///
/// IPv6 support is deferred -- addresses are stored as 32-bit IPv4 for now.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "user", derive(serde::Serialize, serde::Deserialize))]
pub struct FlowRecord {
    /// Source IPv4 address (host byte order).
    pub src_addr: u32,
    /// Destination IPv4 address (host byte order).
    pub dst_addr: u32,
    /// Total packet length: buffer end minus buffer start, taken before any
    /// header is consumed.
    pub pkt_len: u32,
    /// Ingress interface index, supplied by the arrival context rather than
    /// read from the wire.
    pub ingress_if: u32,
    /// TCP source port (host byte order).
    pub src_port: u16,
    /// TCP destination port (host byte order).
    pub dst_port: u16,
}

impl FlowRecord {
    /// Size of the encoded record on the telemetry channel.
    pub const WIRE_LEN: usize = 20;

    /// Serialize into the channel's concrete byte layout.
    ///
    /// Consumers interpret these bytes, never the Rust struct itself, so no
    /// field-order or padding assumption crosses the channel boundary. Both
    /// ends share a host; fields stay native-endian.
    pub fn encode(&self) -> [u8; Self::WIRE_LEN] {
        let mut out = [0u8; Self::WIRE_LEN];
        out[0..4].copy_from_slice(&self.src_addr.to_ne_bytes());
        out[4..8].copy_from_slice(&self.dst_addr.to_ne_bytes());
        out[8..12].copy_from_slice(&self.pkt_len.to_ne_bytes());
        out[12..16].copy_from_slice(&self.ingress_if.to_ne_bytes());
        out[16..18].copy_from_slice(&self.src_port.to_ne_bytes());
        out[18..20].copy_from_slice(&self.dst_port.to_ne_bytes());
        out
    }

    /// Deserialize a record encoded by [`FlowRecord::encode`].
    ///
    /// Returns `None` unless `bytes` is exactly [`FlowRecord::WIRE_LEN`]
    /// long.
    pub fn decode(bytes: &[u8]) -> Option<Self> {
        if bytes.len() != Self::WIRE_LEN {
            return None;
        }
        let u32_at = |off: usize| {
            let mut raw = [0u8; 4];
            raw.copy_from_slice(&bytes[off..off + 4]);
            u32::from_ne_bytes(raw)
        };
        let u16_at = |off: usize| {
            let mut raw = [0u8; 2];
            raw.copy_from_slice(&bytes[off..off + 2]);
            u16::from_ne_bytes(raw)
        };
        Some(Self {
            src_addr: u32_at(0),
            dst_addr: u32_at(4),
            pkt_len: u32_at(8),
            ingress_if: u32_at(12),
            src_port: u16_at(16),
            dst_port: u16_at(18),
        })
    }
}
