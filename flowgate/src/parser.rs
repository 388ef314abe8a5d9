//! Ethernet -> IPv4 -> TCP header decode for the admission fast path.
//!
//! Each layer is read through the bounds-checked [`Cursor`]; truncation at
//! any stage classifies the packet as malformed. Header integers are
//! normalized from network to host byte order as they are decoded.

use crate::cursor::{Cursor, FromWire, OutOfBounds};
use flowgate_common::FlowRecord;

/// IP protocol number for TCP.
pub const IPPROTO_TCP: u8 = 6;

fn be16(bytes: &[u8], off: usize) -> u16 {
    u16::from_be_bytes([bytes[off], bytes[off + 1]])
}

fn be32(bytes: &[u8], off: usize) -> u32 {
    u32::from_be_bytes([bytes[off], bytes[off + 1], bytes[off + 2], bytes[off + 3]])
}

/// Ethernet header, fixed 14 bytes.
///
/// The ethertype is decoded but not enforced: the next layer is always
/// parsed as IPv4, so ARP, IPv6, or VLAN-tagged frames are misread as IPv4
/// rather than rejected at the link layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EthHdr {
    pub dst_addr: [u8; 6],
    pub src_addr: [u8; 6],
    pub ether_type: u16,
}

impl FromWire for EthHdr {
    const WIRE_LEN: usize = 14;

    fn from_wire(bytes: &[u8]) -> Self {
        let mut dst_addr = [0u8; 6];
        let mut src_addr = [0u8; 6];
        dst_addr.copy_from_slice(&bytes[0..6]);
        src_addr.copy_from_slice(&bytes[6..12]);
        Self {
            dst_addr,
            src_addr,
            ether_type: be16(bytes, 12),
        }
    }
}

/// IPv4 header, fixed 20-byte prefix.
///
/// The cursor advances by the fixed prefix, never by IHL, so IPv4 options
/// (when present) are treated as transport payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Ipv4Hdr {
    pub version_ihl: u8,
    pub tos: u8,
    pub tot_len: u16,
    pub id: u16,
    pub frag_off: u16,
    pub ttl: u8,
    pub protocol: u8,
    pub checksum: u16,
    pub src_addr: u32,
    pub dst_addr: u32,
}

impl FromWire for Ipv4Hdr {
    const WIRE_LEN: usize = 20;

    fn from_wire(bytes: &[u8]) -> Self {
        Self {
            version_ihl: bytes[0],
            tos: bytes[1],
            tot_len: be16(bytes, 2),
            id: be16(bytes, 4),
            frag_off: be16(bytes, 6),
            ttl: bytes[8],
            protocol: bytes[9],
            checksum: be16(bytes, 10),
            src_addr: be32(bytes, 12),
            dst_addr: be32(bytes, 16),
        }
    }
}

/// TCP header, fixed 20-byte prefix; options are not parsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TcpHdr {
    pub src_port: u16,
    pub dst_port: u16,
    pub seq: u32,
    pub ack_seq: u32,
    /// Data offset, reserved bits, and flags, undissected.
    pub off_flags: u16,
    pub window: u16,
    pub checksum: u16,
    pub urg_ptr: u16,
}

impl FromWire for TcpHdr {
    const WIRE_LEN: usize = 20;

    fn from_wire(bytes: &[u8]) -> Self {
        Self {
            src_port: be16(bytes, 0),
            dst_port: be16(bytes, 2),
            seq: be32(bytes, 4),
            ack_seq: be32(bytes, 8),
            off_flags: be16(bytes, 12),
            window: be16(bytes, 14),
            checksum: be16(bytes, 16),
            urg_ptr: be16(bytes, 18),
        }
    }
}

/// Outcome of one packet decode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseResult {
    /// Full Ethernet -> IPv4 -> TCP stack decoded.
    Tcp(FlowRecord),
    /// IPv4 but not TCP; outside the filter's mandate.
    NonTcp,
    /// Truncated before the full header stack.
    Malformed,
}

/// Decode one packet's link/network/transport headers.
///
/// `ingress_if` identifies the arrival interface (queue/NIC context); it is
/// carried into the flow record verbatim, never read from the wire. The
/// record's length field is the whole buffer, taken before any header is
/// consumed.
pub fn parse(packet: &[u8], ingress_if: u32) -> ParseResult {
    match parse_inner(packet, ingress_if) {
        Ok(result) => result,
        Err(OutOfBounds) => ParseResult::Malformed,
    }
}

fn parse_inner(packet: &[u8], ingress_if: u32) -> Result<ParseResult, OutOfBounds> {
    let pkt_len = packet.len() as u32;
    let mut cur = Cursor::new(packet);

    // Link layer: only positions the cursor past the header. The ethertype
    // is not checked, so non-IPv4 frames fall through to the IPv4 decode
    // (see EthHdr).
    let _eth: EthHdr = cur.read()?;

    let ip: Ipv4Hdr = cur.read()?;
    if ip.protocol != IPPROTO_TCP {
        return Ok(ParseResult::NonTcp);
    }

    let tcp: TcpHdr = cur.read()?;

    Ok(ParseResult::Tcp(FlowRecord {
        src_addr: ip.src_addr,
        dst_addr: ip.dst_addr,
        pkt_len,
        ingress_if,
        src_port: tcp.src_port,
        dst_port: tcp.dst_port,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::{ipv4_frame, tcp_frame};

    const FULL_STACK_LEN: usize = EthHdr::WIRE_LEN + Ipv4Hdr::WIRE_LEN + TcpHdr::WIRE_LEN;

    #[test]
    fn test_parses_tcp_flow() {
        // 54 header bytes plus 10 bytes of payload.
        let frame = tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 443, 51000, 10);
        assert_eq!(frame.len(), 64);

        let result = parse(&frame, 7);
        assert_eq!(
            result,
            ParseResult::Tcp(FlowRecord {
                src_addr: 0x0A00_0001,
                dst_addr: 0x0A00_0002,
                pkt_len: 64,
                ingress_if: 7,
                src_port: 443,
                dst_port: 51000,
            })
        );
    }

    #[test]
    fn test_pkt_len_is_whole_buffer() {
        // The length field must cover trailing payload beyond the TCP
        // header, not just the parsed prefix.
        let frame = tcp_frame([10, 0, 0, 1], [10, 0, 0, 2], 80, 8080, 100);
        match parse(&frame, 0) {
            ParseResult::Tcp(record) => assert_eq!(record.pkt_len as usize, frame.len()),
            other => panic!("expected Tcp, got {other:?}"),
        }
    }

    #[test]
    fn test_truncation_at_every_boundary_is_malformed() {
        let frame = tcp_frame([192, 168, 1, 5], [192, 168, 1, 6], 12345, 443, 0);
        assert_eq!(frame.len(), FULL_STACK_LEN);

        for len in 0..FULL_STACK_LEN {
            assert_eq!(
                parse(&frame[..len], 0),
                ParseResult::Malformed,
                "a {len}-byte prefix must be malformed"
            );
        }
        assert!(matches!(parse(&frame, 0), ParseResult::Tcp(_)));
    }

    #[test]
    fn test_udp_is_non_tcp() {
        let frame = ipv4_frame(17, [10, 0, 0, 1], [8, 8, 8, 8], &[0u8; 8]);
        assert_eq!(parse(&frame, 0), ParseResult::NonTcp);
    }

    #[test]
    fn test_icmp_is_non_tcp() {
        let frame = ipv4_frame(1, [10, 0, 0, 1], [10, 0, 0, 2], &[0u8; 8]);
        assert_eq!(parse(&frame, 0), ParseResult::NonTcp);
    }

    #[test]
    fn test_non_tcp_without_transport_bytes_is_still_non_tcp() {
        // Classification happens at the IP layer; no transport header is
        // required for the non-TCP verdict.
        let frame = ipv4_frame(17, [10, 0, 0, 1], [8, 8, 8, 8], &[]);
        assert_eq!(parse(&frame, 0), ParseResult::NonTcp);
    }

    #[test]
    fn test_ethertype_is_not_enforced() {
        // Pin the documented gap: a frame with a non-IPv4 ethertype is
        // decoded as IPv4 anyway instead of being rejected at the link
        // layer.
        let mut frame = ipv4_frame(17, [1, 2, 3, 4], [5, 6, 7, 8], &[0u8; 8]);
        frame[12] = 0x08;
        frame[13] = 0x06; // ARP
        assert_eq!(parse(&frame, 0), ParseResult::NonTcp);
    }
}
