//! Hand-built wire frames for parser and engine tests.
//!
//! Frames are assembled byte-by-byte in network order so the tests exercise
//! the same layout real ingress traffic has. Checksums are left zero; the
//! pipeline never verifies them.

/// Ethernet(14) + IPv4(20) frame carrying `payload` with the given IP
/// protocol number.
pub fn ipv4_frame(protocol: u8, src: [u8; 4], dst: [u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut frame = Vec::with_capacity(34 + payload.len());

    // Ethernet
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x01]); // dst mac
    frame.extend_from_slice(&[0x02, 0x00, 0x00, 0x00, 0x00, 0x02]); // src mac
    frame.extend_from_slice(&0x0800u16.to_be_bytes()); // IPv4

    // IPv4, fixed 20-byte header
    frame.push(0x45); // version 4, IHL 5
    frame.push(0); // tos
    frame.extend_from_slice(&((20 + payload.len()) as u16).to_be_bytes()); // tot_len
    frame.extend_from_slice(&0u16.to_be_bytes()); // id
    frame.extend_from_slice(&0u16.to_be_bytes()); // frag_off
    frame.push(64); // ttl
    frame.push(protocol);
    frame.extend_from_slice(&0u16.to_be_bytes()); // checksum
    frame.extend_from_slice(&src);
    frame.extend_from_slice(&dst);

    frame.extend_from_slice(payload);
    frame
}

/// Full Ethernet + IPv4 + TCP SYN frame, padded with `extra` payload bytes
/// (total length `54 + extra`).
pub fn tcp_frame(src: [u8; 4], dst: [u8; 4], src_port: u16, dst_port: u16, extra: usize) -> Vec<u8> {
    let mut tcp = Vec::with_capacity(20 + extra);
    tcp.extend_from_slice(&src_port.to_be_bytes());
    tcp.extend_from_slice(&dst_port.to_be_bytes());
    tcp.extend_from_slice(&1u32.to_be_bytes()); // seq
    tcp.extend_from_slice(&0u32.to_be_bytes()); // ack
    tcp.extend_from_slice(&0x5002u16.to_be_bytes()); // data offset 5, SYN
    tcp.extend_from_slice(&0xFFFFu16.to_be_bytes()); // window
    tcp.extend_from_slice(&0u16.to_be_bytes()); // checksum
    tcp.extend_from_slice(&0u16.to_be_bytes()); // urgent pointer
    tcp.resize(20 + extra, 0);

    ipv4_frame(6, src, dst, &tcp)
}
