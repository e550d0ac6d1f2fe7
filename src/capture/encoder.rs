//! pcap record encoder for captured UDP datagrams.
//!
//! The format is simple enough that no external crate or libpcap linkage is
//! needed. Each datagram is wrapped in a synthesized IPv4 + UDP header pair so
//! the file replays as real packets (linktype 228, LINKTYPE_IPV4).
//!
//! Every multi-byte field is written in network byte order, including the
//! magic number itself. The on-disk magic is therefore `a1 b2 c3 d4`, the
//! big-endian pcap signature, not the little-endian layout most capture
//! tooling emits. Readers that honor the magic's byte-order signal (tshark,
//! wireshark) handle these files; readers hardcoded to little-endian will
//! not. This matches every capture file this daemon has ever produced, so it
//! is kept as a format contract.
//!
//! Useful resources:
//! * https://wiki.wireshark.org/Development/LibpcapFileFormat
//! * https://www.tcpdump.org/linktypes.html

use std::net::IpAddr;

const MAGIC: u32 = 0xa1b2_c3d4;
const VERSION_MAJOR: u16 = 2;
const VERSION_MINOR: u16 = 4;
const SNAPLEN: u32 = 65535;
const LINKTYPE_IPV4: u32 = 228;

/// pcap global header size.
pub const GLOBAL_HEADER_LEN: usize = 24;
/// pcap per-record header size.
pub const RECORD_HEADER_LEN: usize = 16;
const IP_HEADER_LEN: usize = 20;
const UDP_HEADER_LEN: usize = 8;

/// Bytes added to every datagram: record header + IPv4 header + UDP header.
pub const RECORD_OVERHEAD: usize = RECORD_HEADER_LEN + IP_HEADER_LEN + UDP_HEADER_LEN;

/// Total bytes appended to a capture file for one datagram.
pub fn record_len(payload_len: usize) -> usize {
    RECORD_OVERHEAD + payload_len
}

/// The one-time file header written immediately after a capture file is
/// created, before any record.
pub fn global_header() -> [u8; GLOBAL_HEADER_LEN] {
    let mut hdr = [0u8; GLOBAL_HEADER_LEN];
    hdr[0..4].copy_from_slice(&MAGIC.to_be_bytes());
    hdr[4..6].copy_from_slice(&VERSION_MAJOR.to_be_bytes());
    hdr[6..8].copy_from_slice(&VERSION_MINOR.to_be_bytes());
    // thiszone and sigfigs stay zero
    hdr[16..20].copy_from_slice(&SNAPLEN.to_be_bytes());
    hdr[20..24].copy_from_slice(&LINKTYPE_IPV4.to_be_bytes());
    hdr
}

/// Collapses an address to the four bytes the synthesized IPv4 header can
/// carry: IPv4 as-is, IPv4-mapped IPv6 unmapped, anything else 0.0.0.0.
/// The real endpoint is always recoverable from the capture file name.
fn v4_octets(addr: IpAddr) -> [u8; 4] {
    match addr {
        IpAddr::V4(a) => a.octets(),
        IpAddr::V6(a) => a.to_ipv4_mapped().map(|v4| v4.octets()).unwrap_or([0; 4]),
    }
}

/// Encodes one captured datagram as the exact byte sequence to append.
///
/// Layout: 16-byte record header, 20-byte IPv4 header (version/IHL 0x45,
/// protocol 17, source and destination addresses, every other field zero —
/// total length, TTL and checksum included), 8-byte UDP header (peer port,
/// local port, UDP length, checksum 0), then the raw payload. No checksums
/// are computed. Pure function, no I/O.
pub fn encode_record(
    payload: &[u8],
    peer: (IpAddr, u16),
    local: (IpAddr, u16),
    ts_sec: u32,
    ts_usec: u32,
) -> Vec<u8> {
    let wire_len = (IP_HEADER_LEN + UDP_HEADER_LEN + payload.len()) as u32;
    let udp_len = (UDP_HEADER_LEN + payload.len()) as u16;

    let mut out = Vec::with_capacity(record_len(payload.len()));

    // pcap record header: captured and original length are identical, the
    // whole datagram is always kept.
    out.extend_from_slice(&ts_sec.to_be_bytes());
    out.extend_from_slice(&ts_usec.to_be_bytes());
    out.extend_from_slice(&wire_len.to_be_bytes());
    out.extend_from_slice(&wire_len.to_be_bytes());

    // Synthesized IPv4 header.
    out.push(0x45);
    out.extend_from_slice(&[0u8; 8]); // tos, total length, id, frag, ttl
    out.push(17); // IPPROTO_UDP
    out.extend_from_slice(&[0u8; 2]); // header checksum, unchecked
    out.extend_from_slice(&v4_octets(peer.0));
    out.extend_from_slice(&v4_octets(local.0));

    // Synthesized UDP header.
    out.extend_from_slice(&peer.1.to_be_bytes());
    out.extend_from_slice(&local.1.to_be_bytes());
    out.extend_from_slice(&udp_len.to_be_bytes());
    out.extend_from_slice(&[0u8; 2]); // checksum, unchecked

    out.extend_from_slice(payload);
    out
}
