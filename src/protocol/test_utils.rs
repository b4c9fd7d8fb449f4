//! Test utilities for protocol decoding.
//!
//! Provides builders for constructing test frames and helpers that run
//! them through a session.

use super::LINKTYPE_ETHERNET;
use crate::pcap::FrameInfo;
use crate::session::{Dissection, Session, SessionConfig};

/// Builder for Ethernet II frames carrying IPv4.
#[derive(Debug, Clone)]
pub struct EthBuilder {
    src_mac: [u8; 6],
    dst_mac: [u8; 6],
}

impl Default for EthBuilder {
    fn default() -> Self {
        Self {
            src_mac: [0x00, 0x11, 0x22, 0x33, 0x44, 0x55],
            dst_mac: [0x66, 0x77, 0x88, 0x99, 0xaa, 0xbb],
        }
    }
}

impl EthBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Frame with an arbitrary ethertype.
    pub fn frame(self, ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = Vec::with_capacity(14 + payload.len());
        frame.extend_from_slice(&self.dst_mac);
        frame.extend_from_slice(&self.src_mac);
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    /// Frame around a complete IPv4 packet.
    pub fn raw_ipv4(self, packet: Vec<u8>) -> Vec<u8> {
        self.frame(0x0800, &packet)
    }

    /// Unfragmented IPv4 packet with the given protocol and payload.
    pub fn ipv4(self, src: [u8; 4], dst: [u8; 4], proto: u8, payload: &[u8]) -> Vec<u8> {
        self.raw_ipv4(ipv4_header(src, dst, proto, 1, false, 0, payload))
    }

    pub fn ipv4_udp(self, src: [u8; 4], dst: [u8; 4], sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        self.ipv4(src, dst, 17, &Self::udp_segment(sport, dport, payload))
    }

    /// TCP segment with sequence number 1000 and the given flag byte.
    pub fn ipv4_tcp(
        self,
        src: [u8; 4],
        dst: [u8; 4],
        sport: u16,
        dport: u16,
        flags: u8,
        payload: &[u8],
    ) -> Vec<u8> {
        let mut tcp = Vec::with_capacity(20 + payload.len());
        tcp.extend_from_slice(&sport.to_be_bytes());
        tcp.extend_from_slice(&dport.to_be_bytes());
        tcp.extend_from_slice(&1000u32.to_be_bytes()); // seq
        tcp.extend_from_slice(&0u32.to_be_bytes()); // ack
        tcp.push(0x50); // data offset 5
        tcp.push(flags);
        tcp.extend_from_slice(&65535u16.to_be_bytes()); // window
        tcp.extend_from_slice(&[0, 0, 0, 0]); // checksum, urgent pointer
        tcp.extend_from_slice(payload);
        self.ipv4(src, dst, 6, &tcp)
    }

    /// UDP header plus payload, checksum zero.
    pub fn udp_segment(sport: u16, dport: u16, payload: &[u8]) -> Vec<u8> {
        let mut udp = Vec::with_capacity(8 + payload.len());
        udp.extend_from_slice(&sport.to_be_bytes());
        udp.extend_from_slice(&dport.to_be_bytes());
        udp.extend_from_slice(&(8 + payload.len() as u16).to_be_bytes());
        udp.extend_from_slice(&[0, 0]);
        udp.extend_from_slice(payload);
        udp
    }
}

/// IPv4 header followed by `payload`. `offset_units` is the fragment
/// offset in 8-byte units.
pub fn ipv4_header(
    src: [u8; 4],
    dst: [u8; 4],
    proto: u8,
    id: u16,
    more_fragments: bool,
    offset_units: u16,
    payload: &[u8],
) -> Vec<u8> {
    let total_length = 20 + payload.len() as u16;
    let flags_fragment = (if more_fragments { 0x2000u16 } else { 0 }) | (offset_units & 0x1fff);

    let mut packet = Vec::with_capacity(total_length as usize);
    packet.push(0x45); // version 4, IHL 5
    packet.push(0x00);
    packet.extend_from_slice(&total_length.to_be_bytes());
    packet.extend_from_slice(&id.to_be_bytes());
    packet.extend_from_slice(&flags_fragment.to_be_bytes());
    packet.push(64); // TTL
    packet.push(proto);
    packet.extend_from_slice(&[0, 0]); // checksum, filled below
    packet.extend_from_slice(&src);
    packet.extend_from_slice(&dst);

    let checksum = ipv4_checksum(&packet);
    packet[10..12].copy_from_slice(&checksum.to_be_bytes());
    packet.extend_from_slice(payload);
    packet
}

fn ipv4_checksum(header: &[u8]) -> u16 {
    let mut sum: u32 = header
        .chunks(2)
        .map(|pair| u16::from_be_bytes([pair[0], *pair.get(1).unwrap_or(&0)]) as u32)
        .sum();
    while sum > 0xffff {
        sum = (sum & 0xffff) + (sum >> 16);
    }
    !(sum as u16)
}

/// RADIUS message with a zero authenticator; the length field covers the
/// attributes given.
pub fn radius_packet(code: u8, id: u8, attrs: &[(u8, &[u8])]) -> Vec<u8> {
    let mut packet = vec![code, id, 0, 0];
    packet.extend_from_slice(&[0u8; 16]);
    for (attr_type, value) in attrs {
        packet.push(*attr_type);
        packet.push(value.len() as u8 + 2);
        packet.extend_from_slice(value);
    }
    let len = packet.len() as u16;
    packet[2..4].copy_from_slice(&len.to_be_bytes());
    packet
}

/// Session wrapper that numbers frames and remembers them so they can be
/// dissected again.
pub struct TestSession {
    session: Session,
    frames: Vec<(FrameInfo, Vec<u8>)>,
}

impl TestSession {
    pub fn new() -> Self {
        Self::with_config(SessionConfig::default())
    }

    pub fn with_config(config: SessionConfig) -> Self {
        Self {
            session: Session::new(config).unwrap(),
            frames: Vec::new(),
        }
    }

    /// Dissect an Ethernet frame captured at `timestamp_us`.
    pub fn dissect(&mut self, timestamp_us: i64, frame: &[u8]) -> Dissection {
        let number = self.frames.len() as u64 + 1;
        let info = FrameInfo::new(number, timestamp_us, frame.len(), LINKTYPE_ETHERNET);
        self.frames.push((info, frame.to_vec()));
        self.session.dissect(&info, frame)
    }

    /// Dissect frame `number` again, as a second pass would.
    pub fn redissect(&mut self, number: u64) -> Dissection {
        let (info, data) = self.frames[number as usize - 1].clone();
        self.session.dissect(&info, &data)
    }
}

/// Dissect a single Ethernet frame in a fresh session.
pub fn dissect_frame(frame: &[u8]) -> Dissection {
    TestSession::new().dissect(0, frame)
}

/// Dissect frames in order in one session, one millisecond apart.
pub fn dissect_frames(frames: &[Vec<u8>]) -> Vec<Dissection> {
    let mut session = TestSession::new();
    frames
        .iter()
        .enumerate()
        .map(|(i, frame)| session.dissect(i as i64 * 1_000, frame))
        .collect()
}
