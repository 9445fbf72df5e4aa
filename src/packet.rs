//! IPv4/UDP frame handling for DNS interception.

use std::net::Ipv4Addr;

const MIN_FRAME_LEN: usize = 28; // 20-byte IP header + 8-byte UDP header
const UDP_HEADER_LEN: usize = 8;
const DNS_PORT: u16 = 53;

/// A validated outbound IPv4/UDP frame addressed to a DNS resolver.
#[derive(Debug)]
pub struct UdpFrame<'a> {
    packet: &'a [u8],
    header_len: usize,
    pub src_addr: Ipv4Addr,
    pub dst_addr: Ipv4Addr,
    pub src_port: u16,
    pub dst_port: u16,
    pub payload: &'a [u8],
}

impl<'a> UdpFrame<'a> {
    /// Validate and slice one frame read from the interface.
    ///
    /// Returns `None` unless the packet is IPv4, carries UDP, and is
    /// addressed to port 53; everything else is dropped by the caller.
    pub fn parse(packet: &'a [u8]) -> Option<Self> {
        if packet.len() < MIN_FRAME_LEN {
            return None;
        }
        if packet[0] >> 4 != 4 {
            return None;
        }

        let header_len = ((packet[0] & 0x0F) as usize) * 4;
        if header_len < 20 || packet.len() < header_len + UDP_HEADER_LEN {
            return None;
        }
        if packet[9] != 17 {
            return None;
        }

        let udp = &packet[header_len..];
        let src_port = u16::from_be_bytes([udp[0], udp[1]]);
        let dst_port = u16::from_be_bytes([udp[2], udp[3]]);
        if dst_port != DNS_PORT {
            return None;
        }

        Some(Self {
            packet,
            header_len,
            src_addr: Ipv4Addr::new(packet[12], packet[13], packet[14], packet[15]),
            dst_addr: Ipv4Addr::new(packet[16], packet[17], packet[18], packet[19]),
            src_port,
            dst_port,
            payload: &packet[header_len + UDP_HEADER_LEN..],
        })
    }

    /// Build the inbound reply frame for this query: addresses and ports
    /// swapped, both length fields rewritten, IP checksum recomputed,
    /// UDP checksum left disabled (0 is valid for IPv4).
    pub fn reframe(&self, reply: &[u8]) -> Vec<u8> {
        let total_len = self.header_len + UDP_HEADER_LEN + reply.len();
        let mut frame = Vec::with_capacity(total_len);

        // IP header copied from the query, then patched in place
        frame.extend_from_slice(&self.packet[..self.header_len]);
        for i in 0..4 {
            frame[12 + i] = self.packet[16 + i];
            frame[16 + i] = self.packet[12 + i];
        }
        frame[2..4].copy_from_slice(&(total_len as u16).to_be_bytes());
        frame[10] = 0;
        frame[11] = 0;
        let ip_sum = checksum(&frame[..self.header_len]);
        frame[10..12].copy_from_slice(&ip_sum.to_be_bytes());

        // UDP header with the endpoints reversed
        frame.extend_from_slice(&self.dst_port.to_be_bytes());
        frame.extend_from_slice(&self.src_port.to_be_bytes());
        frame.extend_from_slice(&((UDP_HEADER_LEN + reply.len()) as u16).to_be_bytes());
        frame.extend_from_slice(&[0x00, 0x00]);

        frame.extend_from_slice(reply);
        frame
    }
}

/// RFC 1071 internet checksum over big-endian 16-bit words.
pub fn checksum(data: &[u8]) -> u16 {
    let mut sum: u32 = 0;
    let mut i = 0;

    while i + 1 < data.len() {
        sum += u16::from_be_bytes([data[i], data[i + 1]]) as u32;
        i += 2;
    }

    // Odd trailing byte pads low
    if i < data.len() {
        sum += (data[i] as u32) << 8;
    }

    // Fold carries back into the low 16 bits
    while sum >> 16 != 0 {
        sum = (sum & 0xFFFF) + (sum >> 16);
    }

    !sum as u16
}
