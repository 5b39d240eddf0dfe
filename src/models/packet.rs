use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;

/// Fields extracted from one IPv4 datagram.
///
/// Borrows the raw bytes for the duration of one capture loop iteration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedPacket<'a> {
    /// Always 4
    pub ip_version: u8,

    /// IHL * 4
    pub header_length: usize,

    /// IP protocol number (6 = TCP, 17 = UDP, ...)
    pub protocol_number: u8,

    pub src_ip: Ipv4Addr,
    pub dst_ip: Ipv4Addr,

    /// Present only for TCP/UDP with at least 4 bytes of transport header
    pub src_port: Option<u16>,
    pub dst_port: Option<u16>,

    /// Number of bytes captured for this datagram
    pub total_length: usize,

    /// The datagram as delivered by the capture source
    pub raw: &'a [u8],
}

/// Application-level label assigned to a packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Classification {
    Http,
    Dns,
    Dhcp,
    Icmp,
    Tcp,
    Udp,
    Igmp,
    /// Raw protocol number with no higher-level label
    Unknown(u8),
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Classification::Http => f.write_str("HTTP"),
            Classification::Dns => f.write_str("DNS"),
            Classification::Dhcp => f.write_str("DHCP"),
            Classification::Icmp => f.write_str("ICMP"),
            Classification::Tcp => f.write_str("TCP"),
            Classification::Udp => f.write_str("UDP"),
            Classification::Igmp => f.write_str("IGMP"),
            Classification::Unknown(n) => write!(f, "Unknown({})", n),
        }
    }
}

/// Record handed to the sink for every accepted packet
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PacketRecord {
    /// Source IP address, dotted quad
    pub src_ip: String,

    /// Destination IP address, dotted quad
    pub dst_ip: String,

    /// Classification label (e.g. HTTP, DNS, Unknown(47))
    pub protocol_label: String,

    /// Length of the datagram in bytes
    pub length: usize,

    /// Full datagram as lowercase hex
    pub raw_hex: String,
}
