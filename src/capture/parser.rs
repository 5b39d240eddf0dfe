use log::{log_enabled, trace, Level};
use pnet::packet::ipv4::Ipv4Packet;

use crate::models::packet::ParsedPacket;
use crate::utils::error::ParseError;

pub const IPV4_MIN_HLEN: usize = 20;
pub const PROTO_ICMP: u8 = 1;
pub const PROTO_IGMP: u8 = 2;
pub const PROTO_TCP: u8 = 6;
pub const PROTO_UDP: u8 = 17;

/// Parse a raw IPv4 datagram into its addressing fields.
///
/// Ports are read for TCP and UDP when at least four bytes follow the IP
/// header; a shorter transport header just leaves them unset.
pub fn extract(data: &[u8]) -> Result<ParsedPacket<'_>, ParseError> {
    let ipv4 = Ipv4Packet::new(data).ok_or(ParseError::TooShort {
        needed: IPV4_MIN_HLEN,
        available: data.len(),
    })?;

    let version = ipv4.get_version();
    if version != 4 {
        return Err(ParseError::UnsupportedVersion(version));
    }

    let header_length = ipv4.get_header_length() as usize * 4;
    if data.len() < header_length {
        return Err(ParseError::TooShort {
            needed: header_length,
            available: data.len(),
        });
    }

    let protocol_number = ipv4.get_next_level_protocol().0;
    let (src_port, dst_port) = match protocol_number {
        PROTO_TCP | PROTO_UDP => match read_ports(data, header_length) {
            Some((src, dst)) => (Some(src), Some(dst)),
            None => (None, None),
        },
        _ => (None, None),
    };

    let packet = ParsedPacket {
        ip_version: version,
        header_length,
        protocol_number,
        src_ip: ipv4.get_source(),
        dst_ip: ipv4.get_destination(),
        src_port,
        dst_port,
        total_length: data.len(),
        raw: data,
    };

    if log_enabled!(Level::Trace) {
        trace!(
            "IPv4 - src: {}, dst: {}, proto: {}, ihl: {}, ports: {:?}/{:?}",
            packet.src_ip,
            packet.dst_ip,
            packet.protocol_number,
            packet.header_length,
            packet.src_port,
            packet.dst_port
        );
    }

    Ok(packet)
}

/// Source and destination port, big-endian, at the start of the transport header
fn read_ports(data: &[u8], offset: usize) -> Option<(u16, u16)> {
    let ports = data.get(offset..offset.checked_add(4)?)?;
    Some((
        u16::from_be_bytes([ports[0], ports[1]]),
        u16::from_be_bytes([ports[2], ports[3]]),
    ))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    /// Builds raw IPv4 datagrams for tests
    pub(crate) struct DatagramBuilder {
        version: u8,
        ihl: u8,
        protocol: u8,
        src: Ipv4Addr,
        dst: Ipv4Addr,
        options: Vec<u8>,
        transport: Vec<u8>,
    }

    impl DatagramBuilder {
        pub(crate) fn new() -> Self {
            Self {
                version: 4,
                ihl: 5,
                protocol: PROTO_TCP,
                src: Ipv4Addr::new(10, 0, 0, 1),
                dst: Ipv4Addr::new(10, 0, 0, 2),
                options: Vec::new(),
                transport: Vec::new(),
            }
        }

        pub(crate) fn version(mut self, version: u8) -> Self {
            self.version = version;
            self
        }

        pub(crate) fn protocol(mut self, protocol: u8) -> Self {
            self.protocol = protocol;
            self
        }

        pub(crate) fn addrs(mut self, src: Ipv4Addr, dst: Ipv4Addr) -> Self {
            self.src = src;
            self.dst = dst;
            self
        }

        /// IP options; IHL is bumped to cover them
        pub(crate) fn options(mut self, options: Vec<u8>) -> Self {
            assert_eq!(options.len() % 4, 0);
            self.ihl = 5 + (options.len() / 4) as u8;
            self.options = options;
            self
        }

        pub(crate) fn ports(mut self, src: u16, dst: u16) -> Self {
            self.transport = [src.to_be_bytes(), dst.to_be_bytes()].concat();
            self
        }

        pub(crate) fn transport(mut self, bytes: Vec<u8>) -> Self {
            self.transport = bytes;
            self
        }

        pub(crate) fn build(self) -> Vec<u8> {
            let header_len = self.ihl as usize * 4;
            let total = (header_len + self.transport.len()) as u16;

            let mut buf = vec![0u8; 20];
            buf[0] = (self.version << 4) | (self.ihl & 0x0f);
            buf[2..4].copy_from_slice(&total.to_be_bytes());
            buf[8] = 64;
            buf[9] = self.protocol;
            buf[12..16].copy_from_slice(&self.src.octets());
            buf[16..20].copy_from_slice(&self.dst.octets());
            buf.extend_from_slice(&self.options);
            buf.extend_from_slice(&self.transport);
            buf
        }
    }

    #[test]
    fn every_buffer_under_twenty_bytes_is_too_short() {
        let full = DatagramBuilder::new().ports(1, 2).build();
        for len in 0..IPV4_MIN_HLEN {
            assert_eq!(
                extract(&full[..len]),
                Err(ParseError::TooShort {
                    needed: IPV4_MIN_HLEN,
                    available: len
                })
            );
        }
    }

    #[test]
    fn every_non_four_version_is_rejected() {
        for version in (0u8..16).filter(|v| *v != 4) {
            let data = DatagramBuilder::new().version(version).build();
            assert_eq!(extract(&data), Err(ParseError::UnsupportedVersion(version)));
        }
    }

    #[test]
    fn header_longer_than_buffer_is_too_short() {
        let mut data = DatagramBuilder::new().build();
        // IHL 15 claims 60 bytes of header
        data[0] = 0x4f;
        assert_eq!(
            extract(&data),
            Err(ParseError::TooShort {
                needed: 60,
                available: 20
            })
        );
    }

    #[test]
    fn crafted_tcp_datagram() {
        let data: Vec<u8> = vec![
            0x45, 0x00, 0x00, 0x1c, 0x00, 0x00, 0x00, 0x00, 0x40, 0x06, 0x00, 0x00, 10, 0, 0, 1,
            10, 0, 0, 2, 0x30, 0x39, 0x00, 0x50,
        ];
        let packet = extract(&data).unwrap();

        assert_eq!(packet.ip_version, 4);
        assert_eq!(packet.header_length, 20);
        assert_eq!(packet.protocol_number, 6);
        assert_eq!(packet.src_ip, Ipv4Addr::new(10, 0, 0, 1));
        assert_eq!(packet.dst_ip, Ipv4Addr::new(10, 0, 0, 2));
        assert_eq!(packet.src_port, Some(12345));
        assert_eq!(packet.dst_port, Some(80));
        assert_eq!(packet.total_length, 24);
        assert_eq!(packet.raw, &data[..]);
    }

    #[test]
    fn ports_follow_ip_options() {
        let data = DatagramBuilder::new()
            .protocol(PROTO_UDP)
            .options(vec![0x01, 0x01, 0x01, 0x00])
            .ports(68, 67)
            .build();
        let packet = extract(&data).unwrap();

        assert_eq!(packet.header_length, 24);
        assert_eq!(packet.src_port, Some(68));
        assert_eq!(packet.dst_port, Some(67));
    }

    #[test]
    fn truncated_transport_header_leaves_ports_unset() {
        let data = DatagramBuilder::new()
            .protocol(PROTO_TCP)
            .transport(vec![0x30, 0x39, 0x00])
            .build();
        let packet = extract(&data).unwrap();

        assert_eq!(packet.protocol_number, PROTO_TCP);
        assert_eq!(packet.src_port, None);
        assert_eq!(packet.dst_port, None);
    }

    #[test]
    fn non_transport_protocols_have_no_ports() {
        let data = DatagramBuilder::new()
            .protocol(PROTO_ICMP)
            .transport(vec![8, 0, 0xf7, 0xff, 0, 0, 0, 0])
            .build();
        let packet = extract(&data).unwrap();

        assert_eq!(packet.protocol_number, PROTO_ICMP);
        assert_eq!(packet.src_port, None);
        assert_eq!(packet.dst_port, None);
    }
}
