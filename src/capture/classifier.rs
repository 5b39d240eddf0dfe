use crate::capture::parser::{PROTO_ICMP, PROTO_IGMP, PROTO_TCP, PROTO_UDP};
use crate::models::packet::Classification;

const HTTP_PORTS: &[u16] = &[80, 443];
const DNS_PORTS: &[u16] = &[53];
const DHCP_PORTS: &[u16] = &[67, 68];

/// Map protocol number and ports to a label.
///
/// Port rules are checked in order (HTTP, then DNS, then DHCP); missing
/// ports never match, so a truncated TCP/UDP packet keeps its base label.
pub fn classify(protocol_number: u8, src_port: Option<u16>, dst_port: Option<u16>) -> Classification {
    let either = |ports: &[u16]| {
        [src_port, dst_port]
            .iter()
            .flatten()
            .any(|port| ports.contains(port))
    };

    match protocol_number {
        PROTO_TCP if either(HTTP_PORTS) => Classification::Http,
        PROTO_TCP => Classification::Tcp,
        PROTO_UDP if either(DNS_PORTS) => Classification::Dns,
        PROTO_UDP if either(DHCP_PORTS) => Classification::Dhcp,
        PROTO_UDP => Classification::Udp,
        PROTO_ICMP => Classification::Icmp,
        PROTO_IGMP => Classification::Igmp,
        other => Classification::Unknown(other),
    }
}
