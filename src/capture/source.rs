use log::{info, trace};
use pcap::{Activated, Active, Capture, Linktype, Offline};
use pnet::packet::ethernet::{EtherTypes, EthernetPacket};
use pnet::packet::ipv4::Ipv4Packet;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::capture::parser::IPV4_MIN_HLEN;
use crate::models::config::AppConfig;
use crate::utils::error::CaptureError;

/// Yields raw IP datagrams, one per call.
///
/// Returns `CaptureError::Closed` once the source is exhausted or asked to
/// stop; any other error is a failure of the underlying device.
pub trait CaptureSource {
    fn next_packet(&mut self) -> Result<&[u8], CaptureError>;
}

const ETH_HLEN: usize = 14;
const VLAN_HLEN: usize = 4;
const SLL_HLEN: usize = 16;
const NULL_HLEN: usize = 4;
const ETHERTYPE_IPV4: u16 = 0x0800;
const AF_INET: u32 = 2;

/// Link-layer framing in front of the IP header
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkLayer {
    /// DLT_EN10MB
    Ethernet,
    /// DLT_LINUX_SLL (Linux "any" device)
    LinuxSll,
    /// DLT_NULL / DLT_LOOP: 4-byte address family
    Null,
    /// No link-layer header
    RawIp,
}

impl LinkLayer {
    pub fn from_linktype(linktype: Linktype) -> Option<Self> {
        match linktype.0 {
            1 => Some(LinkLayer::Ethernet),
            113 => Some(LinkLayer::LinuxSll),
            0 | 108 => Some(LinkLayer::Null),
            // DLT_RAW has platform-specific values; 228 is LINKTYPE_IPV4
            12 | 14 | 101 | 228 => Some(LinkLayer::RawIp),
            _ => None,
        }
    }

    /// Offset of the IP header in `frame`, or None if the link header says it is not IPv4.
    ///
    /// The version nibble is left to the extractor, so raw-IP links hand over
    /// IPv6 datagrams and they are counted as drops.
    pub fn ipv4_offset(&self, frame: &[u8]) -> Option<usize> {
        match self {
            LinkLayer::Ethernet => {
                let eth = EthernetPacket::new(frame)?;
                match eth.get_ethertype() {
                    EtherTypes::Ipv4 => Some(ETH_HLEN),
                    EtherTypes::Vlan => {
                        let inner = frame.get(ETH_HLEN + 2..ETH_HLEN + VLAN_HLEN)?;
                        if u16::from_be_bytes([inner[0], inner[1]]) != ETHERTYPE_IPV4 {
                            return None;
                        }
                        Some(ETH_HLEN + VLAN_HLEN)
                    }
                    _ => None,
                }
            }
            LinkLayer::LinuxSll => {
                let proto = frame.get(SLL_HLEN - 2..SLL_HLEN)?;
                if u16::from_be_bytes([proto[0], proto[1]]) != ETHERTYPE_IPV4 {
                    return None;
                }
                Some(SLL_HLEN)
            }
            LinkLayer::Null => {
                let family = frame.get(..NULL_HLEN)?;
                let family = [family[0], family[1], family[2], family[3]];
                // Host byte order for DLT_NULL, network order for DLT_LOOP
                if u32::from_le_bytes(family) != AF_INET && u32::from_be_bytes(family) != AF_INET {
                    return None;
                }
                Some(NULL_HLEN)
            }
            LinkLayer::RawIp => Some(0),
        }
    }
}

/// Length of the datagram at the start of `payload`, without link-layer padding.
///
/// Uses the IPv4 Total Length when it is plausible and otherwise keeps
/// everything captured, so truncated captures report what was seen.
fn datagram_len(payload: &[u8]) -> usize {
    match Ipv4Packet::new(payload) {
        Some(ip) if ip.get_version() == 4 => {
            let total = ip.get_total_length() as usize;
            if total >= IPV4_MIN_HLEN {
                total.min(payload.len())
            } else {
                payload.len()
            }
        }
        _ => payload.len(),
    }
}

/// Capture source backed by libpcap: a live device or a pcap file replay
pub struct PcapSource<T: Activated + ?Sized> {
    capture: Capture<T>,
    link: LinkLayer,
    stop: Arc<AtomicBool>,
    /// Current datagram, valid until the next read
    buf: Vec<u8>,
}

impl PcapSource<Active> {
    /// Open a live capture on `interface`
    pub fn open_device(
        interface: &str,
        config: &AppConfig,
        stop: Arc<AtomicBool>,
    ) -> Result<Self, CaptureError> {
        info!(
            "Opening capture on {} (promiscuous: {}, snaplen: {}, timeout: {}ms)",
            interface, config.promiscuous, config.snaplen, config.read_timeout_ms
        );

        let capture = Capture::from_device(interface)?
            .promisc(config.promiscuous)
            .snaplen(config.snaplen)
            .timeout(config.read_timeout_ms)
            .open()?;

        Self::with_capture(capture, stop)
    }
}

impl PcapSource<Offline> {
    /// Replay packets from a pcap file
    pub fn open_file(path: &Path, stop: Arc<AtomicBool>) -> Result<Self, CaptureError> {
        info!("Replaying packets from {}", path.display());
        let capture = Capture::from_file(path)?;
        Self::with_capture(capture, stop)
    }
}

impl<T: Activated + ?Sized> PcapSource<T> {
    fn with_capture(capture: Capture<T>, stop: Arc<AtomicBool>) -> Result<Self, CaptureError> {
        let linktype = capture.get_datalink();
        let link = LinkLayer::from_linktype(linktype)
            .ok_or(CaptureError::UnsupportedLinkType(linktype.0))?;
        info!("Link layer: {:?}", link);

        Ok(Self {
            capture,
            link,
            stop,
            buf: Vec::with_capacity(65535),
        })
    }
}

impl<T: Activated + ?Sized> CaptureSource for PcapSource<T> {
    fn next_packet(&mut self) -> Result<&[u8], CaptureError> {
        loop {
            if self.stop.load(Ordering::SeqCst) {
                return Err(CaptureError::Closed);
            }

            match self.capture.next_packet() {
                Ok(packet) => match self.link.ipv4_offset(packet.data) {
                    Some(offset) => {
                        let payload = &packet.data[offset..];
                        self.buf.clear();
                        self.buf.extend_from_slice(&payload[..datagram_len(payload)]);
                        break;
                    }
                    None => trace!("Skipping non-IPv4 frame ({} bytes)", packet.data.len()),
                },
                // Read timeout: loop around to check the stop flag
                Err(pcap::Error::TimeoutExpired) => continue,
                Err(pcap::Error::NoMorePackets) => return Err(CaptureError::Closed),
                Err(e) => return Err(e.into()),
            }
        }

        Ok(&self.buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    const IPV4_HEADER: [u8; 20] = [
        0x45, 0, 0, 20, 0, 0, 0, 0, 64, 1, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
    ];

    fn ethernet_frame(ethertype: u16, payload: &[u8]) -> Vec<u8> {
        let mut frame = vec![0xffu8; 12];
        frame.extend_from_slice(&ethertype.to_be_bytes());
        frame.extend_from_slice(payload);
        frame
    }

    #[test]
    fn linktypes_map_to_framing() {
        assert_eq!(LinkLayer::from_linktype(Linktype::ETHERNET), Some(LinkLayer::Ethernet));
        assert_eq!(LinkLayer::from_linktype(Linktype(113)), Some(LinkLayer::LinuxSll));
        assert_eq!(LinkLayer::from_linktype(Linktype(0)), Some(LinkLayer::Null));
        assert_eq!(LinkLayer::from_linktype(Linktype(12)), Some(LinkLayer::RawIp));
        assert_eq!(LinkLayer::from_linktype(Linktype(105)), None);
    }

    #[test]
    fn ethernet_ipv4_and_vlan() {
        let frame = ethernet_frame(0x0800, &IPV4_HEADER);
        assert_eq!(LinkLayer::Ethernet.ipv4_offset(&frame), Some(14));

        let mut tagged = vec![0x00, 0x64, 0x08, 0x00];
        tagged.extend_from_slice(&IPV4_HEADER);
        let frame = ethernet_frame(0x8100, &tagged);
        assert_eq!(LinkLayer::Ethernet.ipv4_offset(&frame), Some(18));
    }

    #[test]
    fn ethernet_non_ipv4_is_skipped() {
        let arp = ethernet_frame(0x0806, &[0u8; 28]);
        assert_eq!(LinkLayer::Ethernet.ipv4_offset(&arp), None);

        let ipv6 = ethernet_frame(0x86dd, &[0x60u8; 40]);
        assert_eq!(LinkLayer::Ethernet.ipv4_offset(&ipv6), None);

        assert_eq!(LinkLayer::Ethernet.ipv4_offset(&[0u8; 10]), None);
    }

    #[test]
    fn sll_null_and_raw() {
        let mut sll = vec![0u8; 14];
        sll.extend_from_slice(&[0x08, 0x00]);
        sll.extend_from_slice(&IPV4_HEADER);
        assert_eq!(LinkLayer::LinuxSll.ipv4_offset(&sll), Some(16));

        let mut null = 2u32.to_le_bytes().to_vec();
        null.extend_from_slice(&IPV4_HEADER);
        assert_eq!(LinkLayer::Null.ipv4_offset(&null), Some(4));

        let mut null_v6 = 30u32.to_le_bytes().to_vec();
        null_v6.extend_from_slice(&[0x60u8; 40]);
        assert_eq!(LinkLayer::Null.ipv4_offset(&null_v6), None);

        assert_eq!(LinkLayer::RawIp.ipv4_offset(&IPV4_HEADER), Some(0));
    }

    #[test]
    fn version_nibble_is_left_to_the_extractor() {
        assert_eq!(LinkLayer::RawIp.ipv4_offset(&[0x60u8; 40]), Some(0));

        let mut null = 2u32.to_le_bytes().to_vec();
        null.extend_from_slice(&[0x60u8; 40]);
        assert_eq!(LinkLayer::Null.ipv4_offset(&null), Some(4));

        let frame = ethernet_frame(0x0800, &[0x60u8; 40]);
        assert_eq!(LinkLayer::Ethernet.ipv4_offset(&frame), Some(14));
    }

    #[test]
    fn datagram_len_trims_padding_only() {
        let mut padded = IPV4_HEADER.to_vec();
        padded.extend_from_slice(&[0u8; 6]);
        assert_eq!(datagram_len(&padded), 20);

        // Truncated capture: keep what was seen
        let mut claims_more = IPV4_HEADER;
        claims_more[3] = 200;
        assert_eq!(datagram_len(&claims_more), 20);

        // Zero Total Length (offloaded segments) or not IPv4: keep everything
        let mut zero = IPV4_HEADER;
        zero[3] = 0;
        assert_eq!(datagram_len(&zero), 20);
        assert_eq!(datagram_len(&[0x60u8; 40]), 40);
        assert_eq!(datagram_len(&[0x45, 0x00]), 2);
    }

    /// Minimal little-endian pcap file with Ethernet link type
    fn write_pcap(path: &Path, frames: &[Vec<u8>]) {
        let mut out = Vec::new();
        out.extend_from_slice(&0xa1b2c3d4u32.to_le_bytes());
        out.extend_from_slice(&2u16.to_le_bytes());
        out.extend_from_slice(&4u16.to_le_bytes());
        out.extend_from_slice(&0i32.to_le_bytes());
        out.extend_from_slice(&0u32.to_le_bytes());
        out.extend_from_slice(&65535u32.to_le_bytes());
        out.extend_from_slice(&1u32.to_le_bytes());
        for (i, frame) in frames.iter().enumerate() {
            out.extend_from_slice(&(i as u32).to_le_bytes());
            out.extend_from_slice(&0u32.to_le_bytes());
            out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            out.extend_from_slice(&(frame.len() as u32).to_le_bytes());
            out.extend_from_slice(frame);
        }
        std::fs::File::create(path).unwrap().write_all(&out).unwrap();
    }

    #[test]
    fn file_replay_yields_ipv4_datagrams_then_closes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("replay.pcap");
        write_pcap(
            &path,
            &[
                ethernet_frame(0x0800, &IPV4_HEADER),
                ethernet_frame(0x0806, &[0u8; 28]),
                ethernet_frame(0x0800, &IPV4_HEADER),
            ],
        );

        let mut source = PcapSource::open_file(&path, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(source.next_packet().unwrap(), &IPV4_HEADER[..]);
        assert_eq!(source.next_packet().unwrap(), &IPV4_HEADER[..]);
        assert!(source.next_packet().unwrap_err().is_closed());
    }

    #[test]
    fn file_replay_strips_ethernet_padding() {
        // 40-byte TCP ACK padded to the 60-byte Ethernet minimum
        let mut ack = vec![
            0x45, 0, 0, 40, 0, 0, 0, 0, 64, 6, 0, 0, 10, 0, 0, 1, 10, 0, 0, 2,
        ];
        ack.extend_from_slice(&[0x30, 0x39, 0x00, 0x50]);
        ack.resize(40, 0x11);
        let mut frame = ethernet_frame(0x0800, &ack);
        frame.resize(60, 0);

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("padded.pcap");
        write_pcap(&path, &[frame]);

        let mut source = PcapSource::open_file(&path, Arc::new(AtomicBool::new(false))).unwrap();
        assert_eq!(source.next_packet().unwrap(), &ack[..]);
        assert!(source.next_packet().unwrap_err().is_closed());
    }

    #[test]
    fn stop_flag_closes_source() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("stop.pcap");
        write_pcap(&path, &[ethernet_frame(0x0800, &IPV4_HEADER)]);

        let stop = Arc::new(AtomicBool::new(true));
        let mut source = PcapSource::open_file(&path, stop).unwrap();
        assert!(source.next_packet().unwrap_err().is_closed());
    }
}
