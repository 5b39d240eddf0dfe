use serde::{Serialize, Deserialize};
use std::net::{IpAddr, Ipv4Addr};

/// Summary of a local network interface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InterfaceInfo {
    /// Device system name (used for capture operations)
    pub device_name: String,

    /// First IPv4 address, if any
    pub ipv4_address: Option<Ipv4Addr>,

    /// Whether this is a loopback interface
    pub is_loopback: bool,

    /// Whether this interface is up/active
    pub is_up: bool,
}

impl InterfaceInfo {
    pub fn from_pnet(iface: &pnet_datalink::NetworkInterface) -> Self {
        let ipv4_address = iface.ips.iter().find_map(|net| match net.ip() {
            IpAddr::V4(addr) => Some(addr),
            IpAddr::V6(_) => None,
        });

        Self {
            device_name: iface.name.clone(),
            ipv4_address,
            is_loopback: iface.is_loopback(),
            is_up: iface.is_up(),
        }
    }

    /// Up, not loopback, and holding an IPv4 address
    pub fn is_capture_candidate(&self) -> bool {
        self.is_up && !self.is_loopback && self.ipv4_address.is_some()
    }

    /// Interface name with its IPv4 address (if available)
    pub fn formatted_display(&self) -> String {
        match &self.ipv4_address {
            Some(ip) => format!("{} ({})", self.device_name, ip),
            None => self.device_name.clone(),
        }
    }
}

/// Pick the interface to capture on when none was given
pub fn default_interface(interfaces: &[InterfaceInfo]) -> Option<&InterfaceInfo> {
    interfaces.iter().find(|i| i.is_capture_candidate())
}
