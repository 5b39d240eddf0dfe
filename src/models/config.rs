use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// How accepted packets are written to stdout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// `Packet: src_ip=..., dst_ip=..., ...` lines
    Text,
    /// One JSON object per line
    Json,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Network interface to capture from
    pub interface: Option<String>,

    /// Replay a pcap file instead of a live interface
    pub read_file: Option<PathBuf>,

    /// Enable promiscuous mode
    pub promiscuous: bool,

    /// Maximum bytes captured per packet
    pub snaplen: i32,

    /// Read timeout for the capture handle, in milliseconds
    pub read_timeout_ms: i32,

    /// Initial filter expression (None or empty accepts everything)
    pub filter: Option<String>,

    /// Sink output format
    pub format: OutputFormat,

    /// Accept replacement filters on stdin, one per line
    pub stdin_filters: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            interface: None,
            read_file: None,
            promiscuous: false,
            snaplen: 65535,
            read_timeout_ms: 1000,
            filter: None,
            format: OutputFormat::Text,
            stdin_filters: false,
        }
    }
}
