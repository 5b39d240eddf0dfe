use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use log::{debug, error, info, warn};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use crate::capture::classifier::classify;
use crate::capture::parser::extract;
use crate::capture::sink::{JsonSink, PacketSink, TextSink};
use crate::capture::source::{CaptureSource, PcapSource};
use crate::filter::{evaluate, FilterHandle, PacketFields};
use crate::models::config::{AppConfig, OutputFormat};
use crate::models::interface::{default_interface, InterfaceInfo};
use crate::models::packet::PacketRecord;
use crate::models::stats::CaptureStats;
use crate::utils::error::CaptureError;

/// Lifecycle of a capture loop; `Stopped` is terminal
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureState {
    Idle,
    Running,
    Stopped,
}

/// Single-threaded capture loop: source → extract → classify → filter → sink.
///
/// Packets are handled strictly in arrival order. The filter is re-read from
/// the shared handle between packets, never during one.
pub struct Sniffer<S: CaptureSource, K: PacketSink> {
    source: S,
    sink: K,
    filter: FilterHandle,
    state: CaptureState,
    stats: CaptureStats,
}

impl<S: CaptureSource, K: PacketSink> Sniffer<S, K> {
    pub fn new(source: S, sink: K, filter: FilterHandle) -> Self {
        Self {
            source,
            sink,
            filter,
            state: CaptureState::Idle,
            stats: CaptureStats::default(),
        }
    }

    pub fn state(&self) -> CaptureState {
        self.state
    }

    pub fn stats(&self) -> &CaptureStats {
        &self.stats
    }

    pub fn into_parts(self) -> (K, CaptureStats) {
        (self.sink, self.stats)
    }

    /// Run until the source closes or fails.
    ///
    /// A clean close returns `Ok`; a source failure is returned as the error.
    /// Either way the loop ends in `Stopped` and cannot be restarted.
    pub fn run(&mut self) -> Result<(), CaptureError> {
        if self.state == CaptureState::Stopped {
            return Err(CaptureError::Closed);
        }

        self.state = CaptureState::Running;
        self.stats.start_time = Some(Utc::now());
        info!("Sniffer started.");

        let result = loop {
            let data = match self.source.next_packet() {
                Ok(data) => data,
                Err(e) if e.is_closed() => break Ok(()),
                Err(e) => break Err(e),
            };

            let filter = &self.filter;
            let sink = &mut self.sink;
            let stats = &mut self.stats;
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                Self::handle_packet(data, filter, sink, stats)
            }));
            if outcome.is_err() {
                self.stats.errors += 1;
                error!("Unexpected failure while processing packet; continuing");
            }
        };

        self.state = CaptureState::Stopped;
        self.stats.end_time = Some(Utc::now());
        match &result {
            Ok(()) => info!("Capture source closed, sniffer stopped"),
            Err(e) => error!("Capture stopped on source failure: {}", e),
        }
        result
    }

    fn handle_packet(data: &[u8], filter: &FilterHandle, sink: &mut K, stats: &mut CaptureStats) {
        stats.total_packets += 1;
        stats.total_bytes += data.len();

        let packet = match extract(data) {
            Ok(packet) => packet,
            Err(e) => {
                stats.dropped += 1;
                debug!("Dropping packet: {}", e);
                return;
            }
        };

        let classification = classify(packet.protocol_number, packet.src_port, packet.dst_port);
        let src_ip = packet.src_ip.to_string();
        let dst_ip = packet.dst_ip.to_string();
        let protocol_label = classification.to_string();

        let active = filter.current();
        let fields = PacketFields {
            src_ip: &src_ip,
            dst_ip: &dst_ip,
            protocol: &protocol_label,
        };
        if !evaluate(&active, &fields) {
            stats.rejected += 1;
            return;
        }

        let record = PacketRecord {
            src_ip,
            dst_ip,
            protocol_label,
            length: packet.total_length,
            raw_hex: hex::encode(packet.raw),
        };

        match sink.accept(&record) {
            Ok(()) => {
                stats.accepted += 1;
                *stats.protocols.entry(record.protocol_label).or_insert(0) += 1;
            }
            Err(e) => {
                stats.errors += 1;
                error!("Failed to emit packet: {:#}", e);
            }
        }
    }
}

/// Opens the configured capture source and output, then runs the loop
pub struct CaptureManager {
    config: AppConfig,
    filter: FilterHandle,
    stop: Arc<AtomicBool>,
}

impl CaptureManager {
    pub fn new(config: AppConfig, filter: FilterHandle) -> Self {
        Self {
            config,
            filter,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Setting this flag makes the source report closure at its next read timeout
    pub fn stop_flag(&self) -> Arc<AtomicBool> {
        self.stop.clone()
    }

    /// Local interfaces as seen by pnet
    pub fn list_interfaces() -> Vec<InterfaceInfo> {
        pnet_datalink::interfaces()
            .iter()
            .map(InterfaceInfo::from_pnet)
            .collect()
    }

    fn resolve_interface(&self) -> Result<String> {
        if let Some(name) = &self.config.interface {
            info!("Using specified interface: {}", name);
            return Ok(name.clone());
        }

        info!("No interface specified, trying to find a default one");
        let interfaces = Self::list_interfaces();
        let chosen = default_interface(&interfaces).ok_or_else(|| {
            anyhow!("No interface specified and no active IPv4 interface found. Use --interface.")
        })?;
        info!("Selected interface {}", chosen.formatted_display());
        Ok(chosen.device_name.clone())
    }

    /// Blocking: returns when the source closes, fails, or the stop flag is set
    pub fn run(self) -> Result<CaptureStats> {
        match &self.config.read_file {
            Some(path) => {
                let source = PcapSource::open_file(path, self.stop.clone())
                    .with_context(|| format!("Failed to open capture file {}", path.display()))?;
                self.run_with_source(source)
            }
            None => {
                let interface = self.resolve_interface()?;
                let source = PcapSource::open_device(&interface, &self.config, self.stop.clone())
                    .with_context(|| {
                        format!(
                            "Failed to open capture on {}. Capturing usually requires root or CAP_NET_RAW.",
                            interface
                        )
                    })?;
                self.run_with_source(source)
            }
        }
    }

    fn run_with_source<S: CaptureSource>(&self, source: S) -> Result<CaptureStats> {
        match self.config.format {
            OutputFormat::Text => self.drive(Sniffer::new(source, TextSink::stdout(), self.filter.clone())),
            OutputFormat::Json => self.drive(Sniffer::new(source, JsonSink::stdout(), self.filter.clone())),
        }
    }

    fn drive<S: CaptureSource, K: PacketSink>(&self, mut sniffer: Sniffer<S, K>) -> Result<CaptureStats> {
        let result = sniffer.run();
        log_summary(sniffer.stats());
        result.context("Capture failed")?;
        let (_, stats) = sniffer.into_parts();
        Ok(stats)
    }
}

fn log_summary(stats: &CaptureStats) {
    info!(
        "Captured {} packets ({} bytes) in {:.1}s: {} accepted, {} rejected, {} dropped, {} errors",
        stats.total_packets,
        stats.total_bytes,
        stats.elapsed_secs(),
        stats.accepted,
        stats.rejected,
        stats.dropped,
        stats.errors
    );
    if stats.dropped > 0 {
        warn!("{} packets could not be parsed as IPv4", stats.dropped);
    }
    let mut protocols: Vec<_> = stats.protocols.iter().collect();
    protocols.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (label, count) in protocols {
        info!("  {}: {}", label, count);
    }
}
