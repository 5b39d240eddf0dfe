mod capture;
mod filter;
mod models;
mod utils;

use anyhow::{Context, Result};
use clap::Parser;
use log::{debug, info, warn, LevelFilter};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::thread;

use crate::capture::manager::CaptureManager;
use crate::filter::{compile, FilterHandle};
use crate::models::config::{AppConfig, OutputFormat};
use crate::utils::logging;

#[derive(Parser, Debug)]
#[clap(author, version, about = "Raw IPv4 packet sniffer with a small filter language")]
struct Args {
    /// Filter expression, e.g. "src=10.0.0.1 and proto=~^HTTP". Omit to accept everything.
    filter: Option<String>,

    /// Network interface to capture from
    #[clap(short, long)]
    interface: Option<String>,

    /// Replay packets from a pcap file instead of capturing live
    #[clap(short, long, conflicts_with = "interface")]
    read: Option<PathBuf>,

    /// Enable promiscuous mode
    #[clap(short = 'P', long)]
    promiscuous: bool,

    /// Maximum bytes captured per packet
    #[clap(long, default_value = "65535")]
    snaplen: i32,

    /// Read timeout in milliseconds (how quickly Ctrl-C is noticed on a quiet link)
    #[clap(long, default_value = "1000")]
    read_timeout_ms: i32,

    /// Output format for accepted packets
    #[clap(long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Read replacement filters from stdin, one per line (empty line accepts everything)
    #[clap(long)]
    stdin_filters: bool,

    /// Log level (trace, debug, info, warn, error, off); IPSNIFF_LOG refines it per module
    #[clap(long, default_value = "info", value_parser = logging::parse_level)]
    log_level: LevelFilter,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command line arguments
    let args = Args::parse();

    // Initialize logger with specified level
    logging::init_logger(args.log_level);

    info!("Starting ipsniff v{}", env!("CARGO_PKG_VERSION"));

    // Create application config
    let config = AppConfig {
        interface: args.interface,
        read_file: args.read,
        promiscuous: args.promiscuous,
        snaplen: args.snaplen,
        read_timeout_ms: args.read_timeout_ms,
        filter: args.filter,
        format: args.format,
        stdin_filters: args.stdin_filters,
    };
    debug!("Configuration: {:?}", config);

    // Nothing is running yet, so a bad initial filter is fatal
    let initial = compile(config.filter.as_deref().unwrap_or_default())
        .with_context(|| format!("Invalid filter expression: {:?}", config.filter))?;
    info!("Filter set from args: {}", initial);
    let filter = FilterHandle::new(initial);

    if config.stdin_filters {
        spawn_stdin_watcher(filter.clone());
    }

    let manager = CaptureManager::new(config, filter);
    let stop = manager.stop_flag();

    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping capture");
            stop.store(true, Ordering::SeqCst);
        }
    });

    // The capture loop blocks on the device, so keep it off the async workers
    let stats = tokio::task::spawn_blocking(move || manager.run())
        .await
        .context("Capture task panicked")??;

    info!("Sniffer finished: {} packets accepted", stats.accepted);
    Ok(())
}

/// Install each stdin line as the new filter; bad lines are reported and ignored.
///
/// Runs on a plain thread: a blocked stdin read must not hold up runtime shutdown.
fn spawn_stdin_watcher(filter: FilterHandle) {
    info!("Reading filter updates from stdin");
    thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            match line {
                Ok(text) => {
                    // Errors are logged by the handle; the previous filter stays active
                    let _ = filter.update(text.trim());
                }
                Err(e) => {
                    warn!("Failed to read filter update from stdin: {}", e);
                    break;
                }
            }
        }
        debug!("Stdin closed, no further filter updates");
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_app_config() {
        let args = Args::try_parse_from(["ipsniff"]).unwrap();
        let defaults = AppConfig::default();

        assert!(args.filter.is_none());
        assert_eq!(args.snaplen, defaults.snaplen);
        assert_eq!(args.read_timeout_ms, defaults.read_timeout_ms);
        assert_eq!(args.format, defaults.format);
        assert!(!args.promiscuous);
        assert!(!args.stdin_filters);
        assert_eq!(args.log_level, LevelFilter::Info);
    }

    #[test]
    fn unknown_log_level_is_rejected() {
        assert!(Args::try_parse_from(["ipsniff", "--log-level", "loud"]).is_err());
        let args = Args::try_parse_from(["ipsniff", "--log-level", "TRACE"]).unwrap();
        assert_eq!(args.log_level, LevelFilter::Trace);
    }

    #[test]
    fn positional_filter_and_flags() {
        let args = Args::try_parse_from([
            "ipsniff",
            "-i",
            "eth0",
            "-P",
            "--format",
            "json",
            "src=10.0.0.1 and proto=~^HTTP",
        ])
        .unwrap();

        assert_eq!(args.interface.as_deref(), Some("eth0"));
        assert!(args.promiscuous);
        assert_eq!(args.format, OutputFormat::Json);
        assert_eq!(args.filter.as_deref(), Some("src=10.0.0.1 and proto=~^HTTP"));
    }

    #[test]
    fn file_replay_conflicts_with_interface() {
        assert!(Args::try_parse_from(["ipsniff", "-i", "eth0", "-r", "trace.pcap"]).is_err());
    }
}
