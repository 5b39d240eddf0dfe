use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use chrono::{DateTime, Utc};

/// Statistics for one capture run
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct CaptureStats {
    /// Total number of datagrams read from the source
    pub total_packets: usize,

    /// Total bytes read from the source
    pub total_bytes: usize,

    /// Packets handed to the sink
    pub accepted: usize,

    /// Packets rejected by the active filter
    pub rejected: usize,

    /// Packets dropped because extraction failed
    pub dropped: usize,

    /// Accepted packets per classification label
    pub protocols: HashMap<String, usize>,

    /// Capture start time
    pub start_time: Option<DateTime<Utc>>,

    /// Capture end time (if stopped)
    pub end_time: Option<DateTime<Utc>>,

    /// Non-fatal errors during an iteration (e.g. sink write failures)
    pub errors: usize,
}

impl CaptureStats {
    /// Seconds between start and end (or now, while running)
    pub fn elapsed_secs(&self) -> f64 {
        match self.start_time {
            Some(start) => {
                let end = self.end_time.unwrap_or_else(Utc::now);
                end.signed_duration_since(start).num_milliseconds() as f64 / 1000.0
            }
            None => 0.0,
        }
    }
}
