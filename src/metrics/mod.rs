pub mod recorder;

pub use recorder::LatencyLog;

use std::time::Duration;

use chrono::{DateTime, Local};

use crate::engine::Served;

/// Column header printed once before the first sample.
pub const HEADER: &str = "#date      time         latency  xferTime thinkTime bytes key rc op";

/// A single latency observation. Written to the log stream and then dropped;
/// nothing is aggregated in memory.
#[derive(Debug, Clone)]
pub struct LatencySample {
    pub admitted_wall: DateTime<Local>,
    /// Admission to completion, queuing included
    pub latency: Duration,
    /// Configured service-time component
    pub service_time: Duration,
    /// Transfer time, always zero until payloads are modelled
    pub xfer_time: f64,
    /// Think time, always zero until client think time is modelled
    pub think_time: f64,
    /// Bytes transferred, always zero until response size is modelled
    pub bytes: u64,
    pub key: String,
    pub status: u16,
    pub verb: &'static str,
}

impl LatencySample {
    pub fn from_served(served: &Served, service_time: Duration) -> Self {
        Self {
            admitted_wall: served.admitted_wall,
            latency: served.elapsed,
            service_time,
            xfer_time: 0.0,
            think_time: 0.0,
            bytes: 0,
            key: served.key.clone(),
            status: 200,
            verb: "GET",
        }
    }

    /// Renders the sample as one log line, without the trailing newline:
    /// `<date> <time> <latency> <xferTime> <thinkTime> <bytes> <key> <rc> <op>`
    pub fn format_line(&self) -> String {
        format!(
            "{} {:.6} {:.1} {:.1} {} {} {} {}",
            self.admitted_wall.format("%Y-%m-%d %H:%M:%S%.3f"),
            self.latency.as_secs_f64(),
            self.xfer_time,
            self.think_time,
            self.bytes,
            self.key,
            self.status,
            self.verb,
        )
    }
}
