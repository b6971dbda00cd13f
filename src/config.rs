use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::{Parser, ValueEnum};

/// Command line options, parsed once at startup.
#[derive(Parser, Debug, Clone)]
#[command(name = "queuesim")]
#[command(version, about = "Closed queuing-network simulator behind an HTTP endpoint", long_about = None)]
pub struct Args {
    /// Number of service centers (workers) in the finite-server model
    #[arg(long, default_value_t = 1)]
    pub servers: usize,

    /// Service time in milliseconds per request
    #[arg(long = "service-time", default_value_t = 100.0)]
    pub service_time: f64,

    /// Port to listen on
    #[arg(long, default_value_t = 5280)]
    pub port: u16,

    /// Address to bind
    #[arg(long, default_value_t = IpAddr::V4(Ipv4Addr::UNSPECIFIED))]
    pub host: IpAddr,

    /// Bytes to return, currently locked to 0
    #[arg(long, default_value_t = 0)]
    pub bytes: u64,

    /// Dump the smoke-test request and response
    #[arg(short = 'v', long)]
    pub verbose: bool,

    /// Queuing model: a bounded pool of servers, or one server per request
    #[arg(long, value_enum, default_value_t = ServerModel::Finite)]
    pub model: ServerModel,

    /// Capacity of the work queue in front of the pool. Defaults to the server count.
    #[arg(long = "queue-capacity")]
    pub queue_capacity: Option<usize>,

    /// Grace period before the startup smoke test, in milliseconds
    #[arg(long = "smoke-delay-ms", default_value_t = 2000)]
    pub smoke_delay_ms: u64,

    /// Skip the startup smoke test
    #[arg(long = "no-smoke-test")]
    pub no_smoke_test: bool,
}

/// Which queuing discipline the engine simulates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ServerModel {
    /// Requests queue for a fixed pool of service centers.
    Finite,
    /// Every request gets its own service center, no queuing delay.
    Infinite,
}

#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ConfigError {
    #[error("servers must be at least 1 (got {0})")]
    NoServers(usize),
    #[error("service-time must be a finite, non-negative number of milliseconds (got {0})")]
    BadServiceTime(f64),
    #[error("queue-capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Validated, immutable simulator configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    pub servers: usize,
    pub service_time: Duration,
    pub model: ServerModel,
    pub queue_capacity: usize,
    pub listen: SocketAddr,
    pub verbose: bool,
    /// `None` disables the startup smoke test.
    pub smoke_delay: Option<Duration>,
}

impl SimConfig {
    pub fn from_args(args: &Args) -> Result<Self, ConfigError> {
        if args.servers == 0 {
            return Err(ConfigError::NoServers(args.servers));
        }
        if !args.service_time.is_finite() || args.service_time < 0.0 {
            return Err(ConfigError::BadServiceTime(args.service_time));
        }
        let queue_capacity = args.queue_capacity.unwrap_or(args.servers);
        if queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }
        if args.bytes != 0 {
            tracing::warn!(bytes = args.bytes, "response size is not simulated yet, returning a fixed body");
        }

        Ok(Self {
            servers: args.servers,
            service_time: Duration::from_nanos((args.service_time * 1_000_000.0).round() as u64),
            model: args.model,
            queue_capacity,
            listen: SocketAddr::new(args.host, args.port),
            verbose: args.verbose,
            smoke_delay: (!args.no_smoke_test).then(|| Duration::from_millis(args.smoke_delay_ms)),
        })
    }

    /// Builds a config without going through the command line. Listens on an
    /// ephemeral loopback port and skips the smoke test.
    #[cfg(test)]
    pub fn new(servers: usize, service_time: Duration, model: ServerModel) -> Self {
        Self {
            servers,
            service_time,
            model,
            queue_capacity: servers.max(1),
            listen: SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0),
            verbose: false,
            smoke_delay: None,
        }
    }

    #[cfg(test)]
    pub fn with_queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }
}
