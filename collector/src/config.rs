use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::Duration;

use clap::Parser;
use tokio::net::lookup_host;

use crate::errors::{Error, Result};

pub const DEFAULT_TCP_PORT: u16 = 9091;
pub const DEFAULT_UDP_PORT: u16 = 1234;
pub const DEFAULT_STATISTICS_TIMEOUT_SECS: u64 = 900;
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 30;

/// Command line of the collector binary. Every flag can also come from the
/// environment.
#[derive(Debug, Clone, Parser)]
#[command(name = "oob-state-collector", about = "Out-of-band state collector", version)]
pub struct Args {
    /// TCP listen address or hostname for the metrics endpoint (empty = all interfaces)
    #[arg(long, env = "OOB_TCP_LISTEN_ADDRESS")]
    pub tcp_listen_address: Option<String>,

    /// UDP listen address or hostname for state reports (empty = all interfaces)
    #[arg(long, env = "OOB_UDP_LISTEN_ADDRESS")]
    pub udp_listen_address: Option<String>,

    /// TCP port
    #[arg(long, env = "OOB_TCP_LISTEN_PORT", default_value_t = DEFAULT_TCP_PORT)]
    pub tcp_listen_port: u16,

    /// UDP port
    #[arg(long, env = "OOB_UDP_LISTEN_PORT", default_value_t = DEFAULT_UDP_PORT)]
    pub udp_listen_port: u16,

    /// Seconds without a report before a device is dropped
    #[arg(long, env = "OOB_STATISTICS_TIMEOUT", default_value_t = DEFAULT_STATISTICS_TIMEOUT_SECS)]
    pub statistics_timeout: u64,

    /// Seconds between expiry sweeps
    #[arg(long, env = "OOB_SWEEP_INTERVAL", default_value_t = DEFAULT_SWEEP_INTERVAL_SECS)]
    pub sweep_interval: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CollectorConfig {
    pub http_addr: SocketAddr,
    pub udp_addr: SocketAddr,
    pub statistics_timeout: Duration,
    pub sweep_interval: Duration,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        let any = IpAddr::V4(Ipv4Addr::UNSPECIFIED);
        Self {
            http_addr: SocketAddr::new(any, DEFAULT_TCP_PORT),
            udp_addr: SocketAddr::new(any, DEFAULT_UDP_PORT),
            statistics_timeout: Duration::from_secs(DEFAULT_STATISTICS_TIMEOUT_SECS),
            sweep_interval: Duration::from_secs(DEFAULT_SWEEP_INTERVAL_SECS),
        }
    }
}

impl CollectorConfig {
    /// Builds the configuration from the command line, resolving listen
    /// addresses that are hostnames rather than IP literals.
    pub async fn from_args(args: Args) -> Result<Self> {
        let http_addr =
            listen_addr(args.tcp_listen_address.as_deref(), args.tcp_listen_port).await?;
        let udp_addr =
            listen_addr(args.udp_listen_address.as_deref(), args.udp_listen_port).await?;
        let config = Self {
            http_addr,
            udp_addr,
            statistics_timeout: Duration::from_secs(args.statistics_timeout),
            sweep_interval: Duration::from_secs(args.sweep_interval),
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.sweep_interval.is_zero() {
            return Err(Error::Config("sweep interval must be non-zero".into()));
        }
        Ok(())
    }
}

async fn listen_addr(address: Option<&str>, port: u16) -> Result<SocketAddr> {
    let address = address
        .unwrap_or_default()
        .trim()
        .trim_start_matches('[')
        .trim_end_matches(']');
    if address.is_empty() {
        return Ok(SocketAddr::new(IpAddr::V4(Ipv4Addr::UNSPECIFIED), port));
    }

    if let Ok(ip) = address.parse::<IpAddr>() {
        return Ok(SocketAddr::new(ip, port));
    }

    lookup_host((address, port))
        .await
        .map_err(|e| Error::Config(format!("cannot resolve listen address {:?}: {}", address, e)))?
        .next()
        .ok_or_else(|| Error::Config(format!("listen address {:?} resolved to nothing", address)))
}
