mod telemetry;

use std::net::SocketAddr;
use std::time::Duration;

use clap::Parser;
use rand::Rng;
use telemetry::SimulatedDevice;
use tokio::net::UdpSocket;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Emulates a fleet of devices sending battery reports to a collector.
#[derive(Debug, Parser)]
#[command(name = "simulator")]
struct Args {
    /// Collector UDP address
    #[arg(long, env = "SIM_TARGET", default_value = "127.0.0.1:1234")]
    target: SocketAddr,

    /// Number of simulated devices
    #[arg(long, env = "SIM_DEVICES", default_value_t = 10)]
    devices: u16,

    /// Milliseconds between report rounds
    #[arg(long, env = "SIM_INTERVAL_MS", default_value_t = 1000)]
    interval_ms: u64,

    /// Fraction of reports deliberately sent malformed
    #[arg(long, env = "SIM_INVALID_RATIO", default_value_t = 0.0)]
    invalid_ratio: f64,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("Starting device simulator");
    info!(
        "Target: {}, Devices: {}, Interval: {}ms",
        args.target, args.devices, args.interval_ms
    );

    let bind_addr = if args.target.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
    let socket = match UdpSocket::bind(bind_addr).await {
        Ok(socket) => socket,
        Err(e) => {
            error!("Failed to bind sender socket: {}", e);
            std::process::exit(1);
        }
    };

    let invalid_ratio = args.invalid_ratio.clamp(0.0, 1.0);
    let mut rng = rand::thread_rng();
    let mut fleet: Vec<SimulatedDevice> = (0..args.devices)
        .map(|host| SimulatedDevice::new(host, &mut rng))
        .collect();

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut counter = 0u64;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                for device in fleet.iter_mut() {
                    let payload = device.tick(&mut rng).encode();
                    let payload: Vec<u8> = if rng.gen_bool(invalid_ratio) {
                        malformed(&payload, &mut rng)
                    } else {
                        payload.to_vec()
                    };

                    match socket.send_to(&payload, args.target).await {
                        Ok(_) => counter += 1,
                        Err(e) => warn!("Failed to send report for host {}: {}", device.host, e),
                    }
                }

                if counter % 1000 < u64::from(args.devices) {
                    info!("Sent {} reports", counter);
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received shutdown signal after {} reports", counter);
                break;
            }
        }
    }
}

/// Either a wrong protocol version or a truncated frame.
fn malformed(payload: &[u8], rng: &mut impl Rng) -> Vec<u8> {
    if rng.gen_bool(0.5) {
        let mut bad = payload.to_vec();
        bad[0] = rng.gen_range(2..=u8::MAX);
        bad
    } else {
        payload[..rng.gen_range(0..payload.len())].to_vec()
    }
}
