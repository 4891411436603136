use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::UdpSocket;
use tracing::{debug, info, warn};

use crate::metrics::{DATAGRAMS_TOTAL, REJECTED_DATAGRAMS_TOTAL};
use crate::protocol::{self, DecodeError, MAX_DATAGRAM};
use crate::table::MetricsTable;

/// Receives battery reports until the task is aborted. Malformed datagrams
/// are logged and dropped; nothing is ever sent back to the device.
pub async fn run_listener(socket: UdpSocket, table: Arc<MetricsTable>) {
    match socket.local_addr() {
        Ok(addr) => info!("Listening for state reports on udp://{}", addr),
        Err(e) => warn!("Report socket has no local address: {}", e),
    }

    let mut buf = vec![0u8; MAX_DATAGRAM];
    loop {
        match socket.recv_from(&mut buf).await {
            Ok((len, source)) => {
                // Rejections are logged and counted inside.
                handle_datagram(&buf[..len], source, &table).ok();
            }
            Err(e) => {
                // ICMP errors from earlier sends can surface here on some platforms.
                warn!("Failed to receive datagram: {}", e);
            }
        }
    }
}

/// Decodes one datagram and records it in the table.
pub fn handle_datagram(
    data: &[u8],
    source: SocketAddr,
    table: &MetricsTable,
) -> Result<(), DecodeError> {
    DATAGRAMS_TOTAL.inc();

    match protocol::decode(data, source) {
        Ok((key, report)) => {
            debug!(
                ip = %key.ip,
                host = key.host,
                "SOC: {}, Charging: {}, Temperature: {}, Last Contact: {}",
                report.soc,
                report.charging,
                report.temperature,
                report.observed_at.timestamp()
            );
            table.upsert(key, report);
            Ok(())
        }
        Err(e) => {
            REJECTED_DATAGRAMS_TOTAL.inc();
            warn!("Dropping {} byte datagram from {}: {}", data.len(), source, e);
            Err(e)
        }
    }
}
