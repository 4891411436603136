use std::sync::Arc;
use std::time::Duration;

use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::metrics::{EXPIRED_DEVICES_TOTAL, TRACKED_DEVICES};
use crate::table::MetricsTable;

/// Sweeps devices older than `max_age` out of the table every `every`.
///
/// The cadence is independent of the horizon, so a device disappears at most
/// one cadence after its last report crosses `max_age`.
pub async fn run_sweeper(table: Arc<MetricsTable>, every: Duration, max_age: Duration) {
    info!(
        "Starting expiry sweeper with every={:?}, max_age={:?}",
        every, max_age
    );

    let max_age = chrono::Duration::from_std(max_age).unwrap_or(chrono::Duration::MAX);
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;
        sweep_once(&table, max_age);
    }
}

pub fn sweep_once(table: &MetricsTable, max_age: chrono::Duration) -> usize {
    let removed = table.sweep_expired(max_age);
    let remaining = table.len();
    TRACKED_DEVICES.set(remaining as i64);

    if removed > 0 {
        EXPIRED_DEVICES_TOTAL.inc_by(removed as u64);
        info!("Expired {} devices, {} still tracked", removed, remaining);
    } else {
        debug!("Sweep found nothing to expire, {} tracked", remaining);
    }
    removed
}
