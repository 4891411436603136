use oob_state_collector::{BatteryReading, Collector, CollectorConfig};
use rand::Rng;
use std::time::{Duration, Instant};
use tokio::net::UdpSocket;
use tokio::time::sleep;

fn random_reading(host: u16) -> BatteryReading {
    let mut rng = rand::thread_rng();
    BatteryReading {
        host,
        soc: rng.gen_range(0..=100),
        charging: rng.gen_bool(0.3),
        temperature: rng.gen_range(-20..=45),
    }
}

async fn run_load(test_duration_secs: u64, target_rate: u64, devices: u16) {
    let total_messages = test_duration_secs * target_rate;

    let config = CollectorConfig {
        http_addr: "127.0.0.1:0".parse().unwrap(),
        udp_addr: "127.0.0.1:0".parse().unwrap(),
        ..CollectorConfig::default()
    };
    let handle = Collector::bind(config).await.unwrap().spawn().unwrap();
    let sender = UdpSocket::bind("127.0.0.1:0").await.unwrap();

    println!("\nTest Configuration:");
    println!("  Target Rate:    {} msg/s", target_rate);
    println!("  Duration:       {} seconds", test_duration_secs);
    println!("  Total Messages: {}", total_messages);
    println!("  Devices:        {}", devices);

    let start = Instant::now();
    let mut sent_count = 0u64;
    let mut error_count = 0u64;

    let burst_size = 100;
    let delay_per_burst = Duration::from_micros((burst_size * 1_000_000) / target_rate);

    for batch_start in (0..total_messages).step_by(burst_size as usize) {
        for i in batch_start..std::cmp::min(batch_start + burst_size, total_messages) {
            let reading = random_reading((i % u64::from(devices)) as u16);
            match sender.send_to(&reading.encode(), handle.udp_addr).await {
                Ok(_) => sent_count += 1,
                Err(e) => {
                    error_count += 1;
                    if error_count < 10 {
                        eprintln!("Send error: {}", e);
                    }
                }
            }
        }

        sleep(delay_per_burst).await;
    }

    let duration = start.elapsed();
    sleep(Duration::from_millis(200)).await;

    println!("\nResults:");
    println!("  Total Sent:     {}", sent_count);
    println!("  Errors:         {}", error_count);
    println!("  Duration:       {:.2}s", duration.as_secs_f64());
    println!(
        "  Actual Rate:    {:.2} msg/s",
        sent_count as f64 / duration.as_secs_f64()
    );
    println!("  Tracked:        {}", handle.table.len());

    let actual_rate = sent_count as f64 / duration.as_secs_f64();
    assert!(
        actual_rate >= 900.0,
        "Throughput too low: {:.2} msg/s (expected >= 900)",
        actual_rate
    );
    assert_eq!(error_count, 0, "Send errors: {}", error_count);
    assert_eq!(handle.table.len(), usize::from(devices));

    handle.stop().await.unwrap();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_1000_reports_per_second() {
    run_load(10, 1000, 10).await;
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
#[ignore]
async fn test_sustained_load_60_seconds() {
    run_load(60, 1000, 500).await;
}
