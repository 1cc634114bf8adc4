//! Basic plant usage example
//!
//! Runs one plant with the reference timings for a few seconds, then stops
//! it and prints the counters.
//!
//! Run with: RUST_LOG=debug cargo run --example basic_plant

use bottling_plant::prelude::*;
use std::thread;
use std::time::Duration;

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Bottling Plant - Basic Usage Example ===\n");

    let config = PlantConfig::new(4).with_grace_period(Duration::from_secs(1));
    let plant = Plant::new(1, config)?;

    println!("1. Starting {} with {} workers", plant.name(), plant.config().workers);
    plant.start()?;

    for _ in 0..3 {
        thread::sleep(Duration::from_secs(1));
        let stats = plant.stats();
        println!(
            "   supplied={} processed={} queued={}",
            stats.supplied,
            stats.processed,
            plant.queue_len()
        );
    }

    println!("\n2. Stopping and draining the queue");
    let report = plant.stop()?;
    plant.wait_to_stop()?;
    println!(
        "   stopped in {:?} (forced: {})",
        report.elapsed, report.forced
    );

    println!("\n3. Per-worker statistics:");
    for (i, stats) in plant.worker_stats().iter().enumerate() {
        println!(
            "   Worker {}: {} oranges, {:.1}ms average",
            i + 1,
            stats.get_oranges_processed(),
            stats.get_average_processing_time_us() / 1000.0
        );
    }

    println!("\n4. Totals:");
    println!(
        "   Total provided/processed = {}/{}",
        plant.supplied(),
        plant.processed()
    );
    println!("   Created {}, wasted {} oranges", plant.bottles(), plant.waste());

    Ok(())
}
