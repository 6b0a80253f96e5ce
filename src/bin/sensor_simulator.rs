//! Factory Sensor Feed Simulation
//!
//! Generates wire-format feed pushes for testing Factory Sentinel:
//! - Normal operation with Gaussian sensor noise
//! - Fault episodes (motor overheat, bearing failure, coolant leak) in which
//!   several indicators breach at once and the upstream detector fires
//!
//! # Usage
//! ```bash
//! ./sensor-simulator --count 500 --fault-probability 0.05 | ./factory-sentinel --stdin
//! ```

use std::io::{self, Write};
use std::time::{Duration, Instant};

use clap::Parser;

use factory_sentinel::simulation::{payload_to_json, FaultKind, SensorSimulator};

// ============================================================================
// CLI Arguments
// ============================================================================

#[derive(Parser, Debug)]
#[command(name = "sensor-simulator")]
#[command(about = "Factory sensor feed simulation for Factory Sentinel testing")]
#[command(version = "1.0")]
struct Args {
    /// Number of pushes to emit
    #[arg(short = 'n', long, default_value = "720")]
    count: u64,

    /// Simulated time between readings in milliseconds
    #[arg(long, default_value = "5000")]
    interval_ms: u64,

    /// Entries per push (> 1 emits keyed multi-entry payloads)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u16).range(1..=64))]
    buffered: u16,

    /// Per-reading probability of a fault episode starting
    #[arg(long, default_value = "0.02")]
    fault_probability: f64,

    /// Force a fault episode at this push index
    #[arg(long)]
    fault_at: Option<u64>,

    /// Readings the forced fault lasts
    #[arg(long, default_value = "8")]
    fault_length: u32,

    /// Sleep `interval-ms` between pushes instead of emitting at full speed
    #[arg(long)]
    realtime: bool,

    /// Suppress progress log (only output feed data)
    #[arg(short, long)]
    quiet: bool,

    /// Random seed for reproducibility
    #[arg(long)]
    seed: Option<u64>,
}

fn log_mission(elapsed: Duration, message: &str, quiet: bool) {
    if !quiet {
        eprintln!("[{:>8.1}s] {}", elapsed.as_secs_f64(), message);
    }
}

// ============================================================================
// Main Entry Point
// ============================================================================

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let start = Instant::now();

    let interval = chrono::Duration::milliseconds(i64::try_from(args.interval_ms)?);
    let mut simulator = SensorSimulator::new(args.seed, chrono::Utc::now(), interval)
        .with_fault_probability(args.fault_probability);

    log_mission(start.elapsed(), "FACTORY SENSOR FEED SIMULATION", args.quiet);
    log_mission(
        start.elapsed(),
        &format!(
            "  Pushes: {} | Entries/push: {} | Fault probability: {:.3}",
            args.count, args.buffered, args.fault_probability
        ),
        args.quiet,
    );
    if let Some(seed) = args.seed {
        log_mission(start.elapsed(), &format!("  Random seed: {}", seed), args.quiet);
    }

    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();
    let mut active: Option<FaultKind> = None;

    for push in 0..args.count {
        if args.fault_at == Some(push) {
            simulator.inject_fault(FaultKind::Overheat, args.fault_length);
        }

        let payload = simulator.next_payload(usize::from(args.buffered));

        let fault = simulator.active_fault();
        if fault != active {
            match fault {
                Some(kind) => log_mission(start.elapsed(), &format!(">>> FAULT: {}", kind.name()), args.quiet),
                None => log_mission(start.elapsed(), ">>> Fault cleared", args.quiet),
            }
            active = fault;
        }

        writeln!(stdout_lock, "{}", payload_to_json(&payload)?)?;
        stdout_lock.flush()?;

        if args.realtime {
            std::thread::sleep(Duration::from_millis(args.interval_ms));
        }
    }

    log_mission(
        start.elapsed(),
        &format!(
            "SIMULATION COMPLETE: {} readings, {} in fault episodes",
            simulator.ticks(),
            simulator.fault_ticks()
        ),
        args.quiet,
    );
    Ok(())
}
