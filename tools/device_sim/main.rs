/*
 * Synthetic Device Simulator
 *
 * Connects to a running telemetry server as a single device and streams
 * batches of plausible 3-axis readings on a fixed cadence, reading back the
 * acknowledgement for each batch. Useful for manual load and soak testing
 * without physical hardware.
 *
 * Run several instances with distinct --device names to exercise the
 * concurrent ingestion path.
 *
 * Example:
 *   device_sim --addr 127.0.0.1:8765 --device bench-rig --rows 20 --interval-ms 250
 */

use anyhow::{bail, Context, Result};
use clap::Parser;
use rand::Rng;
use std::f64::consts::TAU;
use std::time::{Duration, Instant};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::{sleep, timeout};

/// Seconds between consecutive samples inside a batch.
const SAMPLE_PERIOD_SECS: f64 = 0.01;

#[derive(Parser)]
#[command(name = "device_sim")]
#[command(about = "Synthetic telemetry device for load and soak testing", long_about = None)]
struct Args {
    /// Server address
    #[arg(long, default_value = "127.0.0.1:8765")]
    addr: String,

    /// Device identifier to report
    #[arg(long, default_value = "sim-0")]
    device: String,

    /// Rows per batch
    #[arg(long, default_value_t = 10)]
    rows: usize,

    /// Delay between batches in milliseconds
    #[arg(long, default_value_t = 500)]
    interval_ms: u64,

    /// Number of batches to send (0 = run until interrupted)
    #[arg(long, default_value_t = 0)]
    batches: u64,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    if args.rows == 0 {
        bail!("--rows must be at least 1");
    }

    let stream = TcpStream::connect(&args.addr)
        .await
        .with_context(|| format!("connecting to {}", args.addr))?;
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half);

    println!(
        "device_sim: streaming as '{}' to {} ({} rows / {} ms)",
        args.device, args.addr, args.rows, args.interval_ms
    );

    let mut rng = rand::thread_rng();
    let mut sample: u64 = 0;
    let mut batch: u64 = 0;

    loop {
        batch += 1;

        let mut message = String::new();
        message.push_str(&args.device);
        message.push('\n');
        for _ in 0..args.rows {
            let t = sample as f64 * SAMPLE_PERIOD_SECS;
            // Slow sway on x/y, gravity plus vibration noise on z.
            let x = (TAU * 0.5 * t).sin() * 0.3 + rng.gen_range(-0.02..0.02);
            let y = (TAU * 0.5 * t).cos() * 0.3 + rng.gen_range(-0.02..0.02);
            let z = 9.81 + rng.gen_range(-0.05..0.05);
            message.push_str(&format!("{t:.3},{x:.4},{y:.4},{z:.4}\n"));
            sample += 1;
        }
        message.push('\n');

        let started = Instant::now();
        write_half.write_all(message.as_bytes()).await?;

        let ack = read_ack(&mut reader).await?;
        let expected = format!("ACK {} {}", args.device, args.rows);
        if ack.trim() != expected {
            bail!("unexpected acknowledgement: '{}'", ack.trim());
        }
        println!(
            "batch {:>6}: {} rows acked in {:?}",
            batch,
            args.rows,
            started.elapsed()
        );

        if args.batches != 0 && batch >= args.batches {
            break;
        }
        sleep(Duration::from_millis(args.interval_ms)).await;
    }

    println!("device_sim: done ({batch} batches)");
    Ok(())
}

/// Read the next acknowledgement line, skipping a clock preamble if the
/// server sends one.
async fn read_ack<R>(reader: &mut R) -> Result<String>
where
    R: AsyncBufReadExt + Unpin,
{
    let mut line = String::new();
    loop {
        line.clear();
        let n = timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .context("timed out waiting for acknowledgement")??;
        if n == 0 {
            bail!("server closed the connection");
        }
        if line.starts_with("TIME ") {
            continue;
        }
        return Ok(line);
    }
}
