//! CLI entry point for telemetry-daq.
//!
//! Provides the command-line interface for:
//! - Running the ingestion server (`serve`)
//! - Pushing one synthetic batch as a device and printing the ack (`send`)
//!
//! # Usage
//!
//! Start the server:
//! ```bash
//! telemetry_daq serve --port 8765 --data-dir ./Data
//! ```
//!
//! Smoke-test it from another shell:
//! ```bash
//! telemetry_daq send --device dev1 --rows 5
//! ```
//!
//! For continuous load, see the `device_sim` binary.

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use mimalloc::MiMalloc;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::info;

use telemetry_daq::config::{TelemetryConfig, DEFAULT_CONFIG_PATH};
use telemetry_daq::data::registry::DeviceRegistry;
use telemetry_daq::data::storage::{CsvSink, DurableSink};
use telemetry_daq::network::server::TelemetryServer;
use telemetry_daq::notify::NotifyQueue;
use telemetry_daq::observer::{self, Observer};
use telemetry_daq::tracing_setup;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

#[derive(Parser)]
#[command(name = "telemetry-daq")]
#[command(about = "Streaming sensor telemetry acquisition server", long_about = None)]
struct Cli {
    /// Path to the configuration file
    #[arg(long, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the ingestion server
    Serve {
        /// Override the configured listen address
        #[arg(long)]
        listen: Option<String>,

        /// Override the configured listen port
        #[arg(long)]
        port: Option<u16>,

        /// Override the configured data directory for device CSV logs
        #[arg(long)]
        data_dir: Option<PathBuf>,
    },

    /// Push one synthetic batch to a running server and print the ack
    Send {
        /// Server address
        #[arg(long, default_value = "127.0.0.1:8765")]
        addr: String,

        /// Device identifier to report
        #[arg(long, default_value = "dev1")]
        device: String,

        /// Number of rows in the batch
        #[arg(long, default_value_t = 5)]
        rows: usize,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Serve {
            listen,
            port,
            data_dir,
        } => {
            let mut config = TelemetryConfig::load_from(&cli.config)
                .with_context(|| format!("loading {}", cli.config.display()))?;
            if let Some(listen) = listen {
                config.server.listen = listen;
            }
            if let Some(port) = port {
                config.server.port = port;
            }
            if let Some(data_dir) = data_dir {
                config.storage.data_dir = data_dir;
            }
            config.validate()?;
            serve(config).await
        }
        Commands::Send { addr, device, rows } => send_batch(&addr, &device, rows).await,
    }
}

async fn serve(config: TelemetryConfig) -> Result<()> {
    tracing_setup::init_from_config(&config)?;
    info!(name = %config.application.name, "starting ingestion server");

    let registry = DeviceRegistry::new(config.server.series_capacity);
    let notifications = Arc::new(NotifyQueue::new(config.server.notify_capacity));
    let sink: Arc<dyn DurableSink> = Arc::new(CsvSink::new(
        &config.storage.data_dir,
        &config.storage.file_prefix,
    )?);

    let observer = Observer::new(registry.clone(), Arc::clone(&notifications));
    tokio::spawn(observer::run_status_loop(
        observer,
        config.observer.status_interval,
    ));

    let server = TelemetryServer::bind(
        &config.listen_addr(),
        registry,
        notifications,
        sink,
        config.server.clock_preamble,
    )
    .await?;

    tokio::select! {
        result = server.run() => result?,
        _ = tokio::signal::ctrl_c() => {
            info!("shutdown signal received, stopping");
        }
    }

    Ok(())
}

async fn send_batch(addr: &str, device: &str, rows: usize) -> Result<()> {
    use rand::Rng;

    if rows == 0 {
        bail!("a batch must contain at least one row");
    }

    let mut stream = TcpStream::connect(addr)
        .await
        .with_context(|| format!("connecting to {addr}"))?;

    let mut message = String::new();
    message.push_str(device);
    message.push('\n');

    let mut rng = rand::thread_rng();
    let base = Utc::now().timestamp_millis() as f64 / 1000.0;
    for i in 0..rows {
        let t = base + i as f64 * 0.01;
        let x: f64 = rng.gen_range(-1.0..1.0);
        let y: f64 = rng.gen_range(-1.0..1.0);
        let z: f64 = 9.81 + rng.gen_range(-0.05..0.05);
        message.push_str(&format!("{t:.3},{x:.4},{y:.4},{z:.4}\n"));
    }
    message.push('\n');

    stream.write_all(message.as_bytes()).await?;

    let mut reader = BufReader::new(stream);
    let mut line = String::new();
    loop {
        line.clear();
        let n = timeout(Duration::from_secs(5), reader.read_line(&mut line))
            .await
            .context("timed out waiting for acknowledgement")??;
        if n == 0 {
            bail!("server closed the connection without acknowledging");
        }
        if line.starts_with("TIME ") {
            // Clock preamble from the server; the ack follows.
            continue;
        }
        print!("{line}");
        return Ok(());
    }
}
