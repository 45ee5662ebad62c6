//! TCP listener and per-connection protocol loop.
//!
//! The listener accepts connections indefinitely and spawns one handler task
//! per connection, with no cap on concurrent connections; this serves a
//! small fleet of cooperating devices, not the public internet. Handlers
//! share only the device registry and the notification queue, both
//! internally synchronized; every other failure is fatal to its own
//! connection and to nothing else.

use std::net::SocketAddr;
use std::sync::Arc;

use chrono::Utc;
use tokio::io::{AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::data::registry::DeviceRegistry;
use crate::data::storage::DurableSink;
use crate::error::AppResult;
use crate::network::protocol::{
    format_ack, format_clock_preamble, parse_payload, read_message,
};
use crate::notify::NotifyQueue;

/// The ingestion server: one listening socket plus its shared collaborators.
pub struct TelemetryServer {
    listener: TcpListener,
    registry: DeviceRegistry,
    notifications: Arc<NotifyQueue>,
    sink: Arc<dyn DurableSink>,
    clock_preamble: bool,
}

impl TelemetryServer {
    /// Bind the listening socket. The registry, queue, and sink are injected
    /// so the server can be driven against test doubles.
    pub async fn bind(
        addr: &str,
        registry: DeviceRegistry,
        notifications: Arc<NotifyQueue>,
        sink: Arc<dyn DurableSink>,
        clock_preamble: bool,
    ) -> AppResult<Self> {
        let listener = TcpListener::bind(addr).await?;
        info!(%addr, "telemetry server listening");

        Ok(Self {
            listener,
            registry,
            notifications,
            sink,
            clock_preamble,
        })
    }

    /// The address the listener actually bound (useful with port 0).
    pub fn local_addr(&self) -> AppResult<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept connections until the task is dropped.
    pub async fn run(self) -> AppResult<()> {
        loop {
            match self.listener.accept().await {
                Ok((socket, addr)) => {
                    let registry = self.registry.clone();
                    let notifications = Arc::clone(&self.notifications);
                    let sink = Arc::clone(&self.sink);
                    let clock_preamble = self.clock_preamble;

                    tokio::spawn(async move {
                        if let Err(e) =
                            handle_connection(socket, addr, registry, notifications, sink, clock_preamble)
                                .await
                        {
                            warn!(%addr, error = %e, "connection error");
                        }
                    });
                }
                Err(e) => error!(error = %e, "accept error"),
            }
        }
    }
}

/// Per-connection protocol loop.
///
/// Reads framed messages until end-of-stream, applying each valid batch to
/// the registry, publishing the hint, appending to the sink, and
/// acknowledging. Invalid batches are logged and skipped without a
/// response; the connection stays open for the next message.
async fn handle_connection(
    socket: TcpStream,
    addr: SocketAddr,
    registry: DeviceRegistry,
    notifications: Arc<NotifyQueue>,
    sink: Arc<dyn DurableSink>,
    clock_preamble: bool,
) -> AppResult<()> {
    let conn_id = Uuid::new_v4();
    info!(%addr, %conn_id, "device connected");

    let (read_half, mut write_half): (OwnedReadHalf, OwnedWriteHalf) = socket.into_split();
    let mut reader = BufReader::new(read_half);

    if clock_preamble {
        let preamble = format_clock_preamble(Utc::now().timestamp_millis());
        write_half.write_all(preamble.as_bytes()).await?;
    }

    loop {
        let Some(message) = read_message(&mut reader).await? else {
            info!(%addr, %conn_id, "connection closed by peer");
            break;
        };
        if message.is_empty() {
            // Consecutive blank lines; keep waiting for the next message.
            continue;
        }

        let (device_id, readings) = parse_payload(&message);
        if device_id.is_empty() || readings.is_empty() {
            warn!(
                %addr,
                device = %device_id,
                bytes = message.len(),
                "invalid batch, no acknowledgement sent"
            );
            continue;
        }

        let row_count = readings.len();
        registry
            .apply_batch(&device_id, &readings, Utc::now().timestamp_millis())
            .await;
        notifications.publish(&device_id);

        if let Err(e) = sink.append(&device_id, &readings).await {
            // The batch stays visible in memory; the durability gap is an
            // operational concern, not a reason to fail the connection.
            error!(device = %device_id, error = %e, "durable sink append failed");
        }

        let ack = format_ack(&device_id, row_count);
        if let Err(e) = write_half.write_all(ack.as_bytes()).await {
            warn!(%addr, %conn_id, error = %e, "failed to send acknowledgement, closing");
            break;
        }

        debug!(device = %device_id, rows = row_count, "batch accepted");
    }

    info!(%addr, %conn_id, "connection handler finished");
    Ok(())
}
