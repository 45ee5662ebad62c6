//! Wire protocol: line framing and payload parsing.
//!
//! Devices speak newline-delimited UTF-8 text. A message is a run of
//! non-empty lines terminated by a blank line or end-of-stream; the first
//! line is the device identifier and every following line is a CSV row
//! `time,x,y,z[,...]`. Only the first four fields are consulted; short or
//! non-numeric rows are skipped without failing the batch.
//!
//! Everything here is pure apart from [`read_message`], which does the
//! framing against an async buffered reader and nothing else.

use tokio::io::{AsyncBufRead, AsyncBufReadExt};

use crate::data::Reading;

/// Parse one CSV row into a reading.
///
/// Requires at least four comma-separated fields, each of which (after
/// trimming) parses as a float; extra fields are ignored. Returns `None`
/// for rows that do not qualify, which the caller skips silently.
pub fn parse_reading(line: &str) -> Option<Reading> {
    let mut fields = line.split(',').map(str::trim);
    let time = fields.next()?.parse().ok()?;
    let x = fields.next()?.parse().ok()?;
    let y = fields.next()?.parse().ok()?;
    let z = fields.next()?.parse().ok()?;
    Some(Reading { time, x, y, z })
}

/// Split a raw message into its device identifier and surviving readings.
///
/// Line 1, trimmed, is the identifier; an empty first line rejects the whole
/// payload (returned as an empty identifier with no readings). Subsequent
/// non-blank lines are parsed individually in order, with failures skipped.
/// A payload with a valid identifier but zero surviving readings is invalid
/// overall; that decision is left to the caller, which also knows whether to
/// acknowledge.
pub fn parse_payload(text: &str) -> (String, Vec<Reading>) {
    let mut lines = text.lines();

    let device_id = match lines.next().map(str::trim) {
        Some(id) if !id.is_empty() => id.to_string(),
        _ => return (String::new(), Vec::new()),
    };

    let readings = lines
        .filter(|line| !line.trim().is_empty())
        .filter_map(parse_reading)
        .collect();

    (device_id, readings)
}

/// Read one framed message from the stream.
///
/// Accumulates lines until a blank line (`"\n"` or `"\r\n"`) or end of
/// stream. The terminator is not part of the message. Returns:
/// - `Ok(Some(message))`: a complete message; may be empty when the peer
///   sent consecutive blank lines, which the caller should skip over.
/// - `Ok(None)`: end of stream with nothing accumulated; the connection
///   is done.
/// - `Err(_)`: transport failure, fatal to this connection.
pub async fn read_message<R>(reader: &mut R) -> std::io::Result<Option<String>>
where
    R: AsyncBufRead + Unpin,
{
    let mut message = String::new();
    let mut line = String::new();

    loop {
        line.clear();
        let n = reader.read_line(&mut line).await?;
        if n == 0 {
            // End of stream: whatever accumulated is the final message.
            if message.is_empty() {
                return Ok(None);
            }
            return Ok(Some(message));
        }
        if line == "\n" || line == "\r\n" {
            return Ok(Some(message));
        }
        message.push_str(&line);
    }
}

/// The acknowledgement line for a valid batch.
pub fn format_ack(device_id: &str, row_count: usize) -> String {
    format!("ACK {device_id} {row_count}\n")
}

/// The optional server-origin clock preamble sent on accept.
pub fn format_clock_preamble(epoch_millis: i64) -> String {
    format!("TIME {epoch_millis}\n")
}
