// src/telemetry/reader.rs
//! Serial line reader feeding one fix store

use super::{
    layout::{parse_line, LineError},
    store::FixStore,
};
use crate::{
    config::SourceConfig,
    error::{Result, TrackerError},
};
use std::{sync::Arc, time::Duration};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncReadExt, BufReader};
use tokio_serial::{SerialPortBuilderExt, SerialStream};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Longest telemetry line kept in memory; anything longer is discarded
pub const MAX_LINE_BYTES: usize = 1024;

/// How a reader (or one connection of it) came to an end
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReaderExit {
    Cancelled,
    EndOfStream,
    ConnectionFailed,
    ReadFailed,
}

/// Reads one beacon's serial port and appends every valid line to its store
pub struct TelemetryReader {
    source: SourceConfig,
    store: Arc<FixStore>,
}

impl TelemetryReader {
    pub fn new(source: SourceConfig, store: Arc<FixStore>) -> Self {
        Self { source, store }
    }

    pub fn store(&self) -> &Arc<FixStore> {
        &self.store
    }

    /// Open the serial device
    pub fn open(&self) -> Result<SerialStream> {
        tokio_serial::new(self.source.port.as_str(), self.source.baudrate)
            .timeout(Duration::from_millis(1000))
            .open_native_async()
            .map_err(|e| {
                TrackerError::Connection(format!(
                    "Failed to open serial port {}: {}",
                    self.source.port, e
                ))
            })
    }

    /// Run until cancelled.
    ///
    /// Without a reconnect delay the reader ends after the first failed open
    /// or when the stream closes; with one it keeps retrying.
    pub async fn run(self, cancel: CancellationToken) -> ReaderExit {
        let name = self.source.name.clone();

        if !self.source.startup_delay().is_zero() {
            tokio::select! {
                _ = cancel.cancelled() => return ReaderExit::Cancelled,
                _ = tokio::time::sleep(self.source.startup_delay()) => {}
            }
        }

        loop {
            let exit = match self.open() {
                Ok(serial) => {
                    info!(
                        source = %name,
                        port = %self.source.port,
                        baud = self.source.baudrate,
                        "connected"
                    );
                    match self.consume(BufReader::new(serial), &cancel).await {
                        Ok(exit) => exit,
                        Err(e) => {
                            error!(source = %name, "Error reading from serial port: {}", e);
                            ReaderExit::ReadFailed
                        }
                    }
                }
                Err(e) => {
                    error!(source = %name, "{}", e);
                    ReaderExit::ConnectionFailed
                }
            };

            if exit == ReaderExit::Cancelled {
                return exit;
            }

            let Some(delay) = self.source.reconnect_delay() else {
                warn!(source = %name, ?exit, "reader stopped, no further updates from this source");
                return exit;
            };

            tokio::select! {
                _ = cancel.cancelled() => return ReaderExit::Cancelled,
                _ = tokio::time::sleep(delay) => {
                    info!(source = %name, ?exit, "reconnecting after {:?}", delay);
                }
            }
        }
    }

    /// Read lines from `reader` until cancellation or end of stream
    pub async fn consume<R>(&self, mut reader: R, cancel: &CancellationToken) -> Result<ReaderExit>
    where
        R: AsyncBufRead + Unpin,
    {
        let mut line = Vec::new();

        loop {
            line.clear();
            let read = tokio::select! {
                _ = cancel.cancelled() => return Ok(ReaderExit::Cancelled),
                read = read_bounded_line(&mut reader, &mut line) => read?,
            };

            if read == 0 {
                info!(source = %self.source.name, "end of stream");
                return Ok(ReaderExit::EndOfStream);
            }

            if line.len() >= MAX_LINE_BYTES && line.last() != Some(&b'\n') {
                // No newline within the limit: drop everything up to the next one
                loop {
                    line.clear();
                    let read = tokio::select! {
                        _ = cancel.cancelled() => return Ok(ReaderExit::Cancelled),
                        read = read_bounded_line(&mut reader, &mut line) => read?,
                    };
                    if read == 0 || line.last() == Some(&b'\n') {
                        break;
                    }
                }
                self.store.record_discard();
                debug!(
                    source = %self.source.name,
                    limit = MAX_LINE_BYTES,
                    "discarded overlong telemetry line"
                );
                continue;
            }

            self.ingest_line(&line);
        }
    }

    /// Parse one raw line; appends on success, counts a discard otherwise
    pub fn ingest_line(&self, raw: &[u8]) -> bool {
        let parsed: Result<_> = std::str::from_utf8(raw)
            .map_err(|_| LineError::NotUtf8)
            .and_then(|line| parse_line(line, &self.source.layout))
            .map_err(TrackerError::from);

        match parsed {
            Ok(fix) => {
                self.store.append(fix);
                true
            }
            Err(reason) => {
                self.store.record_discard();
                debug!(
                    source = %self.source.name,
                    %reason,
                    line = %String::from_utf8_lossy(raw).trim(),
                    "discarded telemetry line"
                );
                false
            }
        }
    }
}

/// `read_until` on a newline, reading at most [`MAX_LINE_BYTES`]
async fn read_bounded_line<R>(reader: &mut R, line: &mut Vec<u8>) -> std::io::Result<usize>
where
    R: AsyncBufRead + Unpin,
{
    reader.take(MAX_LINE_BYTES as u64).read_until(b'\n', line).await
}

/// List available serial ports
pub fn list_serial_ports() -> Result<()> {
    let ports = tokio_serial::available_ports()
        .map_err(|e| TrackerError::Other(format!("Failed to list serial ports: {}", e)))?;

    if ports.is_empty() {
        println!("No serial ports found.");
    } else {
        println!("Available serial ports:");
        for port in ports {
            println!("  {} - {:?}", port.port_name, port.port_type);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::telemetry::layout::FieldLayout;
    use tokio::io::AsyncWriteExt;

    fn receiver() -> TelemetryReader {
        let mut source = SourceConfig::new("receiver", "/dev/null-beacon", 9600, FieldLayout::RECEIVER_A);
        source.startup_delay_ms = 0;
        TelemetryReader::new(source, Arc::new(FixStore::new("receiver")))
    }

    #[test]
    fn test_ingest_valid_line() {
        let reader = receiver();

        assert!(reader.ingest_line(b"12.34,56.78,0,45.0,0,0\r\n"));

        let fix = reader.store().latest().unwrap();
        assert_eq!(fix.latitude, 12.34);
        assert_eq!(fix.longitude, 56.78);
        assert_eq!(fix.heading, Some(45.0));
        assert_eq!(reader.store().discarded(), 0);
    }

    #[test]
    fn test_ingest_bad_line_leaves_store_unchanged() {
        let reader = receiver();

        assert!(!reader.ingest_line(b"bad,data\n"));
        assert!(!reader.ingest_line(b"\xff\xfe,1,2,3,4,5\n"));
        assert!(!reader.ingest_line(b"\n"));

        assert!(reader.store().is_empty());
        assert_eq!(reader.store().discarded(), 3);
    }

    #[tokio::test]
    async fn test_consume_until_end_of_stream() {
        let reader = receiver();
        let input: &[u8] = b"1.0,2.0,0,10,0,0\nbad,data\n3.0,4.0,0,20,0,0\n5.0,6.0,0,30,0,0";
        let cancel = CancellationToken::new();

        let exit = reader.consume(BufReader::new(input), &cancel).await.unwrap();

        assert_eq!(exit, ReaderExit::EndOfStream);
        let headings: Vec<Option<f64>> = reader.store().history().iter().map(|f| f.heading).collect();
        assert_eq!(headings, vec![Some(10.0), Some(20.0), Some(30.0)]);
        assert_eq!(reader.store().discarded(), 1);
    }

    #[tokio::test]
    async fn test_overlong_line_discarded() {
        let reader = receiver();
        let mut input = vec![b'x'; 64 * MAX_LINE_BYTES + 7];
        input.extend_from_slice(b"\n1.0,2.0,0,10,0,0\n");
        let cancel = CancellationToken::new();

        let exit = reader.consume(BufReader::new(input.as_slice()), &cancel).await.unwrap();

        assert_eq!(exit, ReaderExit::EndOfStream);
        assert_eq!(reader.store().discarded(), 1);
        assert_eq!(reader.store().len(), 1);
        assert_eq!(reader.store().latest().unwrap().heading, Some(10.0));
    }

    #[tokio::test]
    async fn test_endless_noise_ends_as_one_discard() {
        let reader = receiver();
        let noise = tokio::io::repeat(b'x').take(1 << 20);
        let cancel = CancellationToken::new();

        let exit = reader.consume(BufReader::new(noise), &cancel).await.unwrap();

        assert_eq!(exit, ReaderExit::EndOfStream);
        assert_eq!(reader.store().discarded(), 1);
        assert!(reader.store().is_empty());
    }

    #[tokio::test]
    async fn test_consume_stops_on_cancel() {
        let reader = Arc::new(receiver());
        let (mut tx, rx) = tokio::io::duplex(256);
        let cancel = CancellationToken::new();

        let task = {
            let reader = Arc::clone(&reader);
            let cancel = cancel.clone();
            tokio::spawn(async move { reader.consume(BufReader::new(rx), &cancel).await })
        };

        tx.write_all(b"1.0,2.0,0,90,0,0\n").await.unwrap();
        // Wait for the line to land before cancelling
        for _ in 0..100 {
            if !reader.store().is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        cancel.cancel();

        let exit = task.await.unwrap().unwrap();
        assert_eq!(exit, ReaderExit::Cancelled);
        assert_eq!(reader.store().len(), 1);
    }

    #[tokio::test]
    async fn test_run_gives_up_on_missing_device() {
        let reader = receiver();
        let exit = reader.run(CancellationToken::new()).await;
        assert_eq!(exit, ReaderExit::ConnectionFailed);
    }

    #[tokio::test]
    async fn test_run_with_reconnect_stops_on_cancel() {
        let mut reader = receiver();
        reader.source.reconnect_delay_ms = Some(10);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(reader.run(cancel.clone()));
        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();

        assert_eq!(task.await.unwrap(), ReaderExit::Cancelled);
    }
}
