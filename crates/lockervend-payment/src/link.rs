//! Line-oriented link to the MDB cashless master.
//!
//! The master is a USB serial device speaking newline-terminated ASCII.
//! Reads are patient: a read gives the master several short windows to
//! answer before reporting silence, which the session treats as a normal
//! outcome rather than an error.

use crate::error::{MdbError, Result};
use lockervend_core::MdbConfig;
use serialport::SerialPort;
use std::io::{ErrorKind, Read, Write};
use tracing::{debug, info, trace, warn};

/// Longest partial line kept while waiting for its newline.
pub const MAX_PENDING_BYTES: usize = 512;

/// Blocking line transport to the MDB master.
///
/// Implementations are driven from a blocking worker thread, never from an
/// async task.
pub trait MdbLink: Send {
    /// Send one line; the newline is appended.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::ConnectionError` if the line could not be written.
    fn write_line(&mut self, line: &str) -> Result<()>;

    /// Wait for the next non-empty line.
    ///
    /// Returns `Ok(None)` if the master stayed silent for the whole read
    /// window.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::ConnectionError` if the link itself failed.
    fn read_line(&mut self) -> Result<Option<String>>;

    /// Close and reopen the underlying port.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::ConnectionError` if the port cannot be reopened.
    fn reopen(&mut self) -> Result<()>;
}

/// Splits received bytes into lines.
///
/// A partial line longer than [`MAX_PENDING_BYTES`] is discarded so a master
/// that never sends a newline cannot grow the buffer without bound.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
        if self.pending.len() > MAX_PENDING_BYTES && !self.pending.contains(&b'\n') {
            warn!(
                "Discarding {} bytes from the MDB master without a line end",
                self.pending.len()
            );
            self.pending.clear();
        }
    }

    /// Take the next complete line, trimmed.
    pub fn next_line(&mut self) -> Option<String> {
        let pos = self.pending.iter().position(|&b| b == b'\n')?;
        let raw: Vec<u8> = self.pending.drain(..=pos).collect();
        Some(String::from_utf8_lossy(&raw).trim().to_string())
    }

    /// Bytes held while waiting for a line end.
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

/// [`MdbLink`] over a `serialport` device.
pub struct SerialLink {
    config: MdbConfig,
    port: Option<Box<dyn SerialPort>>,
    pending: LineBuffer,
}

impl SerialLink {
    /// Open the configured port and give it time to settle.
    ///
    /// # Errors
    ///
    /// Returns `MdbError::ConnectionError` if the port cannot be opened.
    pub fn open(config: MdbConfig) -> Result<Self> {
        let mut link = Self {
            config,
            port: None,
            pending: LineBuffer::new(),
        };
        link.connect()?;
        Ok(link)
    }

    /// Settings the port was opened with.
    pub fn config(&self) -> &MdbConfig {
        &self.config
    }

    fn connect(&mut self) -> Result<()> {
        let port = serialport::new(&self.config.port, self.config.baud_rate)
            .timeout(self.config.read_timeout)
            .open()?;
        std::thread::sleep(self.config.stabilise_delay);
        info!(
            "MDB serial port {} open at {} baud",
            self.config.port, self.config.baud_rate
        );
        self.port = Some(port);
        self.pending.clear();
        Ok(())
    }

    /// One read window: a complete line, or `None` on timeout.
    fn read_once(&mut self) -> Result<Option<String>> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| MdbError::connection("serial port closed"))?;
        let mut buf = [0u8; 64];

        loop {
            if let Some(line) = self.pending.next_line() {
                return Ok(Some(line));
            }

            match port.read(&mut buf) {
                Ok(0) => return Ok(None),
                Ok(n) => self.pending.extend(&buf[..n]),
                Err(e) if e.kind() == ErrorKind::TimedOut => return Ok(None),
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl MdbLink for SerialLink {
    fn write_line(&mut self, line: &str) -> Result<()> {
        let port = self
            .port
            .as_mut()
            .ok_or_else(|| MdbError::connection("serial port closed"))?;
        trace!("MDB > {}", line);
        port.write_all(line.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<Option<String>> {
        for attempt in 0..self.config.read_attempts {
            match self.read_once()? {
                Some(line) if !line.is_empty() => {
                    trace!("MDB < {}", line);
                    return Ok(Some(line));
                }
                _ => {
                    if attempt + 1 < self.config.read_attempts {
                        std::thread::sleep(self.config.read_retry_delay);
                    }
                }
            }
        }
        Ok(None)
    }

    fn reopen(&mut self) -> Result<()> {
        debug!("Reopening MDB serial port {}", self.config.port);
        self.port = None;
        self.connect()
    }
}

impl std::fmt::Debug for SerialLink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialLink")
            .field("port", &self.config.port)
            .field("open", &self.port.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_line_buffer_splits_lines() {
        let mut buffer = LineBuffer::new();
        buffer.extend(b"d,STATUS,INIT\r\nd,STATUS,");
        buffer.extend(b"IDLE\n");

        assert_eq!(buffer.next_line().as_deref(), Some("d,STATUS,INIT"));
        assert_eq!(buffer.next_line().as_deref(), Some("d,STATUS,IDLE"));
        assert_eq!(buffer.next_line(), None);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_line_buffer_drops_endless_partial_line() {
        let mut buffer = LineBuffer::new();
        for _ in 0..(MAX_PENDING_BYTES / 64 + 1) {
            buffer.extend(&[b'x'; 64]);
        }
        assert!(buffer.len() <= MAX_PENDING_BYTES);

        // The link recovers on the next well-formed line.
        buffer.extend(b"d,STATUS,IDLE\n");
        assert_eq!(buffer.next_line().as_deref(), Some("d,STATUS,IDLE"));
    }

    #[test]
    fn test_line_buffer_keeps_long_input_with_line_end() {
        let mut buffer = LineBuffer::new();
        let mut bytes = b"d,STATUS,VEND\n".to_vec();
        bytes.extend_from_slice(&[b'y'; MAX_PENDING_BYTES]);
        buffer.extend(&bytes);

        assert_eq!(buffer.next_line().as_deref(), Some("d,STATUS,VEND"));
    }

    #[test]
    fn test_open_missing_port_is_connection_error() {
        let config = MdbConfig {
            port: "/dev/lockervend-no-such-port".to_string(),
            stabilise_delay: std::time::Duration::ZERO,
            ..MdbConfig::default()
        };

        assert!(matches!(
            SerialLink::open(config),
            Err(MdbError::ConnectionError { .. })
        ));
    }
}
