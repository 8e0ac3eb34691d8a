//! Serial bridge to EMG acquisition firmware
//!
//! The firmware prints one text record per sample over USB serial. Read
//! timeouts are treated as "no data yet"; the stream ends once nothing has
//! arrived for the configured idle period.

use std::io::{BufReader, ErrorKind, Write};
use std::time::{Duration, Instant};

use super::{read_record, RecordItem, SampleSource};
use crate::error::SessionResult;
use crate::ingest::RecordParser;

/// Live record source over a serial port.
pub struct SerialSource {
    reader: BufReader<Box<dyn serialport::SerialPort>>,
    parser: RecordParser,
    buf: Vec<u8>,
    port_name: String,
    idle_limit: Duration,
    last_data: Instant,
}

impl SerialSource {
    /// Open a serial connection
    ///
    /// # Arguments
    ///
    /// * `port_name` - Serial port name (e.g., "/dev/ttyACM0" or "COM3")
    /// * `baud_rate` - Baud rate (typically 115200)
    /// * `parser` - Record parser configured for the stream's channel count
    ///
    /// # Errors
    ///
    /// Returns error if port cannot be opened
    pub fn open(port_name: &str, baud_rate: u32, parser: RecordParser) -> SessionResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;
        tracing::info!("Opened serial port {} at {} baud", port_name, baud_rate);

        Ok(Self {
            reader: BufReader::with_capacity(1024, port),
            parser,
            buf: Vec::with_capacity(128),
            port_name: port_name.to_string(),
            idle_limit: Duration::from_secs(5),
            last_data: Instant::now(),
        })
    }

    /// End the stream after this long without data.
    #[must_use]
    pub fn with_idle_limit(mut self, idle_limit: Duration) -> Self {
        self.idle_limit = idle_limit;
        self
    }

    /// List available serial ports
    #[must_use]
    pub fn list_ports() -> Vec<String> {
        serialport::available_ports()
            .map(|ports| ports.into_iter().map(|p| p.port_name).collect())
            .unwrap_or_default()
    }

    /// Send a single-line command to the firmware.
    ///
    /// # Errors
    ///
    /// Write failure on the port.
    pub fn send_command(&mut self, command: &str) -> SessionResult<()> {
        let port = self.reader.get_mut();
        port.write_all(command.as_bytes())?;
        port.write_all(b"\n")?;
        port.flush()?;
        Ok(())
    }
}

impl SampleSource for SerialSource {
    fn next_record(&mut self) -> SessionResult<Option<RecordItem>> {
        loop {
            match read_record(&mut self.reader, &mut self.parser, &mut self.buf) {
                Ok(Some(item)) => {
                    self.last_data = Instant::now();
                    return Ok(Some(item));
                }
                Ok(None) => return Ok(None),
                Err(e) if e.kind() == ErrorKind::TimedOut => {
                    if self.last_data.elapsed() >= self.idle_limit {
                        tracing::warn!(
                            "No data from {} for {:?}, ending stream",
                            self.port_name,
                            self.idle_limit
                        );
                        return Ok(None);
                    }
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    fn describe(&self) -> String {
        format!("serial {}", self.port_name)
    }
}
