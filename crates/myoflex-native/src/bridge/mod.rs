//! Sample sources feeding the pipeline
//!
//! - [`replay`]: recorded sessions from any buffered reader (files, stdin)
//! - [`usb`]: live serial stream from acquisition firmware (requires `usb` feature)
//!
//! Both deliver one [`Record`] per parsed line. A line that cannot be
//! parsed is reported as an [`IngestError`] item so the caller can count
//! and drop it; only I/O failures end the stream with an error.

use std::io::BufRead;

use crate::error::{IngestError, SessionResult};
use crate::ingest::{Record, RecordParser};

pub mod replay;

#[cfg(feature = "usb")]
pub mod usb;

pub use replay::ReplaySource;

#[cfg(feature = "usb")]
pub use usb::SerialSource;

/// Outcome of reading one record: the record, or why the line was refused.
pub type RecordItem = Result<Record, IngestError>;

/// Anything that produces sample records.
pub trait SampleSource {
    /// Next record, or `Ok(None)` when the stream has ended.
    ///
    /// # Errors
    ///
    /// The underlying transport failed.
    fn next_record(&mut self) -> SessionResult<Option<RecordItem>>;

    /// Short description for logs.
    fn describe(&self) -> String;
}

/// Read lines until one yields a record or a parse error.
///
/// Bytes that are not UTF-8 are replaced. A partial line left in `buf` by
/// an interrupted read is completed on the next call.
pub(crate) fn read_record<R: BufRead>(
    reader: &mut R,
    parser: &mut RecordParser,
    buf: &mut Vec<u8>,
) -> std::io::Result<Option<RecordItem>> {
    loop {
        if reader.read_until(b'\n', buf)? == 0 && buf.is_empty() {
            return Ok(None);
        }
        let parsed = parser.parse_line(&String::from_utf8_lossy(buf));
        buf.clear();
        match parsed {
            Ok(Some(record)) => return Ok(Some(Ok(record))),
            Ok(None) => {}
            Err(err) => return Ok(Some(Err(err))),
        }
    }
}
