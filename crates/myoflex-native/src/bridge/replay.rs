//! Replay of recorded sample streams

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use super::{read_record, RecordItem, SampleSource};
use crate::error::SessionResult;
use crate::ingest::RecordParser;

/// Record source over any buffered reader.
pub struct ReplaySource<R> {
    reader: R,
    parser: RecordParser,
    buf: Vec<u8>,
    label: String,
}

impl<R: BufRead> ReplaySource<R> {
    /// Wrap a reader.
    pub fn new(reader: R, parser: RecordParser, label: impl Into<String>) -> Self {
        Self { reader, parser, buf: Vec::with_capacity(128), label: label.into() }
    }

    /// Parser state (line and skip counters).
    #[must_use]
    pub fn parser(&self) -> &RecordParser {
        &self.parser
    }
}

impl ReplaySource<BufReader<File>> {
    /// Open a recording on disk.
    ///
    /// # Errors
    ///
    /// The file cannot be opened.
    pub fn open(path: &Path, parser: RecordParser) -> SessionResult<Self> {
        let file = File::open(path)?;
        Ok(Self::new(BufReader::new(file), parser, path.display().to_string()))
    }
}

impl<R: BufRead> SampleSource for ReplaySource<R> {
    fn next_record(&mut self) -> SessionResult<Option<RecordItem>> {
        Ok(read_record(&mut self.reader, &mut self.parser, &mut self.buf)?)
    }

    fn describe(&self) -> String {
        format!("replay {}", self.label)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    use myoflex_core::types::ClassId;

    #[test]
    fn test_reads_records_and_reports_bad_lines() {
        let text = "timestamp_us,ch1,ch2,gesture_id\n0,1,2,0\n1000,oops,2,0\n\n2000,3,4,1\n";
        let mut source = ReplaySource::new(Cursor::new(text), RecordParser::new(2, 1000), "memory");

        let first = source.next_record().unwrap().unwrap().unwrap();
        assert_eq!(first.sample.readings(), &[1.0, 2.0]);
        assert!(source.next_record().unwrap().unwrap().is_err());
        let third = source.next_record().unwrap().unwrap().unwrap();
        assert_eq!(third.gesture, Some(ClassId(1)));
        assert!(source.next_record().unwrap().is_none());
        assert_eq!(source.parser().skipped(), 1);
    }

    #[test]
    fn test_open_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "DATA,0,5").unwrap();
        writeln!(file, "DATA,1000,6").unwrap();

        let mut source = ReplaySource::open(file.path(), RecordParser::new(1, 1000)).unwrap();
        let mut count = 0;
        while let Some(item) = source.next_record().unwrap() {
            assert!(item.is_ok());
            count += 1;
        }
        assert_eq!(count, 2);
        assert!(source.describe().starts_with("replay "));
    }
}
