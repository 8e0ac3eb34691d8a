//! Line-oriented sample record parsing
//!
//! Two record shapes are understood, matching what acquisition firmware
//! prints on its serial console:
//!
//! - CSV: `timestamp_us,ch1,...,chC[,gesture_id]`, optionally prefixed by
//!   `DATA,`, read with the `csv` crate. Lines whose first field is text
//!   (headers, boot banners) are skipped; a first field that looks numeric
//!   but is not a valid timestamp is an error.
//! - Plotter: `>CH1:v,CH2:v,...`. These carry no timestamp, so one is
//!   derived from the record count and the nominal sample rate.
//!
//! Readings are parsed as-is; finiteness, range and timestamp ordering are
//! enforced later by the windower.

use csv::{ReaderBuilder, StringRecord, Trim};
use myoflex_core::types::{ClassId, EmgSample, MAX_CHANNELS};

use crate::error::IngestError;

/// One parsed input record.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Record {
    /// Sample handed to the pipeline
    pub sample: EmgSample,
    /// Ground-truth gesture, used only for replay scoring
    pub gesture: Option<ClassId>,
}

/// Stateful parser assigning sequence numbers to records.
#[derive(Clone, Debug)]
pub struct RecordParser {
    channels: usize,
    sample_period_us: u64,
    line: u64,
    sequence: u32,
    skipped: u64,
    fields: StringRecord,
}

impl RecordParser {
    /// Parser for `channels` channels sampled at `sample_rate_hz`.
    #[must_use]
    pub fn new(channels: usize, sample_rate_hz: u32) -> Self {
        Self {
            channels,
            sample_period_us: 1_000_000 / u64::from(sample_rate_hz.max(1)),
            line: 0,
            sequence: 0,
            skipped: 0,
            fields: StringRecord::new(),
        }
    }

    /// Lines ignored as headers or chatter.
    #[must_use]
    pub fn skipped(&self) -> u64 {
        self.skipped
    }

    /// Lines seen so far.
    #[must_use]
    pub fn lines(&self) -> u64 {
        self.line
    }

    /// Parse one line.
    ///
    /// Returns `Ok(None)` for blank and skipped lines.
    ///
    /// # Errors
    ///
    /// The line looks like a record but its fields cannot be parsed.
    pub fn parse_line(&mut self, line: &str) -> Result<Option<Record>, IngestError> {
        self.line += 1;
        let text = line.trim();
        if text.is_empty() {
            return Ok(None);
        }

        let parsed = if let Some(body) = text.strip_prefix('>') {
            self.parse_plotter(body)?
        } else {
            let body = text.strip_prefix("DATA,").unwrap_or(text);
            match self.parse_csv(body)? {
                Some(record) => record,
                None => {
                    self.skipped += 1;
                    tracing::debug!("Skipping non-record line {}: {}", self.line, text);
                    return Ok(None);
                }
            }
        };

        self.sequence = self.sequence.wrapping_add(1);
        Ok(Some(parsed))
    }

    fn parse_csv(&mut self, body: &str) -> Result<Option<Record>, IngestError> {
        let mut reader = ReaderBuilder::new()
            .has_headers(false)
            .flexible(true)
            .trim(Trim::All)
            .from_reader(body.as_bytes());
        let mut fields = std::mem::take(&mut self.fields);
        let read = reader.read_record(&mut fields);
        let result = match read {
            Ok(true) => self.record_from_fields(&fields),
            Ok(false) => Ok(None),
            Err(err) => Err(IngestError::Csv { line: self.line, message: err.to_string() }),
        };
        self.fields = fields;
        result
    }

    fn record_from_fields(&self, fields: &StringRecord) -> Result<Option<Record>, IngestError> {
        let first = fields.get(0).unwrap_or("");
        let timestamp_us = match parse_timestamp(first) {
            Timestamp::Valid(us) => us,
            Timestamp::Text => return Ok(None),
            Timestamp::Invalid => {
                return Err(IngestError::BadTimestamp { line: self.line, text: first.to_string() })
            }
        };

        let min = 1 + self.channels;
        if fields.len() < min || fields.len() > min + 1 {
            return Err(IngestError::FieldCount {
                line: self.line,
                expected: min,
                found: fields.len(),
            });
        }

        let readings = fields
            .iter()
            .enumerate()
            .take(min)
            .skip(1)
            .map(|(i, f)| self.parse_reading(i, f))
            .collect::<Result<Vec<f32>, _>>()?;
        let sample = self.make_sample(timestamp_us, &readings)?;

        let gesture = match fields.get(min) {
            Some(text) if !text.is_empty() => Some(self.parse_gesture(min, text)?),
            _ => None,
        };
        Ok(Some(Record { sample, gesture }))
    }

    fn parse_plotter(&self, body: &str) -> Result<Record, IngestError> {
        let mut readings = Vec::with_capacity(self.channels);
        for (i, token) in body.split(',').map(str::trim).enumerate() {
            let Some((_, value)) = token.split_once(':') else {
                return Err(IngestError::PlotterToken { line: self.line, token: token.to_string() });
            };
            readings.push(self.parse_reading(i, value.trim())?);
        }
        if readings.len() != self.channels {
            return Err(IngestError::FieldCount {
                line: self.line,
                expected: self.channels,
                found: readings.len(),
            });
        }
        let timestamp_us = u64::from(self.sequence) * self.sample_period_us;
        Ok(Record { sample: self.make_sample(timestamp_us, &readings)?, gesture: None })
    }

    fn parse_reading(&self, field: usize, text: &str) -> Result<f32, IngestError> {
        text.parse::<f32>().map_err(|_| IngestError::NotNumeric {
            line: self.line,
            field,
            text: text.to_string(),
        })
    }

    fn parse_gesture(&self, field: usize, text: &str) -> Result<ClassId, IngestError> {
        let value = text.parse::<i64>().map_err(|_| IngestError::NotNumeric {
            line: self.line,
            field,
            text: text.to_string(),
        })?;
        u16::try_from(value)
            .map(ClassId)
            .map_err(|_| IngestError::GestureOutOfRange { line: self.line, value })
    }

    fn make_sample(&self, timestamp_us: u64, readings: &[f32]) -> Result<EmgSample, IngestError> {
        if readings.len() > MAX_CHANNELS {
            return Err(IngestError::TooManyChannels { line: self.line, count: readings.len() });
        }
        EmgSample::from_readings(timestamp_us, self.sequence, readings)
            .ok_or(IngestError::TooManyChannels { line: self.line, count: readings.len() })
    }
}

enum Timestamp {
    Valid(u64),
    /// Header or banner text
    Text,
    /// Looks numeric but is negative or malformed
    Invalid,
}

/// Integer microseconds, or a decimal value truncated to whole microseconds.
fn parse_timestamp(text: &str) -> Timestamp {
    if let Ok(us) = text.parse::<u64>() {
        return Timestamp::Valid(us);
    }
    match text.parse::<f64>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Timestamp::Valid(v as u64),
        _ if looks_numeric(text) => Timestamp::Invalid,
        _ => Timestamp::Text,
    }
}

fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix(['-', '+']).unwrap_or(text);
    digits.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}
