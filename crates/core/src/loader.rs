//! Recording loaders: turn a byte stream into an [`EventCollection`].
//!
//! The report generator only knows the [`RecordingLoader`] trait. The bundled
//! [`JsonLinesLoader`] reads newline-delimited JSON where each line is either
//! an event or a declaration of captured / disabled event types:
//!
//! ```text
//! {"declare": ["jdk.GarbageCollection", "jdk.ThreadPark"]}
//! {"disable": ["jdk.ObjectAllocationSample"]}
//! {"type": "jdk.GarbageCollection", "duration_ms": 12.5, "fields": {"cause": "G1 Evacuation Pause"}}
//! ```

use std::io::{self, BufRead, BufReader, Read};

use serde::Deserialize;
use tracing::debug;

use crate::error::LoadError;
use crate::event::{Event, EventCollection};

/// Parses a recording byte stream into an event collection.
pub trait RecordingLoader: Send + Sync {
    fn load(&self, reader: &mut dyn Read) -> Result<EventCollection, LoadError>;
}

/// Reader adapter that counts every byte pulled through it.
pub struct CountingReader<R> {
    inner: R,
    count: u64,
}

impl<R: Read> CountingReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, count: 0 }
    }

    /// Bytes consumed so far.
    pub fn byte_count(&self) -> u64 {
        self.count
    }

    pub fn into_inner(self) -> R {
        self.inner
    }
}

impl<R: Read> Read for CountingReader<R> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let n = self.inner.read(buf)?;
        self.count += n as u64;
        Ok(n)
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Record {
    Declare { declare: Vec<String> },
    Disable { disable: Vec<String> },
    Event(Event),
}

/// Loader for newline-delimited JSON recordings. Reads the stream to EOF.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonLinesLoader;

impl JsonLinesLoader {
    pub fn new() -> Self {
        Self
    }
}

impl RecordingLoader for JsonLinesLoader {
    fn load(&self, reader: &mut dyn Read) -> Result<EventCollection, LoadError> {
        let mut reader = BufReader::new(reader);
        let mut collection = EventCollection::new();
        let mut line = String::new();
        let mut line_no = 0usize;
        let mut records = 0usize;

        loop {
            line.clear();
            if reader.read_line(&mut line)? == 0 {
                break;
            }
            line_no += 1;
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let record: Record = serde_json::from_str(trimmed).map_err(|source| {
                LoadError::Malformed {
                    line: line_no,
                    source,
                }
            })?;
            match record {
                Record::Declare { declare } => declare.into_iter().for_each(|t| collection.declare(t)),
                Record::Disable { disable } => disable.into_iter().for_each(|t| collection.disable(t)),
                Record::Event(event) => collection.push(event),
            }
            records += 1;
        }

        if records == 0 {
            return Err(LoadError::Empty);
        }
        debug!(lines = line_no, events = collection.len(), "recording parsed");
        Ok(collection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventAvailability;

    const RECORDING: &str = r#"{"declare": ["jdk.GarbageCollection", "jdk.JavaMonitorWait"]}
{"type": "jdk.GarbageCollection", "duration_ms": 12.5, "fields": {"cause": "G1 Evacuation Pause"}}

{"type": "jdk.GarbageCollection", "duration_ms": 40, "fields": {"cause": "Allocation Failure"}}
{"disable": ["jdk.ObjectAllocationSample"]}
"#;

    #[test]
    fn loads_events_and_declarations() {
        let mut bytes = RECORDING.as_bytes();
        let collection = JsonLinesLoader.load(&mut bytes).unwrap();
        assert_eq!(collection.count("jdk.GarbageCollection"), 2);
        assert_eq!(
            collection.availability("jdk.JavaMonitorWait"),
            EventAvailability::Enabled
        );
        assert_eq!(
            collection.availability("jdk.ObjectAllocationSample"),
            EventAvailability::Disabled
        );
        let first = collection.of_type("jdk.GarbageCollection").next().unwrap();
        assert_eq!(first.fields["cause"].as_str(), Some("G1 Evacuation Pause"));
        assert_eq!(first.number("duration_ms"), Some(12.5));
    }

    #[test]
    fn counting_reader_sees_every_byte() {
        let mut counting = CountingReader::new(RECORDING.as_bytes());
        JsonLinesLoader.load(&mut counting).unwrap();
        assert_eq!(counting.byte_count(), RECORDING.len() as u64);
    }

    #[test]
    fn malformed_line_reports_line_number() {
        let input = "{\"type\": \"a\"}\nnot json\n";
        let err = JsonLinesLoader.load(&mut input.as_bytes()).unwrap_err();
        match err {
            LoadError::Malformed { line, .. } => assert_eq!(line, 2),
            other => panic!("expected malformed, got {other:?}"),
        }
    }

    #[test]
    fn empty_stream_is_an_error() {
        let err = JsonLinesLoader.load(&mut "\n\n".as_bytes()).unwrap_err();
        assert!(matches!(err, LoadError::Empty));
    }
}
