use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;
use std::sync::Mutex;

use crate::datum::FetchedDatum;
use crate::error::{Error, Result};

/// Append-only writer for completion records.
///
/// One sink is shared by every queue in the process, so implementations
/// must serialize their own writes; callers only ever hold a shared handle.
pub trait OutputSink: Send + Sync {
    /// Append one completion record
    fn append(&self, datum: FetchedDatum) -> Result<()>;
}

/// Sink that collects records in memory.
///
/// The default for tests and small crawls where the caller post-processes
/// results in the same process.
#[derive(Debug, Default)]
pub struct MemorySink {
    records: Mutex<Vec<FetchedDatum>>,
}

impl MemorySink {
    /// Create a new, empty sink
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the records appended so far
    pub fn records(&self) -> Vec<FetchedDatum> {
        self.records.lock().expect("sink lock poisoned").clone()
    }

    /// Number of records appended so far
    pub fn len(&self) -> usize {
        self.records.lock().expect("sink lock poisoned").len()
    }

    /// Whether no records have been appended
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl OutputSink for MemorySink {
    fn append(&self, datum: FetchedDatum) -> Result<()> {
        self.records.lock().expect("sink lock poisoned").push(datum);
        Ok(())
    }
}

/// Sink that writes each record as one JSON line to a file.
pub struct JsonLinesSink {
    writer: Mutex<BufWriter<File>>,
}

impl JsonLinesSink {
    /// Create the output file, truncating any existing content
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let file = File::create(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    fn write_line(writer: &mut BufWriter<File>, line: &[u8]) -> std::io::Result<()> {
        writer.write_all(line)?;
        writer.write_all(b"\n")?;
        writer.flush()
    }
}

impl OutputSink for JsonLinesSink {
    fn append(&self, datum: FetchedDatum) -> Result<()> {
        let line = serde_json::to_string(&datum)?;
        let mut writer = self.writer.lock().expect("sink lock poisoned");
        Self::write_line(&mut writer, line.as_bytes())
            .map_err(|error| Error::sink(error.to_string()))
    }
}
