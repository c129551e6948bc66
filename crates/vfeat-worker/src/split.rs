//! Manifest splitting.
//!
//! Streams a large JSON array record by record and writes fixed-size chunks
//! to `<prefix>_<k>.json`, so a multi-gigabyte annotation file never has to
//! be held in memory.

use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use serde::de::{self, Deserializer as _, SeqAccess, Visitor};
use serde_json::Value;
use tracing::info;

use crate::error::{WorkerError, WorkerResult};

/// What a split produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SplitSummary {
    pub records: usize,
    pub files: Vec<PathBuf>,
}

/// Path of chunk `index` for `prefix`.
pub fn chunk_path(prefix: &Path, index: usize) -> PathBuf {
    PathBuf::from(format!("{}_{index}.json", prefix.display()))
}

/// Split the JSON array at `input` into chunks of `records_per_file`.
///
/// The last chunk holds the remainder. An empty array writes nothing.
pub fn split_manifest(input: &Path, prefix: &Path, records_per_file: usize) -> WorkerResult<SplitSummary> {
    if records_per_file == 0 {
        return Err(WorkerError::config("records per file must be at least 1"));
    }

    let file = File::open(input)
        .map_err(|e| WorkerError::malformed(format!("cannot read {}: {e}", input.display())))?;
    let mut writer = ChunkWriter::new(prefix, records_per_file);

    let mut de = serde_json::Deserializer::from_reader(BufReader::new(file));
    let parsed = de
        .deserialize_seq(RecordVisitor(&mut writer))
        .and_then(|()| de.end());

    // A write failure surfaces through serde as a custom error; report the
    // original instead
    if let Some(e) = writer.error.take() {
        return Err(e);
    }
    parsed.map_err(|e| WorkerError::malformed(format!("{}: {e}", input.display())))?;

    writer.flush()?;
    info!(
        input = %input.display(),
        records = writer.summary.records,
        files = writer.summary.files.len(),
        "Manifest split complete"
    );
    Ok(writer.summary)
}

struct ChunkWriter<'a> {
    prefix: &'a Path,
    per_file: usize,
    buffer: Vec<Value>,
    summary: SplitSummary,
    error: Option<WorkerError>,
}

impl<'a> ChunkWriter<'a> {
    fn new(prefix: &'a Path, per_file: usize) -> Self {
        Self {
            prefix,
            per_file,
            buffer: Vec::with_capacity(per_file.min(65_536)),
            summary: SplitSummary::default(),
            error: None,
        }
    }

    fn push(&mut self, record: Value) -> WorkerResult<()> {
        self.buffer.push(record);
        self.summary.records += 1;
        if self.buffer.len() >= self.per_file {
            self.flush()?;
        }
        Ok(())
    }

    fn flush(&mut self) -> WorkerResult<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }

        let path = chunk_path(self.prefix, self.summary.files.len());
        let mut out = BufWriter::new(File::create(&path)?);
        serde_json::to_writer_pretty(&mut out, &self.buffer)
            .map_err(|e| WorkerError::Io(e.into()))?;
        out.flush()?;

        info!(
            file = %path.display(),
            records = self.buffer.len(),
            total = self.summary.records,
            "Wrote manifest chunk"
        );
        self.summary.files.push(path);
        self.buffer.clear();
        Ok(())
    }
}

struct RecordVisitor<'w, 'a>(&'w mut ChunkWriter<'a>);

impl<'de> Visitor<'de> for RecordVisitor<'_, '_> {
    type Value = ();

    fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str("a JSON array of records")
    }

    fn visit_seq<A>(self, mut seq: A) -> Result<(), A::Error>
    where
        A: SeqAccess<'de>,
    {
        while let Some(record) = seq.next_element::<Value>()? {
            if let Err(e) = self.0.push(record) {
                let msg = e.to_string();
                self.0.error = Some(e);
                return Err(de::Error::custom(msg));
            }
        }
        Ok(())
    }
}
