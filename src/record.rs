//! # Session Recorder
//!
//! Writes decoded telemetry samples to JSONL files with rotation.
//!
//! This module handles:
//! - Formatting each applied sample as one JSON line
//! - Writing to rotating log files (max N records per file)
//! - Retaining only the last M files

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::PathBuf;

use crate::config::RecordConfig;
use crate::error::Result;
use crate::protocol::Value;

/// Log file name prefix; rotation pruning only ever touches these
const FILE_PREFIX: &str = "telemetry-";

/// One recorded sample, serialized as a single JSON line
#[derive(Debug, Serialize)]
struct SampleRecord<'a> {
    /// Wall-clock time the sample was applied to the store
    received_at: DateTime<Utc>,
    /// Channel display name
    channel: &'a str,
    /// Device timestamp in milliseconds since session start
    timestamp_ms: u64,
    /// Numeric or text sample value
    value: &'a Value,
}

/// JSONL recorder with file rotation
pub struct SessionRecorder {
    dir: PathBuf,
    max_records_per_file: usize,
    max_files_to_keep: usize,
    writer: Option<BufWriter<File>>,
    records_in_file: usize,
    file_seq: u64,
}

impl std::fmt::Debug for SessionRecorder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRecorder")
            .field("dir", &self.dir)
            .field("file_seq", &self.file_seq)
            .finish_non_exhaustive()
    }
}

impl SessionRecorder {
    /// Create a recorder, creating the log directory if needed
    ///
    /// # Errors
    ///
    /// Returns error if the log directory cannot be created.
    pub fn new(config: &RecordConfig) -> Result<Self> {
        let dir = PathBuf::from(&config.log_dir);
        fs::create_dir_all(&dir)?;

        Ok(Self {
            dir,
            max_records_per_file: config.max_records_per_file,
            max_files_to_keep: config.max_files_to_keep,
            writer: None,
            records_in_file: 0,
            file_seq: 0,
        })
    }

    /// Append one sample as a JSON line, rotating files as needed
    ///
    /// # Errors
    ///
    /// Returns error if the log file cannot be written or rotated.
    pub fn record(&mut self, channel: &str, timestamp_ms: u64, value: &Value) -> Result<()> {
        if self.writer.is_none() || self.records_in_file >= self.max_records_per_file {
            self.rotate()?;
        }

        let record = SampleRecord {
            received_at: Utc::now(),
            channel,
            timestamp_ms,
            value,
        };
        let line = serde_json::to_string(&record).map_err(std::io::Error::other)?;

        // rotate() always leaves a writer in place
        if let Some(writer) = self.writer.as_mut() {
            writeln!(writer, "{}", line)?;
            self.records_in_file += 1;
        }
        Ok(())
    }

    /// Flush buffered lines to disk
    pub fn flush(&mut self) -> Result<()> {
        if let Some(writer) = self.writer.as_mut() {
            writer.flush()?;
        }
        Ok(())
    }

    /// Open the next log file and prune the oldest beyond the retention cap
    fn rotate(&mut self) -> Result<()> {
        // Finish the current file before switching
        self.flush()?;

        self.file_seq += 1;
        let name = format!(
            "{}{}-{:04}.jsonl",
            FILE_PREFIX,
            Utc::now().format("%Y%m%d-%H%M%S"),
            self.file_seq
        );
        let file = File::create(self.dir.join(name))?;
        self.writer = Some(BufWriter::new(file));
        self.records_in_file = 0;

        self.prune()?;
        Ok(())
    }

    /// Delete the oldest log files until at most `max_files_to_keep` remain
    fn prune(&self) -> Result<()> {
        let mut files: Vec<PathBuf> = fs::read_dir(&self.dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .map_or(false, |name| {
                        name.starts_with(FILE_PREFIX) && name.ends_with(".jsonl")
                    })
            })
            .collect();

        // File names sort chronologically (timestamp + sequence number)
        files.sort();
        while files.len() > self.max_files_to_keep {
            fs::remove_file(files.remove(0))?;
        }
        Ok(())
    }
}
