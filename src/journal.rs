//! Append-only event journal
//!
//! One newline-delimited JSON record per event, in a single file that only
//! grows while open. The file is removed whole after a confirmed flush;
//! it is never partially truncated. Reads go through an independent handle
//! so a closed write handle is all that is needed before draining.

use std::fs;
use std::io::{self, BufReader, Write};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::event::Event;

/// The on-disk event queue.
#[derive(Debug)]
pub struct Journal {
    path: PathBuf,
    writer: Option<fs::File>,
}

impl Journal {
    /// Open the journal at `path` for appending, creating it if needed.
    pub fn open(path: PathBuf) -> Result<Journal> {
        let file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| Error::Store(format!("opening event journal: {}", e)))?;

        Ok(Journal {
            path,
            writer: Some(file),
        })
    }

    /// A journal with no write handle. Appends are silent no-ops; reads and
    /// clears still work. Used when tracking is disabled or degraded.
    pub fn closed(path: PathBuf) -> Journal {
        Journal { path, writer: None }
    }

    /// Whether a write handle is open
    pub fn is_open(&self) -> bool {
        self.writer.is_some()
    }

    /// The backing file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Append one event as a self-delimited JSON record.
    ///
    /// A journal without a write handle accepts and drops the event:
    /// recording must never surface hard errors to producers.
    pub fn append(&mut self, event: &Event) -> Result<()> {
        let writer = match self.writer.as_mut() {
            Some(w) => w,
            None => return Ok(()),
        };

        let mut line = serde_json::to_vec(event)?;
        line.push(b'\n');
        writer.write_all(&line)?;
        Ok(())
    }

    /// Read every event, oldest first, through an independent handle.
    ///
    /// An absent file reads as empty. A record that fails to decode aborts
    /// the read; journal corruption is surfaced, not repaired.
    pub fn read_all(&self) -> Result<Vec<Event>> {
        let file = match fs::File::open(&self.path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(Error::Store(format!("opening event journal: {}", e))),
        };

        let reader = BufReader::new(file);
        let mut events = Vec::new();

        for record in serde_json::Deserializer::from_reader(reader).into_iter::<Event>() {
            let event =
                record.map_err(|e| Error::Store(format!("decoding event journal: {}", e)))?;
            events.push(event);
        }

        Ok(events)
    }

    /// Number of queued events. O(n) in journal size, which is bounded by
    /// the flush cadence.
    pub fn count(&self) -> Result<usize> {
        Ok(self.read_all()?.len())
    }

    /// Delete the backing file. Only called once delivery is confirmed;
    /// an already-absent file counts as cleared.
    pub fn clear(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::Store(format!("clearing event journal: {}", e))),
        }
    }

    /// Release the write handle. Idempotent; required before another
    /// handle can safely drain and delete the file.
    pub fn close(&mut self) -> Result<()> {
        if let Some(mut writer) = self.writer.take() {
            writer.flush()?;
        }
        Ok(())
    }
}
