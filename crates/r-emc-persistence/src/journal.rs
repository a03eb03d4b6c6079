//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
//! Append-only JSON-lines audit journal of store operations.
//!
//! The first line is a header; every following line is one [`JournalEntry`].
//! The journal is informational: the store document remains the source of truth.

use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use r_emc_msg::{MessageId, MessageType};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::document::STORE_VERSION;
use crate::{Result, StoreError};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct JournalHeader {
    version: u16,
    created_at: DateTime<Utc>,
    hash: String,
}

impl JournalHeader {
    fn new() -> Self {
        let created_at = Utc::now();
        let hash = hex::encode(Sha256::digest(created_at.to_rfc3339().as_bytes()));
        Self {
            version: STORE_VERSION,
            created_at,
            hash,
        }
    }
}

/// Store operation captured in the journal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum StoreOperation {
    /// A new record entered the store.
    Recorded {
        /// Record id.
        id: MessageId,
        /// Record name.
        name: String,
        /// Record type.
        message_type: MessageType,
        /// Persisted flag at creation.
        saved: bool,
        /// Sent flag at creation.
        sent: bool,
    },
    /// An existing record was transmitted.
    Sent {
        /// Record id.
        id: MessageId,
    },
    /// A record was removed.
    Deleted {
        /// Record id.
        id: MessageId,
        /// Removed as part of a confirmed overwrite.
        overwrite: bool,
    },
    /// A save was held back pending overwrite confirmation.
    ConflictsReported {
        /// Candidate name.
        name: String,
        /// Conflicting records.
        conflicts: Vec<MessageId>,
    },
    /// A send was refused as ineligible.
    Refused {
        /// Candidate name.
        name: String,
        /// Candidate type.
        message_type: MessageType,
    },
}

/// Journal line.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JournalEntry {
    /// Sequential identifier assigned when appending.
    pub sequence: u64,
    /// Timestamp when the operation was recorded.
    pub timestamp: DateTime<Utc>,
    /// Operation details.
    pub operation: StoreOperation,
}

/// Append-only writer for the journal.
#[derive(Debug)]
pub struct JournalWriter {
    path: PathBuf,
    writer: BufWriter<File>,
    next_sequence: u64,
}

impl JournalWriter {
    /// Open a journal for appending, writing a header if the file is new.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let fresh = !path.exists() || fs::metadata(path)?.len() == 0;
        let next_sequence = if fresh { 0 } else { last_sequence(path)? };
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let mut writer = BufWriter::new(file);
        if fresh {
            serde_json::to_writer(&mut writer, &JournalHeader::new())?;
            writer.write_all(b"\n")?;
            writer.flush()?;
        }
        Ok(Self {
            path: path.to_path_buf(),
            writer,
            next_sequence,
        })
    }

    /// Append an operation and return the assigned sequence number and byte count.
    pub fn append(&mut self, operation: StoreOperation) -> Result<(u64, usize)> {
        self.next_sequence += 1;
        let entry = JournalEntry {
            sequence: self.next_sequence,
            timestamp: Utc::now(),
            operation,
        };
        let line = serde_json::to_string(&entry)?;
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok((entry.sequence, line.len() + 1))
    }

    /// Location on disk.
    pub fn path(&self) -> &Path {
        &self.path
    }

    #[cfg(test)]
    pub(crate) fn from_file(path: &Path, file: File) -> Self {
        Self {
            path: path.to_path_buf(),
            writer: BufWriter::new(file),
            next_sequence: 0,
        }
    }
}

fn last_sequence(path: &Path) -> Result<u64> {
    let mut last = 0;
    for entry in JournalReader::open(path)? {
        last = entry?.sequence;
    }
    Ok(last)
}

/// Replay the journal in order, invoking the callback for each entry.
pub fn replay<F>(path: &Path, mut handler: F) -> Result<usize>
where
    F: FnMut(JournalEntry) -> Result<()>,
{
    let mut count = 0usize;
    for entry in JournalReader::open(path)? {
        handler(entry?)?;
        count += 1;
    }
    Ok(count)
}

/// Streaming iterator over journal entries.
pub struct JournalReader {
    lines: std::io::Lines<BufReader<File>>,
}

impl JournalReader {
    /// Open the journal for sequential reading.
    pub fn open(path: &Path) -> Result<Self> {
        let mut reader = BufReader::new(File::open(path)?);
        let mut header = String::new();
        reader.read_line(&mut header)?;
        Ok(Self {
            lines: reader.lines(),
        })
    }
}

impl Iterator for JournalReader {
    type Item = Result<JournalEntry>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            match self.lines.next()? {
                Ok(line) if line.trim().is_empty() => continue,
                Ok(line) => return Some(serde_json::from_str(&line).map_err(StoreError::from)),
                Err(err) => return Some(Err(err.into())),
            }
        }
    }
}
