//! ---
//! emc_section: "03-persistence-logging"
//! emc_subsection: "module"
//! emc_type: "source"
//! emc_scope: "code"
//! emc_description: "Message store and storage bindings."
//! emc_version: "v0.0.0-prealpha"
//! emc_owner: "tbd"
//! ---
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use r_emc_msg::MessageRecord;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::{Result, StoreError};

/// Current store document envelope version.
pub const STORE_VERSION: u16 = 1;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreEnvelope {
    version: u16,
    updated_at: DateTime<Utc>,
    hash: String,
    messages: Vec<MessageRecord>,
}

/// Persist the full message set to `path`.
///
/// The document is written next to the target and renamed over it, so readers
/// never observe a partially written file.
pub fn save_document(messages: &[MessageRecord], path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let envelope = StoreEnvelope {
        version: STORE_VERSION,
        updated_at: Utc::now(),
        hash: compute_hash(messages)?,
        messages: messages.to_vec(),
    };

    let staging = staging_path(path);
    {
        let mut writer = BufWriter::new(File::create(&staging)?);
        serde_json::to_writer_pretty(&mut writer, &envelope)?;
        writer.flush()?;
    }
    fs::rename(&staging, path)?;
    Ok(())
}

/// Load the message set; a missing document is an empty store.
pub fn load_document(path: &Path) -> Result<Vec<MessageRecord>> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    let envelope = load_envelope(path)?;
    if envelope.version != STORE_VERSION {
        return Err(StoreError::UnsupportedVersion(envelope.version));
    }
    if compute_hash(&envelope.messages)? != envelope.hash {
        return Err(StoreError::HashMismatch);
    }
    Ok(envelope.messages)
}

/// Verify the integrity of a document without returning its records.
pub fn verify_document(path: &Path) -> bool {
    match load_envelope(path) {
        Ok(envelope) => compute_hash(&envelope.messages)
            .map(|hash| hash == envelope.hash)
            .unwrap_or(false),
        Err(_) => false,
    }
}

fn load_envelope(path: &Path) -> Result<StoreEnvelope> {
    let bytes = fs::read(path)?;
    Ok(serde_json::from_slice(&bytes)?)
}

fn compute_hash(messages: &[MessageRecord]) -> Result<String> {
    let serialized = serde_json::to_vec(messages)?;
    Ok(hex::encode(Sha256::digest(serialized)))
}

fn staging_path(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
