//! Session archive format.
//!
//! A plain tar container:
//!
//! ```text
//! manifest.json        format version, counts, recording file name
//! session.json         session metadata
//! events.jsonl         one event per line
//! bookmarks.json       optional
//! recording/<file>     optional
//! ```
//!
//! These functions do blocking file I/O; async callers wrap them in
//! `tokio::task::spawn_blocking`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::Path;
use tar::{Archive, Builder, EntryType, Header};

use crate::backend::{ArchiveSummary, Bookmark, Session, SessionEvent};
use crate::BridgeError;

pub const FORMAT_VERSION: u32 = 1;

const MANIFEST: &str = "manifest.json";
const SESSION: &str = "session.json";
const EVENTS: &str = "events.jsonl";
const BOOKMARKS: &str = "bookmarks.json";
const RECORDING_DIR: &str = "recording/";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArchiveManifest {
    pub format_version: u32,
    pub exported_at: DateTime<Utc>,
    pub session_id: String,
    pub event_count: usize,
    pub has_bookmarks: bool,
    pub has_recording: bool,
    pub recording_file: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordingAsset {
    pub file_name: String,
    pub bytes: Vec<u8>,
}

/// Everything a session archive holds.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionArchive {
    pub session: Session,
    pub events: Vec<SessionEvent>,
    pub bookmarks: Vec<Bookmark>,
    pub recording: Option<RecordingAsset>,
}

fn export_err(message: impl Into<String>) -> BridgeError {
    BridgeError::backend("export_session", message)
}

fn import_err(message: impl Into<String>) -> BridgeError {
    BridgeError::backend("import_session", message)
}

impl SessionArchive {
    pub fn manifest(&self) -> ArchiveManifest {
        ArchiveManifest {
            format_version: FORMAT_VERSION,
            exported_at: Utc::now(),
            session_id: self.session.id.clone(),
            event_count: self.events.len(),
            has_bookmarks: !self.bookmarks.is_empty(),
            has_recording: self.recording.is_some(),
            recording_file: self.recording.as_ref().map(|r| r.file_name.clone()),
        }
    }

    /// Write the archive to `path`, replacing any existing file.
    ///
    /// The tar is assembled in a sibling temp file and renamed into place, so
    /// a failed export never leaves a truncated archive behind.
    pub fn write_to(&self, path: &Path) -> Result<ArchiveSummary, BridgeError> {
        let parent = path
            .parent()
            .filter(|p| !p.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| {
            export_err(format!("cannot create {}: {}", parent.display(), e))
        })?;

        let staging = tempfile::Builder::new()
            .prefix(".autobridge-export-")
            .suffix(".tar")
            .tempfile_in(parent)
            .map_err(|e| export_err(e.to_string()))?;
        let file = staging.reopen().map_err(|e| export_err(e.to_string()))?;
        let mut builder = Builder::new(file);

        let manifest = self.manifest();
        append(&mut builder, MANIFEST, &serde_json::to_vec_pretty(&manifest)?)?;
        append(&mut builder, SESSION, &serde_json::to_vec_pretty(&self.session)?)?;

        let mut events = Vec::new();
        for event in &self.events {
            serde_json::to_writer(&mut events, event)?;
            events.push(b'\n');
        }
        append(&mut builder, EVENTS, &events)?;

        if !self.bookmarks.is_empty() {
            append(&mut builder, BOOKMARKS, &serde_json::to_vec_pretty(&self.bookmarks)?)?;
        }
        if let Some(recording) = &self.recording {
            let name = format!("{}{}", RECORDING_DIR, recording.file_name);
            append(&mut builder, &name, &recording.bytes)?;
        }
        builder.finish().map_err(|e| export_err(e.to_string()))?;
        drop(builder);

        staging
            .persist(path)
            .map_err(|e| export_err(format!("cannot write {}: {}", path.display(), e.error)))?;

        Ok(ArchiveSummary {
            path: path.display().to_string(),
            session_id: manifest.session_id,
            event_count: manifest.event_count,
            has_bookmarks: manifest.has_bookmarks,
            has_recording: manifest.has_recording,
        })
    }

    /// Read and validate an archive.
    pub fn read_from(path: &Path) -> Result<Self, BridgeError> {
        let file = fs::File::open(path)
            .map_err(|e| import_err(format!("cannot open {}: {}", path.display(), e)))?;
        let mut archive = Archive::new(file);

        let mut manifest: Option<ArchiveManifest> = None;
        let mut session: Option<Session> = None;
        let mut events = Vec::new();
        let mut bookmarks = Vec::new();
        let mut recording = None;

        for entry in archive.entries().map_err(|e| import_err(e.to_string()))? {
            let mut entry = entry.map_err(|e| import_err(e.to_string()))?;
            match entry.header().entry_type() {
                EntryType::Regular => {}
                EntryType::Directory => continue,
                _ => return Err(import_err("archive contains special entries")),
            }
            let name = entry
                .path()
                .map_err(|e| import_err(e.to_string()))?
                .to_string_lossy()
                .into_owned();

            match name.as_str() {
                MANIFEST => manifest = Some(read_json(&mut entry, MANIFEST)?),
                SESSION => session = Some(read_json(&mut entry, SESSION)?),
                BOOKMARKS => bookmarks = read_json(&mut entry, BOOKMARKS)?,
                EVENTS => {
                    for (n, line) in BufReader::new(&mut entry).lines().enumerate() {
                        let line = line.map_err(|e| import_err(e.to_string()))?;
                        if line.trim().is_empty() {
                            continue;
                        }
                        let event = serde_json::from_str(&line).map_err(|e| {
                            import_err(format!("{} line {}: {}", EVENTS, n + 1, e))
                        })?;
                        events.push(event);
                    }
                }
                other => {
                    if let Some(file_name) = other.strip_prefix(RECORDING_DIR) {
                        // Nested paths are not part of the format.
                        if file_name.is_empty() || file_name.contains('/') || file_name.contains("..") {
                            return Err(import_err(format!("invalid recording entry {}", other)));
                        }
                        let mut bytes = Vec::new();
                        entry
                            .read_to_end(&mut bytes)
                            .map_err(|e| import_err(e.to_string()))?;
                        recording = Some(RecordingAsset {
                            file_name: file_name.to_string(),
                            bytes,
                        });
                    } else {
                        tracing::debug!(entry = other, "ignoring unknown archive entry");
                    }
                }
            }
        }

        let manifest = manifest.ok_or_else(|| import_err(format!("archive has no {}", MANIFEST)))?;
        if manifest.format_version > FORMAT_VERSION {
            return Err(import_err(format!(
                "archive format version {} is newer than supported version {}",
                manifest.format_version, FORMAT_VERSION
            )));
        }
        let session = session.ok_or_else(|| import_err(format!("archive has no {}", SESSION)))?;
        if session.id != manifest.session_id {
            return Err(import_err("manifest and session ids differ"));
        }

        Ok(Self {
            session,
            events,
            bookmarks,
            recording,
        })
    }

    /// Give the archived session a fresh identity so it cannot collide with
    /// the original.
    pub fn into_imported(mut self) -> Self {
        let original_id = std::mem::take(&mut self.session.id);
        let new_id = uuid::Uuid::new_v4().to_string();

        for event in &mut self.events {
            event.session_id = new_id.clone();
        }
        self.session.id = new_id;
        self.session.session_type = "import".to_string();
        self.session.imported_from = Some(original_id);
        self.session.event_count = self.events.len();
        if let Some(recording) = &self.recording {
            self.session.recording = Some(recording.file_name.clone());
        }
        self
    }
}

fn append(builder: &mut Builder<fs::File>, name: &str, bytes: &[u8]) -> Result<(), BridgeError> {
    let mut header = Header::new_gnu();
    header.set_size(bytes.len() as u64);
    header.set_mode(0o644);
    header.set_mtime(Utc::now().timestamp().max(0) as u64);
    header.set_entry_type(EntryType::Regular);
    header.set_cksum();
    builder
        .append_data(&mut header, name, bytes)
        .map_err(|e| export_err(format!("{}: {}", name, e)))
}

fn read_json<T, R>(reader: &mut R, name: &str) -> Result<T, BridgeError>
where
    T: serde::de::DeserializeOwned,
    R: Read,
{
    serde_json::from_reader(reader).map_err(|e| import_err(format!("{}: {}", name, e)))
}
