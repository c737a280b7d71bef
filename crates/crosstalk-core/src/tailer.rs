//! Incremental reader for growing JSONL transcripts.
//!
//! Transcripts live at `<root>/<project-dir>/<session-id>.jsonl`. The tailer
//! keeps a byte offset per file and only ever reads what was appended since
//! the previous read. A line the producer has not finished writing yet is
//! held back in a per-file buffer and completed by the next read.

use crate::parser::parse_line;
use crate::Result;
use chrono::Utc;
use crosstalk_types::{ActivityEvent, SESSION_INDEX_FILE};
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// Extension of transcript files.
pub const TRANSCRIPT_EXTENSION: &str = "jsonl";

/// Read position for one transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TailState {
    /// Bytes consumed from the file so far.
    offset: u64,
    /// Trailing bytes of a line whose newline has not been written yet.
    pending: Vec<u8>,
}

impl TailState {
    pub fn offset(&self) -> u64 {
        self.offset
    }

    /// Position just after the last complete line.
    pub fn committed_offset(&self) -> u64 {
        self.offset - self.pending.len() as u64
    }

    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

/// Tails every transcript below one projects root.
pub struct TranscriptTailer {
    root: PathBuf,
    files: HashMap<PathBuf, TailState>,
}

impl TranscriptTailer {
    pub fn new(root: PathBuf) -> Self {
        Self {
            root,
            files: HashMap::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record the current size of every existing transcript so that history
    /// written before watching began is never replayed.
    ///
    /// Returns the number of transcripts found.
    pub fn prime(&mut self) -> usize {
        let project_dirs = match std::fs::read_dir(&self.root) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(target: "crosstalk::tailer", "Cannot list {:?}: {}", self.root, e);
                return 0;
            }
        };

        let mut primed = 0;
        for project_dir in project_dirs.flatten() {
            let dir_path = project_dir.path();
            if !dir_path.is_dir() {
                continue;
            }

            let Ok(entries) = std::fs::read_dir(&dir_path) else {
                continue;
            };

            for entry in entries.flatten() {
                let path = entry.path();
                if !self.is_transcript(&path) {
                    continue;
                }
                match entry.metadata() {
                    Ok(meta) if meta.is_file() => {
                        self.files.insert(
                            path,
                            TailState {
                                offset: meta.len(),
                                pending: Vec::new(),
                            },
                        );
                        primed += 1;
                    }
                    Ok(_) => {}
                    Err(e) => {
                        debug!(target: "crosstalk::tailer", "Cannot stat {:?}: {}", path, e);
                    }
                }
            }
        }

        debug!(target: "crosstalk::tailer", "Primed {} existing transcripts under {:?}", primed, self.root);
        primed
    }

    /// Whether `path` is a transcript directly inside a project directory.
    pub fn is_transcript(&self, path: &Path) -> bool {
        if path.extension().map(|ext| ext != TRANSCRIPT_EXTENSION).unwrap_or(true) {
            return false;
        }
        if path.file_name().map(|n| n == SESSION_INDEX_FILE).unwrap_or(false) {
            return false;
        }
        path.strip_prefix(&self.root)
            .map(|rel| rel.components().count() == 2)
            .unwrap_or(false)
    }

    /// Read newly appended lines and parse them into activity events.
    ///
    /// Lines that are not valid records are dropped; the offset still moves
    /// past them. On I/O failure the stored state is left untouched so the
    /// next call retries from the same place.
    pub fn poll(&mut self, path: &Path) -> Result<Vec<ActivityEvent>> {
        let lines = self.read_new_lines(path)?;
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let Some(session_id) = session_id_for(path) else {
            return Ok(Vec::new());
        };
        let ingested_at = Utc::now();

        let mut events = Vec::new();
        for line in lines {
            match parse_line(&line, &session_id, ingested_at) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => {}
                Err(e) => {
                    let preview = String::from_utf8_lossy(&line[..line.len().min(100)]).into_owned();
                    trace!(
                        target: "crosstalk::tailer",
                        "Skipping malformed line in {:?}: {} - {}",
                        path,
                        e,
                        preview
                    );
                }
            }
        }

        Ok(events)
    }

    /// Read complete lines appended since the last call.
    pub fn read_new_lines(&mut self, path: &Path) -> Result<Vec<Vec<u8>>> {
        let mut file = File::open(path)?;
        let file_len = file.metadata()?.len();

        let known_offset = self.files.get(path).map(|s| s.offset);
        let mut start = known_offset.unwrap_or(0);

        // A shorter file means it was replaced; start over.
        let truncated = file_len < start;
        if truncated {
            start = 0;
        }

        if file_len == start && !truncated {
            if known_offset.is_none() {
                self.files.insert(path.to_path_buf(), TailState::default());
            }
            return Ok(Vec::new());
        }

        file.seek(SeekFrom::Start(start))?;
        let mut buf = Vec::with_capacity((file_len - start) as usize);
        // Never read past the size observed above.
        file.take(file_len - start).read_to_end(&mut buf)?;

        let state = self.files.entry(path.to_path_buf()).or_default();
        if truncated {
            debug!(target: "crosstalk::tailer", "Transcript {:?} was truncated, reading from start", path);
            state.pending.clear();
        }
        state.offset = start + buf.len() as u64;
        state.pending.extend_from_slice(&buf);

        Ok(take_complete_lines(&mut state.pending))
    }

    /// Drop the state of a removed transcript; a re-created file is read from the start.
    pub fn forget(&mut self, path: &Path) -> bool {
        self.files.remove(path).is_some()
    }

    pub fn state(&self, path: &Path) -> Option<&TailState> {
        self.files.get(path)
    }

    pub fn tracked_files(&self) -> usize {
        self.files.len()
    }
}

/// Split off every complete line in `buffer`, leaving any unterminated tail.
fn take_complete_lines(buffer: &mut Vec<u8>) -> Vec<Vec<u8>> {
    let Some(last_newline) = buffer.iter().rposition(|&b| b == b'\n') else {
        return Vec::new();
    };

    let complete: Vec<u8> = buffer.drain(..=last_newline).collect();
    complete
        .split(|&b| b == b'\n')
        .map(|line| line.strip_suffix(b"\r").unwrap_or(line))
        .filter(|line| !line.iter().all(u8::is_ascii_whitespace))
        .map(<[u8]>::to_vec)
        .collect()
}

/// Session id of a transcript: its file stem.
pub fn session_id_for(path: &Path) -> Option<String> {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.is_empty())
}

/// Project path encoded in a project directory name (`-home-dev-app` → `/home/dev/app`).
pub fn project_path_for(path: &Path) -> Option<String> {
    let dir = if path.is_dir() { path } else { path.parent()? };
    dir.file_name()
        .map(|name| name.to_string_lossy().replace('-', "/"))
}
