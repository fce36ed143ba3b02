// jsonl.rs — Append-only JSONL action log.
//
// One JSON object per line. Each line carries `previous_hash`, the SHA-256
// of the line before it, so inserting, deleting or editing a line breaks the
// chain and is caught by `verify_chain`.
//
// Any number of handles, in this process or in others, may share a file.
// Each handle caches the entries it has read and the byte offset they end
// at, and tails newer lines before every read and append. Appends serialize
// on `<log>.locks/writer.lock`; policy leases are one lock file per policy
// in the same directory.

use std::fs::{self, File, OpenOptions};
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use fs2::FileExt;

use crate::entry::{ActionLogEntry, ActionStatus, NewLogEntry};
use crate::error::{poisoned, LedgerError};
use crate::hasher;
use crate::log::{matches, next_timestamp, ActionLog, LogLease, UtcDay};

const WRITER_LOCK: &str = "writer.lock";

struct State {
    file: File,
    /// Length of the prefix already folded into `entries`. Always a line end.
    offset: u64,
    /// Hash of the last line read or written, linked from the next entry.
    last_hash: Option<String>,
    last_created_at: Option<DateTime<Utc>>,
    entries: Vec<ActionLogEntry>,
}

impl State {
    /// Fold in the complete lines written since `offset`. Nothing is
    /// committed unless every new line parses.
    fn catch_up(&mut self, path: &Path) -> Result<usize, LedgerError> {
        let (lines, end) = read_lines_from(path, self.offset)?;
        if end == self.offset {
            return Ok(0);
        }

        let mut fresh: Vec<ActionLogEntry> = Vec::new();
        let mut last_hash = None;
        for line in lines.iter().filter(|l| !l.trim().is_empty()) {
            fresh.push(serde_json::from_str(line)?);
            last_hash = Some(hasher::hash_line(line));
        }

        if last_hash.is_some() {
            self.last_hash = last_hash;
        }
        if let Some(latest) = fresh.iter().map(|e| e.created_at).max() {
            self.last_created_at = Some(self.last_created_at.map_or(latest, |t| t.max(latest)));
        }
        self.offset = end;
        let added = fresh.len();
        self.entries.extend(fresh);
        Ok(added)
    }

    /// Write one line at `offset`. Bytes past `offset` can only be the
    /// unterminated tail of an interrupted write, and are cut first. A failed
    /// write is cut back the same way, so the file never keeps half a line.
    fn write_line(&mut self, json: &str) -> Result<(), LedgerError> {
        let len = self.file.metadata()?.len();
        if len > self.offset {
            tracing::warn!(
                offset = self.offset,
                discarded = len - self.offset,
                "dropping incomplete line at end of action log"
            );
            self.file.set_len(self.offset)?;
        }

        let mut line = String::with_capacity(json.len() + 1);
        line.push_str(json);
        line.push('\n');
        if let Err(e) = self.file.write_all(line.as_bytes()) {
            let _ = self.file.set_len(self.offset);
            return Err(e.into());
        }
        self.offset += line.len() as u64;
        Ok(())
    }
}

/// An action log backed by a JSONL file.
pub struct JsonlActionLog {
    path: PathBuf,
    locks: PathBuf,
    state: Mutex<State>,
}

impl JsonlActionLog {
    /// Open (or create) the log at `path`, loading existing entries and
    /// recovering the chain head so new lines link correctly.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LedgerError> {
        let path = path.as_ref().to_path_buf();
        let locks = locks_dir(&path);
        fs::create_dir_all(&locks).map_err(|source| LedgerError::OpenFailed {
            path: locks.clone(),
            source,
        })?;

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| LedgerError::OpenFailed {
                path: path.clone(),
                source,
            })?;

        let mut state = State {
            file,
            offset: 0,
            last_hash: None,
            last_created_at: None,
            entries: Vec::new(),
        };
        let loaded = state.catch_up(&path)?;
        tracing::debug!(path = %path.display(), entries = loaded, "action log opened");

        Ok(Self {
            path,
            locks,
            state: Mutex::new(state),
        })
    }

    /// Every entry in a log file, oldest first. Blank lines and an
    /// unterminated last line are skipped.
    pub fn read_all(path: impl AsRef<Path>) -> Result<Vec<ActionLogEntry>, LedgerError> {
        let (lines, _) = read_lines_from(path.as_ref(), 0)?;
        lines
            .iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| serde_json::from_str::<ActionLogEntry>(l).map_err(LedgerError::from))
            .collect()
    }

    /// Walk the file and check that each entry links to the line before it.
    ///
    /// The link is the SHA-256 of the raw line as stored; re-encoding the
    /// entry could reorder fields. A broken link is reported with its
    /// 1-based line number.
    pub fn verify_chain(path: impl AsRef<Path>) -> Result<bool, LedgerError> {
        let (lines, _) = read_lines_from(path.as_ref(), 0)?;
        let mut previous_hash: Option<String> = None;

        for (index, line) in lines.iter().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let entry: ActionLogEntry = serde_json::from_str(line)?;
            if entry.previous_hash != previous_hash {
                return Err(LedgerError::IntegrityViolation {
                    line: index + 1,
                    expected: previous_hash.unwrap_or_else(|| "None".to_string()),
                    actual: entry.previous_hash.unwrap_or_else(|| "None".to_string()),
                });
            }
            previous_hash = Some(hasher::hash_line(line));
        }

        Ok(true)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Cached entries after tailing whatever other writers have added.
    fn refreshed(&self) -> Result<std::sync::MutexGuard<'_, State>, LedgerError> {
        let mut state = self.state.lock().map_err(poisoned)?;
        state.catch_up(&self.path)?;
        Ok(state)
    }
}

impl ActionLog for JsonlActionLog {
    fn append(&self, entry: NewLogEntry) -> Result<ActionLogEntry, LedgerError> {
        let mut state = self.state.lock().map_err(poisoned)?;
        let _writer = FileLock::exclusive(&self.locks.join(WRITER_LOCK))?;
        let caught_up = state.catch_up(&self.path)?;
        if caught_up > 0 {
            tracing::debug!(entries = caught_up, "picked up entries from other writers");
        }

        let mut written = ActionLogEntry::from_new(entry, next_timestamp(state.last_created_at));
        written.previous_hash = state.last_hash.clone();

        let json = serde_json::to_string(&written)?;
        state.write_line(&json)?;

        state.last_hash = Some(hasher::hash_line(&json));
        state.last_created_at = Some(written.created_at);
        state.entries.push(written.clone());
        Ok(written)
    }

    fn try_lease(&self, policy_id: &str) -> Result<Option<LogLease>, LedgerError> {
        let name = format!("policy-{}.lock", &hasher::hash_line(policy_id)[..16]);
        let lock = FileLock::try_exclusive(&self.locks.join(name))?;
        Ok(lock.map(|lock| LogLease::on_release(move || drop(lock))))
    }

    fn query(
        &self,
        policy_id: &str,
        status: ActionStatus,
        day: &UtcDay,
    ) -> Result<Vec<ActionLogEntry>, LedgerError> {
        let state = self.refreshed()?;
        Ok(state
            .entries
            .iter()
            .filter(|e| matches(e, policy_id, status, day))
            .cloned()
            .collect())
    }

    fn list_for_policy(&self, policy_id: &str) -> Result<Vec<ActionLogEntry>, LedgerError> {
        let state = self.refreshed()?;
        Ok(state
            .entries
            .iter()
            .rev()
            .filter(|e| e.policy_id == policy_id)
            .cloned()
            .collect())
    }
}

/// An advisory exclusive lock on a file, released on drop.
struct FileLock(File);

impl FileLock {
    fn open(path: &Path) -> Result<File, LedgerError> {
        OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|source| LedgerError::OpenFailed {
                path: path.to_path_buf(),
                source,
            })
    }

    fn exclusive(path: &Path) -> Result<Self, LedgerError> {
        let file = Self::open(path)?;
        file.lock_exclusive()?;
        Ok(Self(file))
    }

    fn try_exclusive(path: &Path) -> Result<Option<Self>, LedgerError> {
        let file = Self::open(path)?;
        match file.try_lock_exclusive() {
            Ok(()) => Ok(Some(Self(file))),
            Err(e) if e.raw_os_error() == fs2::lock_contended_error().raw_os_error() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        let _ = FileExt::unlock(&self.0);
    }
}

/// `actions.jsonl` keeps its lock files in `actions.jsonl.locks/`.
fn locks_dir(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".locks");
    path.with_file_name(name)
}

/// The complete lines from `offset` on, and the offset just past the last
/// newline. Trailing bytes with no newline are left for a later read.
fn read_lines_from(path: &Path, offset: u64) -> Result<(Vec<String>, u64), LedgerError> {
    let mut file = File::open(path).map_err(|source| LedgerError::OpenFailed {
        path: path.to_path_buf(),
        source,
    })?;
    file.seek(SeekFrom::Start(offset))?;
    let mut buf = Vec::new();
    file.read_to_end(&mut buf)?;

    let complete = buf.iter().rposition(|b| *b == b'\n').map_or(0, |i| i + 1);
    buf.truncate(complete);
    let text = String::from_utf8(buf).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

    Ok((text.lines().map(str::to_string).collect(), offset + complete as u64))
}
