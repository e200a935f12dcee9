//! Log Store - append-only NDJSON event log with locked writes
//!
//! One JSON record per line, append-only; physical deletion never
//! happens. Writes are serialized across processes with a sidecar lock
//! file holding the writer's pid: a dead holder is reclaimed silently,
//! a live one is waited on with backoff up to a timeout. Reads take no
//! lock and tolerate a torn trailing line from a concurrent writer.

use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use tracing::{debug, warn};

use crate::entry::Entry;
use crate::error::StoreError;

/// Default bound on how long `append` waits for the write lock.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Result of a tolerant read pass over the log.
#[derive(Debug, Default)]
pub struct ReadOutcome {
    /// Entries that parsed and validated, in append order.
    pub entries: Vec<Entry>,
    /// Lines skipped because they failed to parse or validate.
    pub skipped: usize,
}

/// File-backed append-only log.
pub struct LogStore {
    log_path: PathBuf,
    lock_path: PathBuf,
    lock_timeout: Duration,
}

impl LogStore {
    /// Open a store at the given log path, creating parent directories.
    /// The lock file lives next to the log as `<name>.lock`.
    pub fn open(log_path: impl Into<PathBuf>, lock_timeout: Duration) -> Result<Self, StoreError> {
        let log_path = log_path.into();
        if let Some(parent) = log_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut lock_name = log_path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "brain.ndjson".into());
        lock_name.push(".lock");
        let lock_path = log_path.with_file_name(lock_name);
        Ok(Self {
            log_path,
            lock_path,
            lock_timeout,
        })
    }

    /// Path of the underlying log file.
    pub fn log_path(&self) -> &Path {
        &self.log_path
    }

    /// Validate and durably append a single entry.
    ///
    /// Validation runs before the lock is touched: a structurally
    /// invalid entry fails with `SchemaViolation` and nothing is
    /// written. On success the line is flushed and fsynced before the
    /// lock is released.
    pub fn append(&self, entry: &Entry) -> Result<(), StoreError> {
        entry.validate().map_err(StoreError::SchemaViolation)?;
        let line = serde_json::to_string(entry)?;

        let _guard = LockGuard::acquire(&self.lock_path, self.lock_timeout)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.log_path)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
        file.flush()?;
        file.sync_all()?;
        debug!(id = %entry.id, kind = %entry.kind(), "appended entry");
        Ok(())
    }

    /// Lock-free read of the whole log in append order.
    ///
    /// Lines that fail to parse as JSON or fail schema validation are
    /// skipped and counted, never fatal: a concurrent writer may leave
    /// a partially written trailing line.
    pub fn read_all(&self) -> Result<ReadOutcome, StoreError> {
        if !self.log_path.exists() {
            return Ok(ReadOutcome::default());
        }
        // Raw bytes, decoded per line: a torn trailing line may end
        // mid UTF-8 sequence and must skip that line, not fail the read.
        let content = fs::read(&self.log_path)?;

        let mut outcome = ReadOutcome::default();
        for raw in content.split(|b| *b == b'\n') {
            let line = match std::str::from_utf8(raw) {
                Ok(s) => s.trim(),
                Err(e) => {
                    debug!(error = %e, "skipping non-UTF-8 log line");
                    outcome.skipped += 1;
                    continue;
                }
            };
            if line.is_empty() {
                continue;
            }
            match serde_json::from_str::<Entry>(line) {
                Ok(entry) => match entry.validate() {
                    Ok(()) => outcome.entries.push(entry),
                    Err(reason) => {
                        debug!(%reason, "skipping invalid entry line");
                        outcome.skipped += 1;
                    }
                },
                Err(e) => {
                    debug!(error = %e, "skipping malformed log line");
                    outcome.skipped += 1;
                }
            }
        }
        Ok(outcome)
    }
}

/// Scoped exclusive lock over a sidecar file. Released on drop on
/// every exit path.
struct LockGuard {
    path: PathBuf,
}

impl LockGuard {
    fn acquire(path: &Path, timeout: Duration) -> Result<Self, StoreError> {
        let started = Instant::now();
        let mut backoff = Duration::from_millis(10);

        loop {
            match OpenOptions::new().write(true).create_new(true).open(path) {
                Ok(mut file) => {
                    // Best effort: a torn pid read on the other side is
                    // handled as an unknown holder.
                    let _ = write!(file, "{}", std::process::id());
                    let _ = file.flush();
                    return Ok(Self {
                        path: path.to_path_buf(),
                    });
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    let holder = fs::read_to_string(path)
                        .ok()
                        .and_then(|s| s.trim().parse::<u32>().ok());

                    if let Some(pid) = holder {
                        if !pid_alive(pid) {
                            warn!(pid, "reclaiming stale lock left by dead process");
                            let _ = fs::remove_file(path);
                            continue;
                        }
                    }

                    if started.elapsed() >= timeout {
                        return Err(StoreError::LockTimeout {
                            holder: holder.unwrap_or(0),
                            timeout,
                        });
                    }
                    std::thread::sleep(backoff);
                    backoff = (backoff * 2).min(Duration::from_millis(100));
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            warn!(path = %self.path.display(), error = %e, "failed to remove lock file");
        }
    }
}

#[cfg(unix)]
fn pid_alive(pid: u32) -> bool {
    if pid == 0 {
        return false;
    }
    // Signal 0 probes existence without delivering anything. EPERM
    // still means the process exists.
    let rc = unsafe { libc::kill(pid as libc::pid_t, 0) };
    rc == 0 || std::io::Error::last_os_error().raw_os_error() == Some(libc::EPERM)
}

#[cfg(not(unix))]
fn pid_alive(_pid: u32) -> bool {
    // No cheap liveness probe; assume the holder is alive and rely on
    // the acquisition timeout.
    true
}
