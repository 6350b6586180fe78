//! Advisory single-writer locking for llmcompare workflow state
//!
//! Every mutation of a feature's workflow state runs inside [`FeatureLock::run`],
//! which holds an exclusive `fd-lock` on a per-feature lock file for the
//! duration of the closure. The lock is advisory: it coordinates llmcompare
//! processes and tasks, it is not a security boundary.
//!
//! Lock files are never deleted. The holder's PID is written into the file on
//! acquisition so a timed-out waiter can report who is holding it.

use camino::{Utf8Path, Utf8PathBuf};
use chrono::{DateTime, Utc};
use fd_lock::RwLock;
use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::process;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Default time to wait for a contended lock before giving up
pub const DEFAULT_LOCK_WAIT: Duration = Duration::from_secs(30);

const INITIAL_POLL: Duration = Duration::from_millis(5);
const MAX_POLL: Duration = Duration::from_millis(200);

/// Information written into the lock file by the current holder
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LockHolder {
    /// Process ID of the holder
    pub pid: u32,
    /// What is being locked (usually a feature name)
    pub label: String,
    /// When the holder acquired the lock
    pub acquired_at: DateTime<Utc>,
}

/// Lock errors for workflow state locking
#[derive(Debug, thiserror::Error)]
pub enum LockError {
    #[error(
        "Timed out after {waited:?} waiting for the lock on '{label}'{}",
        .holder_pid.map(|pid| format!(" (held by PID {pid})")).unwrap_or_default()
    )]
    Timeout {
        label: String,
        waited: Duration,
        holder_pid: Option<u32>,
    },

    #[error("IO error during lock operation: {0}")]
    Io(#[from] io::Error),
}

/// Exclusive lock over a single lock file
#[derive(Debug, Clone)]
pub struct FeatureLock {
    path: Utf8PathBuf,
    label: String,
    wait: Duration,
}

impl FeatureLock {
    /// Create a lock handle. Nothing is touched on disk until [`run`](Self::run).
    #[must_use]
    pub fn new(path: impl Into<Utf8PathBuf>, label: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            label: label.into(),
            wait: DEFAULT_LOCK_WAIT,
        }
    }

    /// Set the maximum time [`run`](Self::run) waits for a contended lock
    #[must_use]
    pub fn with_wait(mut self, wait: Duration) -> Self {
        self.wait = wait;
        self
    }

    #[must_use]
    pub fn path(&self) -> &Utf8Path {
        &self.path
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Run `f` while holding the exclusive lock.
    ///
    /// Blocks the calling thread while waiting; async callers should run this
    /// inside `tokio::task::spawn_blocking`. The lock is released when `f`
    /// returns, whether it succeeded or not.
    pub fn run<T, E>(&self, f: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        E: From<LockError>,
    {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(LockError::from)?;
        }

        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(&self.path)
            .map_err(LockError::from)?;
        let mut lock = RwLock::new(file);

        let started = Instant::now();
        let mut poll = INITIAL_POLL;
        loop {
            match lock.try_write() {
                Ok(mut guard) => {
                    debug!(label = %self.label, waited_ms = started.elapsed().as_millis(), "Lock acquired");
                    record_holder(&mut guard, &self.label).map_err(LockError::from)?;
                    return f();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => {
                    let waited = started.elapsed();
                    if waited >= self.wait {
                        let holder_pid = read_holder(&self.path).map(|h| h.pid);
                        warn!(label = %self.label, ?holder_pid, "Gave up waiting for lock");
                        return Err(LockError::Timeout {
                            label: self.label.clone(),
                            waited,
                            holder_pid,
                        }
                        .into());
                    }
                    thread::sleep(poll.min(self.wait - waited));
                    poll = (poll * 2).min(MAX_POLL);
                }
                Err(e) => return Err(LockError::Io(e).into()),
            }
        }
    }
}

fn record_holder(file: &mut File, label: &str) -> io::Result<()> {
    let holder = LockHolder {
        pid: process::id(),
        label: label.to_string(),
        acquired_at: Utc::now(),
    };
    let json = serde_json::to_string(&holder).map_err(io::Error::other)?;
    file.set_len(0)?;
    file.seek(SeekFrom::Start(0))?;
    file.write_all(json.as_bytes())?;
    file.flush()
}

/// Read the last recorded holder of a lock file, if any
#[must_use]
pub fn read_holder(path: &Utf8Path) -> Option<LockHolder> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn lock_in(dir: &TempDir, name: &str) -> FeatureLock {
        let path = Utf8PathBuf::from_path_buf(dir.path().join(name)).unwrap();
        FeatureLock::new(path, "generate_code")
    }

    #[test]
    fn test_run_returns_closure_value_and_records_holder() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir, "feature.lock");

        let value: Result<u32, LockError> = lock.run(|| Ok(42));
        assert_eq!(value.unwrap(), 42);

        let holder = read_holder(lock.path()).unwrap();
        assert_eq!(holder.pid, process::id());
        assert_eq!(holder.label, "generate_code");
    }

    #[test]
    fn test_lock_is_reusable_after_release() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir, "feature.lock");

        for i in 0..3 {
            let out: Result<i32, LockError> = lock.run(|| Ok(i));
            assert_eq!(out.unwrap(), i);
        }
    }

    #[test]
    fn test_closure_error_is_propagated() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir, "feature.lock");

        let out: Result<(), LockError> =
            lock.run(|| Err(LockError::Io(io::Error::other("boom"))));
        assert!(matches!(out, Err(LockError::Io(_))));
    }

    #[test]
    fn test_contended_lock_times_out_with_holder_pid() {
        let dir = TempDir::new().unwrap();
        let lock = lock_in(&dir, "feature.lock");
        let holder_lock = lock.clone();

        let (acquired_tx, acquired_rx) = mpsc::channel();
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let holder = thread::spawn(move || {
            let _: Result<(), LockError> = holder_lock.run(|| {
                acquired_tx.send(()).unwrap();
                release_rx.recv().unwrap();
                Ok(())
            });
        });

        acquired_rx.recv().unwrap();
        let waiter = lock.clone().with_wait(Duration::from_millis(100));
        let result: Result<(), LockError> = waiter.run(|| Ok(()));

        release_tx.send(()).unwrap();
        holder.join().unwrap();

        match result {
            Err(LockError::Timeout {
                label, holder_pid, ..
            }) => {
                assert_eq!(label, "generate_code");
                assert_eq!(holder_pid, Some(process::id()));
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[test]
    fn test_concurrent_read_modify_write_loses_no_updates() {
        let dir = TempDir::new().unwrap();
        let lock = Arc::new(lock_in(&dir, "counter.lock"));
        let counter = dir.path().join("counter.txt");
        fs::write(&counter, "0").unwrap();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let lock = Arc::clone(&lock);
                let counter = counter.clone();
                thread::spawn(move || {
                    for _ in 0..10 {
                        let _: Result<(), LockError> = lock.run(|| {
                            let n: u32 = fs::read_to_string(&counter)?.trim().parse().unwrap();
                            thread::sleep(Duration::from_millis(1));
                            fs::write(&counter, (n + 1).to_string())?;
                            Ok(())
                        });
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let total: u32 = fs::read_to_string(&counter).unwrap().parse().unwrap();
        assert_eq!(total, 80);
    }

    #[test]
    fn test_timeout_message_mentions_holder() {
        let err = LockError::Timeout {
            label: "chat_window".to_string(),
            waited: Duration::from_secs(1),
            holder_pid: Some(4242),
        };
        let msg = err.to_string();
        assert!(msg.contains("chat_window"));
        assert!(msg.contains("PID 4242"));
    }
}
