//! A SQLite connection owned by a dedicated thread.
//!
//! Callers submit closures over the connection through a channel and wait for
//! the answer with a deadline, so a stalled database surfaces as
//! [`StoreError::Timeout`] instead of blocking a tick.

use crate::error::{Result, StoreError};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU8, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError, Sender};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

type Job = Box<dyn FnOnce(&mut Connection) + Send>;

pub struct SqliteWorker {
    sender: Sender<Job>,
    timeout: Duration,
    label: String,
}

impl SqliteWorker {
    /// Opens `path` on a new worker thread and runs `init` there before
    /// accepting calls.
    pub fn open<P, F>(path: P, timeout: Duration, init: F) -> Result<Self>
    where
        P: AsRef<Path>,
        F: FnOnce(&mut Connection) -> rusqlite::Result<()> + Send + 'static,
    {
        let path = path.as_ref().to_owned();
        let label = path.display().to_string();
        Self::spawn(Some(path), label, timeout, init)
    }

    /// A private in-memory database, mostly for tests.
    pub fn in_memory<F>(timeout: Duration, init: F) -> Result<Self>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<()> + Send + 'static,
    {
        Self::spawn(None, ":memory:".to_string(), timeout, init)
    }

    fn spawn<F>(path: Option<PathBuf>, label: String, timeout: Duration, init: F) -> Result<Self>
    where
        F: FnOnce(&mut Connection) -> rusqlite::Result<()> + Send + 'static,
    {
        let (tx, rx) = mpsc::channel::<Job>();
        let (ready_tx, ready_rx) = mpsc::channel::<Result<()>>();
        let busy_timeout = timeout;

        thread::Builder::new()
            .name(format!("sqlite-{label}"))
            .spawn(move || {
                let opened = match &path {
                    Some(path) => Connection::open(path),
                    None => Connection::open_in_memory(),
                };
                let mut conn = match opened {
                    Ok(c) => c,
                    Err(e) => {
                        let _ = ready_tx.send(Err(StoreError::unavailable(format!(
                            "Failed to open database: {e}"
                        ))));
                        return;
                    }
                };
                let setup = conn
                    .busy_timeout(busy_timeout)
                    .and_then(|()| init(&mut conn));
                if let Err(e) = setup {
                    let _ = ready_tx.send(Err(StoreError::unavailable(format!(
                        "Failed to initialize database: {e}"
                    ))));
                    return;
                }
                let _ = ready_tx.send(Ok(()));

                while let Ok(job) = rx.recv() {
                    job(&mut conn);
                }
                tracing::debug!("SQLite worker stopped");
            })
            .map_err(|e| StoreError::unavailable(format!("Failed to spawn worker: {e}")))?;

        match ready_rx.recv_timeout(timeout) {
            Ok(Ok(())) => {}
            Ok(Err(e)) => return Err(e.with_context(format!("opening {label}"))),
            Err(RecvTimeoutError::Timeout) => {
                return Err(StoreError::timeout(format!("open {label}"), millis(timeout)))
            }
            Err(RecvTimeoutError::Disconnected) => {
                return Err(StoreError::unavailable(format!("worker for {label} exited")))
            }
        }

        tracing::info!(database = %label, timeout_ms = millis(timeout), "SQLite worker ready");
        Ok(Self {
            sender: tx,
            timeout,
            label,
        })
    }

    /// Runs `f` on the worker thread and waits at most the configured timeout.
    ///
    /// A call that timed out before the worker reached it is skipped. Writes
    /// go through [`SqliteWorker::call_guarded`] so a late commit cannot land.
    pub fn call<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
    {
        self.call_guarded(operation, move |conn, _| f(conn))
    }

    /// Like [`SqliteWorker::call`], but `f` must claim its guard with
    /// [`CallGuard::finish`] right before committing.
    ///
    /// Exactly one side wins: either the caller times out first and the claim
    /// fails, so `f` rolls back, or the claim succeeds and the caller waits for
    /// the real outcome past its deadline.
    pub fn call_guarded<T, F>(&self, operation: &str, f: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection, &CallGuard) -> Result<T> + Send + 'static,
    {
        let guard = CallGuard::new(operation, self.timeout);
        let job_guard = guard.clone();
        let (reply_tx, reply_rx) = mpsc::channel();
        let job: Job = Box::new(move |conn| {
            if job_guard.is_cancelled() {
                return;
            }
            let _ = reply_tx.send(f(conn, &job_guard));
        });
        self.sender
            .send(job)
            .map_err(|_| StoreError::unavailable(format!("worker for {} is gone", self.label)))?;

        match reply_rx.recv_timeout(self.timeout) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) if guard.cancel() => {
                tracing::warn!(database = %self.label, operation, "SQLite call timed out");
                Err(StoreError::timeout(operation, millis(self.timeout)))
            }
            Err(RecvTimeoutError::Timeout) => {
                tracing::debug!(database = %self.label, operation, "Commit already claimed, waiting");
                reply_rx.recv().map_err(|_| {
                    StoreError::unavailable(format!(
                        "worker for {} dropped {operation}",
                        self.label
                    ))
                })?
            }
            Err(RecvTimeoutError::Disconnected) => Err(StoreError::unavailable(format!(
                "worker for {} dropped {operation}",
                self.label
            ))),
        }
    }

    #[must_use]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

const PENDING: u8 = 0;
const CANCELLED: u8 = 1;
const FINISHING: u8 = 2;

/// Shared between a caller and its job; decides who owns the outcome once
/// the deadline passes.
#[derive(Debug, Clone)]
pub struct CallGuard {
    state: Arc<AtomicU8>,
    operation: String,
    timeout: Duration,
}

impl CallGuard {
    fn new(operation: &str, timeout: Duration) -> Self {
        Self {
            state: Arc::new(AtomicU8::new(PENDING)),
            operation: operation.to_string(),
            timeout,
        }
    }

    /// Claims the commit. Fails with [`StoreError::Timeout`] once the caller
    /// has given up; the job must then drop its transaction.
    pub fn finish(&self) -> Result<()> {
        match self
            .state
            .compare_exchange(PENDING, FINISHING, Ordering::SeqCst, Ordering::SeqCst)
        {
            Ok(_) | Err(FINISHING) => Ok(()),
            Err(_) => Err(StoreError::timeout(
                self.operation.clone(),
                millis(self.timeout),
            )),
        }
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.state.load(Ordering::SeqCst) == CANCELLED
    }

    fn cancel(&self) -> bool {
        self.state
            .compare_exchange(PENDING, CANCELLED, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

fn millis(d: Duration) -> u64 {
    u64::try_from(d.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_call_returns_value() {
        let worker = SqliteWorker::in_memory(Duration::from_secs(2), |_| Ok(())).unwrap();
        let answer: i64 = worker
            .call("select", |conn| {
                Ok(conn.query_row("SELECT 40 + 2", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(answer, 42);
    }

    #[test]
    fn test_slow_call_times_out() {
        let worker = SqliteWorker::in_memory(Duration::from_millis(50), |_| Ok(())).unwrap();
        let err = worker
            .call("sleep", |_| {
                thread::sleep(Duration::from_millis(300));
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));
    }

    fn counting_worker(timeout: Duration) -> SqliteWorker {
        SqliteWorker::in_memory(timeout, |conn| {
            conn.execute_batch("CREATE TABLE t (x INTEGER)")
        })
        .unwrap()
    }

    fn count(worker: &SqliteWorker) -> i64 {
        worker
            .call("count", |conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM t", [], |row| row.get(0))?)
            })
            .unwrap()
    }

    #[test]
    fn test_timed_out_write_rolls_back() {
        let worker = counting_worker(Duration::from_millis(50));
        let err = worker
            .call_guarded("slow insert", |conn, guard| {
                let tx = conn.transaction()?;
                tx.execute("INSERT INTO t (x) VALUES (1)", [])?;
                thread::sleep(Duration::from_millis(200));
                guard.finish()?;
                tx.commit()?;
                Ok(())
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::Timeout { .. }));

        thread::sleep(Duration::from_millis(300));
        assert_eq!(count(&worker), 0);
    }

    #[test]
    fn test_claimed_commit_outlives_the_deadline() {
        let worker = counting_worker(Duration::from_millis(50));
        worker
            .call_guarded("claimed insert", |conn, guard| {
                let tx = conn.transaction()?;
                tx.execute("INSERT INTO t (x) VALUES (1)", [])?;
                guard.finish()?;
                thread::sleep(Duration::from_millis(200));
                tx.commit()?;
                Ok(())
            })
            .unwrap();
        assert_eq!(count(&worker), 1);
    }

    #[test]
    fn test_queued_call_is_skipped_after_timeout() {
        let worker = counting_worker(Duration::from_millis(50));
        let blocker = worker.call("block", |_| {
            thread::sleep(Duration::from_millis(150));
            Ok(())
        });
        assert!(blocker.is_err());
        let queued = worker.call("queued insert", |conn| {
            conn.execute("INSERT INTO t (x) VALUES (1)", [])?;
            Ok(())
        });
        assert!(matches!(queued, Err(StoreError::Timeout { .. })));

        thread::sleep(Duration::from_millis(300));
        assert_eq!(count(&worker), 0);
    }

    #[test]
    fn test_failing_init_is_unavailable() {
        let err = SqliteWorker::in_memory(Duration::from_secs(2), |conn| {
            conn.execute_batch("NOT SQL")
        })
        .err()
        .unwrap();
        assert!(matches!(err.root_cause(), StoreError::Unavailable(_)));
    }

    #[test]
    fn test_opens_file_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("worker.db");
        let worker = SqliteWorker::open(&path, Duration::from_secs(2), |conn| {
            conn.execute_batch("CREATE TABLE t (x INTEGER)")
        })
        .unwrap();
        worker
            .call("insert", |conn| {
                conn.execute("INSERT INTO t (x) VALUES (1)", [])?;
                Ok(())
            })
            .unwrap();
        assert!(path.exists());
    }
}
