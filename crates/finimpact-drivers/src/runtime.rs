//! Worker runtime for background data loads
//!
//! Database work is offloaded to a small, fixed set of worker threads so the
//! caller driving the user interface never blocks on I/O. Each task reports
//! back through a success or an error callback.

use std::future::Future;
use std::time::Duration;

use finimpact_core::{FinImpactError, Result};
use tokio::runtime::{Handle, Runtime};
use tokio::task::JoinHandle;

/// Number of worker threads used when none is configured
pub const DEFAULT_WORKER_THREADS: usize = 4;

/// A fixed-size pool of worker threads running async database tasks
pub struct TaskRunner {
    runtime: Runtime,
    workers: usize,
}

impl TaskRunner {
    /// Build a runner with `workers` threads
    pub fn new(workers: usize) -> Result<Self> {
        let workers = workers.max(1);
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(workers)
            .enable_all()
            .thread_name("finimpact-worker")
            .build()?;
        tracing::debug!(workers, "task runner started");
        Ok(Self { runtime, workers })
    }

    /// Build a runner with [`DEFAULT_WORKER_THREADS`] threads
    pub fn with_defaults() -> Result<Self> {
        Self::new(DEFAULT_WORKER_THREADS)
    }

    /// Number of worker threads
    pub fn workers(&self) -> usize {
        self.workers
    }

    /// Handle for spawning onto the workers from async code
    pub fn handle(&self) -> &Handle {
        self.runtime.handle()
    }

    /// Run a task in the background.
    ///
    /// `on_success` receives the task's value, `on_error` its error, whatever
    /// error type the task uses. Both run on a worker thread. A task that
    /// panics is reported to `on_error` as `FinImpactError::Other` converted
    /// into that type.
    pub fn execute<T, Fail, Fut, S, E>(&self, task: Fut, on_success: S, on_error: E) -> JoinHandle<()>
    where
        T: Send + 'static,
        Fail: From<FinImpactError> + std::fmt::Display + Send + 'static,
        Fut: Future<Output = std::result::Result<T, Fail>> + Send + 'static,
        S: FnOnce(T) + Send + 'static,
        E: FnOnce(Fail) + Send + 'static,
    {
        let inner = self.runtime.spawn(task);
        self.runtime.spawn(async move {
            match inner.await {
                Ok(Ok(value)) => on_success(value),
                Ok(Err(e)) => {
                    tracing::warn!(error = %e, "background task failed");
                    on_error(e);
                }
                Err(join_error) => {
                    tracing::error!(error = %join_error, "background task panicked or was cancelled");
                    on_error(FinImpactError::Other(join_error.to_string()).into());
                }
            }
        })
    }

    /// Run a future to completion on the workers, blocking the current thread
    pub fn block_on<F: Future>(&self, future: F) -> F::Output {
        self.runtime.block_on(future)
    }

    /// Stop the workers, waiting up to `timeout` for running tasks
    pub fn shutdown(self, timeout: Duration) {
        tracing::debug!(?timeout, "shutting down task runner");
        self.runtime.shutdown_timeout(timeout);
    }
}

impl std::fmt::Debug for TaskRunner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TaskRunner")
            .field("workers", &self.workers)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_success_callback_receives_value() {
        let runner = TaskRunner::new(2).unwrap();
        let (tx, rx) = mpsc::channel();
        let err_tx = tx.clone();

        runner.execute(
            async { Ok::<_, FinImpactError>(21 * 2) },
            move |value| tx.send(Ok(value)).unwrap(),
            move |e| err_tx.send(Err(e.to_string())).unwrap(),
        );

        assert_eq!(rx.recv_timeout(Duration::from_secs(5)).unwrap(), Ok(42));
        runner.shutdown(Duration::from_secs(1));
    }

    #[test]
    fn test_error_callback_receives_error() {
        let runner = TaskRunner::with_defaults().unwrap();
        assert_eq!(runner.workers(), DEFAULT_WORKER_THREADS);
        let (tx, rx) = mpsc::channel();
        let ok_tx = tx.clone();

        runner.execute(
            async { Err::<(), _>(FinImpactError::Query("boom".into())) },
            move |_| ok_tx.send(None).unwrap(),
            move |e| tx.send(Some(e.to_string())).unwrap(),
        );

        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(received.as_deref(), Some("Query error: boom"));
    }

    #[test]
    fn test_panicking_task_reports_error() {
        let runner = TaskRunner::new(1).unwrap();
        let (tx, rx) = mpsc::channel();

        runner.execute(
            async {
                if true {
                    panic!("worker panic");
                }
                Ok::<_, FinImpactError>(())
            },
            |_| {},
            move |e| tx.send(e.to_string()).unwrap(),
        );

        let message = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(message.contains("panic"));
    }

    #[derive(Debug, PartialEq)]
    enum LoadError {
        Denied(String),
        Core(String),
    }

    impl std::fmt::Display for LoadError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                LoadError::Denied(m) | LoadError::Core(m) => f.write_str(m),
            }
        }
    }

    impl From<FinImpactError> for LoadError {
        fn from(e: FinImpactError) -> Self {
            LoadError::Core(e.to_string())
        }
    }

    #[test]
    fn test_error_callback_keeps_task_error_type() {
        let runner = TaskRunner::new(1).unwrap();
        let (tx, rx) = mpsc::channel();
        let panic_tx = tx.clone();

        runner.execute(
            async { Err::<(), _>(LoadError::Denied("not yours".into())) },
            |_| {},
            move |e| tx.send(e).unwrap(),
        );
        assert_eq!(
            rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            LoadError::Denied("not yours".into())
        );

        runner.execute(
            async {
                if true {
                    panic!("worker panic");
                }
                Ok::<(), LoadError>(())
            },
            |_| {},
            move |e| panic_tx.send(e).unwrap(),
        );
        let received = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert!(matches!(received, LoadError::Core(ref m) if m.contains("panic")));
    }

    #[test]
    fn test_block_on_runs_on_workers() {
        let runner = TaskRunner::new(1).unwrap();
        let name = runner.block_on(async {
            tokio::spawn(async { std::thread::current().name().map(String::from) })
                .await
                .unwrap()
        });
        assert_eq!(name.as_deref(), Some("finimpact-worker"));
    }
}
