//! Routed execution runtime.
//!
//! The [`QueryEngine`](crate::QueryEngine) is a synchronous executor. In a
//! running daemon, collector backends submit STORE commands continuously
//! while client connections issue LIST/FETCH/LOOKUP queries; a slow render
//! must not hold up the collectors. This module provides a small, bounded,
//! thread-based runtime that routes commands into separate worker pools
//! for the two paths.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam_channel::{bounded, Receiver, Sender, TrySendError};

use crate::engine::{EngineResponse, QueryEngine};
use crate::error::{ExecutionError, SysdbError, SysdbResult};
use crate::ir::{Command, Request};

/// Execution path selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExecutionPath {
    /// Collector-driven update operations.
    Update,
    /// Client-driven read operations.
    Query,
}

impl ExecutionPath {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Update => "update",
            Self::Query => "query",
        }
    }
}

/// Routes commands to an execution path.
pub trait CommandRouter: Send + Sync {
    /// Selects the execution path for the given command.
    fn route(&self, command: &Command) -> ExecutionPath;
}

/// Default router: STORE commands take the update path, everything else
/// the query path.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultRouter;

impl CommandRouter for DefaultRouter {
    fn route(&self, command: &Command) -> ExecutionPath {
        match command {
            Command::Store(_) => ExecutionPath::Update,
            Command::List { .. } | Command::Fetch { .. } | Command::Lookup { .. } => {
                ExecutionPath::Query
            }
        }
    }
}

/// Runtime configuration.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Number of update workers.
    pub update_workers: usize,
    /// Number of query workers.
    pub query_workers: usize,
    /// Maximum queued jobs per pool.
    pub queue_capacity: usize,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            update_workers: 2,
            query_workers: 2,
            queue_capacity: 1024,
        }
    }
}

enum Job {
    Execute {
        request: Request,
        reply: Sender<SysdbResult<EngineResponse>>,
    },

    #[cfg(test)]
    Sleep {
        duration: Duration,
        reply: Sender<()>,
    },
}

struct WorkerPool {
    tx: Sender<Job>,
    workers: Vec<JoinHandle<()>>,
    queue_capacity: usize,
}

impl WorkerPool {
    fn start(
        name: &'static str,
        workers: usize,
        queue_capacity: usize,
        engine: Arc<QueryEngine>,
    ) -> Self {
        let workers = workers.max(1);
        let queue_capacity = queue_capacity.max(1);
        let (tx, rx) = bounded::<Job>(queue_capacity);

        let mut handles = Vec::with_capacity(workers);
        for idx in 0..workers {
            let rx: Receiver<Job> = rx.clone();
            let engine = Arc::clone(&engine);
            let thread_name = format!("sysdb-{name}-{idx}");
            let handle = thread::Builder::new()
                .name(thread_name)
                .spawn(move || loop {
                    match rx.recv() {
                        Ok(Job::Execute { request, reply }) => {
                            let result = engine.execute(request);
                            let _ = reply.send(result);
                        }
                        Err(_) => break,

                        #[cfg(test)]
                        Ok(Job::Sleep { duration, reply }) => {
                            thread::sleep(duration);
                            let _ = reply.send(());
                        }
                    }
                })
                .expect("failed to spawn sysdb worker");
            handles.push(handle);
        }

        Self {
            tx,
            workers: handles,
            queue_capacity,
        }
    }

    fn try_submit(&self, job: Job, path: ExecutionPath) -> Result<(), SysdbError> {
        match self.tx.try_send(job) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SysdbError::Execution(ExecutionError::QueueFull {
                path: path.as_str(),
                capacity: self.queue_capacity,
            })),
            Err(TrySendError::Disconnected(_)) => {
                Err(SysdbError::Execution(ExecutionError::Disconnected {
                    path: path.as_str(),
                }))
            }
        }
    }

    fn shutdown(self) {
        // Closing the channel makes workers drain queued jobs and exit.
        drop(self.tx);
        for handle in self.workers {
            let _ = handle.join();
        }
    }
}

/// Handle returned by [`Runtime::execute_async`].
pub struct ExecutionHandle {
    path: ExecutionPath,
    rx: Receiver<SysdbResult<EngineResponse>>,
}

impl ExecutionHandle {
    /// Returns the path selected by the router.
    #[must_use]
    pub const fn path(&self) -> ExecutionPath {
        self.path
    }

    /// Waits for the execution to complete.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Disconnected`] if the worker pool shut down
    /// before replying.
    pub fn join(self) -> SysdbResult<EngineResponse> {
        self.rx.recv().map_err(|_| {
            SysdbError::Execution(ExecutionError::Disconnected {
                path: self.path.as_str(),
            })
        })?
    }

    /// Waits for the execution to complete with a timeout.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::Timeout`] when the wait elapses,
    /// [`ExecutionError::Disconnected`] if the worker pool shut down
    /// before replying.
    pub fn join_timeout(self, timeout: Duration) -> SysdbResult<EngineResponse> {
        self.rx.recv_timeout(timeout).map_err(|err| match err {
            crossbeam_channel::RecvTimeoutError::Timeout => {
                SysdbError::Execution(ExecutionError::Timeout {
                    duration_ms: timeout.as_millis().min(u128::from(u64::MAX)) as u64,
                })
            }
            crossbeam_channel::RecvTimeoutError::Disconnected => {
                SysdbError::Execution(ExecutionError::Disconnected {
                    path: self.path.as_str(),
                })
            }
        })?
    }
}

/// A routed runtime keeping collector updates and client queries on
/// separate worker pools.
pub struct Runtime<R: CommandRouter = DefaultRouter> {
    router: R,
    engine: Arc<QueryEngine>,
    update: WorkerPool,
    query: WorkerPool,
}

impl Runtime<DefaultRouter> {
    /// Creates a runtime with the default router.
    #[must_use]
    pub fn new(engine: QueryEngine, config: RuntimeConfig) -> Self {
        Self::with_router(engine, DefaultRouter, config)
    }
}

impl<R: CommandRouter> Runtime<R> {
    /// Creates a runtime with a custom router.
    pub fn with_router(engine: QueryEngine, router: R, config: RuntimeConfig) -> Self {
        let engine = Arc::new(engine);
        let update = WorkerPool::start(
            "update",
            config.update_workers,
            config.queue_capacity,
            Arc::clone(&engine),
        );
        let query = WorkerPool::start(
            "query",
            config.query_workers,
            config.queue_capacity,
            Arc::clone(&engine),
        );
        Self {
            router,
            engine,
            update,
            query,
        }
    }

    /// Submits a request on its routed path without waiting.
    ///
    /// # Errors
    ///
    /// [`ExecutionError::QueueFull`] when the routed pool's queue is at
    /// capacity.
    pub fn execute_async(&self, request: Request) -> Result<ExecutionHandle, SysdbError> {
        let path = self.router.route(&request.command);
        let (tx, rx) = bounded::<SysdbResult<EngineResponse>>(1);
        let job = Job::Execute { request, reply: tx };
        match path {
            ExecutionPath::Update => self.update.try_submit(job, path)?,
            ExecutionPath::Query => self.query.try_submit(job, path)?,
        }
        Ok(ExecutionHandle { path, rx })
    }

    /// Executes a request synchronously on its routed path.
    ///
    /// # Errors
    ///
    /// Submission and execution errors are propagated.
    pub fn execute(&self, request: Request) -> SysdbResult<EngineResponse> {
        self.execute_async(request)?.join()
    }

    /// Returns a shared reference to the underlying engine.
    #[must_use]
    pub fn engine(&self) -> &QueryEngine {
        &self.engine
    }

    #[cfg(test)]
    fn submit_sleep(
        &self,
        path: ExecutionPath,
        duration: Duration,
    ) -> Result<Receiver<()>, SysdbError> {
        let (tx, rx) = bounded::<()>(1);
        let job = Job::Sleep {
            duration,
            reply: tx,
        };
        match path {
            ExecutionPath::Update => self.update.try_submit(job, path)?,
            ExecutionPath::Query => self.query.try_submit(job, path)?,
        }
        Ok(rx)
    }
}

impl<R: CommandRouter> Drop for Runtime<R> {
    fn drop(&mut self) {
        // Deterministic shutdown: stop workers and join threads. This is
        // fast because worker loops block on `recv()`.
        let update = std::mem::replace(
            &mut self.update,
            WorkerPool {
                tx: bounded::<Job>(1).0,
                workers: Vec::new(),
                queue_capacity: 1,
            },
        );
        let query = std::mem::replace(
            &mut self.query,
            WorkerPool {
                tx: bounded::<Job>(1).0,
                workers: Vec::new(),
                queue_capacity: 1,
            },
        );

        update.shutdown();
        query.shutdown();
    }
}
