//! Error types for sysdb.
//!
//! All errors are strongly typed using thiserror. The store layer and the
//! execution layer have separate error enums so that callers can pattern
//! match on the conditions they care about; `SysdbError` is the top-level
//! umbrella type.

use thiserror::Error;

/// Errors raised by the object store and its query surfaces.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named host does not exist.
    #[error("host not found: {0}")]
    HostNotFound(String),

    /// The named service does not exist below the given host.
    #[error("service not found: {host}.{name}")]
    ServiceNotFound {
        /// Host the lookup went through.
        host: String,
        /// Missing service name.
        name: String,
    },

    /// The named metric does not exist below the given host.
    #[error("metric not found: {host}.{name}")]
    MetricNotFound {
        /// Host the lookup went through.
        host: String,
        /// Missing metric name.
        name: String,
    },

    /// An object name was empty.
    #[error("object names must not be empty")]
    EmptyName,

    /// A caller-supplied argument was rejected.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// An expression combined operands of incompatible types.
    #[error("type mismatch: cannot apply '{op}' to {lhs} and {rhs}")]
    TypeMismatch {
        /// Operator symbol.
        op: &'static str,
        /// Type name of the left operand.
        lhs: &'static str,
        /// Type name of the right operand.
        rhs: &'static str,
    },

    /// Integer division or modulo by zero.
    #[error("division by zero")]
    DivisionByZero,

    /// A regular expression failed to compile.
    #[error("invalid regular expression '{pattern}': {reason}")]
    InvalidRegex {
        /// The offending pattern.
        pattern: String,
        /// Compiler diagnostic.
        reason: String,
    },

    /// Iterating an empty store; distinguished from a zero-visit walk.
    #[error("the store is empty")]
    EmptyStore,

    /// A lock was poisoned by a panicking writer.
    #[error("poisoned lock: {0}")]
    LockPoisoned(&'static str),

    /// Writing to the output buffer failed.
    #[error("serialization failed: {0}")]
    Serialization(String),
}

/// Errors raised by the query engine and its runtime.
#[derive(Debug, Error)]
pub enum ExecutionError {
    /// The command addresses an object kind this engine cannot serve.
    #[error("unsupported command: {0}")]
    Unsupported(String),

    /// The runtime queue for the given path is full.
    #[error("runtime queue is full for the {path} path (capacity={capacity})")]
    QueueFull {
        /// Execution path name.
        path: &'static str,
        /// Queue capacity.
        capacity: usize,
    },

    /// The runtime worker pool shut down before producing a reply.
    #[error("runtime worker pool disconnected for the {path} path")]
    Disconnected {
        /// Execution path name.
        path: &'static str,
    },

    /// Waiting on a reply timed out.
    #[error("operation timed out after {duration_ms}ms")]
    Timeout {
        /// Duration waited before giving up.
        duration_ms: u64,
    },
}

/// Top-level error type for sysdb.
#[derive(Debug, Error)]
pub enum SysdbError {
    /// Store-level failure.
    #[error("store error: {0}")]
    Store(#[from] StoreError),

    /// Execution failure.
    #[error("execution error: {0}")]
    Execution(#[from] ExecutionError),
}

impl SysdbError {
    /// Returns true if this is a store error.
    #[must_use]
    pub const fn is_store(&self) -> bool {
        matches!(self, Self::Store(_))
    }

    /// Returns true if this is an execution error.
    #[must_use]
    pub const fn is_execution(&self) -> bool {
        matches!(self, Self::Execution(_))
    }

    /// Returns true if retrying the operation may succeed.
    ///
    /// Stale data and missing objects do not change on retry; transient
    /// runtime conditions (a full queue, a timeout) do.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        match self {
            Self::Execution(e) => matches!(
                e,
                ExecutionError::QueueFull { .. } | ExecutionError::Timeout { .. }
            ),
            Self::Store(_) => false,
        }
    }
}

/// Result type alias for sysdb operations.
pub type SysdbResult<T> = Result<T, SysdbError>;
