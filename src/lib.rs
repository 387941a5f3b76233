//! # sysdb - a system-information database
//!
//! sysdb consolidates descriptive facts about a fleet of machines — hosts,
//! the services running on them, the metrics they emit, and free-form
//! attributes on any of these — into a single in-memory model that many
//! collector backends update concurrently and remote clients query.
//!
//! ## Core concepts
//!
//! - **Store**: the root object set; update-idempotent, time-aware, ordered
//! - **Datum**: a tagged value attached to attributes and produced by
//!   expressions
//! - **Matcher**: a boolean predicate filtering store objects
//! - **Expression**: a computation over a store object yielding a datum
//!
//! ## Usage
//!
//! ```rust
//! use sysdb::{Datum, Store, SerializeFlags, Timestamp};
//!
//! let store = Store::new();
//! store.store_host("web-1", Timestamp::from_secs(1), Some("collectd"))?;
//! store.store_service("web-1", "httpd", Timestamp::from_secs(1), Some("collectd"))?;
//! store.store_attribute("web-1", "role", Datum::from("frontend"),
//!     Timestamp::from_secs(1), Some("collectd"))?;
//!
//! let json = store.to_json(None, SerializeFlags::NONE)?;
//! assert!(json.starts_with("[{\"name\": \"web-1\""));
//! # Ok::<(), sysdb::StoreError>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod error;
pub mod object;
pub mod store;
pub mod time;
pub mod value;

pub mod engine;
pub mod ir;

// Re-export primary types at the crate root for convenience
pub use error::{ExecutionError, StoreError, SysdbError, SysdbResult};
pub use object::{Field, ObjectKind, UpdateStatus};
pub use store::{
    Attribute, BinaryOp, ChildSet, CmpOp, Expr, Host, HostHandle, Matcher, Metric, MetricStore,
    ObjectRef, SerializeFlags, Service, Store,
};
pub use time::Timestamp;
pub use value::Datum;

pub use engine::runtime::{CommandRouter, DefaultRouter, ExecutionPath, Runtime, RuntimeConfig};
pub use engine::{EngineResponse, QueryEngine};
pub use ir::{Command, Request, StorePayload};
