//! Object kinds, field ids, and the metadata shared by all store objects.
//!
//! Every store object (host, service, metric, attribute) carries the same
//! header: its display name, the timestamp of the newest accepted
//! observation, a smoothed update interval, and the list of backends that
//! have contributed observations. The update rule lives here so that all
//! four kinds age identically.

use serde::{Deserialize, Serialize};

use crate::time::Timestamp;

/// Wire bit for host objects.
pub const HOST: u32 = 1;
/// Wire bit for service objects.
pub const SERVICE: u32 = 2;
/// Wire bit for metric objects.
pub const METRIC: u32 = 4;
/// Wire bit for attribute objects.
pub const ATTRIBUTE: u32 = 8;
/// Host attribute, as transported in messages.
pub const HOST_ATTRIBUTE: u32 = HOST | ATTRIBUTE;
/// Service attribute, as transported in messages.
pub const SERVICE_ATTRIBUTE: u32 = SERVICE | ATTRIBUTE;
/// Metric attribute, as transported in messages.
pub const METRIC_ATTRIBUTE: u32 = METRIC | ATTRIBUTE;

/// The four store object kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    /// A machine in the fleet.
    Host,
    /// A service running on a host.
    Service,
    /// A metric emitted by a host.
    Metric,
    /// A key/value annotation on any of the above.
    Attribute,
}

impl ObjectKind {
    /// The registry bit for this kind.
    #[must_use]
    pub const fn bits(self) -> u32 {
        match self {
            Self::Host => HOST,
            Self::Service => SERVICE,
            Self::Metric => METRIC,
            Self::Attribute => ATTRIBUTE,
        }
    }

    /// Lower-case kind name, as used in status messages.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Host => "host",
            Self::Service => "service",
            Self::Metric => "metric",
            Self::Attribute => "attribute",
        }
    }
}

impl std::fmt::Display for ObjectKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Uniform field ids over any store object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    /// The object's display name.
    Name,
    /// Timestamp of the newest accepted observation.
    LastUpdate,
    /// Now minus `last_update`.
    Age,
    /// Smoothed observation cadence.
    Interval,
    /// Array of contributing backend names.
    Backend,
    /// The attribute's datum; `Null` on non-attributes.
    Value,
}

impl Field {
    /// Lower-case field name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::LastUpdate => "last_update",
            Self::Age => "age",
            Self::Interval => "interval",
            Self::Backend => "backend",
            Self::Value => "value",
        }
    }
}

/// Outcome of an accepted update operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateStatus {
    /// A new object was created, or an existing one was mutated.
    Stored,
    /// The object was already current for the given timestamp.
    UpToDate,
}

impl UpdateStatus {
    /// Returns true if the store was mutated.
    #[must_use]
    pub const fn is_stored(self) -> bool {
        matches!(self, Self::Stored)
    }

    /// The numeric status code used on the wire: 0 stored, 1 up to date.
    #[must_use]
    pub const fn code(self) -> i32 {
        match self {
            Self::Stored => 0,
            Self::UpToDate => 1,
        }
    }
}

/// Metadata common to all store objects.
#[derive(Debug, Clone)]
pub struct ObjectMeta {
    name: String,
    last_update: Timestamp,
    interval: Timestamp,
    backends: Vec<String>,
}

impl ObjectMeta {
    /// Creates metadata for a freshly observed object.
    #[must_use]
    pub(crate) fn new(name: impl Into<String>, last_update: Timestamp) -> Self {
        Self {
            name: name.into(),
            last_update,
            interval: Timestamp::EPOCH,
            backends: Vec::new(),
        }
    }

    /// The display name; retains the first-observed casing.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Timestamp of the newest accepted observation.
    #[must_use]
    pub const fn last_update(&self) -> Timestamp {
        self.last_update
    }

    /// Smoothed observation cadence, in microseconds.
    #[must_use]
    pub const fn interval(&self) -> Timestamp {
        self.interval
    }

    /// Names of the backends that contributed observations.
    #[must_use]
    pub fn backends(&self) -> &[String] {
        &self.backends
    }

    /// Applies an observation at `ts`.
    ///
    /// Observations at or before `last_update` leave the object untouched
    /// and report `UpToDate`. Newer observations advance `last_update`,
    /// refresh the interval estimate, and record the backend.
    pub(crate) fn observe(&mut self, ts: Timestamp, backend: Option<&str>) -> UpdateStatus {
        if ts <= self.last_update {
            return UpdateStatus::UpToDate;
        }

        let delta = ts.saturating_sub(self.last_update).as_micros();
        if self.interval.as_micros() == 0 {
            self.interval = Timestamp::from_micros(delta);
        } else {
            // Exponential moving average biased 9:1 toward the prior value;
            // integer arithmetic, matching the observable cadence fixtures.
            let prior = self.interval.as_micros();
            self.interval = Timestamp::from_micros((prior * 9 + delta) / 10);
        }

        self.last_update = ts;
        self.record_backend(backend);
        UpdateStatus::Stored
    }

    /// Records a contributing backend name, once.
    pub(crate) fn record_backend(&mut self, backend: Option<&str>) {
        if let Some(backend) = backend {
            if !self.backends.iter().any(|b| b == backend) {
                self.backends.push(backend.to_string());
            }
        }
    }
}
