//! The command set consumed by the frontend.
//!
//! The connection layer decodes client messages (or parses query text)
//! into a [`Request`]: a small envelope carrying protocol version, a
//! request id for correlation, and the [`Command`] to execute. Update
//! commands carry a serializable [`StorePayload`]; lookup commands carry
//! an already-constructed matcher tree.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::object::{self, ObjectKind};
use crate::store::{Matcher, MetricStore, SerializeFlags};
use crate::time::Timestamp;
use crate::value::Datum;

/// Envelope around a single command.
#[derive(Debug, Clone)]
pub struct Request {
    /// Protocol version (e.g. `"1.0"`).
    pub version: String,

    /// Unique identifier for this request, for correlation in logs.
    pub request_id: Uuid,

    /// When the request entered the engine.
    pub received_at: DateTime<Utc>,

    /// The command to execute.
    pub command: Command,
}

impl Request {
    /// Current protocol version.
    pub const CURRENT_VERSION: &'static str = "1.0";

    /// Creates a new request around the given command.
    #[must_use]
    pub fn new(command: Command) -> Self {
        Self {
            version: Self::CURRENT_VERSION.to_string(),
            request_id: Uuid::new_v4(),
            received_at: Utc::now(),
            command,
        }
    }

    /// Sets a custom request id (useful for correlation).
    #[must_use]
    pub fn with_request_id(mut self, request_id: Uuid) -> Self {
        self.request_id = request_id;
        self
    }
}

/// All commands the engine executes.
#[derive(Debug, Clone)]
pub enum Command {
    /// Render the object inventory: names and timing metadata only.
    List {
        /// The listed object kind; only hosts are served today.
        kind: ObjectKind,
    },

    /// Render one host in full.
    Fetch {
        /// The fetched object kind; only hosts are served today.
        kind: ObjectKind,
        /// The host's name.
        hostname: String,
    },

    /// Render the store filtered by a matcher.
    Lookup {
        /// Predicate applied at every level of the tree.
        matcher: Matcher,
        /// Which child levels to emit.
        flags: SerializeFlags,
    },

    /// Apply one update operation.
    Store(StorePayload),
}

/// Payload of a STORE command: one observation to merge.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "object", rename_all = "snake_case")]
pub enum StorePayload {
    /// Observation of a host.
    Host {
        /// Host name.
        name: String,
        /// Observation timestamp.
        last_update: Timestamp,
        /// Acting backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
    },

    /// Observation of a service.
    Service {
        /// Parent host name.
        hostname: String,
        /// Service name.
        name: String,
        /// Observation timestamp.
        last_update: Timestamp,
        /// Acting backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
    },

    /// Observation of a metric.
    Metric {
        /// Parent host name.
        hostname: String,
        /// Metric name.
        name: String,
        /// Where the metric's data points live, if known.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        store_info: Option<MetricStore>,
        /// Observation timestamp.
        last_update: Timestamp,
        /// Acting backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
    },

    /// Observation of a host attribute.
    HostAttribute {
        /// Parent host name.
        hostname: String,
        /// Attribute key.
        key: String,
        /// Attribute value.
        value: Datum,
        /// Observation timestamp.
        last_update: Timestamp,
        /// Acting backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
    },

    /// Observation of a service attribute.
    ServiceAttribute {
        /// Parent host name.
        hostname: String,
        /// Parent service name.
        service: String,
        /// Attribute key.
        key: String,
        /// Attribute value.
        value: Datum,
        /// Observation timestamp.
        last_update: Timestamp,
        /// Acting backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
    },

    /// Observation of a metric attribute.
    MetricAttribute {
        /// Parent host name.
        hostname: String,
        /// Parent metric name.
        metric: String,
        /// Attribute key.
        key: String,
        /// Attribute value.
        value: Datum,
        /// Observation timestamp.
        last_update: Timestamp,
        /// Acting backend, if any.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        backend: Option<String>,
    },
}

impl StorePayload {
    /// The registry bits of the stored object, attribute kinds bit-or'd
    /// with their parent kind.
    #[must_use]
    pub const fn kind_bits(&self) -> u32 {
        match self {
            Self::Host { .. } => object::HOST,
            Self::Service { .. } => object::SERVICE,
            Self::Metric { .. } => object::METRIC,
            Self::HostAttribute { .. } => object::HOST_ATTRIBUTE,
            Self::ServiceAttribute { .. } => object::SERVICE_ATTRIBUTE,
            Self::MetricAttribute { .. } => object::METRIC_ATTRIBUTE,
        }
    }

    /// Human name of the stored object's kind, as used in status
    /// messages.
    #[must_use]
    pub const fn kind_name(&self) -> &'static str {
        match self {
            Self::Host { .. } => "host",
            Self::Service { .. } => "service",
            Self::Metric { .. } => "metric",
            Self::HostAttribute { .. } => "host attribute",
            Self::ServiceAttribute { .. } => "service attribute",
            Self::MetricAttribute { .. } => "metric attribute",
        }
    }

    /// Dotted name of the addressed object, e.g. `"web-1.httpd.port"`.
    #[must_use]
    pub fn qualified_name(&self) -> String {
        match self {
            Self::Host { name, .. } => name.clone(),
            Self::Service { hostname, name, .. } | Self::Metric { hostname, name, .. } => {
                format!("{hostname}.{name}")
            }
            Self::HostAttribute { hostname, key, .. } => format!("{hostname}.{key}"),
            Self::ServiceAttribute {
                hostname,
                service,
                key,
                ..
            } => format!("{hostname}.{service}.{key}"),
            Self::MetricAttribute {
                hostname,
                metric,
                key,
                ..
            } => format!("{hostname}.{metric}.{key}"),
        }
    }

    /// The acting backend, if any.
    #[must_use]
    pub fn backend(&self) -> Option<&str> {
        match self {
            Self::Host { backend, .. }
            | Self::Service { backend, .. }
            | Self::Metric { backend, .. }
            | Self::HostAttribute { backend, .. }
            | Self::ServiceAttribute { backend, .. }
            | Self::MetricAttribute { backend, .. } => backend.as_deref(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_envelope() {
        let req = Request::new(Command::List {
            kind: ObjectKind::Host,
        });
        assert_eq!(req.version, Request::CURRENT_VERSION);

        let id = Uuid::new_v4();
        let req = req.with_request_id(id);
        assert_eq!(req.request_id, id);
    }

    #[test]
    fn test_payload_kind_bits() {
        let payload = StorePayload::ServiceAttribute {
            hostname: "h1".to_string(),
            service: "s1".to_string(),
            key: "k".to_string(),
            value: Datum::Integer(1),
            last_update: Timestamp::from_micros(1),
            backend: None,
        };
        assert_eq!(payload.kind_bits(), object::SERVICE | object::ATTRIBUTE);
        assert_eq!(payload.kind_name(), "service attribute");
        assert_eq!(payload.qualified_name(), "h1.s1.k");
    }

    #[test]
    fn test_payload_qualified_names() {
        let host = StorePayload::Host {
            name: "h1".to_string(),
            last_update: Timestamp::from_micros(1),
            backend: None,
        };
        assert_eq!(host.qualified_name(), "h1");

        let metric = StorePayload::Metric {
            hostname: "h1".to_string(),
            name: "load".to_string(),
            store_info: None,
            last_update: Timestamp::from_micros(1),
            backend: Some("collectd".to_string()),
        };
        assert_eq!(metric.qualified_name(), "h1.load");
        assert_eq!(metric.backend(), Some("collectd"));
    }

    #[test]
    fn test_payload_serde_round_trip() {
        let payload = StorePayload::Metric {
            hostname: "h1".to_string(),
            name: "load".to_string(),
            store_info: Some(MetricStore::new("rrdtool", "/var/lib/load.rrd")),
            last_update: Timestamp::from_micros(42),
            backend: Some("collectd".to_string()),
        };

        let json = serde_json::to_string(&payload).unwrap();
        assert!(json.contains("\"object\":\"metric\""));
        let back: StorePayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back.qualified_name(), "h1.load");
        let StorePayload::Metric { store_info, .. } = back else {
            panic!("round trip changed the payload kind");
        };
        assert_eq!(store_info.unwrap().store_type, "rrdtool");
    }

    #[test]
    fn test_payload_backend_defaults_to_none() {
        let json = r#"{"object":"host","name":"h1","last_update":1}"#;
        let payload: StorePayload = serde_json::from_str(json).unwrap();
        assert!(payload.backend().is_none());
    }
}
