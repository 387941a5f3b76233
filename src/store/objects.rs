//! The store object graph: hosts, services, metrics, and attributes.
//!
//! Containment is strict and cycle-free: children live by value inside
//! their parent, keyed by the lower-cased name so that iteration order is
//! deterministic and lookups are case-insensitive. The display name (with
//! its first-observed casing) lives in the object's [`ObjectMeta`].

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use serde::{Deserialize, Serialize};

use crate::error::StoreError;
use crate::object::{Field, ObjectKind, ObjectMeta};
use crate::time::Timestamp;
use crate::value::Datum;

/// Case-insensitive identity key for an object name.
pub(crate) fn name_key(name: &str) -> String {
    name.to_ascii_lowercase()
}

/// Descriptor of the time-series store holding a metric's data points.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricStore {
    /// Store type, e.g. `"rrdtool"`.
    #[serde(rename = "type")]
    pub store_type: String,
    /// Identifier of the data within that store, e.g. a file name.
    pub id: String,
}

impl MetricStore {
    /// Creates a new descriptor.
    #[must_use]
    pub fn new(store_type: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            store_type: store_type.into(),
            id: id.into(),
        }
    }
}

/// A key/value annotation attached to a host, service, or metric.
#[derive(Debug, Clone)]
pub struct Attribute {
    pub(crate) meta: ObjectMeta,
    pub(crate) value: Datum,
}

impl Attribute {
    pub(crate) fn new(name: impl Into<String>, value: Datum, last_update: Timestamp) -> Self {
        Self {
            meta: ObjectMeta::new(name, last_update),
            value,
        }
    }

    /// Shared object metadata.
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// The attribute's current value.
    #[must_use]
    pub fn value(&self) -> &Datum {
        &self.value
    }
}

/// A service running on a host.
#[derive(Debug, Clone)]
pub struct Service {
    pub(crate) meta: ObjectMeta,
    pub(crate) attributes: BTreeMap<String, Attribute>,
}

impl Service {
    pub(crate) fn new(name: impl Into<String>, last_update: Timestamp) -> Self {
        Self {
            meta: ObjectMeta::new(name, last_update),
            attributes: BTreeMap::new(),
        }
    }

    /// Shared object metadata.
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// The service's attributes, in name order.
    pub fn attributes(&self) -> impl ExactSizeIterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Looks up an attribute by name, case-insensitively.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(&name_key(name))
    }
}

/// A metric emitted by a host.
#[derive(Debug, Clone)]
pub struct Metric {
    pub(crate) meta: ObjectMeta,
    pub(crate) store_info: Option<MetricStore>,
    pub(crate) attributes: BTreeMap<String, Attribute>,
}

impl Metric {
    pub(crate) fn new(
        name: impl Into<String>,
        store_info: Option<MetricStore>,
        last_update: Timestamp,
    ) -> Self {
        Self {
            meta: ObjectMeta::new(name, last_update),
            store_info,
            attributes: BTreeMap::new(),
        }
    }

    /// Shared object metadata.
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// Where this metric's data points live, if known.
    #[must_use]
    pub fn store_info(&self) -> Option<&MetricStore> {
        self.store_info.as_ref()
    }

    /// The metric's attributes, in name order.
    pub fn attributes(&self) -> impl ExactSizeIterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// Looks up an attribute by name, case-insensitively.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(&name_key(name))
    }
}

/// A machine in the fleet, the root of one containment subtree.
#[derive(Debug, Clone)]
pub struct Host {
    pub(crate) meta: ObjectMeta,
    pub(crate) attributes: BTreeMap<String, Attribute>,
    pub(crate) services: BTreeMap<String, Service>,
    pub(crate) metrics: BTreeMap<String, Metric>,
}

impl Host {
    pub(crate) fn new(name: impl Into<String>, last_update: Timestamp) -> Self {
        Self {
            meta: ObjectMeta::new(name, last_update),
            attributes: BTreeMap::new(),
            services: BTreeMap::new(),
            metrics: BTreeMap::new(),
        }
    }

    /// Shared object metadata.
    #[must_use]
    pub fn meta(&self) -> &ObjectMeta {
        &self.meta
    }

    /// The host's attributes, in name order.
    pub fn attributes(&self) -> impl ExactSizeIterator<Item = &Attribute> {
        self.attributes.values()
    }

    /// The host's services, in name order.
    pub fn services(&self) -> impl ExactSizeIterator<Item = &Service> {
        self.services.values()
    }

    /// The host's metrics, in name order.
    pub fn metrics(&self) -> impl ExactSizeIterator<Item = &Metric> {
        self.metrics.values()
    }

    /// Looks up an attribute by name, case-insensitively.
    #[must_use]
    pub fn attribute(&self, name: &str) -> Option<&Attribute> {
        self.attributes.get(&name_key(name))
    }

    /// Looks up a service by name, case-insensitively.
    #[must_use]
    pub fn service(&self, name: &str) -> Option<&Service> {
        self.services.get(&name_key(name))
    }

    /// Looks up a metric by name, case-insensitively.
    #[must_use]
    pub fn metric(&self, name: &str) -> Option<&Metric> {
        self.metrics.get(&name_key(name))
    }
}

/// A borrowed view of any store object.
///
/// Expressions and matchers evaluate against this sum view; it also powers
/// the uniform field extraction of [`ObjectRef::field`].
#[derive(Debug, Clone, Copy)]
pub enum ObjectRef<'a> {
    /// A host.
    Host(&'a Host),
    /// A service.
    Service(&'a Service),
    /// A metric.
    Metric(&'a Metric),
    /// An attribute.
    Attribute(&'a Attribute),
}

impl<'a> ObjectRef<'a> {
    /// The kind of the referenced object.
    #[must_use]
    pub const fn kind(&self) -> ObjectKind {
        match self {
            Self::Host(_) => ObjectKind::Host,
            Self::Service(_) => ObjectKind::Service,
            Self::Metric(_) => ObjectKind::Metric,
            Self::Attribute(_) => ObjectKind::Attribute,
        }
    }

    /// The referenced object's shared metadata.
    #[must_use]
    pub fn meta(&self) -> &'a ObjectMeta {
        match self {
            Self::Host(h) => h.meta(),
            Self::Service(s) => s.meta(),
            Self::Metric(m) => m.meta(),
            Self::Attribute(a) => a.meta(),
        }
    }

    /// Extracts a uniform field as a datum.
    ///
    /// `Age` is computed against the current wall clock. `Value` yields the
    /// attribute's datum and `Null` on every other kind.
    #[must_use]
    pub fn field(&self, field: Field) -> Datum {
        let meta = self.meta();
        match field {
            Field::Name => Datum::String(meta.name().to_string()),
            Field::LastUpdate => Datum::DateTime(meta.last_update()),
            Field::Age => {
                Datum::DateTime(Timestamp::now().saturating_sub(meta.last_update()))
            }
            Field::Interval => Datum::DateTime(meta.interval()),
            Field::Backend => Datum::Array(
                meta.backends()
                    .iter()
                    .map(|b| Datum::String(b.clone()))
                    .collect(),
            ),
            Field::Value => match self {
                Self::Attribute(a) => a.value().clone(),
                _ => Datum::Null,
            },
        }
    }
}

/// Shared-ownership handle on a host.
///
/// Cloning the handle is the reference-count increment, dropping it the
/// release; the host stays alive while any handle exists, even past a
/// store [`clear`](crate::Store::clear).
#[derive(Debug, Clone)]
pub struct HostHandle {
    inner: Arc<RwLock<Host>>,
}

impl HostHandle {
    pub(crate) fn new(inner: Arc<RwLock<Host>>) -> Self {
        Self { inner }
    }

    /// Acquires a shared read guard on the host.
    pub fn read(&self) -> Result<RwLockReadGuard<'_, Host>, StoreError> {
        self.inner
            .read()
            .map_err(|_| StoreError::LockPoisoned("host"))
    }

    pub(crate) fn write(&self) -> Result<RwLockWriteGuard<'_, Host>, StoreError> {
        self.inner
            .write()
            .map_err(|_| StoreError::LockPoisoned("host"))
    }

    /// Returns true if both handles refer to the same host object.
    #[must_use]
    pub fn same_object(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    /// The number of live handles on this host, including the store's own.
    #[must_use]
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_host() -> Host {
        let mut host = Host::new("Web-1", Timestamp::from_micros(10));
        host.attributes.insert(
            name_key("role"),
            Attribute::new("role", Datum::from("frontend"), Timestamp::from_micros(10)),
        );
        host.services.insert(
            name_key("httpd"),
            Service::new("httpd", Timestamp::from_micros(12)),
        );
        host.metrics.insert(
            name_key("load"),
            Metric::new(
                "load",
                Some(MetricStore::new("rrdtool", "/var/lib/load.rrd")),
                Timestamp::from_micros(15),
            ),
        );
        host
    }

    #[test]
    fn test_case_insensitive_child_lookup() {
        let host = sample_host();
        assert!(host.service("HTTPD").is_some());
        assert!(host.metric("Load").is_some());
        assert!(host.attribute("ROLE").is_some());
        assert!(host.service("sshd").is_none());
    }

    #[test]
    fn test_display_casing_retained() {
        let host = sample_host();
        assert_eq!(host.meta().name(), "Web-1");
        assert_eq!(host.service("httpd").unwrap().meta().name(), "httpd");
    }

    #[test]
    fn test_object_ref_kinds() {
        let host = sample_host();
        assert_eq!(ObjectRef::Host(&host).kind(), ObjectKind::Host);
        let svc = host.service("httpd").unwrap();
        assert_eq!(ObjectRef::Service(svc).kind(), ObjectKind::Service);
    }

    #[test]
    fn test_field_extraction() {
        let host = sample_host();
        let obj = ObjectRef::Host(&host);

        assert_eq!(obj.field(Field::Name), Datum::from("Web-1"));
        assert_eq!(
            obj.field(Field::LastUpdate),
            Datum::DateTime(Timestamp::from_micros(10))
        );
        assert_eq!(
            obj.field(Field::Interval),
            Datum::DateTime(Timestamp::EPOCH)
        );
        assert_eq!(obj.field(Field::Backend), Datum::Array(Vec::new()));
        assert_eq!(obj.field(Field::Value), Datum::Null);
    }

    #[test]
    fn test_field_age_is_positive() {
        let host = sample_host();
        let age = ObjectRef::Host(&host).field(Field::Age);
        // The fixture timestamp is microseconds after the epoch, so the age
        // is essentially "now".
        let Datum::DateTime(age) = age else {
            panic!("age must be a datetime datum");
        };
        assert!(age.as_micros() > 10 * crate::time::YEAR);
    }

    #[test]
    fn test_attribute_value_field() {
        let host = sample_host();
        let attr = host.attribute("role").unwrap();
        assert_eq!(
            ObjectRef::Attribute(attr).field(Field::Value),
            Datum::from("frontend")
        );
    }

    #[test]
    fn test_metric_store_descriptor() {
        let host = sample_host();
        let metric = host.metric("load").unwrap();
        let info = metric.store_info().unwrap();
        assert_eq!(info.store_type, "rrdtool");
        assert_eq!(info.id, "/var/lib/load.rrd");
    }

    #[test]
    fn test_host_handle_identity_and_count() {
        let handle = HostHandle::new(Arc::new(RwLock::new(sample_host())));
        assert_eq!(handle.handle_count(), 1);

        let second = handle.clone();
        assert_eq!(handle.handle_count(), 2);
        assert!(handle.same_object(&second));

        let other = HostHandle::new(Arc::new(RwLock::new(sample_host())));
        assert!(!handle.same_object(&other));

        drop(second);
        assert_eq!(handle.handle_count(), 1);
    }

    #[test]
    fn test_metric_store_serde() {
        let info = MetricStore::new("rrdtool", "id-1");
        let json = serde_json::to_string(&info).unwrap();
        assert!(json.contains("\"type\":\"rrdtool\""));
        let back: MetricStore = serde_json::from_str(&json).unwrap();
        assert_eq!(back, info);
    }
}
