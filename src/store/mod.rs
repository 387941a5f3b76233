//! The object store.
//!
//! A [`Store`] holds the consolidated view of the fleet: an ordered set of
//! hosts, each carrying attributes, services, and metrics. Collector
//! backends feed it through the six update entry points; the frontend
//! queries it through [`has_host`](Store::has_host),
//! [`get_host`](Store::get_host), [`iterate`](Store::iterate), and the
//! JSON projections.
//!
//! Updates are idempotent and time-aware: an observation at or before an
//! object's `last_update` reports [`UpdateStatus::UpToDate`] and leaves the
//! object untouched, so observations may arrive in any order without
//! corrupting state. Parents are never auto-created; storing a child of a
//! missing parent is an error.
//!
//! The root state sits behind an `RwLock`; each host has its own lock, and
//! the acquisition order is always root first, host second.

mod expr;
mod json;
mod matcher;
mod objects;

pub use expr::{BinaryOp, Expr};
pub use json::SerializeFlags;
pub use matcher::{ChildSet, CmpOp, Matcher};
pub use objects::{Attribute, Host, HostHandle, Metric, MetricStore, ObjectRef, Service};

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::object::UpdateStatus;
use crate::time::Timestamp;
use crate::value::Datum;

use objects::name_key;

fn lock_err(context: &'static str) -> StoreError {
    StoreError::LockPoisoned(context)
}

#[derive(Debug, Default)]
struct State {
    hosts: BTreeMap<String, Arc<RwLock<Host>>>,
}

/// The in-memory system-information store.
///
/// # Examples
///
/// ```
/// use sysdb::{Store, Timestamp};
///
/// let store = Store::new();
/// store.store_host("web-1", Timestamp::from_secs(1), None).unwrap();
/// assert!(store.has_host("WEB-1"));
/// ```
#[derive(Debug, Default)]
pub struct Store {
    state: RwLock<State>,
}

impl Store {
    /// Creates a new empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores an observation of a host.
    ///
    /// Creates the host if it is unknown; otherwise applies the
    /// monotonic-timestamp update rule.
    ///
    /// # Errors
    ///
    /// [`StoreError::EmptyName`] if `name` is empty.
    pub fn store_host(
        &self,
        name: &str,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> Result<UpdateStatus, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let mut state = self
            .state
            .write()
            .map_err(|_| lock_err("store.store_host"))?;
        match state.hosts.entry(name_key(name)) {
            Entry::Occupied(entry) => {
                let mut host = entry.get().write().map_err(|_| lock_err("host"))?;
                Ok(host.meta.observe(last_update, backend))
            }
            Entry::Vacant(entry) => {
                let mut host = Host::new(name, last_update);
                host.meta.record_backend(backend);
                entry.insert(Arc::new(RwLock::new(host)));
                Ok(UpdateStatus::Stored)
            }
        }
    }

    /// Stores an observation of a service below an existing host.
    ///
    /// # Errors
    ///
    /// [`StoreError::HostNotFound`] if the host is unknown; the host is
    /// *not* created.
    pub fn store_service(
        &self,
        hostname: &str,
        name: &str,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> Result<UpdateStatus, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let state = self
            .state
            .read()
            .map_err(|_| lock_err("store.store_service"))?;
        let mut host = Self::host_mut(&state, hostname)?;
        match host.services.entry(name_key(name)) {
            Entry::Occupied(mut entry) => Ok(entry.get_mut().meta.observe(last_update, backend)),
            Entry::Vacant(entry) => {
                let mut service = Service::new(name, last_update);
                service.meta.record_backend(backend);
                entry.insert(service);
                Ok(UpdateStatus::Stored)
            }
        }
    }

    /// Stores an observation of a metric below an existing host.
    ///
    /// A metric-store descriptor given at a strictly newer timestamp
    /// replaces the previous one; `None` never clears a known descriptor.
    ///
    /// # Errors
    ///
    /// [`StoreError::HostNotFound`] if the host is unknown.
    pub fn store_metric(
        &self,
        hostname: &str,
        name: &str,
        store_info: Option<MetricStore>,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> Result<UpdateStatus, StoreError> {
        if name.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let state = self
            .state
            .read()
            .map_err(|_| lock_err("store.store_metric"))?;
        let mut host = Self::host_mut(&state, hostname)?;
        match host.metrics.entry(name_key(name)) {
            Entry::Occupied(mut entry) => {
                let metric = entry.get_mut();
                let status = metric.meta.observe(last_update, backend);
                if status.is_stored() {
                    if let Some(info) = store_info {
                        metric.store_info = Some(info);
                    }
                }
                Ok(status)
            }
            Entry::Vacant(entry) => {
                let mut metric = Metric::new(name, store_info, last_update);
                metric.meta.record_backend(backend);
                entry.insert(metric);
                Ok(UpdateStatus::Stored)
            }
        }
    }

    /// Stores a host attribute.
    ///
    /// # Errors
    ///
    /// [`StoreError::HostNotFound`] if the host is unknown.
    pub fn store_attribute(
        &self,
        hostname: &str,
        key: &str,
        value: Datum,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> Result<UpdateStatus, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let state = self
            .state
            .read()
            .map_err(|_| lock_err("store.store_attribute"))?;
        let mut host = Self::host_mut(&state, hostname)?;
        Ok(Self::upsert_attribute(
            &mut host.attributes,
            key,
            value,
            last_update,
            backend,
        ))
    }

    /// Stores an attribute of an existing service.
    ///
    /// # Errors
    ///
    /// [`StoreError::HostNotFound`] or [`StoreError::ServiceNotFound`] if
    /// the parent chain is incomplete.
    pub fn store_service_attribute(
        &self,
        hostname: &str,
        service: &str,
        key: &str,
        value: Datum,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> Result<UpdateStatus, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let state = self
            .state
            .read()
            .map_err(|_| lock_err("store.store_service_attribute"))?;
        let mut host = Self::host_mut(&state, hostname)?;
        let service = host
            .services
            .get_mut(&name_key(service))
            .ok_or_else(|| StoreError::ServiceNotFound {
                host: hostname.to_string(),
                name: service.to_string(),
            })?;
        Ok(Self::upsert_attribute(
            &mut service.attributes,
            key,
            value,
            last_update,
            backend,
        ))
    }

    /// Stores an attribute of an existing metric.
    ///
    /// # Errors
    ///
    /// [`StoreError::HostNotFound`] or [`StoreError::MetricNotFound`] if
    /// the parent chain is incomplete.
    pub fn store_metric_attribute(
        &self,
        hostname: &str,
        metric: &str,
        key: &str,
        value: Datum,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> Result<UpdateStatus, StoreError> {
        if key.is_empty() {
            return Err(StoreError::EmptyName);
        }

        let state = self
            .state
            .read()
            .map_err(|_| lock_err("store.store_metric_attribute"))?;
        let mut host = Self::host_mut(&state, hostname)?;
        let metric = host
            .metrics
            .get_mut(&name_key(metric))
            .ok_or_else(|| StoreError::MetricNotFound {
                host: hostname.to_string(),
                name: metric.to_string(),
            })?;
        Ok(Self::upsert_attribute(
            &mut metric.attributes,
            key,
            value,
            last_update,
            backend,
        ))
    }

    /// Returns true if the named host exists; names match
    /// case-insensitively.
    #[must_use]
    pub fn has_host(&self, name: &str) -> bool {
        self.state
            .read()
            .map(|state| state.hosts.contains_key(&name_key(name)))
            .unwrap_or(false)
    }

    /// Looks up a host and returns a shared handle on it.
    ///
    /// The returned handle keeps the host alive independently of the
    /// store; dropping it releases the reference.
    #[must_use]
    pub fn get_host(&self, name: &str) -> Option<HostHandle> {
        let state = self.state.read().ok()?;
        state
            .hosts
            .get(&name_key(name))
            .map(|host| HostHandle::new(Arc::clone(host)))
    }

    /// Visits every host in case-insensitive name order.
    ///
    /// # Errors
    ///
    /// [`StoreError::EmptyStore`] when there are no hosts (distinguishing
    /// an empty walk from a successful one); a callback error stops the
    /// iteration and is propagated verbatim.
    pub fn iterate<F>(&self, mut f: F) -> Result<(), StoreError>
    where
        F: FnMut(&Host) -> Result<(), StoreError>,
    {
        let state = self.state.read().map_err(|_| lock_err("store.iterate"))?;
        if state.hosts.is_empty() {
            return Err(StoreError::EmptyStore);
        }
        for host in state.hosts.values() {
            let host = host.read().map_err(|_| lock_err("host"))?;
            f(&host)?;
        }
        Ok(())
    }

    /// Renders a filtered projection of the store as a JSON array of
    /// hosts.
    ///
    /// A filter applies at every level: hosts, services, metrics, and
    /// attributes failing it are omitted, emptied containers still render
    /// as `[]`.
    ///
    /// # Errors
    ///
    /// [`StoreError::LockPoisoned`] if a lock was poisoned.
    pub fn to_json(
        &self,
        filter: Option<&Matcher>,
        flags: SerializeFlags,
    ) -> Result<String, StoreError> {
        let state = self.state.read().map_err(|_| lock_err("store.to_json"))?;
        json::render_hosts(&state.hosts, filter, flags)
    }

    /// Renders a single host as a JSON object.
    ///
    /// # Errors
    ///
    /// [`StoreError::HostNotFound`] if the host is unknown.
    pub fn host_to_json(
        &self,
        name: &str,
        filter: Option<&Matcher>,
        flags: SerializeFlags,
    ) -> Result<String, StoreError> {
        let state = self
            .state
            .read()
            .map_err(|_| lock_err("store.host_to_json"))?;
        let host = state
            .hosts
            .get(&name_key(name))
            .ok_or_else(|| StoreError::HostNotFound(name.to_string()))?;
        let host = host.read().map_err(|_| lock_err("host"))?;
        Ok(json::render_host(&host, filter, flags))
    }

    /// Drops all hosts.
    ///
    /// Handles obtained through [`get_host`](Store::get_host) keep their
    /// hosts alive until released.
    pub fn clear(&self) {
        if let Ok(mut state) = self.state.write() {
            state.hosts.clear();
        }
    }

    fn host_mut<'a>(
        state: &'a State,
        hostname: &str,
    ) -> Result<std::sync::RwLockWriteGuard<'a, Host>, StoreError> {
        state
            .hosts
            .get(&name_key(hostname))
            .ok_or_else(|| StoreError::HostNotFound(hostname.to_string()))?
            .write()
            .map_err(|_| lock_err("host"))
    }

    fn upsert_attribute(
        attributes: &mut BTreeMap<String, Attribute>,
        key: &str,
        value: Datum,
        last_update: Timestamp,
        backend: Option<&str>,
    ) -> UpdateStatus {
        match attributes.entry(name_key(key)) {
            Entry::Occupied(mut entry) => {
                let attr = entry.get_mut();
                let status = attr.meta.observe(last_update, backend);
                if status.is_stored() {
                    attr.value = value;
                }
                status
            }
            Entry::Vacant(entry) => {
                let mut attr = Attribute::new(key, value, last_update);
                attr.meta.record_backend(backend);
                entry.insert(attr);
                UpdateStatus::Stored
            }
        }
    }
}
