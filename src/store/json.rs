//! Streaming JSON serializer for the store.
//!
//! The output format is fixed: object members are separated by `", "` with
//! `": "` after each key, array elements by a bare `","`, and the member
//! order per object kind never changes. Child arrays keep the original
//! serializer's comma discipline: an emitted child is followed by a comma
//! whenever it is not the last element of the *unfiltered* sibling list,
//! so filtered-out trailing siblings leave a trailing comma in place.

use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};

use crate::error::StoreError;
use crate::store::matcher::Matcher;
use crate::store::objects::{Attribute, Host, Metric, ObjectRef, Service};
use crate::value::Datum;

/// Flags controlling which child levels the serializer emits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SerializeFlags(u32);

impl SerializeFlags {
    /// Emit everything.
    pub const NONE: Self = Self(0);
    /// Omit the `attributes` arrays at every level.
    pub const SKIP_ATTRIBUTES: Self = Self(1);
    /// Omit the hosts' `metrics` arrays.
    pub const SKIP_METRICS: Self = Self(1 << 1);
    /// Omit the hosts' `services` arrays.
    pub const SKIP_SERVICES: Self = Self(1 << 2);
    /// Omit all three child levels.
    pub const SKIP_ALL: Self =
        Self(Self::SKIP_ATTRIBUTES.0 | Self::SKIP_METRICS.0 | Self::SKIP_SERVICES.0);

    /// Returns true if all bits of `other` are set in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }
}

impl std::ops::BitOr for SerializeFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl std::ops::BitOrAssign for SerializeFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

/// Renders the full host list as a JSON array.
pub(crate) fn render_hosts(
    hosts: &BTreeMap<String, Arc<RwLock<Host>>>,
    filter: Option<&Matcher>,
    flags: SerializeFlags,
) -> Result<String, StoreError> {
    let mut buf = String::new();
    buf.push('[');
    let mut first = true;
    for host in hosts.values() {
        let host = host.read().map_err(|_| StoreError::LockPoisoned("host"))?;
        if let Some(filter) = filter {
            if !filter.matches(&ObjectRef::Host(&host)) {
                continue;
            }
        }
        if !first {
            buf.push(',');
        }
        first = false;
        write_host(&mut buf, &host, filter, flags);
    }
    buf.push(']');
    Ok(buf)
}

/// Renders a single host object.
pub(crate) fn render_host(
    host: &Host,
    filter: Option<&Matcher>,
    flags: SerializeFlags,
) -> String {
    let mut buf = String::new();
    write_host(&mut buf, host, filter, flags);
    buf
}

fn write_host(buf: &mut String, host: &Host, filter: Option<&Matcher>, flags: SerializeFlags) {
    buf.push_str("{\"name\": ");
    write_json_string(buf, host.meta().name());
    write_meta_tail(buf, host);

    if !flags.contains(SerializeFlags::SKIP_ATTRIBUTES) {
        buf.push_str(", \"attributes\": [");
        write_attribute_elements(buf, host.attributes(), filter);
        buf.push(']');
    }
    if !flags.contains(SerializeFlags::SKIP_METRICS) {
        buf.push_str(", \"metrics\": [");
        let metrics = host.metrics();
        let len = metrics.len();
        for (idx, metric) in metrics.enumerate() {
            if matches_filter(filter, ObjectRef::Metric(metric)) {
                write_metric(buf, metric, filter, flags);
                if idx + 1 < len {
                    buf.push(',');
                }
            }
        }
        buf.push(']');
    }
    if !flags.contains(SerializeFlags::SKIP_SERVICES) {
        buf.push_str(", \"services\": [");
        let services = host.services();
        let len = services.len();
        for (idx, service) in services.enumerate() {
            if matches_filter(filter, ObjectRef::Service(service)) {
                write_service(buf, service, filter, flags);
                if idx + 1 < len {
                    buf.push(',');
                }
            }
        }
        buf.push(']');
    }
    buf.push('}');
}

fn write_service(
    buf: &mut String,
    service: &Service,
    filter: Option<&Matcher>,
    flags: SerializeFlags,
) {
    buf.push_str("{\"name\": ");
    write_json_string(buf, service.meta().name());
    write_meta_tail(buf, service);
    if !flags.contains(SerializeFlags::SKIP_ATTRIBUTES) {
        buf.push_str(", \"attributes\": [");
        write_attribute_elements(buf, service.attributes(), filter);
        buf.push(']');
    }
    buf.push('}');
}

fn write_metric(
    buf: &mut String,
    metric: &Metric,
    filter: Option<&Matcher>,
    flags: SerializeFlags,
) {
    buf.push_str("{\"name\": ");
    write_json_string(buf, metric.meta().name());
    write_meta_tail(buf, metric);
    if !flags.contains(SerializeFlags::SKIP_ATTRIBUTES) {
        buf.push_str(", \"attributes\": [");
        write_attribute_elements(buf, metric.attributes(), filter);
        buf.push(']');
    }
    buf.push('}');
}

fn write_attribute_elements<'a>(
    buf: &mut String,
    attributes: impl ExactSizeIterator<Item = &'a Attribute>,
    filter: Option<&Matcher>,
) {
    let len = attributes.len();
    for (idx, attr) in attributes.enumerate() {
        if matches_filter(filter, ObjectRef::Attribute(attr)) {
            write_attribute(buf, attr);
            if idx + 1 < len {
                buf.push(',');
            }
        }
    }
}

fn write_attribute(buf: &mut String, attr: &Attribute) {
    buf.push_str("{\"name\": ");
    write_json_string(buf, attr.meta().name());
    buf.push_str(", \"value\": ");
    write_datum(buf, attr.value());
    write_meta_tail(buf, attr);
    buf.push('}');
}

fn matches_filter(filter: Option<&Matcher>, obj: ObjectRef<'_>) -> bool {
    filter.map_or(true, |f| f.matches(&obj))
}

trait HasMeta {
    fn object_meta(&self) -> &crate::object::ObjectMeta;
}

impl HasMeta for Host {
    fn object_meta(&self) -> &crate::object::ObjectMeta {
        self.meta()
    }
}

impl HasMeta for Service {
    fn object_meta(&self) -> &crate::object::ObjectMeta {
        self.meta()
    }
}

impl HasMeta for Metric {
    fn object_meta(&self) -> &crate::object::ObjectMeta {
        self.meta()
    }
}

impl HasMeta for Attribute {
    fn object_meta(&self) -> &crate::object::ObjectMeta {
        self.meta()
    }
}

fn write_meta_tail(buf: &mut String, obj: &impl HasMeta) {
    let meta = obj.object_meta();
    buf.push_str(", \"last_update\": \"");
    buf.push_str(&meta.last_update().format_datetime());
    buf.push_str("\", \"update_interval\": \"");
    buf.push_str(&meta.interval().format_interval());
    buf.push_str("\", \"backends\": [");
    for (idx, backend) in meta.backends().iter().enumerate() {
        if idx > 0 {
            buf.push(',');
        }
        write_json_string(buf, backend);
    }
    buf.push(']');
}

fn write_json_string(buf: &mut String, s: &str) {
    match serde_json::to_string(s) {
        Ok(escaped) => buf.push_str(&escaped),
        // Serializing a string cannot fail; keep the output well-formed
        // regardless.
        Err(_) => buf.push_str("\"\""),
    }
}

fn write_datum(buf: &mut String, value: &Datum) {
    match value {
        Datum::Null => buf.push_str("null"),
        Datum::Integer(v) => buf.push_str(&v.to_string()),
        Datum::Decimal(v) => match serde_json::to_string(v) {
            Ok(n) => buf.push_str(&n),
            Err(_) => buf.push_str("null"),
        },
        Datum::String(s) => write_json_string(buf, s),
        Datum::DateTime(ts) => {
            buf.push('"');
            buf.push_str(&ts.format_datetime());
            buf.push('"');
        }
        Datum::Binary(bytes) => {
            buf.push('"');
            for byte in bytes {
                buf.push_str(&format!("{byte:02x}"));
            }
            buf.push('"');
        }
        Datum::Array(items) => {
            buf.push('[');
            for (idx, item) in items.iter().enumerate() {
                if idx > 0 {
                    buf.push(',');
                }
                write_datum(buf, item);
            }
            buf.push(']');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object::Field;
    use crate::store::expr::Expr;
    use crate::store::objects::name_key;
    use crate::time::Timestamp;

    #[test]
    fn test_flags_operations() {
        let flags = SerializeFlags::SKIP_ATTRIBUTES | SerializeFlags::SKIP_METRICS;
        assert!(flags.contains(SerializeFlags::SKIP_ATTRIBUTES));
        assert!(!flags.contains(SerializeFlags::SKIP_SERVICES));
        assert!(SerializeFlags::SKIP_ALL.contains(flags));
        assert!(SerializeFlags::NONE.contains(SerializeFlags::NONE));

        let mut flags = SerializeFlags::NONE;
        flags |= SerializeFlags::SKIP_SERVICES;
        assert!(flags.contains(SerializeFlags::SKIP_SERVICES));
    }

    #[test]
    fn test_write_datum_scalars() {
        let mut buf = String::new();
        write_datum(&mut buf, &Datum::Integer(42));
        assert_eq!(buf, "42");

        let mut buf = String::new();
        write_datum(&mut buf, &Datum::from("a \"quoted\" name"));
        assert_eq!(buf, "\"a \\\"quoted\\\" name\"");

        let mut buf = String::new();
        write_datum(&mut buf, &Datum::DateTime(Timestamp::EPOCH));
        assert_eq!(buf, "\"1970-01-01 00:00:00 +0000\"");

        let mut buf = String::new();
        write_datum(&mut buf, &Datum::Binary(vec![0xca, 0xfe]));
        assert_eq!(buf, "\"cafe\"");

        let mut buf = String::new();
        write_datum(&mut buf, &Datum::Null);
        assert_eq!(buf, "null");
    }

    #[test]
    fn test_write_datum_array() {
        let mut buf = String::new();
        write_datum(
            &mut buf,
            &Datum::Array(vec![Datum::Integer(1), Datum::from("x")]),
        );
        assert_eq!(buf, "[1,\"x\"]");
    }

    #[test]
    fn test_render_bare_host() {
        let host = Host::new("h1", Timestamp::from_micros(1));
        let out = render_host(&host, None, SerializeFlags::SKIP_ALL);
        assert_eq!(
            out,
            "{\"name\": \"h1\", \"last_update\": \"1970-01-01 00:00:00 +0000\", \
             \"update_interval\": \"0s\", \"backends\": []}"
        );
    }

    #[test]
    fn test_render_host_with_children_keys() {
        let host = Host::new("h1", Timestamp::from_micros(1));
        let out = render_host(&host, None, SerializeFlags::NONE);
        assert_eq!(
            out,
            "{\"name\": \"h1\", \"last_update\": \"1970-01-01 00:00:00 +0000\", \
             \"update_interval\": \"0s\", \"backends\": [], \
             \"attributes\": [], \"metrics\": [], \"services\": []}"
        );
    }

    #[test]
    fn test_filtered_trailing_comma() {
        // Suppressing a trailing sibling leaves the comma of the previous
        // element in place.
        let mut host = Host::new("h1", Timestamp::from_micros(1));
        host.attributes.insert(
            name_key("k1"),
            Attribute::new("k1", Datum::from("v1"), Timestamp::from_micros(1)),
        );
        host.attributes.insert(
            name_key("k2"),
            Attribute::new("k2", Datum::from("v2"), Timestamp::from_micros(2)),
        );

        let only_old = Matcher::cmp_le(
            Expr::field(Field::LastUpdate),
            Expr::constant(Datum::DateTime(Timestamp::from_micros(1))),
        );
        let out = render_host(
            &host,
            Some(&only_old),
            SerializeFlags::SKIP_METRICS | SerializeFlags::SKIP_SERVICES,
        );
        assert!(out.contains("\"attributes\": [{\"name\": \"k1\", \"value\": \"v1\", "));
        assert!(out.ends_with("\"backends\": []},]}"));
    }

    #[test]
    fn test_backends_rendering() {
        let mut host = Host::new("h1", Timestamp::from_micros(1));
        host.meta.record_backend(Some("collectd"));
        host.meta.record_backend(Some("facter"));
        let out = render_host(&host, None, SerializeFlags::SKIP_ALL);
        assert!(out.contains("\"backends\": [\"collectd\",\"facter\"]"));
    }
}
