//! The query engine.
//!
//! A [`QueryEngine`] executes decoded frontend commands against a shared
//! [`Store`]: LIST and FETCH render inventory views, LOOKUP renders a
//! matcher-filtered projection, and STORE applies one update operation,
//! answering with the human-readable status line the frontend sends back
//! to clients.

/// Routed runtime separating the update path from the query path.
pub mod runtime;

use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{ExecutionError, SysdbResult};
use crate::ir::{Command, Request, StorePayload};
use crate::object::{ObjectKind, UpdateStatus};
use crate::store::{SerializeFlags, Store};

/// Result of executing a command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineResponse {
    /// A rendered JSON payload (LIST, FETCH, LOOKUP).
    Data(String),

    /// A human-readable status line (STORE).
    Status(String),
}

/// Executes frontend commands against a shared store.
#[derive(Debug, Clone)]
pub struct QueryEngine {
    store: Arc<Store>,
}

impl QueryEngine {
    /// Creates an engine on top of the given store.
    #[must_use]
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<Store> {
        &self.store
    }

    /// Executes a single request.
    ///
    /// # Errors
    ///
    /// Store-level refusals (missing parents, unknown hosts) and
    /// unsupported commands are returned as errors; stale updates are
    /// reported through the status line, not as errors.
    pub fn execute(&self, request: Request) -> SysdbResult<EngineResponse> {
        debug!(request_id = %request.request_id, "executing command");
        match &request.command {
            Command::List { kind } => self.exec_list(*kind),
            Command::Fetch { kind, hostname } => self.exec_fetch(*kind, hostname),
            Command::Lookup { matcher, flags } => {
                Ok(EngineResponse::Data(self.store.to_json(Some(matcher), *flags)?))
            }
            Command::Store(payload) => self.exec_store(payload),
        }
    }

    fn exec_list(&self, kind: ObjectKind) -> SysdbResult<EngineResponse> {
        if kind != ObjectKind::Host {
            return Err(ExecutionError::Unsupported(format!("LIST {kind}")).into());
        }
        Ok(EngineResponse::Data(
            self.store.to_json(None, SerializeFlags::SKIP_ALL)?,
        ))
    }

    fn exec_fetch(&self, kind: ObjectKind, hostname: &str) -> SysdbResult<EngineResponse> {
        if kind != ObjectKind::Host {
            return Err(ExecutionError::Unsupported(format!("FETCH {kind}")).into());
        }
        Ok(EngineResponse::Data(self.store.host_to_json(
            hostname,
            None,
            SerializeFlags::NONE,
        )?))
    }

    fn exec_store(&self, payload: &StorePayload) -> SysdbResult<EngineResponse> {
        let backend = payload.backend();
        let result = match payload {
            StorePayload::Host {
                name, last_update, ..
            } => self.store.store_host(name, *last_update, backend),
            StorePayload::Service {
                hostname,
                name,
                last_update,
                ..
            } => self
                .store
                .store_service(hostname, name, *last_update, backend),
            StorePayload::Metric {
                hostname,
                name,
                store_info,
                last_update,
                ..
            } => self.store.store_metric(
                hostname,
                name,
                store_info.clone(),
                *last_update,
                backend,
            ),
            StorePayload::HostAttribute {
                hostname,
                key,
                value,
                last_update,
                ..
            } => self
                .store
                .store_attribute(hostname, key, value.clone(), *last_update, backend),
            StorePayload::ServiceAttribute {
                hostname,
                service,
                key,
                value,
                last_update,
                ..
            } => self.store.store_service_attribute(
                hostname,
                service,
                key,
                value.clone(),
                *last_update,
                backend,
            ),
            StorePayload::MetricAttribute {
                hostname,
                metric,
                key,
                value,
                last_update,
                ..
            } => self.store.store_metric_attribute(
                hostname,
                metric,
                key,
                value.clone(),
                *last_update,
                backend,
            ),
        };

        match result {
            Ok(UpdateStatus::Stored) => Ok(EngineResponse::Status(format!(
                "Successfully stored {} {}",
                payload.kind_name(),
                payload.qualified_name()
            ))),
            Ok(UpdateStatus::UpToDate) => {
                let mut label = payload.kind_name().to_string();
                if let Some(first) = label.get_mut(0..1) {
                    first.make_ascii_uppercase();
                }
                Ok(EngineResponse::Status(format!(
                    "{label} {} already up to date",
                    payload.qualified_name()
                )))
            }
            Err(err) => {
                warn!(
                    object = payload.kind_name(),
                    name = %payload.qualified_name(),
                    error = %err,
                    "failed to store object"
                );
                Err(err.into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::SysdbError;
    use crate::object::Field;
    use crate::store::{Expr, Matcher};
    use crate::time::Timestamp;
    use crate::value::Datum;

    fn engine() -> QueryEngine {
        QueryEngine::new(Arc::new(Store::new()))
    }

    fn store_host(engine: &QueryEngine, name: &str, micros: u64) -> SysdbResult<EngineResponse> {
        engine.execute(Request::new(Command::Store(StorePayload::Host {
            name: name.to_string(),
            last_update: Timestamp::from_micros(micros),
            backend: None,
        })))
    }

    #[test]
    fn test_store_status_lines() {
        let engine = engine();

        let resp = store_host(&engine, "h1", 1).unwrap();
        assert_eq!(
            resp,
            EngineResponse::Status("Successfully stored host h1".to_string())
        );

        let resp = store_host(&engine, "h1", 1).unwrap();
        assert_eq!(
            resp,
            EngineResponse::Status("Host h1 already up to date".to_string())
        );
    }

    #[test]
    fn test_store_attribute_status_lines() {
        let engine = engine();
        store_host(&engine, "h1", 1).unwrap();

        let resp = engine
            .execute(Request::new(Command::Store(StorePayload::HostAttribute {
                hostname: "h1".to_string(),
                key: "role".to_string(),
                value: Datum::from("db"),
                last_update: Timestamp::from_micros(1),
                backend: None,
            })))
            .unwrap();
        assert_eq!(
            resp,
            EngineResponse::Status("Successfully stored host attribute h1.role".to_string())
        );

        let resp = engine
            .execute(Request::new(Command::Store(StorePayload::HostAttribute {
                hostname: "h1".to_string(),
                key: "role".to_string(),
                value: Datum::from("db"),
                last_update: Timestamp::from_micros(1),
                backend: None,
            })))
            .unwrap();
        assert_eq!(
            resp,
            EngineResponse::Status("Host attribute h1.role already up to date".to_string())
        );
    }

    #[test]
    fn test_store_missing_parent_is_error() {
        let engine = engine();
        let err = engine
            .execute(Request::new(Command::Store(StorePayload::Service {
                hostname: "nope".to_string(),
                name: "svc".to_string(),
                last_update: Timestamp::from_micros(1),
                backend: None,
            })))
            .unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn test_list_skips_children() {
        let engine = engine();
        store_host(&engine, "h1", 1).unwrap();

        let resp = engine
            .execute(Request::new(Command::List {
                kind: ObjectKind::Host,
            }))
            .unwrap();
        let EngineResponse::Data(json) = resp else {
            panic!("LIST must produce data");
        };
        assert!(json.contains("\"name\": \"h1\""));
        assert!(!json.contains("attributes"));
    }

    #[test]
    fn test_list_unsupported_kind() {
        let engine = engine();
        let err = engine
            .execute(Request::new(Command::List {
                kind: ObjectKind::Service,
            }))
            .unwrap_err();
        assert!(matches!(
            err,
            SysdbError::Execution(ExecutionError::Unsupported(_))
        ));
    }

    #[test]
    fn test_fetch_renders_one_host() {
        let engine = engine();
        store_host(&engine, "h1", 1).unwrap();
        store_host(&engine, "h2", 1).unwrap();

        let resp = engine
            .execute(Request::new(Command::Fetch {
                kind: ObjectKind::Host,
                hostname: "H1".to_string(),
            }))
            .unwrap();
        let EngineResponse::Data(json) = resp else {
            panic!("FETCH must produce data");
        };
        assert!(json.starts_with("{\"name\": \"h1\""));
        assert!(!json.contains("h2"));

        let err = engine
            .execute(Request::new(Command::Fetch {
                kind: ObjectKind::Host,
                hostname: "h3".to_string(),
            }))
            .unwrap_err();
        assert!(err.is_store());
    }

    #[test]
    fn test_lookup_applies_matcher() {
        let engine = engine();
        store_host(&engine, "h1", 1).unwrap();
        store_host(&engine, "h2", 3).unwrap();

        let matcher = Matcher::cmp_gt(
            Expr::field(Field::LastUpdate),
            Expr::constant(Datum::DateTime(Timestamp::from_micros(1))),
        );
        let resp = engine
            .execute(Request::new(Command::Lookup {
                matcher,
                flags: SerializeFlags::SKIP_ALL,
            }))
            .unwrap();
        let EngineResponse::Data(json) = resp else {
            panic!("LOOKUP must produce data");
        };
        assert!(json.contains("h2"));
        assert!(!json.contains("h1"));
    }
}
