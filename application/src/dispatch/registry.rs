//! Name-keyed handler registries with type-erased dispatch.
//!
//! A registration binds a method (or daemon notification type) to a
//! strongly-typed callback. The registry stores a closure that decodes the raw
//! JSON fragment into the callback's payload type and invokes it, so the
//! reader loop only ever deals with `(&str, &RawValue)`.
//!
//! Registries reject duplicate names. Whether a duplicate is fatal is up to
//! the caller: session builders propagate [`RegistryError`], while the daemon
//! registry owner logs it and keeps the first handler.

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use serde_json::value::RawValue;
use std::any::{Any, type_name};
use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::fmt::Display;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::{Arc, PoisonError, RwLock};
use thiserror::Error;

/// Registration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("duplicate {kind} handler registered for \"{name}\"")]
    Duplicate { kind: &'static str, name: String },
}

/// Failures while running a registered handler.
#[derive(Debug, Error)]
pub enum HandlerFault {
    #[error("failed to decode {type_name}: {source}")]
    Decode {
        type_name: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("handler failed: {0}")]
    Failed(String),

    #[error("handler panicked: {0}")]
    Panicked(String),

    #[error("handler produced a null result")]
    NullResult,

    #[error("handler produced a non-object result: {0}")]
    NonObjectResult(&'static str),

    #[error("failed to encode handler result: {0}")]
    Encode(#[source] serde_json::Error),
}

impl HandlerFault {
    pub fn is_decode(&self) -> bool {
        matches!(self, HandlerFault::Decode { .. })
    }
}

/// Future yielding the `result` payload of an inbound request.
pub type ResponseFuture = BoxFuture<'static, Result<Value, HandlerFault>>;

type NotificationFn = dyn Fn(&RawValue) -> Result<(), HandlerFault> + Send + Sync;
type RequestFn = dyn Fn(&RawValue) -> Result<ResponseFuture, HandlerFault> + Send + Sync;

/// Outcome of looking up and invoking a handler.
pub enum Dispatch<T> {
    Handled(T),
    UnknownName,
    Fault(HandlerFault),
}

struct Handlers<H: ?Sized> {
    kind: &'static str,
    map: RwLock<HashMap<String, Arc<H>>>,
}

impl<H: ?Sized> Handlers<H> {
    fn new(kind: &'static str) -> Self {
        Self {
            kind,
            map: RwLock::new(HashMap::new()),
        }
    }

    fn insert(&self, name: String, handler: Arc<H>) -> Result<(), RegistryError> {
        let mut map = self.map.write().unwrap_or_else(PoisonError::into_inner);
        match map.entry(name) {
            Entry::Occupied(entry) => Err(RegistryError::Duplicate {
                kind: self.kind,
                name: entry.key().clone(),
            }),
            Entry::Vacant(entry) => {
                entry.insert(handler);
                Ok(())
            }
        }
    }

    fn get(&self, name: &str) -> Option<Arc<H>> {
        self.map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(name)
            .cloned()
    }

    fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .map
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

fn decode<T: DeserializeOwned>(params: &RawValue) -> Result<T, HandlerFault> {
    serde_json::from_str(params.get()).map_err(|source| HandlerFault::Decode {
        type_name: type_name::<T>(),
        source,
    })
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Registry of notification handlers (socket notifications or daemon
/// notification types).
pub struct NotificationRegistry {
    handlers: Handlers<NotificationFn>,
}

impl NotificationRegistry {
    /// `kind` labels the registry in errors and logs.
    pub fn new(kind: &'static str) -> Self {
        Self {
            handlers: Handlers::new(kind),
        }
    }

    pub fn register<T, F>(&self, name: impl Into<String>, callback: F) -> Result<(), RegistryError>
    where
        T: DeserializeOwned + 'static,
        F: Fn(T) + Send + Sync + 'static,
    {
        let handler: Arc<NotificationFn> = Arc::new(move |params: &RawValue| {
            let payload = decode::<T>(params)?;
            catch_unwind(AssertUnwindSafe(|| callback(payload)))
                .map_err(|panic| HandlerFault::Panicked(panic_message(&*panic)))
        });
        self.handlers.insert(name.into(), handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.names()
    }

    pub fn kind(&self) -> &'static str {
        self.handlers.kind
    }

    /// Decode `params` and run the handler registered under `name`.
    pub fn dispatch(&self, name: &str, params: &RawValue) -> Dispatch<()> {
        let Some(handler) = self.handlers.get(name) else {
            return Dispatch::UnknownName;
        };
        match handler(params) {
            Ok(()) => Dispatch::Handled(()),
            Err(fault) => Dispatch::Fault(fault),
        }
    }
}

impl Default for NotificationRegistry {
    fn default() -> Self {
        Self::new("notification")
    }
}

/// Registry of inbound request handlers.
pub struct RequestRegistry {
    handlers: Handlers<RequestFn>,
}

impl RequestRegistry {
    pub fn new() -> Self {
        Self {
            handlers: Handlers::new("request"),
        }
    }

    /// Register an asynchronous request handler.
    ///
    /// The result must serialize to a JSON object. `null` (including `()`),
    /// scalars and arrays are handler faults.
    pub fn register<T, R, E, F, Fut>(
        &self,
        name: impl Into<String>,
        callback: F,
    ) -> Result<(), RegistryError>
    where
        T: DeserializeOwned + 'static,
        R: Serialize + 'static,
        E: Display + 'static,
        F: Fn(T) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        let handler: Arc<RequestFn> = Arc::new(move |params: &RawValue| {
            let payload = decode::<T>(params)?;
            let pending = catch_unwind(AssertUnwindSafe(|| callback(payload)))
                .map_err(|panic| HandlerFault::Panicked(panic_message(&*panic)))?;

            Ok(async move {
                let outcome = AssertUnwindSafe(pending)
                    .catch_unwind()
                    .await
                    .map_err(|panic| HandlerFault::Panicked(panic_message(&*panic)))?;
                let response = outcome.map_err(|e| HandlerFault::Failed(e.to_string()))?;
                let value = serde_json::to_value(response).map_err(HandlerFault::Encode)?;
                match value {
                    Value::Object(_) => Ok(value),
                    Value::Null => Err(HandlerFault::NullResult),
                    Value::Array(_) => Err(HandlerFault::NonObjectResult("array")),
                    _ => Err(HandlerFault::NonObjectResult("scalar")),
                }
            }
            .boxed())
        });
        self.handlers.insert(name.into(), handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.get(name).is_some()
    }

    pub fn names(&self) -> Vec<String> {
        self.handlers.names()
    }

    /// Decode `params` and start the handler registered under `method`.
    ///
    /// Decoding happens eagerly; the returned future runs the callback body.
    pub fn dispatch(&self, method: &str, params: &RawValue) -> Dispatch<ResponseFuture> {
        let Some(handler) = self.handlers.get(method) else {
            return Dispatch::UnknownName;
        };
        match handler(params) {
            Ok(future) => Dispatch::Handled(future),
            Err(fault) => Dispatch::Fault(fault),
        }
    }
}

impl Default for RequestRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::Mutex;

    #[derive(Debug, Deserialize)]
    struct Ping {
        n: i64,
    }

    #[derive(Debug, Serialize)]
    struct Pong {
        n: i64,
    }

    fn raw(value: Value) -> Box<RawValue> {
        serde_json::value::to_raw_value(&value).unwrap()
    }

    #[test]
    fn notification_handler_receives_decoded_payload() {
        let registry = NotificationRegistry::default();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&seen);
        registry
            .register("Ping", move |ping: Ping| sink.lock().unwrap().push(ping.n))
            .unwrap();

        assert!(matches!(
            registry.dispatch("Ping", &raw(json!({"n": 5}))),
            Dispatch::Handled(())
        ));
        assert_eq!(*seen.lock().unwrap(), vec![5]);
    }

    #[test]
    fn duplicate_registration_is_rejected_and_first_wins() {
        let registry = NotificationRegistry::new("daemon notification");
        let hits = Arc::new(Mutex::new(Vec::new()));
        let first = Arc::clone(&hits);
        let second = Arc::clone(&hits);

        registry
            .register("log", move |_: Value| first.lock().unwrap().push("first"))
            .unwrap();
        let err = registry
            .register("log", move |_: Value| second.lock().unwrap().push("second"))
            .unwrap_err();
        assert_eq!(
            err,
            RegistryError::Duplicate {
                kind: "daemon notification",
                name: "log".into()
            }
        );

        let _ = registry.dispatch("log", &raw(json!({})));
        assert_eq!(*hits.lock().unwrap(), vec!["first"]);
    }

    #[test]
    fn unknown_name_is_reported() {
        let registry = NotificationRegistry::default();
        assert!(matches!(
            registry.dispatch("Nope", &raw(json!({}))),
            Dispatch::UnknownName
        ));
    }

    #[test]
    fn decode_failure_is_a_fault_not_a_panic() {
        let registry = NotificationRegistry::default();
        registry.register("Ping", |_: Ping| {}).unwrap();
        match registry.dispatch("Ping", &raw(json!({"n": "five"}))) {
            Dispatch::Fault(fault) => assert!(fault.is_decode()),
            _ => panic!("expected decode fault"),
        }
    }

    #[test]
    fn panicking_notification_handler_is_contained() {
        let registry = NotificationRegistry::default();
        registry
            .register("Boom", |_: Value| panic!("kaboom"))
            .unwrap();
        match registry.dispatch("Boom", &raw(json!({}))) {
            Dispatch::Fault(HandlerFault::Panicked(msg)) => assert_eq!(msg, "kaboom"),
            _ => panic!("expected panic fault"),
        }
    }

    #[tokio::test]
    async fn request_handler_produces_result() {
        let registry = RequestRegistry::new();
        registry
            .register("Ping", |ping: Ping| async move {
                Ok::<_, String>(Pong { n: ping.n + 1 })
            })
            .unwrap();

        let Dispatch::Handled(future) = registry.dispatch("Ping", &raw(json!({"n": 1}))) else {
            panic!("expected handler");
        };
        assert_eq!(future.await.unwrap(), json!({"n": 2}));
    }

    #[tokio::test]
    async fn request_handler_error_is_a_fault() {
        let registry = RequestRegistry::new();
        registry
            .register("Ping", |_: Ping| async move {
                Err::<Pong, _>("database exploded")
            })
            .unwrap();

        let Dispatch::Handled(future) = registry.dispatch("Ping", &raw(json!({"n": 1}))) else {
            panic!("expected handler");
        };
        assert!(matches!(future.await, Err(HandlerFault::Failed(msg)) if msg == "database exploded"));
    }

    #[tokio::test]
    async fn null_result_is_a_fault() {
        let registry = RequestRegistry::new();
        registry
            .register("Unit", |_: Value| async move { Ok::<(), String>(()) })
            .unwrap();
        registry
            .register("None", |_: Value| async move {
                Ok::<Option<Pong>, String>(None)
            })
            .unwrap();

        for method in ["Unit", "None"] {
            let Dispatch::Handled(future) = registry.dispatch(method, &raw(json!({}))) else {
                panic!("expected handler");
            };
            assert!(matches!(future.await, Err(HandlerFault::NullResult)), "{method}");
        }
    }

    #[tokio::test]
    async fn scalar_and_array_results_are_faults() {
        let registry = RequestRegistry::new();
        registry
            .register("Five", |_: Value| async move { Ok::<i32, String>(5) })
            .unwrap();
        registry
            .register("List", |_: Value| async move { Ok::<Vec<u8>, String>(vec![1, 2]) })
            .unwrap();

        let Dispatch::Handled(future) = registry.dispatch("Five", &raw(json!({}))) else {
            panic!("expected handler");
        };
        assert!(matches!(future.await, Err(HandlerFault::NonObjectResult("scalar"))));
        let Dispatch::Handled(future) = registry.dispatch("List", &raw(json!({}))) else {
            panic!("expected handler");
        };
        assert!(matches!(future.await, Err(HandlerFault::NonObjectResult("array"))));
    }

    #[tokio::test]
    async fn panicking_request_handler_is_contained() {
        let registry = RequestRegistry::new();
        registry
            .register("Boom", |_: Value| async move {
                if true {
                    panic!("inside future");
                }
                Ok::<Pong, String>(Pong { n: 0 })
            })
            .unwrap();

        let Dispatch::Handled(future) = registry.dispatch("Boom", &raw(json!({}))) else {
            panic!("expected handler");
        };
        assert!(matches!(future.await, Err(HandlerFault::Panicked(_))));
    }

    #[test]
    fn request_decode_failure_is_reported_eagerly() {
        let registry = RequestRegistry::new();
        registry
            .register("Ping", |_: Ping| async move { Ok::<_, String>(Pong { n: 0 }) })
            .unwrap();
        assert!(matches!(
            registry.dispatch("Ping", &raw(json!({}))),
            Dispatch::Fault(HandlerFault::Decode { .. })
        ));
    }

    #[test]
    fn duplicate_request_registration_is_rejected() {
        let registry = RequestRegistry::new();
        registry
            .register("Pick", |_: Value| async move { Ok::<_, String>(json!({"index": 0})) })
            .unwrap();
        assert!(registry
            .register("Pick", |_: Value| async move { Ok::<_, String>(json!({"index": 1})) })
            .is_err());
        assert_eq!(registry.names(), vec!["Pick".to_string()]);
    }
}
