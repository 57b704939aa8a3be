//! Test fixtures shared by the unit tests of this crate.

use crate::backend::magento_registry;
use parking_lot::Mutex;
use shopsync_codec::{Record, Value};
use shopsync_core::{
    BackendConfig, BackendId, BackendKind, ConnectorRuntime, Environment, InMemoryQueue,
    RemoteTransport, SessionContext, SharedTransport, StoreView, SyncResult,
};
use shopsync_storage::{InMemoryStore, LocalId, LocalStore};
use std::sync::Arc;

type Handler = Box<dyn Fn(&str, &[Value]) -> SyncResult<Value> + Send + Sync>;

/// A transport answering through a closure and logging every call.
pub(crate) struct FakeTransport {
    handler: Handler,
    calls: Mutex<Vec<(String, Vec<Value>)>>,
}

impl FakeTransport {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> SyncResult<Value> + Send + Sync + 'static,
    {
        Self {
            handler: Box::new(handler),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn calls(&self) -> Vec<(String, Vec<Value>)> {
        self.calls.lock().clone()
    }

    pub fn methods(&self) -> Vec<String> {
        self.calls.lock().iter().map(|(m, _)| m.clone()).collect()
    }

    pub fn last_call(&self) -> Option<(String, Vec<Value>)> {
        self.calls.lock().last().cloned()
    }
}

impl RemoteTransport for FakeTransport {
    fn call(&self, method: &str, params: Vec<Value>) -> SyncResult<Value> {
        self.calls.lock().push((method.to_string(), params.clone()));
        (self.handler)(method, &params)
    }
}

pub(crate) fn backend() -> BackendConfig {
    BackendConfig::new(
        BackendId::new(1),
        BackendKind::versioned("magento", "1.7"),
        "http://shop.example.com",
    )
    .with_name("Demo shop")
    .with_storeview(StoreView::new("1"))
    .with_storeview(StoreView::new("2").with_lang("fr_FR"))
}

/// The Magento connectors over an in-memory store and queue.
pub(crate) struct Harness {
    pub runtime: ConnectorRuntime,
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<InMemoryQueue>,
    pub transport: Arc<FakeTransport>,
}

impl Harness {
    pub fn new<F>(handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> SyncResult<Value> + Send + Sync + 'static,
    {
        Self::with_backend(backend(), handler)
    }

    pub fn with_backend<F>(backend: BackendConfig, handler: F) -> Self
    where
        F: Fn(&str, &[Value]) -> SyncResult<Value> + Send + Sync + 'static,
    {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let transport = Arc::new(FakeTransport::new(handler));
        let runtime = ConnectorRuntime::new(
            magento_registry(),
            store.clone(),
            Arc::new(SharedTransport::new(transport.clone())),
            queue.clone(),
        )
        .unwrap()
        .with_backend(backend);
        Self {
            runtime,
            store,
            queue,
            transport,
        }
    }

    pub fn env(&self, model: &str) -> Environment<'_> {
        self.runtime
            .environment(BackendId::new(1), SessionContext::new(1), model)
            .unwrap()
    }

    /// Creates a local record.
    pub fn record(&self, model: &str, values: Record) -> LocalId {
        self.store.create(model, values).unwrap()
    }

    /// Creates an unbound binding of `model` around `local_id`.
    pub fn binding(&self, model: &str, local_id: LocalId, extra: Record) -> LocalId {
        self.env(model)
            .binder()
            .unwrap()
            .create_binding(local_id, extra)
            .unwrap()
    }

    /// Creates a binding of `model` around `local_id` bound to `remote_id`.
    pub fn bound(&self, model: &str, local_id: LocalId, remote_id: &str, extra: Record) -> LocalId {
        let binding = self.binding(model, local_id, extra);
        self.env(model)
            .binder()
            .unwrap()
            .bind(&remote_id.into(), binding)
            .unwrap();
        binding
    }

    pub fn remote_id(&self, model: &str, binding: LocalId) -> Option<String> {
        self.env(model)
            .binder()
            .unwrap()
            .to_remote(binding)
            .unwrap()
            .map(|id| id.to_string())
    }
}

/// Builds a map value, as remote payloads are.
pub(crate) fn map_of(pairs: &[(&str, Value)]) -> Value {
    Value::Map(
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect(),
    )
}
