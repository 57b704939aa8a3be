//! Test fixtures shared by the unit tests of this crate.

use crate::adapter::{AssetFetcher, MemoryAdapter};
use crate::binder::BindingModel;
use crate::config::{BackendConfig, StoreView};
use crate::environment::Environment;
use crate::registry::{ModelConnector, Registry};
use crate::runtime::ConnectorRuntime;
use crate::session::SessionContext;
use crate::transport::{Disconnected, SharedTransport};
use crate::types::{BackendId, BackendKind};
use crate::queue::InMemoryQueue;
use shopsync_codec::Record;
use shopsync_storage::{InMemoryStore, LocalId, LocalStore};
use std::sync::Arc;

pub(crate) const CATEGORY: &str = "magento.product.category";
pub(crate) const PARTNER: &str = "magento.res.partner";

/// A runtime with one magento 1.7 backend (id 1), an in-memory store and
/// queue, and one shared in-memory remote.
pub(crate) struct TestRuntime {
    pub runtime: ConnectorRuntime,
    pub store: Arc<InMemoryStore>,
    pub queue: Arc<InMemoryQueue>,
    pub adapter: Arc<MemoryAdapter>,
    registry: Registry,
    assets: Option<Arc<dyn AssetFetcher>>,
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

impl TestRuntime {
    pub fn new() -> Self {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let adapter = Arc::new(MemoryAdapter::new("remote"));
        let mut rt = Self {
            runtime: build(Registry::new(), &store, &queue, None),
            store,
            queue,
            adapter,
            registry: Registry::new(),
            assets: None,
        };
        rt.register(rt.connector(CATEGORY, "product.category"));
        rt
    }

    pub fn with_assets(mut self, assets: Arc<dyn AssetFetcher>) -> Self {
        self.assets = Some(assets);
        self.rebuild();
        self
    }

    /// A connector whose adapter is the shared in-memory remote.
    pub fn connector(&self, model: &str, wrapped: &str) -> ModelConnector {
        let adapter = self.adapter.clone();
        ModelConnector::new(BindingModel::new(model, wrapped), move |_, _| adapter.clone())
    }

    /// Registers `connector` for every magento version.
    pub fn register(&mut self, connector: ModelConnector) {
        self.registry.register(BackendKind::new("magento"), connector);
        self.rebuild();
    }

    pub fn env(&self, model: &str) -> Environment<'_> {
        self.runtime
            .environment(BackendId::new(1), SessionContext::new(1), model)
            .unwrap()
    }

    /// Creates a wrapped record and an unbound binding of `model`.
    pub fn binding(&self, model: &str, values: Record) -> LocalId {
        let binder = self.env(model).binder().unwrap();
        let local = self
            .store
            .create(&binder.model().wrapped_model, values)
            .unwrap();
        binder.create_binding(local, Record::new()).unwrap()
    }

    fn rebuild(&mut self) {
        self.runtime = build(self.registry.clone(), &self.store, &self.queue, self.assets.clone());
    }
}

fn build(
    registry: Registry,
    store: &Arc<InMemoryStore>,
    queue: &Arc<InMemoryQueue>,
    assets: Option<Arc<dyn AssetFetcher>>,
) -> ConnectorRuntime {
    let runtime = ConnectorRuntime::new(
        registry,
        store.clone(),
        Arc::new(SharedTransport::new(Arc::new(Disconnected))),
        queue.clone(),
    )
    .unwrap()
    .with_backend(backend());
    match assets {
        Some(assets) => runtime.with_assets(assets),
        None => runtime,
    }
}
