//! Test fixtures: a connector runtime wired to an in-memory store, queue
//! and Magento.

use crate::remote::FakeMagento;
use shopsync_codec::Record;
use shopsync_core::{
    drain, BackendConfig, BackendId, BackendKind, ConnectorConfig, ConnectorRuntime, Environment,
    InMemoryQueue, JobReport, Registry, RemoteId, SessionContext, SharedTransport, StoreView,
};
use shopsync_magento::magento_registry;
use shopsync_storage::{InMemoryStore, LocalId, LocalStore};
use std::path::PathBuf;
use std::sync::Arc;
use tempfile::TempDir;

/// Id of the backend of [`demo_backend`].
pub const DEMO_BACKEND: BackendId = BackendId::new(1);

/// A Magento 1.7 backend with a default and a French store view.
pub fn demo_backend() -> BackendConfig {
    BackendConfig::new(DEMO_BACKEND, BackendKind::versioned("magento", "1.7"), "http://shop.example.com")
        .with_name("Demo shop")
        .with_credentials("api", "secret")
        .with_storeview(StoreView::new("1"))
        .with_storeview(StoreView::new("2").with_lang("fr_FR"))
}

/// A configuration holding [`demo_backend`].
pub fn demo_config() -> ConnectorConfig {
    ConnectorConfig::new().with_backend(demo_backend())
}

/// The Magento connectors running against a [`FakeMagento`].
pub struct TestShop {
    /// The runtime.
    pub runtime: ConnectorRuntime,
    /// The local records.
    pub store: Arc<InMemoryStore>,
    /// The job queue.
    pub queue: Arc<InMemoryQueue>,
    /// The remote shop.
    pub magento: Arc<FakeMagento>,
}

impl TestShop {
    /// A shop with [`demo_backend`].
    pub fn new() -> Self {
        Self::with_config(&demo_config())
    }

    /// A shop with the backends of `config`, all served by one Magento.
    pub fn with_config(config: &ConnectorConfig) -> Self {
        Self::with_registry(magento_registry(), config)
    }

    /// A shop running the connectors of `registry`.
    pub fn with_registry(registry: Registry, config: &ConnectorConfig) -> Self {
        let store = Arc::new(InMemoryStore::new());
        let queue = Arc::new(InMemoryQueue::new());
        let magento = Arc::new(FakeMagento::new());
        let runtime = ConnectorRuntime::new(
            registry,
            store.clone(),
            Arc::new(SharedTransport::new(magento.clone())),
            queue.clone(),
        )
        .expect("Failed to create runtime")
        .with_config(config);
        Self {
            runtime,
            store,
            queue,
            magento,
        }
    }

    /// The session jobs run with.
    pub fn session(&self) -> SessionContext {
        SessionContext::new(1)
    }

    /// An environment of [`DEMO_BACKEND`].
    pub fn env(&self, model: &str) -> Environment<'_> {
        self.runtime
            .environment(DEMO_BACKEND, self.session(), model)
            .expect("Failed to open environment")
    }

    /// Creates a local record.
    pub fn record(&self, model: &str, values: Record) -> LocalId {
        self.store.create(model, values).expect("Failed to create record")
    }

    /// Reads a local record.
    pub fn read(&self, model: &str, id: LocalId) -> Record {
        self.store.read(model, id).expect("Failed to read record")
    }

    /// Creates an unbound binding of `model` around `local_id`.
    pub fn binding(&self, model: &str, local_id: LocalId, extra: Record) -> LocalId {
        self.env(model)
            .binder()
            .expect("Failed to open binder")
            .create_binding(local_id, extra)
            .expect("Failed to create binding")
    }

    /// Creates a binding of `model` around `local_id` bound to `remote_id`.
    pub fn bound(&self, model: &str, local_id: LocalId, remote_id: &str, extra: Record) -> LocalId {
        let binding = self.binding(model, local_id, extra);
        self.env(model)
            .binder()
            .expect("Failed to open binder")
            .bind(&remote_id.into(), binding)
            .expect("Failed to bind");
        binding
    }

    /// Remote id of a binding.
    pub fn remote_id(&self, model: &str, binding: LocalId) -> Option<RemoteId> {
        self.env(model)
            .binder()
            .expect("Failed to open binder")
            .to_remote(binding)
            .expect("Failed to read binding")
    }

    /// Local record bound to a remote id.
    pub fn local_of(&self, model: &str, remote_id: &str) -> Option<LocalId> {
        self.env(model)
            .binder()
            .expect("Failed to open binder")
            .to_local(&remote_id.into(), true)
            .expect("Failed to read binding")
    }

    /// Runs the queued jobs until the queue is empty.
    pub fn drain(&self) -> Vec<JobReport> {
        drain(&self.runtime, &self.queue).expect("Failed to drain queue")
    }
}

impl Default for TestShop {
    fn default() -> Self {
        Self::new()
    }
}

/// A configuration file in a temporary directory.
pub struct ConfigFile {
    /// Path of the file.
    pub path: PathBuf,
    _dir: TempDir,
}

/// Writes `config` as JSON to a temporary file.
pub fn write_config(config: &ConnectorConfig) -> ConfigFile {
    write_config_json(&serde_json::to_value(config).expect("Failed to serialize config"))
}

/// Writes any JSON to a temporary configuration file.
pub fn write_config_json(json: &serde_json::Value) -> ConfigFile {
    let dir = TempDir::new().expect("Failed to create temp directory");
    let path = dir.path().join("shopsync.json");
    let text = serde_json::to_string_pretty(json).expect("Failed to render config");
    std::fs::write(&path, text).expect("Failed to write config");
    ConfigFile { path, _dir: dir }
}
