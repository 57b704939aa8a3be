//! The connector runtime: registry, store, backends, transport and queue.

use crate::adapter::AssetFetcher;
use crate::binder::{BACKEND_FIELD, REMOTE_FIELD, REMOTE_UNIQUE};
use crate::changes::ChangeFeed;
use crate::config::{BackendConfig, ConnectorConfig};
use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::queue::{JobHandle, JobQueue, JobRequest};
use crate::registry::Registry;
use crate::session::SessionContext;
use crate::transport::{RemoteTransport, TransportProvider};
use crate::tree::DEFAULT_BASE_PRIORITY;
use crate::types::BackendId;
use shopsync_storage::LocalStore;
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Long-lived, shared state of a connector.
///
/// Built once at startup; jobs borrow it to create their
/// [`Environment`]s.
pub struct ConnectorRuntime {
    registry: Registry,
    store: Arc<dyn LocalStore>,
    backends: BTreeMap<BackendId, Arc<BackendConfig>>,
    transports: Arc<dyn TransportProvider>,
    queue: Arc<dyn JobQueue>,
    assets: Option<Arc<dyn AssetFetcher>>,
    changes: Arc<ChangeFeed>,
    tree_base_priority: u32,
}

impl ConnectorRuntime {
    /// Creates a runtime and declares the `remote_uniq` constraint of every
    /// registered binding model on the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the store already violates a constraint.
    pub fn new(
        registry: Registry,
        store: Arc<dyn LocalStore>,
        transports: Arc<dyn TransportProvider>,
        queue: Arc<dyn JobQueue>,
    ) -> SyncResult<Self> {
        for binding in registry.binding_models() {
            store.ensure_unique(&binding.name, REMOTE_UNIQUE, &[BACKEND_FIELD, REMOTE_FIELD])?;
        }
        info!(connectors = registry.len(), "connector runtime ready");
        Ok(Self {
            registry,
            store,
            backends: BTreeMap::new(),
            transports,
            queue,
            assets: None,
            changes: Arc::new(ChangeFeed::new()),
            tree_base_priority: DEFAULT_BASE_PRIORITY,
        })
    }

    /// Adds a backend.
    pub fn with_backend(mut self, backend: BackendConfig) -> Self {
        self.backends.insert(backend.id, Arc::new(backend));
        self
    }

    /// Adds the backends and settings of a configuration.
    pub fn with_config(mut self, config: &ConnectorConfig) -> Self {
        for backend in &config.backends {
            self.backends.insert(backend.id, Arc::new(backend.clone()));
        }
        self.tree_base_priority = config.category_base_priority;
        self
    }

    /// Sets the asset fetcher used by image imports.
    pub fn with_assets(mut self, assets: Arc<dyn AssetFetcher>) -> Self {
        self.assets = Some(assets);
        self
    }

    /// Registry.
    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Local store.
    pub fn store(&self) -> &Arc<dyn LocalStore> {
        &self.store
    }

    /// Feed of the local writes made through environments.
    pub fn changes(&self) -> &Arc<ChangeFeed> {
        &self.changes
    }

    /// Job queue.
    pub fn queue(&self) -> &Arc<dyn JobQueue> {
        &self.queue
    }

    /// Asset fetcher, if any.
    pub fn assets(&self) -> Option<&Arc<dyn AssetFetcher>> {
        self.assets.as_ref()
    }

    /// Base priority of category imports.
    pub fn tree_base_priority(&self) -> u32 {
        self.tree_base_priority
    }

    /// Configured backends.
    pub fn backends(&self) -> impl Iterator<Item = &Arc<BackendConfig>> {
        self.backends.values()
    }

    /// Looks up a backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownBackend`] if it is not configured.
    pub fn backend(&self, id: BackendId) -> SyncResult<Arc<BackendConfig>> {
        self.backends
            .get(&id)
            .cloned()
            .ok_or(SyncError::UnknownBackend(id))
    }

    /// Opens the transport of a backend.
    ///
    /// # Errors
    ///
    /// Propagates the provider error.
    pub fn transport(&self, backend: &BackendConfig) -> SyncResult<Arc<dyn RemoteTransport>> {
        self.transports.connect(backend)
    }

    /// Creates the environment of a call.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::UnknownBackend`] if the backend is not configured.
    pub fn environment(
        &self,
        backend_id: BackendId,
        session: SessionContext,
        model: impl Into<String>,
    ) -> SyncResult<Environment<'_>> {
        Ok(Environment::new(self, self.backend(backend_id)?, session, model))
    }

    /// Enqueues a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue refuses the job.
    pub fn enqueue(&self, request: JobRequest) -> SyncResult<JobHandle> {
        debug!(
            function = %request.function,
            model = %request.descriptor.model,
            target = %request.target,
            priority = ?request.priority,
            "enqueue job"
        );
        self.queue.enqueue(request)
    }
}

impl std::fmt::Debug for ConnectorRuntime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectorRuntime")
            .field("registry", &self.registry)
            .field("backends", &self.backends.keys().collect::<Vec<_>>())
            .field("assets", &self.assets.is_some())
            .field("change_subscribers", &self.changes.subscriber_count())
            .field("tree_base_priority", &self.tree_base_priority)
            .finish()
    }
}
