//! Per-call synchronization environment.

use crate::adapter::BackendAdapter;
use crate::binder::Binder;
use crate::changes::SessionStore;
use crate::config::BackendConfig;
use crate::error::{SyncError, SyncResult};
use crate::export::ExportSynchronizer;
use crate::guard::SyncGuard;
use crate::import::ImportSynchronizer;
use crate::queue::{JobHandle, JobRequest};
use crate::registry::ModelConnector;
use crate::runtime::ConnectorRuntime;
use crate::session::SessionContext;
use crate::types::RemoteId;
use shopsync_codec::Record;
use shopsync_storage::{LocalId, LocalStore};
use std::rc::Rc;
use std::sync::Arc;
use tracing::debug;

/// The backend, session and binding model of one synchronization call.
///
/// Resolves the binder, adapter and connector of its model from the
/// runtime. Environments derived with [`Environment::for_model`] share the
/// cycle guard of the call.
pub struct Environment<'r> {
    runtime: &'r ConnectorRuntime,
    backend: Arc<BackendConfig>,
    session: SessionContext,
    model: String,
    guard: Rc<SyncGuard>,
}

impl<'r> Environment<'r> {
    /// Creates an environment.
    pub fn new(
        runtime: &'r ConnectorRuntime,
        backend: Arc<BackendConfig>,
        session: SessionContext,
        model: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            backend,
            session,
            model: model.into(),
            guard: Rc::new(SyncGuard::new()),
        }
    }

    /// The runtime.
    pub fn runtime(&self) -> &'r ConnectorRuntime {
        self.runtime
    }

    /// Backend configuration.
    pub fn backend(&self) -> &BackendConfig {
        &self.backend
    }

    /// Session context.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    /// Binding model name.
    pub fn model(&self) -> &str {
        &self.model
    }

    /// Local store. Writes are reported on the change feed of the runtime
    /// with the session of this environment.
    pub fn store(&self) -> Arc<dyn LocalStore> {
        self.store_as(self.session.clone())
    }

    fn store_as(&self, session: SessionContext) -> Arc<dyn LocalStore> {
        Arc::new(SessionStore::new(
            self.runtime.store().clone(),
            self.runtime.changes().clone(),
            session,
        ))
    }

    /// Cycle guard of the call.
    pub fn guard(&self) -> &SyncGuard {
        &self.guard
    }

    /// Same call, another binding model.
    pub fn for_model(&self, model: impl Into<String>) -> Environment<'r> {
        Environment {
            runtime: self.runtime,
            backend: self.backend.clone(),
            session: self.session.clone(),
            model: model.into(),
            guard: self.guard.clone(),
        }
    }

    /// Same call, with a session whose writes export nothing.
    pub fn without_export(&self) -> Environment<'r> {
        Environment {
            runtime: self.runtime,
            backend: self.backend.clone(),
            session: self.session.clone().with_no_export(true),
            model: self.model.clone(),
            guard: self.guard.clone(),
        }
    }

    /// Connector of the model.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRegistered`] if the model has no connector
    /// for the backend kind.
    pub fn connector(&self) -> SyncResult<Arc<ModelConnector>> {
        self.runtime.registry().get(&self.model, &self.backend.kind)
    }

    /// Binder of the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not registered.
    pub fn binder(&self) -> SyncResult<Binder> {
        let connector = self.connector()?;
        Ok(Binder::new(self.store(), connector.binding.clone(), self.backend.id)
            .with_pairing_store(self.store_as(self.session.clone().with_no_export(true))))
    }

    /// Binder of another model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not registered.
    pub fn binder_for(&self, model: &str) -> SyncResult<Binder> {
        self.for_model(model).binder()
    }

    /// Adapter of the model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not registered or the transport
    /// cannot be opened.
    pub fn adapter(&self) -> SyncResult<Arc<dyn BackendAdapter>> {
        let connector = self.connector()?;
        let transport = self.runtime.transport(&self.backend)?;
        Ok((connector.adapter)(&self.backend, transport))
    }

    /// Adapter of another model.
    ///
    /// # Errors
    ///
    /// Returns an error if the model is not registered.
    pub fn adapter_for(&self, model: &str) -> SyncResult<Arc<dyn BackendAdapter>> {
        self.for_model(model).adapter()
    }

    /// Enqueues a job.
    ///
    /// # Errors
    ///
    /// Returns an error if the queue refuses the job.
    pub fn enqueue(&self, request: JobRequest) -> SyncResult<JobHandle> {
        self.runtime.enqueue(request)
    }

    /// Exports a binding of `model` in-line unless it is already bound.
    ///
    /// # Errors
    ///
    /// Propagates the errors of the dependency export.
    pub fn export_dependency(&self, model: &str, binding_id: LocalId) -> SyncResult<()> {
        let env = self.for_model(model);
        if env.binder()?.to_remote(binding_id)?.is_some() {
            return Ok(());
        }
        debug!(model, binding = %binding_id, "exporting dependency");
        ExportSynchronizer::new(&env).run(binding_id, None)?;
        Ok(())
    }

    /// Exports the binding of a local record in-line, creating the binding
    /// with `extra` binding fields when the record has none. Returns the
    /// binding id.
    ///
    /// # Errors
    ///
    /// Propagates the errors of the dependency export.
    pub fn export_wrapped_dependency(
        &self,
        model: &str,
        local_id: LocalId,
        extra: Record,
    ) -> SyncResult<LocalId> {
        let binder = self.without_export().binder_for(model)?;
        let binding_id = match binder.bindings_of(local_id)?.first() {
            Some(id) => *id,
            None => binder.create_binding(local_id, extra)?,
        };
        self.export_dependency(model, binding_id)?;
        Ok(binding_id)
    }

    /// Imports a remote record of `model` in-line unless it is already bound.
    ///
    /// # Errors
    ///
    /// Propagates the errors of the dependency import.
    pub fn import_dependency(&self, model: &str, remote_id: &RemoteId) -> SyncResult<()> {
        let env = self.for_model(model);
        if env.binder()?.to_local(remote_id, false)?.is_some() {
            return Ok(());
        }
        debug!(model, remote = %remote_id, "importing dependency");
        ImportSynchronizer::new(&env).run(remote_id)?;
        Ok(())
    }

    /// Returns the local record bound to `remote_id` in `model`, failing
    /// with a mapping error when it is not imported.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mapping`] if the remote record is not bound.
    pub fn require_local(&self, model: &str, remote_id: &RemoteId, unwrap: bool) -> SyncResult<LocalId> {
        self.binder_for(model)?
            .to_local(remote_id, unwrap)?
            .ok_or_else(|| {
                SyncError::mapping(format!("{} with remote id {} is not imported", model, remote_id))
            })
    }
}

impl std::fmt::Debug for Environment<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Environment")
            .field("backend", &self.backend.id)
            .field("model", &self.model)
            .field("session", &self.session)
            .finish()
    }
}
