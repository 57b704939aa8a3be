//! Registry of model connectors.
//!
//! A [`ModelConnector`] bundles everything the synchronizers need for one
//! binding model on one backend kind: the binding declaration, the adapter
//! factory, mappers, synchronizer hooks and batch strategy. Connectors are
//! registered once at startup; lookups fall back from a versioned backend
//! kind to the unversioned service.

use crate::adapter::{AdapterFactory, BackendAdapter};
use crate::binder::BindingModel;
use crate::config::BackendConfig;
use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::export::ExportHooks;
use crate::import::ImportHooks;
use crate::mapper::Mapper;
use crate::queue::JobFunction;
use crate::state::SyncOutcome;
use crate::transport::RemoteTransport;
use crate::types::{BackendKind, FieldSet};
use shopsync_codec::Record;
use shopsync_storage::LocalId;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

/// A hand-written exporter: `(env, binding id, extra arguments)`.
pub type CustomExporter =
    Arc<dyn Fn(&Environment<'_>, LocalId, &Record) -> SyncResult<SyncOutcome> + Send + Sync>;

/// How a binding model is exported.
#[derive(Clone)]
pub enum Exporter {
    /// The generic export pipeline with hooks.
    Pipeline(ExportHooks),
    /// A custom exporter.
    Custom(CustomExporter),
}

/// How a batch import enumerates remote records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchStrategy {
    /// Search remote ids.
    Plain,
    /// Walk the remote category tree, parents first.
    Tree,
}

/// Everything needed to synchronize one binding model.
#[derive(Clone)]
pub struct ModelConnector {
    /// Binding model declaration.
    pub binding: BindingModel,
    /// Builds the remote adapter.
    pub adapter: AdapterFactory,
    /// Remote to local mapper.
    pub import_mapper: Option<Mapper>,
    /// Local to remote mapper.
    pub export_mapper: Option<Mapper>,
    /// Exporter.
    pub exporter: Option<Exporter>,
    /// Import hooks; `None` means the model is not importable.
    pub importer: Option<ImportHooks>,
    /// Remote records may be deleted.
    pub deleter: bool,
    /// Batch import strategy.
    pub batch: Option<BatchStrategy>,
    /// Job enqueued when a binding changes locally.
    pub export_job: JobFunction,
    /// Local create and write events enqueue an export.
    pub export_on_event: bool,
    /// Fields imported as translations.
    pub translatable: FieldSet,
}

impl ModelConnector {
    /// Creates a connector with no synchronizer.
    pub fn new<F>(binding: BindingModel, adapter: F) -> Self
    where
        F: Fn(&BackendConfig, Arc<dyn RemoteTransport>) -> Arc<dyn BackendAdapter>
            + Send
            + Sync
            + 'static,
    {
        Self {
            binding,
            adapter: Arc::new(adapter),
            import_mapper: None,
            export_mapper: None,
            exporter: None,
            importer: None,
            deleter: false,
            batch: None,
            export_job: JobFunction::ExportRecord,
            export_on_event: false,
            translatable: FieldSet::new(),
        }
    }

    /// Sets the import mapper and hooks.
    pub fn with_import(mut self, mapper: Mapper, hooks: ImportHooks) -> Self {
        self.import_mapper = Some(mapper);
        self.importer = Some(hooks);
        self
    }

    /// Sets the export mapper and hooks.
    pub fn with_export(mut self, mapper: Mapper, hooks: ExportHooks) -> Self {
        self.export_mapper = Some(mapper);
        self.exporter = Some(Exporter::Pipeline(hooks));
        self
    }

    /// Sets a custom exporter.
    pub fn with_custom_export<F>(mut self, export: F) -> Self
    where
        F: Fn(&Environment<'_>, LocalId, &Record) -> SyncResult<SyncOutcome>
            + Send
            + Sync
            + 'static,
    {
        self.exporter = Some(Exporter::Custom(Arc::new(export)));
        self
    }

    /// Allows remote deletion.
    pub fn with_deleter(mut self) -> Self {
        self.deleter = true;
        self
    }

    /// Sets the batch import strategy.
    pub fn with_batch(mut self, strategy: BatchStrategy) -> Self {
        self.batch = Some(strategy);
        self
    }

    /// Enqueues `job` on local create and write events.
    pub fn export_on_event(mut self, job: JobFunction) -> Self {
        self.export_on_event = true;
        self.export_job = job;
        self
    }

    /// Declares translatable fields.
    pub fn with_translatable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.translatable.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Binding model name.
    pub fn model(&self) -> &str {
        &self.binding.name
    }
}

impl fmt::Debug for ModelConnector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModelConnector")
            .field("binding", &self.binding)
            .field("importable", &self.importer.is_some())
            .field("exportable", &self.exporter.is_some())
            .field("deleter", &self.deleter)
            .field("batch", &self.batch)
            .field("export_job", &self.export_job)
            .field("export_on_event", &self.export_on_event)
            .finish()
    }
}

/// Map of `(binding model, backend kind)` to connector.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    connectors: BTreeMap<(String, BackendKind), Arc<ModelConnector>>,
}

impl Registry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a connector for a backend kind. A later registration for
    /// the same key replaces the earlier one.
    pub fn register(&mut self, kind: BackendKind, connector: ModelConnector) -> &mut Self {
        self.connectors
            .insert((connector.binding.name.clone(), kind), Arc::new(connector));
        self
    }

    /// Looks up the connector of `model` for `kind`, falling back to the
    /// unversioned kind.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotRegistered`] if neither is registered.
    pub fn get(&self, model: &str, kind: &BackendKind) -> SyncResult<Arc<ModelConnector>> {
        let exact = (model.to_string(), kind.clone());
        if let Some(connector) = self.connectors.get(&exact) {
            return Ok(connector.clone());
        }
        if kind.version.is_some() {
            if let Some(connector) = self.connectors.get(&(model.to_string(), kind.unversioned())) {
                return Ok(connector.clone());
            }
        }
        Err(SyncError::NotRegistered {
            model: model.to_string(),
            kind: kind.to_string(),
        })
    }

    /// Returns true if `model` is registered for `kind`.
    pub fn contains(&self, model: &str, kind: &BackendKind) -> bool {
        self.get(model, kind).is_ok()
    }

    /// Every distinct binding model.
    pub fn binding_models(&self) -> Vec<&BindingModel> {
        let mut seen = BTreeSet::new();
        self.connectors
            .values()
            .map(|c| &c.binding)
            .filter(|b| seen.insert(b.name.as_str()))
            .collect()
    }

    /// Names of the binding models wrapping `wrapped_model`.
    pub fn wrapping(&self, wrapped_model: &str) -> BTreeSet<&str> {
        self.connectors
            .values()
            .filter(|c| c.binding.wrapped_model == wrapped_model)
            .map(|c| c.binding.name.as_str())
            .collect()
    }

    /// Registered `(model, kind)` keys.
    pub fn keys(&self) -> impl Iterator<Item = (&str, &BackendKind)> {
        self.connectors.keys().map(|(m, k)| (m.as_str(), k))
    }

    /// Number of registrations.
    pub fn len(&self) -> usize {
        self.connectors.len()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.connectors.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapter::MemoryAdapter;

    fn connector(model: &str, wrapped: &str) -> ModelConnector {
        let adapter = Arc::new(MemoryAdapter::new("remote"));
        ModelConnector::new(BindingModel::new(model, wrapped), move |_, _| adapter.clone())
    }

    #[test]
    fn versioned_lookup_falls_back() {
        let mut registry = Registry::new();
        registry.register(BackendKind::new("magento"), connector("magento.res.partner", "res.partner"));

        let kind = BackendKind::versioned("magento", "1.7");
        assert!(registry.get("magento.res.partner", &kind).is_ok());
        assert!(matches!(
            registry.get("magento.res.partner", &BackendKind::new("prestashop")),
            Err(SyncError::NotRegistered { .. })
        ));
    }

    #[test]
    fn versioned_registration_wins() {
        let mut registry = Registry::new();
        registry
            .register(BackendKind::new("magento"), connector("m", "a"))
            .register(BackendKind::versioned("magento", "1.7"), connector("m", "a").with_deleter());

        assert!(registry.get("m", &BackendKind::versioned("magento", "1.7")).unwrap().deleter);
        assert!(!registry.get("m", &BackendKind::versioned("magento", "1.6")).unwrap().deleter);
        assert_eq!(registry.binding_models().len(), 1);
    }

    #[test]
    fn wrapping_models() {
        let mut registry = Registry::new();
        registry
            .register(BackendKind::new("magento"), connector("magento.res.partner", "res.partner"))
            .register(BackendKind::new("magento"), connector("magento.address", "res.partner"))
            .register(BackendKind::new("magento"), connector("magento.product.product", "product.product"));

        let wrapping = registry.wrapping("res.partner");
        assert_eq!(wrapping.len(), 2);
        assert!(wrapping.contains("magento.address"));
        assert_eq!(registry.len(), 3);
    }

    #[test]
    fn connector_builder() {
        let c = connector("magento.account.invoice", "account.invoice")
            .export_on_event(JobFunction::ExportInvoicePaid)
            .with_translatable(["name"]);
        assert!(c.export_on_event);
        assert_eq!(c.export_job, JobFunction::ExportInvoicePaid);
        assert!(c.translatable.contains("name"));
        assert_eq!(c.model(), "magento.account.invoice");
    }
}
