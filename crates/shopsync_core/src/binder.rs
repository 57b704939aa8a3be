//! Bindings and the binder, the single writer of remote ids.
//!
//! A binding is a record of a binding model (`magento.product.category`)
//! that wraps a record of a domain model (`product.category`) and pairs it
//! with a remote id on one backend:
//!
//! ```text
//! magento.product.category #7          product.category #3
//! ┌────────────────────────────┐       ┌──────────────────┐
//! │ backend_id  = 1            │       │ name = "Shoes"   │
//! │ local_id    = 3  ──────────┼──────►│ parent_id = 1    │
//! │ remote_id   = "12"         │       └──────────────────┘
//! │ sync_date   = 2026-..Z     │
//! └────────────────────────────┘
//! ```
//!
//! Synchronizers see the merged view: the wrapped record overlaid with the
//! binding fields.

use crate::error::{SyncError, SyncResult};
use crate::types::{BackendId, RemoteId};
use chrono::{DateTime, Utc};
use shopsync_codec::{Record, Value};
use shopsync_storage::{Domain, LocalId, LocalStore};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::debug;

/// Field holding the backend of a binding.
pub const BACKEND_FIELD: &str = "backend_id";
/// Field holding the wrapped record id.
pub const LOCAL_FIELD: &str = "local_id";
/// Field holding the remote id.
pub const REMOTE_FIELD: &str = "remote_id";
/// Field holding the date of the last pairing change.
pub const SYNC_DATE_FIELD: &str = "sync_date";
/// Name of the `(backend_id, remote_id)` unique constraint.
pub const REMOTE_UNIQUE: &str = "remote_uniq";

/// Declaration of a binding model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BindingModel {
    /// Binding model name, e.g. `magento.res.partner`.
    pub name: String,
    /// Wrapped domain model name, e.g. `res.partner`.
    pub wrapped_model: String,
    /// Fields stored on the binding record rather than the wrapped record.
    pub binding_fields: BTreeSet<String>,
}

impl BindingModel {
    /// Declares a binding model.
    pub fn new(name: impl Into<String>, wrapped_model: impl Into<String>) -> Self {
        let binding_fields = [BACKEND_FIELD, LOCAL_FIELD, REMOTE_FIELD, SYNC_DATE_FIELD]
            .into_iter()
            .map(String::from)
            .collect();
        Self {
            name: name.into(),
            wrapped_model: wrapped_model.into(),
            binding_fields,
        }
    }

    /// Declares extra binding-only fields.
    pub fn with_binding_fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.binding_fields.extend(fields.into_iter().map(Into::into));
        self
    }

    /// Returns true if `field` is stored on the binding record.
    pub fn is_binding_field(&self, field: &str) -> bool {
        self.binding_fields.contains(field)
    }

    /// Splits values into `(binding part, wrapped part)`.
    pub fn split(&self, values: Record) -> (Record, Record) {
        values.partition(|field| self.is_binding_field(field))
    }
}

/// A binding record.
#[derive(Debug, Clone, PartialEq)]
pub struct Binding {
    /// Binding record id.
    pub id: LocalId,
    /// Owning backend.
    pub backend_id: BackendId,
    /// Wrapped record id.
    pub local_id: LocalId,
    /// Remote id, when bound.
    pub remote_id: Option<RemoteId>,
    /// Date of the last pairing change.
    pub sync_date: Option<DateTime<Utc>>,
    /// Other binding-only fields.
    pub extra: Record,
}

impl Binding {
    /// Parses a binding record.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Mapping`] if `backend_id` or `local_id` is missing.
    pub fn from_record(model: &str, id: LocalId, mut record: Record) -> SyncResult<Self> {
        let backend_id = record
            .remove(BACKEND_FIELD)
            .as_ref()
            .and_then(BackendId::from_value)
            .ok_or_else(|| SyncError::mapping(format!("{} {} has no backend", model, id)))?;
        let local_id = record
            .remove(LOCAL_FIELD)
            .as_ref()
            .and_then(LocalId::from_value)
            .ok_or_else(|| SyncError::mapping(format!("{} {} wraps no record", model, id)))?;
        let remote_id = record.remove(REMOTE_FIELD).as_ref().and_then(RemoteId::from_value);
        let sync_date = record
            .remove(SYNC_DATE_FIELD)
            .as_ref()
            .and_then(Value::as_text)
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|d| d.with_timezone(&Utc));
        Ok(Self {
            id,
            backend_id,
            local_id,
            remote_id,
            sync_date,
            extra: record,
        })
    }

    /// Returns true if the binding has a remote id.
    pub fn is_bound(&self) -> bool {
        self.remote_id.is_some()
    }
}

/// Looks up and writes the pairing between bindings and remote ids for one
/// binding model on one backend.
///
/// # Invariants
///
/// - `(backend_id, remote_id)` is unique per binding model
/// - `bind` of an already stored pair writes nothing
/// - nothing else writes `remote_id`
#[derive(Clone)]
pub struct Binder {
    store: Arc<dyn LocalStore>,
    pairing_store: Arc<dyn LocalStore>,
    model: BindingModel,
    backend_id: BackendId,
}

impl Binder {
    /// Creates a binder.
    pub fn new(store: Arc<dyn LocalStore>, model: BindingModel, backend_id: BackendId) -> Self {
        Self {
            pairing_store: store.clone(),
            store,
            model,
            backend_id,
        }
    }

    /// Sets the store receiving the writes of `remote_id` and `sync_date`.
    #[must_use]
    pub fn with_pairing_store(mut self, store: Arc<dyn LocalStore>) -> Self {
        self.pairing_store = store;
        self
    }

    /// Binding model handled by this binder.
    pub fn model(&self) -> &BindingModel {
        &self.model
    }

    /// Backend handled by this binder.
    pub fn backend_id(&self) -> BackendId {
        self.backend_id
    }

    /// Reads a binding of this backend.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::NotFound`] if the binding does not exist or
    /// belongs to another backend.
    pub fn binding(&self, binding_id: LocalId) -> SyncResult<Binding> {
        let record = self.store.read(&self.model.name, binding_id)?;
        let binding = Binding::from_record(&self.model.name, binding_id, record)?;
        if binding.backend_id != self.backend_id {
            return Err(SyncError::not_found(&self.model.name, binding_id));
        }
        Ok(binding)
    }

    /// Returns the remote id of a binding.
    ///
    /// `None` if the binding is unbound or does not exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn to_remote(&self, binding_id: LocalId) -> SyncResult<Option<RemoteId>> {
        let Some(record) = self.store.try_read(&self.model.name, binding_id)? else {
            return Ok(None);
        };
        if record.get(BACKEND_FIELD).and_then(BackendId::from_value) != Some(self.backend_id) {
            return Ok(None);
        }
        Ok(record.get(REMOTE_FIELD).and_then(RemoteId::from_value))
    }

    /// Returns the remote id of the binding wrapping a local record.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn to_remote_wrapped(&self, local_id: LocalId) -> SyncResult<Option<RemoteId>> {
        for binding_id in self.bindings_of(local_id)? {
            if let Some(remote_id) = self.to_remote(binding_id)? {
                return Ok(Some(remote_id));
            }
        }
        Ok(None)
    }

    /// Returns the binding paired with a remote id, or the wrapped record
    /// when `unwrap` is set.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn to_local(&self, remote_id: &RemoteId, unwrap: bool) -> SyncResult<Option<LocalId>> {
        let domain = Domain::new()
            .eq(BACKEND_FIELD, self.backend_id)
            .eq(REMOTE_FIELD, remote_id);
        let Some(binding_id) = self.store.search(&self.model.name, &domain)?.first().copied()
        else {
            return Ok(None);
        };
        if !unwrap {
            return Ok(Some(binding_id));
        }
        Ok(Some(self.binding(binding_id)?.local_id))
    }

    /// Pairs a binding with a remote id.
    ///
    /// Overwrites a previous remote id of the binding. Sets `sync_date`
    /// when the pairing changes; does not write when it is already stored.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::ConstraintViolation`] if another binding of the
    /// backend already holds `remote_id`.
    pub fn bind(&self, remote_id: &RemoteId, binding_id: LocalId) -> SyncResult<()> {
        let current = self.binding(binding_id)?;
        if current.remote_id.as_ref() == Some(remote_id) {
            return Ok(());
        }
        let values = Record::new()
            .with(REMOTE_FIELD, remote_id)
            .with(SYNC_DATE_FIELD, Utc::now().to_rfc3339());
        self.pairing_store.write(&self.model.name, binding_id, values)?;
        debug!(model = %self.model.name, binding = %binding_id, remote = %remote_id, "bound");
        Ok(())
    }

    /// Sets the `sync_date` of a binding to now.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding does not exist.
    pub fn touch(&self, binding_id: LocalId) -> SyncResult<()> {
        self.binding(binding_id)?;
        let values = Record::new().with(SYNC_DATE_FIELD, Utc::now().to_rfc3339());
        self.pairing_store.write(&self.model.name, binding_id, values)?;
        Ok(())
    }

    /// Clears the remote id of a binding.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding does not exist.
    pub fn unbind(&self, binding_id: LocalId) -> SyncResult<()> {
        let current = self.binding(binding_id)?;
        if current.remote_id.is_none() {
            return Ok(());
        }
        let values = Record::new()
            .with(REMOTE_FIELD, Value::Null)
            .with(SYNC_DATE_FIELD, Utc::now().to_rfc3339());
        self.pairing_store.write(&self.model.name, binding_id, values)?;
        debug!(model = %self.model.name, binding = %binding_id, "unbound");
        Ok(())
    }

    /// Creates an unbound binding wrapping `local_id`.
    ///
    /// `extra` holds binding-only fields.
    ///
    /// # Errors
    ///
    /// Returns an error if the wrapped record does not exist.
    pub fn create_binding(&self, local_id: LocalId, extra: Record) -> SyncResult<LocalId> {
        self.store.read(&self.model.wrapped_model, local_id)?;
        let mut values = extra;
        values.insert(BACKEND_FIELD, self.backend_id);
        values.insert(LOCAL_FIELD, local_id);
        values.insert(REMOTE_FIELD, Value::Null);
        values.remove(SYNC_DATE_FIELD);
        Ok(self.store.create(&self.model.name, values)?)
    }

    /// Bindings of this backend wrapping `local_id`.
    ///
    /// # Errors
    ///
    /// Returns an error if the store fails.
    pub fn bindings_of(&self, local_id: LocalId) -> SyncResult<Vec<LocalId>> {
        let domain = Domain::new()
            .eq(BACKEND_FIELD, self.backend_id)
            .eq(LOCAL_FIELD, local_id);
        Ok(self.store.search(&self.model.name, &domain)?)
    }

    /// Reads the merged view of a binding: the wrapped record overlaid with
    /// the binding fields. `id` holds the binding id.
    ///
    /// # Errors
    ///
    /// Returns an error if the binding or wrapped record does not exist.
    pub fn read_view(&self, binding_id: LocalId) -> SyncResult<Record> {
        let binding_record = self.store.read(&self.model.name, binding_id)?;
        let binding = Binding::from_record(&self.model.name, binding_id, binding_record.clone())?;
        if binding.backend_id != self.backend_id {
            return Err(SyncError::not_found(&self.model.name, binding_id));
        }
        let mut view = self.store.read(&self.model.wrapped_model, binding.local_id)?;
        view.merge(binding_record);
        view.insert("id", binding_id);
        Ok(view)
    }
}

impl std::fmt::Debug for Binder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Binder")
            .field("model", &self.model.name)
            .field("backend_id", &self.backend_id)
            .finish()
    }
}
