//! Consumers of local record events.
//!
//! The host calls [`on_record_create`], [`on_record_write`] and
//! [`on_record_unlink`] when records change. Consumers never synchronize
//! in-line: they enqueue jobs. Sessions flagged `no_export`, such as the
//! ones of importers, enqueue nothing on create and write.

use crate::binder::{Binding, BACKEND_FIELD};
use crate::error::SyncResult;
use crate::queue::{JobFunction, JobHandle, JobRequest, JobTarget};
use crate::runtime::ConnectorRuntime;
use crate::session::SessionContext;
use crate::types::{BackendId, FieldSet};
use shopsync_storage::LocalId;
use tracing::debug;

/// Enqueues the export job of a binding.
///
/// # Errors
///
/// Returns an error if the model is not registered for the backend or the
/// queue refuses the job.
pub fn delay_export(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    backend_id: BackendId,
    model: &str,
    binding_id: LocalId,
    fields: Option<&FieldSet>,
) -> SyncResult<JobHandle> {
    let backend = runtime.backend(backend_id)?;
    let connector = runtime.registry().get(model, &backend.kind)?;
    let request = JobRequest::new(connector.export_job, backend_id, model, JobTarget::Local(binding_id))
        .with_fields(fields.cloned())
        .with_session(session.clone());
    runtime.enqueue(request)
}

/// Enqueues the export of every binding, on every backend, of a wrapped
/// record whose binding model exports on events.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn delay_export_all_bindings(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    wrapped_model: &str,
    local_id: LocalId,
    fields: Option<&FieldSet>,
) -> SyncResult<Vec<JobHandle>> {
    let mut handles = Vec::new();
    for model in runtime.registry().wrapping(wrapped_model) {
        for backend in runtime.backends() {
            let Ok(connector) = runtime.registry().get(model, &backend.kind) else {
                continue;
            };
            if !connector.export_on_event {
                continue;
            }
            let env = runtime.environment(backend.id, session.clone(), model)?;
            for binding_id in env.binder()?.bindings_of(local_id)? {
                handles.push(delay_export(runtime, session, backend.id, model, binding_id, fields)?);
            }
        }
    }
    Ok(handles)
}

/// A local record was created.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn on_record_create(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    model: &str,
    record_id: LocalId,
    fields: &FieldSet,
) -> SyncResult<Vec<JobHandle>> {
    if session.no_export {
        return Ok(Vec::new());
    }
    Ok(export_binding_on_event(runtime, session, model, record_id, fields)?
        .into_iter()
        .collect())
}

/// A local record was written. Writing a wrapped record exports all of its
/// bindings.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn on_record_write(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    model: &str,
    record_id: LocalId,
    fields: &FieldSet,
) -> SyncResult<Vec<JobHandle>> {
    if session.no_export {
        debug!(model, record = %record_id, "no_export session, nothing enqueued");
        return Ok(Vec::new());
    }
    if is_binding_model(runtime, model) {
        return Ok(export_binding_on_event(runtime, session, model, record_id, fields)?
            .into_iter()
            .collect());
    }
    delay_export_all_bindings(runtime, session, model, record_id, Some(fields))
}

/// A local record is about to be deleted. Must be called while the
/// binding is still readable.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn on_record_unlink(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    model: &str,
    record_id: LocalId,
) -> SyncResult<Option<JobHandle>> {
    let Some(binding) = read_binding(runtime, model, record_id)? else {
        return Ok(None);
    };
    let backend = runtime.backend(binding.backend_id)?;
    let connector = runtime.registry().get(model, &backend.kind)?;
    if !connector.deleter {
        return Ok(None);
    }
    let Some(remote_id) = binding.remote_id else {
        debug!(model, binding = %record_id, "unbound, nothing to delete");
        return Ok(None);
    };
    let request = JobRequest::new(
        JobFunction::ExportDeleteRecord,
        binding.backend_id,
        model,
        JobTarget::Remote(remote_id),
    )
    .with_session(session.clone());
    Ok(Some(runtime.enqueue(request)?))
}

fn is_binding_model(runtime: &ConnectorRuntime, model: &str) -> bool {
    runtime.registry().binding_models().iter().any(|b| b.name == model)
}

fn read_binding(runtime: &ConnectorRuntime, model: &str, record_id: LocalId) -> SyncResult<Option<Binding>> {
    if !is_binding_model(runtime, model) {
        return Ok(None);
    }
    let Some(record) = runtime.store().try_read(model, record_id)? else {
        return Ok(None);
    };
    if !record.is_set(BACKEND_FIELD) {
        return Ok(None);
    }
    Ok(Some(Binding::from_record(model, record_id, record)?))
}

fn export_binding_on_event(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    model: &str,
    record_id: LocalId,
    fields: &FieldSet,
) -> SyncResult<Option<JobHandle>> {
    let Some(binding) = read_binding(runtime, model, record_id)? else {
        return Ok(None);
    };
    let backend = runtime.backend(binding.backend_id)?;
    let connector = runtime.registry().get(model, &backend.kind)?;
    if !connector.export_on_event {
        return Ok(None);
    }
    delay_export(runtime, session, binding.backend_id, model, record_id, Some(fields)).map(Some)
}
