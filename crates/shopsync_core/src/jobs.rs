//! Job functions and dispatch.
//!
//! The queue calls [`run_job`] with a decoded [`JobRequest`]; it builds the
//! environment from the descriptor and runs the synchronizer the function
//! names. Errors are reported to operators as [`JobFailure`]s.

use crate::adapter::Filters;
use crate::batch::{BatchImporter, BatchMode};
use crate::delete::DeleteSynchronizer;
use crate::environment::Environment;
use crate::error::{ErrorKind, SyncError, SyncResult};
use crate::export::ExportSynchronizer;
use crate::import::ImportSynchronizer;
use crate::queue::{InMemoryQueue, JobFunction, JobHandle, JobRequest};
use crate::registry::Exporter;
use crate::runtime::ConnectorRuntime;
use crate::state::SyncOutcome;
use crate::types::{FieldSet, RemoteId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use shopsync_codec::{Record, Value};
use shopsync_storage::LocalId;
use std::fmt;
use tracing::{debug, warn};

/// Extra argument of `import_batch`: remote filters.
pub const FILTERS_ARG: &str = "filters";
/// Extra argument of `import_batch`: RFC 3339 lower bound of `updated_at`.
pub const FROM_DATE_ARG: &str = "from_date";
/// Extra argument of `import_batch`: import in the batch job itself.
pub const DIRECT_ARG: &str = "direct";
/// Extra argument of `export_picking_done`.
pub const PICKING_TYPE_ARG: &str = "picking_type";

/// Exports a binding, through the pipeline or the custom exporter of its
/// model.
///
/// # Errors
///
/// Propagates the export errors.
pub fn export_record(env: &Environment<'_>, binding_id: LocalId, fields: Option<&FieldSet>) -> SyncResult<SyncOutcome> {
    match env.connector()?.exporter.as_ref() {
        Some(Exporter::Custom(export)) => export(env, binding_id, &Record::new()),
        _ => ExportSynchronizer::new(env).run(binding_id, fields),
    }
}

/// Imports a remote record.
///
/// # Errors
///
/// Propagates the import errors.
pub fn import_record(env: &Environment<'_>, remote_id: &RemoteId) -> SyncResult<SyncOutcome> {
    ImportSynchronizer::new(env).run(remote_id)
}

/// Imports every remote record matching `filters`.
///
/// # Errors
///
/// Propagates the batch errors.
pub fn import_batch(
    env: &Environment<'_>,
    filters: &Filters,
    from_date: Option<DateTime<Utc>>,
    mode: BatchMode,
) -> SyncResult<SyncOutcome> {
    BatchImporter::new(env, mode).run(filters, from_date)
}

/// Deletes a remote record.
///
/// # Errors
///
/// Propagates the delete errors.
pub fn export_delete_record(env: &Environment<'_>, remote_id: &RemoteId) -> SyncResult<SyncOutcome> {
    DeleteSynchronizer::new(env).run(remote_id)
}

/// Exports a paid invoice binding.
///
/// # Errors
///
/// Returns [`SyncError::Unsupported`] if the model has no custom exporter.
pub fn export_invoice_paid(env: &Environment<'_>, binding_id: LocalId) -> SyncResult<SyncOutcome> {
    run_custom(env, binding_id, &Record::new())
}

/// Exports a done picking binding as a complete or partial shipment.
///
/// # Errors
///
/// Returns [`SyncError::Unsupported`] if the model has no custom exporter.
pub fn export_picking_done(env: &Environment<'_>, binding_id: LocalId, picking_type: &str) -> SyncResult<SyncOutcome> {
    run_custom(env, binding_id, &Record::new().with(PICKING_TYPE_ARG, picking_type))
}

fn run_custom(env: &Environment<'_>, binding_id: LocalId, extra: &Record) -> SyncResult<SyncOutcome> {
    match env.connector()?.exporter.as_ref() {
        Some(Exporter::Custom(export)) => export(env, binding_id, extra),
        _ => Err(SyncError::unsupported(env.model(), "custom export")),
    }
}

/// Runs a job.
///
/// # Errors
///
/// Returns the error of the job function, or
/// [`SyncError::InvalidArgument`] if the request does not fit it.
pub fn run_job(runtime: &ConnectorRuntime, request: &JobRequest) -> SyncResult<SyncOutcome> {
    let descriptor = &request.descriptor;
    let env = runtime.environment(
        descriptor.backend_id,
        request.session.clone(),
        descriptor.model.as_str(),
    )?;
    debug!(function = %request.function, model = %descriptor.model, target = %request.target, "running job");
    match request.function {
        JobFunction::ExportRecord => {
            export_record(&env, request.local_target()?, request.fields.as_ref())
        }
        JobFunction::ImportRecord => import_record(&env, request.remote_target()?),
        JobFunction::ImportBatch => {
            let filters = Filters::from_value(request.extra.get(FILTERS_ARG).unwrap_or(&Value::Null))?;
            let from_date = parse_from_date(&request.extra)?;
            let mode = if request.extra.get(DIRECT_ARG).is_some_and(Value::is_truthy) {
                BatchMode::Direct
            } else {
                BatchMode::Delayed
            };
            import_batch(&env, &filters, from_date, mode)
        }
        JobFunction::ExportDeleteRecord => export_delete_record(&env, request.remote_target()?),
        JobFunction::ExportInvoicePaid => run_custom(&env, request.local_target()?, &request.extra),
        JobFunction::ExportPickingDone => run_custom(&env, request.local_target()?, &request.extra),
    }
}

fn parse_from_date(extra: &Record) -> SyncResult<Option<DateTime<Utc>>> {
    let Some(value) = extra.get(FROM_DATE_ARG).filter(|v| v.is_truthy()) else {
        return Ok(None);
    };
    let text = value
        .as_text()
        .ok_or_else(|| SyncError::InvalidArgument(format!("{} must be a date", FROM_DATE_ARG)))?;
    DateTime::parse_from_rfc3339(text)
        .map(|d| Some(d.with_timezone(&Utc)))
        .map_err(|e| SyncError::InvalidArgument(format!("{} {:?}: {}", FROM_DATE_ARG, text, e)))
}

/// A failed job, as shown to operators.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Error category.
    pub kind: ErrorKind,
    /// Error message.
    pub message: String,
    /// The queue may retry the job as is.
    pub retryable: bool,
}

impl From<&SyncError> for JobFailure {
    fn from(err: &SyncError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}", self.kind, self.message)?;
        if self.retryable {
            f.write_str(" (retryable)")?;
        }
        Ok(())
    }
}

/// Result of one job run by [`drain`].
pub type JobReport = (JobHandle, JobRequest, Result<SyncOutcome, JobFailure>);

/// Runs the jobs of an in-memory queue until it is empty, including jobs
/// enqueued by the jobs themselves.
///
/// # Errors
///
/// Returns an error only if a queued payload cannot be decoded; job
/// failures are reported.
pub fn drain(runtime: &ConnectorRuntime, queue: &InMemoryQueue) -> SyncResult<Vec<JobReport>> {
    let mut reports = Vec::new();
    while let Some((handle, request)) = queue.pop()? {
        let result = run_job(runtime, &request).map_err(|err| {
            let failure = JobFailure::from(&err);
            warn!(job = %handle, function = %request.function, failure = %failure, "job failed");
            failure
        });
        reports.push((handle, request, result));
    }
    Ok(reports)
}
