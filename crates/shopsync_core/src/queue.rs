//! Job requests and the job queue contract.
//!
//! Every synchronization runs as a job. A [`JobRequest`] names the job
//! function, the backend and binding model, the target record and the
//! session of the event that produced it. Requests are plain data and
//! travel to the queue as CBOR.

use crate::error::{SyncError, SyncResult};
use crate::session::SessionContext;
use crate::types::{BackendId, FieldSet, RemoteId};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use shopsync_codec::{Decode, Encode, Record};
use shopsync_storage::LocalId;
use std::fmt;
use uuid::Uuid;

/// Priority of jobs enqueued without one.
pub const DEFAULT_JOB_PRIORITY: u32 = 10;

/// The job functions a queue can run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobFunction {
    /// Export a binding.
    ExportRecord,
    /// Import a remote record.
    ImportRecord,
    /// Import every remote record matching filters.
    ImportBatch,
    /// Delete a remote record.
    ExportDeleteRecord,
    /// Export a paid invoice.
    ExportInvoicePaid,
    /// Export a done picking.
    ExportPickingDone,
}

impl JobFunction {
    /// Every job function.
    pub const ALL: [JobFunction; 6] = [
        JobFunction::ExportRecord,
        JobFunction::ImportRecord,
        JobFunction::ImportBatch,
        JobFunction::ExportDeleteRecord,
        JobFunction::ExportInvoicePaid,
        JobFunction::ExportPickingDone,
    ];

    /// Function name.
    pub fn as_str(&self) -> &'static str {
        match self {
            JobFunction::ExportRecord => "export_record",
            JobFunction::ImportRecord => "import_record",
            JobFunction::ImportBatch => "import_batch",
            JobFunction::ExportDeleteRecord => "export_delete_record",
            JobFunction::ExportInvoicePaid => "export_invoice_paid",
            JobFunction::ExportPickingDone => "export_picking_done",
        }
    }
}

impl fmt::Display for JobFunction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Backend and binding model of a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobDescriptor {
    /// Backend.
    pub backend_id: BackendId,
    /// Binding model.
    pub model: String,
}

/// Record targeted by a job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobTarget {
    /// A local binding.
    Local(LocalId),
    /// A remote record.
    Remote(RemoteId),
    /// No single record.
    None,
}

impl fmt::Display for JobTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobTarget::Local(id) => write!(f, "local {}", id),
            JobTarget::Remote(id) => write!(f, "remote {}", id),
            JobTarget::None => f.write_str("none"),
        }
    }
}

/// A deferred synchronization call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRequest {
    /// Function to run.
    pub function: JobFunction,
    /// Backend and model.
    pub descriptor: JobDescriptor,
    /// Target record.
    pub target: JobTarget,
    /// Changed fields, for exports.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fields: Option<FieldSet>,
    /// Function-specific arguments.
    #[serde(default)]
    pub extra: Record,
    /// Priority; lower runs first.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub priority: Option<u32>,
    /// Session of the event that produced the job.
    #[serde(default)]
    pub session: SessionContext,
}

impl JobRequest {
    /// Creates a request.
    pub fn new(
        function: JobFunction,
        backend_id: BackendId,
        model: impl Into<String>,
        target: JobTarget,
    ) -> Self {
        Self {
            function,
            descriptor: JobDescriptor {
                backend_id,
                model: model.into(),
            },
            target,
            fields: None,
            extra: Record::new(),
            priority: None,
            session: SessionContext::default(),
        }
    }

    /// Sets the changed fields.
    pub fn with_fields(mut self, fields: Option<FieldSet>) -> Self {
        self.fields = fields;
        self
    }

    /// Adds an extra argument.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<shopsync_codec::Value>) -> Self {
        self.extra.insert(key, value);
        self
    }

    /// Sets the priority.
    pub fn with_priority(mut self, priority: u32) -> Self {
        self.priority = Some(priority);
        self
    }

    /// Sets the session.
    pub fn with_session(mut self, session: SessionContext) -> Self {
        self.session = session;
        self
    }

    /// Priority, defaulted.
    pub fn effective_priority(&self) -> u32 {
        self.priority.unwrap_or(DEFAULT_JOB_PRIORITY)
    }

    /// The local target.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] for another target.
    pub fn local_target(&self) -> SyncResult<LocalId> {
        match &self.target {
            JobTarget::Local(id) => Ok(*id),
            other => Err(SyncError::InvalidArgument(format!(
                "{} expects a local id, got {}",
                self.function, other
            ))),
        }
    }

    /// The remote target.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] for another target.
    pub fn remote_target(&self) -> SyncResult<&RemoteId> {
        match &self.target {
            JobTarget::Remote(id) => Ok(id),
            other => Err(SyncError::InvalidArgument(format!(
                "{} expects a remote id, got {}",
                self.function, other
            ))),
        }
    }

    /// Encodes the request to CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn to_bytes(&self) -> SyncResult<Vec<u8>> {
        Ok(self.encode()?)
    }

    /// Decodes a request from CBOR.
    ///
    /// # Errors
    ///
    /// Returns an error if the bytes are not a request.
    pub fn from_bytes(bytes: &[u8]) -> SyncResult<Self> {
        Ok(Self::decode(bytes)?)
    }
}

/// Handle of an enqueued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobHandle(Uuid);

impl JobHandle {
    /// Creates a fresh handle.
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// The job uuid.
    pub fn uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for JobHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Deferred execution of jobs. Scheduling, retries and workers belong to
/// the implementation.
pub trait JobQueue: Send + Sync {
    /// Enqueues a job.
    fn enqueue(&self, request: JobRequest) -> SyncResult<JobHandle>;
}

#[derive(Debug)]
struct QueuedJob {
    handle: JobHandle,
    seq: u64,
    priority: u32,
    payload: Vec<u8>,
}

#[derive(Debug, Default)]
struct QueueState {
    next_seq: u64,
    jobs: Vec<QueuedJob>,
}

/// An in-memory job queue for testing and tooling.
///
/// Jobs are stored encoded and handed out by priority, then FIFO.
#[derive(Debug, Default)]
pub struct InMemoryQueue {
    state: Mutex<QueueState>,
}

impl InMemoryQueue {
    /// Creates an empty queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of pending jobs.
    pub fn len(&self) -> usize {
        self.state.lock().jobs.len()
    }

    /// Returns true if no job is pending.
    pub fn is_empty(&self) -> bool {
        self.state.lock().jobs.is_empty()
    }

    /// Pending jobs in execution order, without removing them.
    ///
    /// # Errors
    ///
    /// Returns an error if a payload cannot be decoded.
    pub fn pending(&self) -> SyncResult<Vec<(JobHandle, JobRequest)>> {
        let state = self.state.lock();
        let mut jobs: Vec<&QueuedJob> = state.jobs.iter().collect();
        jobs.sort_by_key(|j| (j.priority, j.seq));
        jobs.into_iter()
            .map(|j| Ok((j.handle, JobRequest::from_bytes(&j.payload)?)))
            .collect()
    }

    /// Removes and returns the next job.
    ///
    /// # Errors
    ///
    /// Returns an error if the payload cannot be decoded.
    pub fn pop(&self) -> SyncResult<Option<(JobHandle, JobRequest)>> {
        let mut state = self.state.lock();
        let next = state
            .jobs
            .iter()
            .enumerate()
            .min_by_key(|(_, j)| (j.priority, j.seq))
            .map(|(i, _)| i);
        let Some(index) = next else {
            return Ok(None);
        };
        let job = state.jobs.remove(index);
        Ok(Some((job.handle, JobRequest::from_bytes(&job.payload)?)))
    }

    /// Removes every pending job.
    pub fn clear(&self) {
        self.state.lock().jobs.clear();
    }
}

impl JobQueue for InMemoryQueue {
    fn enqueue(&self, request: JobRequest) -> SyncResult<JobHandle> {
        let payload = request.to_bytes()?;
        let handle = JobHandle::new();
        let mut state = self.state.lock();
        state.next_seq += 1;
        let seq = state.next_seq;
        state.jobs.push(QueuedJob {
            handle,
            seq,
            priority: request.effective_priority(),
            payload,
        });
        Ok(handle)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::field_set;

    fn import(remote: &str, priority: Option<u32>) -> JobRequest {
        let request = JobRequest::new(
            JobFunction::ImportRecord,
            BackendId::new(1),
            "magento.product.category",
            JobTarget::Remote(remote.into()),
        );
        match priority {
            Some(p) => request.with_priority(p),
            None => request,
        }
    }

    #[test]
    fn request_survives_encoding() {
        let request = JobRequest::new(
            JobFunction::ExportRecord,
            BackendId::new(1),
            "magento.res.partner",
            JobTarget::Local(LocalId::new(3)),
        )
        .with_fields(Some(field_set(["email"])))
        .with_extra("picking_type", "complete")
        .with_session(SessionContext::new(2).with_lang("fr_FR"));

        let decoded = JobRequest::from_bytes(&request.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, request);
    }

    #[test]
    fn garbage_is_codec_error() {
        assert!(matches!(
            JobRequest::from_bytes(&[0xff, 0x00]),
            Err(SyncError::Codec(_))
        ));
    }

    #[test]
    fn queue_orders_by_priority_then_fifo() {
        let queue = InMemoryQueue::new();
        queue.enqueue(import("c", Some(12))).unwrap();
        queue.enqueue(import("a", None)).unwrap();
        queue.enqueue(import("b", Some(10))).unwrap();
        queue.enqueue(import("d", Some(11))).unwrap();

        let order: Vec<String> = queue
            .pending()
            .unwrap()
            .into_iter()
            .map(|(_, r)| r.remote_target().unwrap().to_string())
            .collect();
        assert_eq!(order, vec!["a", "b", "d", "c"]);

        let (_, first) = queue.pop().unwrap().unwrap();
        assert_eq!(first.remote_target().unwrap().as_str(), "a");
        assert_eq!(queue.len(), 3);
    }

    #[test]
    fn handles_are_unique() {
        let queue = InMemoryQueue::new();
        let a = queue.enqueue(import("1", None)).unwrap();
        let b = queue.enqueue(import("1", None)).unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn wrong_target_is_invalid_argument() {
        let request = import("1", None);
        assert!(matches!(
            request.local_target(),
            Err(SyncError::InvalidArgument(_))
        ));
        assert_eq!(JobFunction::ExportDeleteRecord.to_string(), "export_delete_record");
    }
}
