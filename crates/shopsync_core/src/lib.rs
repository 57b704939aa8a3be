//! # shopsync core
//!
//! Binding, mapping and synchronization core of shopsync connectors.
//!
//! This crate provides:
//! - Bindings pairing local records with remote ids, and the [`Binder`]
//! - Declarative [`Mapper`]s between local and remote shapes
//! - Export, import and delete synchronizers with hook pipelines
//! - Batch imports, including parent-first category trees
//! - The model [`Registry`], the [`ConnectorRuntime`] and per-call
//!   [`Environment`]s
//! - Job requests, job dispatch and event consumers
//! - A [`ChangeFeed`] of the local writes, tagged with their session
//!
//! ## Architecture
//!
//! ```text
//! host event ─► consumer ─► JobQueue ─► run_job ─► Environment
//!                                                     │
//!                        ┌────────────────────────────┼──────────────┐
//!                        ▼                            ▼              ▼
//!                     Binder                       Mapper     BackendAdapter
//!                   (LocalStore)                              (RemoteTransport)
//! ```
//!
//! ## Design Principles
//!
//! - One job is one synchronous unit of work; dependencies are
//!   synchronized in-line, guarded against cycles
//! - The binder is the only writer of remote ids
//! - Exports and imports are idempotent upserts
//! - Retries belong to the job queue; errors say whether they are retryable

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod batch;
mod binder;
mod changes;
mod config;
mod consumer;
mod delete;
mod environment;
mod error;
mod export;
mod guard;
mod import;
mod jobs;
mod mapper;
mod queue;
mod registry;
mod runtime;
mod session;
mod state;
mod transport;
mod tree;
mod types;

#[cfg(test)]
mod testing;

pub use adapter::{
    format_remote_date, AdapterFactory, AssetFetcher, BackendAdapter, FilterSpec, Filters,
    ItemQuantities, MemoryAdapter, REMOTE_DATE_FORMAT, UPDATED_AT,
};
pub use batch::{BatchImporter, BatchMode};
pub use binder::{
    Binder, Binding, BindingModel, BACKEND_FIELD, LOCAL_FIELD, REMOTE_FIELD, REMOTE_UNIQUE,
    SYNC_DATE_FIELD,
};
pub use changes::{relay, ChangeFeed, ChangeType, LocalChange, SessionStore};
pub use config::{
    BackendConfig, ConnectorConfig, FaultCodes, StoreView, DEFAULT_INVOICE_EXISTS_FAULT,
};
pub use consumer::{
    delay_export, delay_export_all_bindings, on_record_create, on_record_unlink, on_record_write,
};
pub use delete::DeleteSynchronizer;
pub use environment::Environment;
pub use error::{ErrorKind, SyncError, SyncResult};
pub use export::{
    require_fields, AfterExportHook, DependencyHook, ExportHooks, ExportSynchronizer, SkipHook,
    ValidateHook,
};
pub use guard::{GuardEntry, SyncGuard};
pub use import::{
    import_main_image, import_translations, main_image, AfterImportHook, ImportDependencyHook,
    ImportHooks, ImportSynchronizer,
};
pub use jobs::{
    drain, export_delete_record, export_invoice_paid, export_picking_done, export_record,
    import_batch, import_record, run_job, JobFailure, JobReport, DIRECT_ARG, FILTERS_ARG,
    FROM_DATE_ARG, PICKING_TYPE_ARG,
};
pub use mapper::{ComputeFn, ComputedMapping, DirectRule, Mapper};
pub use queue::{
    InMemoryQueue, JobDescriptor, JobFunction, JobHandle, JobQueue, JobRequest, JobTarget,
    DEFAULT_JOB_PRIORITY,
};
pub use registry::{BatchStrategy, CustomExporter, Exporter, ModelConnector, Registry};
pub use runtime::ConnectorRuntime;
pub use session::SessionContext;
pub use state::{ExportState, ImportState, SkipReason, Stage, StateTrail, SyncOutcome};
pub use transport::{Disconnected, RemoteTransport, SharedTransport, TransportProvider};
pub use tree::{CategoryTree, TreeNode, DEFAULT_BASE_PRIORITY};
pub use types::{field_set, BackendId, BackendKind, FieldSet, RemoteId};

pub use shopsync_codec::{Record, Value};
pub use shopsync_storage::{LocalId, LocalStore};

/// Version of the connector core.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
