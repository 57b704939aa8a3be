//! Export synchronizer.
//!
//! Exports one binding to the remote side:
//!
//! ```text
//! Init ─┬─► Skipped                      (has_to_skip veto)
//!       └─► DepsExported ─► Mapped ─┬─► Skipped   (nothing to send)
//!                                   └─► Validated ─┬─► Created ─┐
//!                                                  └─► Updated ─┴─► Bound ─► Done
//! ```
//!
//! An unbound record is always exported in full, whatever fields changed.

use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::registry::Exporter;
use crate::state::{ExportState, SkipReason, StateTrail, SyncOutcome};
use crate::types::{FieldSet, RemoteId};
use shopsync_codec::Record;
use shopsync_storage::LocalId;
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Vetoes an export, given the merged view of the binding.
pub type SkipHook = Arc<dyn Fn(&Environment<'_>, &Record) -> SyncResult<bool> + Send + Sync>;

/// Exports the dependencies of a binding, given its merged view.
pub type DependencyHook = Arc<dyn Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync>;

/// Validates mapped data.
pub type ValidateHook = Arc<dyn Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync>;

/// Runs after a successful export: `(env, binding id, merged view)`.
pub type AfterExportHook =
    Arc<dyn Fn(&Environment<'_>, LocalId, &Record) -> SyncResult<()> + Send + Sync>;

/// Optional stages of the export pipeline.
#[derive(Clone, Default)]
pub struct ExportHooks {
    /// Veto stage.
    pub has_to_skip: Option<SkipHook>,
    /// Dependency stage.
    pub export_dependencies: Option<DependencyHook>,
    /// Validation stage.
    pub validate: Option<ValidateHook>,
    /// Post-export stage.
    pub after_export: Option<AfterExportHook>,
}

impl ExportHooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the veto stage.
    pub fn with_skip<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, &Record) -> SyncResult<bool> + Send + Sync + 'static,
    {
        self.has_to_skip = Some(Arc::new(hook));
        self
    }

    /// Sets the dependency stage.
    pub fn with_dependencies<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.export_dependencies = Some(Arc::new(hook));
        self
    }

    /// Sets the validation stage.
    pub fn with_validate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(hook));
        self
    }

    /// Sets the post-export stage.
    pub fn with_after_export<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, LocalId, &Record) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.after_export = Some(Arc::new(hook));
        self
    }

    /// Validation requiring `fields` to be set in the mapped data.
    pub fn with_required_fields<I, S>(self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let fields: Vec<String> = fields.into_iter().map(Into::into).collect();
        self.with_validate(move |_env, data| require_fields(data, &fields))
    }
}

impl fmt::Debug for ExportHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExportHooks")
            .field("has_to_skip", &self.has_to_skip.is_some())
            .field("export_dependencies", &self.export_dependencies.is_some())
            .field("validate", &self.validate.is_some())
            .field("after_export", &self.after_export.is_some())
            .finish()
    }
}

/// Fails with a validation error naming the first field of `fields` that
/// is not set in `data`.
///
/// # Errors
///
/// Returns [`SyncError::Validation`] naming the missing field.
pub fn require_fields(data: &Record, fields: &[String]) -> SyncResult<()> {
    match fields.iter().find(|f| !data.is_set(f)) {
        Some(field) => Err(SyncError::validation(
            field.clone(),
            format!("the record has no {} but it is mandatory on the remote side", field),
        )),
        None => Ok(()),
    }
}

/// Exports one binding.
pub struct ExportSynchronizer<'e, 'r> {
    env: &'e Environment<'r>,
    trail: StateTrail<ExportState>,
    remote_id: Option<RemoteId>,
}

impl<'e, 'r> ExportSynchronizer<'e, 'r> {
    /// Creates an export synchronizer for the model of `env`.
    pub fn new(env: &'e Environment<'r>) -> Self {
        Self {
            env,
            trail: StateTrail::new(),
            remote_id: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ExportState {
        self.trail.current()
    }

    /// States gone through.
    pub fn history(&self) -> &[ExportState] {
        self.trail.history()
    }

    /// Remote id after a successful export.
    pub fn remote_id(&self) -> Option<&RemoteId> {
        self.remote_id.as_ref()
    }

    /// Exports `binding_id`. `fields` narrows the update of a bound record.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; the state becomes `Failed`.
    pub fn run(&mut self, binding_id: LocalId, fields: Option<&FieldSet>) -> SyncResult<SyncOutcome> {
        let env = self.env;
        let model = env.model().to_string();
        let result = match env.guard().enter(&model, format!("export {}", binding_id)) {
            Ok(_entry) => self.run_stages(binding_id, fields),
            Err(err) => Err(err),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.trail.fail();
                warn!(model = %model, binding = %binding_id, error = %err, "export failed");
                Err(err)
            }
        }
    }

    fn run_stages(&mut self, binding_id: LocalId, fields: Option<&FieldSet>) -> SyncResult<SyncOutcome> {
        let env = self.env;
        let connector = env.connector()?;
        let hooks = match &connector.exporter {
            Some(Exporter::Pipeline(hooks)) => hooks.clone(),
            Some(Exporter::Custom(_)) | None => {
                return Err(SyncError::unsupported(env.model(), "export"));
            }
        };
        let mapper = connector
            .export_mapper
            .as_ref()
            .ok_or_else(|| SyncError::unsupported(env.model(), "export mapping"))?;

        let binder = env.binder()?;
        let view = binder.read_view(binding_id)?;
        let remote_id = binder.to_remote(binding_id)?;
        // a create needs every field
        let fields = if remote_id.is_some() { fields } else { None };

        if let Some(skip) = &hooks.has_to_skip {
            if skip(env, &view)? {
                self.trail.advance(ExportState::Skipped)?;
                debug!(model = env.model(), binding = %binding_id, "export vetoed");
                return Ok(SyncOutcome::Skipped(SkipReason::Vetoed));
            }
        }

        if let Some(deps) = &hooks.export_dependencies {
            deps(env, &view)?;
        }
        self.trail.advance(ExportState::DepsExported)?;

        let data = mapper.convert(&view, fields, env)?;
        self.trail.advance(ExportState::Mapped)?;
        if data.is_empty() {
            self.trail.advance(ExportState::Skipped)?;
            debug!(model = env.model(), binding = %binding_id, "nothing to export");
            return Ok(SyncOutcome::Skipped(SkipReason::NothingToDo));
        }

        if let Some(validate) = &hooks.validate {
            validate(env, &data)?;
        }
        self.trail.advance(ExportState::Validated)?;

        let adapter = env.adapter()?;
        let remote_id = match remote_id {
            Some(remote_id) => {
                adapter.update(&remote_id, data)?;
                self.trail.advance(ExportState::Updated)?;
                remote_id
            }
            None => {
                let remote_id = adapter.create(data)?;
                self.trail.advance(ExportState::Created)?;
                remote_id
            }
        };

        binder.bind(&remote_id, binding_id)?;
        self.trail.advance(ExportState::Bound)?;
        self.remote_id = Some(remote_id.clone());

        if let Some(after) = &hooks.after_export {
            after(env, binding_id, &view)?;
        }
        self.trail.advance(ExportState::Done)?;

        info!(model = env.model(), binding = %binding_id, remote = %remote_id, "exported");
        Ok(SyncOutcome::Done(format!(
            "Record exported with ID {} on {}.",
            remote_id,
            env.backend().kind.label()
        )))
    }
}
