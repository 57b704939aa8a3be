//! Import synchronizer.
//!
//! Imports one remote record into its binding and wrapped record:
//!
//! ```text
//! Init ─► Fetched ─┬─► DepsImported ─► Mapped ─► Validated ─┬─► Created ─┐
//!                  │                                        └─► Updated ─┴─► Bound ─► AfterImport ─► Done
//!                  └─► Skipped
//! ```
//!
//! A record is skipped when its binding was synchronized after the remote
//! `updated_at`. Dependencies are imported in-line, inside the same job; the
//! cycle guard of the environment stops a dependency chain that loops back.
//! Every local write of an import is made with a `no_export` session.

use crate::adapter::UPDATED_AT;
use crate::binder::{Binder, BACKEND_FIELD, LOCAL_FIELD, REMOTE_FIELD, SYNC_DATE_FIELD};
use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::export::ValidateHook;
use crate::state::{ImportState, SkipReason, StateTrail, SyncOutcome};
use crate::types::RemoteId;
use chrono::{DateTime, NaiveDateTime, Utc};
use shopsync_codec::{Record, Value};
use shopsync_storage::{LocalId, LocalStore};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Imports the dependencies of a remote record.
pub type ImportDependencyHook =
    Arc<dyn Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync>;

/// Runs after a successful import: `(env, remote id, binding id)`.
pub type AfterImportHook =
    Arc<dyn Fn(&Environment<'_>, &RemoteId, LocalId) -> SyncResult<()> + Send + Sync>;

/// Optional stages of the import pipeline.
#[derive(Clone, Default)]
pub struct ImportHooks {
    /// Dependency stage, run in order.
    pub import_dependencies: Vec<ImportDependencyHook>,
    /// Validation stage.
    pub validate: Option<ValidateHook>,
    /// Post-import stage, run in order.
    pub after_import: Vec<AfterImportHook>,
}

impl ImportHooks {
    /// No hooks.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a dependency step.
    pub fn with_dependencies<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.import_dependencies.push(Arc::new(hook));
        self
    }

    /// Imports the record of `model` whose remote id is in the remote
    /// `field`, when set.
    pub fn with_dependency(self, field: impl Into<String>, model: impl Into<String>) -> Self {
        let field = field.into();
        let model = model.into();
        self.with_dependencies(move |env, record| {
            match record.get(&field).and_then(RemoteId::from_value) {
                Some(remote_id) => env.import_dependency(&model, &remote_id),
                None => Ok(()),
            }
        })
    }

    /// Sets the validation stage.
    pub fn with_validate<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, &Record) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.validate = Some(Arc::new(hook));
        self
    }

    /// Adds a post-import step.
    pub fn with_after_import<F>(mut self, hook: F) -> Self
    where
        F: Fn(&Environment<'_>, &RemoteId, LocalId) -> SyncResult<()> + Send + Sync + 'static,
    {
        self.after_import.push(Arc::new(hook));
        self
    }

    /// Imports the translatable fields of every translated store view.
    pub fn with_translations(self) -> Self {
        self.with_after_import(import_translations)
    }

    /// Imports the main image of the record.
    pub fn with_main_image(self) -> Self {
        self.with_after_import(import_main_image)
    }
}

impl fmt::Debug for ImportHooks {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ImportHooks")
            .field("import_dependencies", &self.import_dependencies.len())
            .field("validate", &self.validate.is_some())
            .field("after_import", &self.after_import.len())
            .finish()
    }
}

/// Imports one remote record.
pub struct ImportSynchronizer<'e, 'r> {
    env: &'e Environment<'r>,
    trail: StateTrail<ImportState>,
    binding_id: Option<LocalId>,
}

impl<'e, 'r> ImportSynchronizer<'e, 'r> {
    /// Creates an import synchronizer for the model of `env`.
    pub fn new(env: &'e Environment<'r>) -> Self {
        Self {
            env,
            trail: StateTrail::new(),
            binding_id: None,
        }
    }

    /// Current state.
    pub fn state(&self) -> ImportState {
        self.trail.current()
    }

    /// States gone through.
    pub fn history(&self) -> &[ImportState] {
        self.trail.history()
    }

    /// Binding id after a successful import.
    pub fn binding_id(&self) -> Option<LocalId> {
        self.binding_id
    }

    /// Imports `remote_id`.
    ///
    /// # Errors
    ///
    /// Returns the first error of any stage; the state becomes `Failed`.
    pub fn run(&mut self, remote_id: &RemoteId) -> SyncResult<SyncOutcome> {
        let env = self.env.without_export();
        let model = env.model().to_string();
        let result = match env.guard().enter(&model, format!("import {}", remote_id)) {
            Ok(_entry) => self.run_stages(&env, remote_id),
            Err(err) => Err(err),
        };
        match result {
            Ok(outcome) => Ok(outcome),
            Err(err) => {
                self.trail.fail();
                warn!(model = %model, remote = %remote_id, error = %err, "import failed");
                Err(err)
            }
        }
    }

    fn run_stages(&mut self, env: &Environment<'_>, remote_id: &RemoteId) -> SyncResult<SyncOutcome> {
        let connector = env.connector()?;
        let hooks = connector
            .importer
            .clone()
            .ok_or_else(|| SyncError::unsupported(env.model(), "import"))?;
        let mapper = connector
            .import_mapper
            .as_ref()
            .ok_or_else(|| SyncError::unsupported(env.model(), "import mapping"))?;

        let record = env.adapter()?.read(remote_id, None, None)?;
        self.trail.advance(ImportState::Fetched)?;

        let binder = env.binder()?;
        if let Some(binding_id) = binder.to_local(remote_id, false)? {
            if is_up_to_date(&binder, binding_id, &record)? {
                self.trail.advance(ImportState::Skipped)?;
                self.binding_id = Some(binding_id);
                debug!(model = env.model(), remote = %remote_id, "already up to date");
                return Ok(SyncOutcome::Skipped(SkipReason::UpToDate));
            }
        }

        for dependency in &hooks.import_dependencies {
            dependency(env, &record)?;
        }
        self.trail.advance(ImportState::DepsImported)?;

        let data = mapper.convert(&record, None, env)?;
        self.trail.advance(ImportState::Mapped)?;

        if let Some(validate) = &hooks.validate {
            validate(env, &data)?;
        }
        self.trail.advance(ImportState::Validated)?;

        let (mut binding_part, wrapped_part) = binder.model().split(data);
        for field in [BACKEND_FIELD, LOCAL_FIELD, REMOTE_FIELD, SYNC_DATE_FIELD] {
            binding_part.remove(field);
        }
        let store = env.store();
        let wrapped_model = &binder.model().wrapped_model;

        let binding_id = match binder.to_local(remote_id, false)? {
            Some(binding_id) => {
                let binding = binder.binding(binding_id)?;
                if !wrapped_part.is_empty() {
                    store.write(wrapped_model, binding.local_id, wrapped_part)?;
                }
                if !binding_part.is_empty() {
                    store.write(env.model(), binding_id, binding_part)?;
                }
                self.trail.advance(ImportState::Updated)?;
                binder.touch(binding_id)?;
                binding_id
            }
            None => {
                let local_id = store.create(wrapped_model, wrapped_part)?;
                let binding_id = match binder.create_binding(local_id, binding_part) {
                    Ok(binding_id) => binding_id,
                    Err(err) => return Err(discard(store.as_ref(), wrapped_model, local_id, err)),
                };
                if let Err(err) = binder.bind(remote_id, binding_id) {
                    let err = discard(store.as_ref(), env.model(), binding_id, err);
                    return Err(discard(store.as_ref(), wrapped_model, local_id, err));
                }
                self.trail.advance(ImportState::Created)?;
                binding_id
            }
        };
        self.trail.advance(ImportState::Bound)?;
        self.binding_id = Some(binding_id);

        for after in &hooks.after_import {
            after(env, remote_id, binding_id)?;
        }
        self.trail.advance(ImportState::AfterImport)?;
        self.trail.advance(ImportState::Done)?;

        info!(model = env.model(), remote = %remote_id, binding = %binding_id, "imported");
        Ok(SyncOutcome::Done(format!(
            "Record imported with ID {} from {}.",
            remote_id,
            env.backend().kind.label()
        )))
    }
}

/// Returns true when the binding was synchronized at or after the remote
/// `updated_at`. Records without either date are never up to date.
fn is_up_to_date(binder: &Binder, binding_id: LocalId, record: &Record) -> SyncResult<bool> {
    let Some(sync_date) = binder.binding(binding_id)?.sync_date else {
        return Ok(false);
    };
    let Some(updated_at) = record.text(UPDATED_AT).and_then(parse_remote_date) else {
        return Ok(false);
    };
    Ok(updated_at <= sync_date)
}

/// Parses a remote date, `2013-05-10 12:00:00` or `2013/05/10 12:00:00`, in UTC.
fn parse_remote_date(text: &str) -> Option<DateTime<Utc>> {
    ["%Y-%m-%d %H:%M:%S", crate::adapter::REMOTE_DATE_FORMAT]
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(text, format).ok())
        .map(|naive| naive.and_utc())
}

/// Deletes a record created by a failed import and returns `err`.
fn discard(store: &dyn LocalStore, model: &str, id: LocalId, err: SyncError) -> SyncError {
    if let Err(cleanup) = store.unlink(model, id) {
        warn!(model, record = %id, error = %cleanup, "could not discard record of failed import");
    }
    err
}

/// Writes the translatable fields of a remote record, read in each store
/// view that carries a language, as translations of the wrapped record.
///
/// # Errors
///
/// Propagates adapter, mapping and store errors.
pub fn import_translations(env: &Environment<'_>, remote_id: &RemoteId, binding_id: LocalId) -> SyncResult<()> {
    let connector = env.connector()?;
    if connector.translatable.is_empty() {
        return Ok(());
    }
    let mapper = connector
        .import_mapper
        .as_ref()
        .ok_or_else(|| SyncError::unsupported(env.model(), "import mapping"))?;
    let binder = env.binder()?;
    let local_id = binder.binding(binding_id)?.local_id;
    let adapter = env.adapter()?;

    for (storeview, lang) in env.backend().translated_storeviews() {
        let record = adapter.read(remote_id, Some(storeview), None)?;
        let mut data = mapper.convert(&record, None, env)?;
        data.retain(|field| connector.translatable.contains(field));
        if data.is_empty() {
            continue;
        }
        debug!(model = env.model(), remote = %remote_id, lang, "importing translation");
        env.store()
            .write_translation(&binder.model().wrapped_model, local_id, lang, data)?;
    }
    Ok(())
}

/// Picks the image typed `base`, else the one with the lowest position.
pub fn main_image(images: &[Record]) -> Option<&Record> {
    let is_base = |image: &&Record| {
        image
            .get("types")
            .and_then(Value::as_array)
            .is_some_and(|types| types.iter().any(|t| t.as_text() == Some("base")))
    };
    images
        .iter()
        .find(is_base)
        .or_else(|| images.iter().min_by_key(|i| i.integer("position").unwrap_or(i64::MAX)))
}

/// Downloads the main image of a remote record into the `image` field of
/// the wrapped record. Does nothing without an asset fetcher or images.
///
/// # Errors
///
/// Propagates adapter, fetch and store errors.
pub fn import_main_image(env: &Environment<'_>, remote_id: &RemoteId, binding_id: LocalId) -> SyncResult<()> {
    let Some(assets) = env.runtime().assets() else {
        return Ok(());
    };
    let images = env.adapter()?.images(remote_id, None)?;
    let Some(url) = main_image(&images).and_then(|image| image.text("url")) else {
        debug!(model = env.model(), remote = %remote_id, "no image to import");
        return Ok(());
    };
    let data = assets.fetch(url)?;
    let binder = env.binder()?;
    let local_id = binder.binding(binding_id)?.local_id;
    env.store().write(
        &binder.model().wrapped_model,
        local_id,
        Record::new().with("image", data),
    )?;
    Ok(())
}
