//! Feed of the local writes made by synchronizers.
//!
//! Every store write of an [`Environment`](crate::Environment) goes through
//! a [`SessionStore`], which reports it on the runtime's [`ChangeFeed`]
//! together with the session that made it. A host that turns store writes
//! into connector events subscribes to the feed and hands each change to
//! [`relay`]:
//!
//! ```text
//! ImportSynchronizer ─► SessionStore ─► LocalStore
//!                            │
//!                            ▼
//!                        ChangeFeed ─► host ─► relay ─► on_record_create / on_record_write
//! ```
//!
//! Importers and pairing writes carry a `no_export` session, so relaying
//! them enqueues nothing.

use crate::consumer::{on_record_create, on_record_write};
use crate::error::SyncResult;
use crate::queue::JobHandle;
use crate::runtime::ConnectorRuntime;
use crate::session::SessionContext;
use crate::types::FieldSet;
use parking_lot::RwLock;
use shopsync_codec::Record;
use shopsync_storage::{Domain, LocalId, LocalStore, StorageResult};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;

/// Kind of local write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeType {
    /// A record was created.
    Create,
    /// Fields of a record were written.
    Write,
    /// A record was deleted.
    Unlink,
}

/// One local write, with the session that made it.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalChange {
    /// Model of the record.
    pub model: String,
    /// Record id.
    pub id: LocalId,
    /// Kind of write.
    pub change_type: ChangeType,
    /// Fields written. Empty for unlinks.
    pub fields: FieldSet,
    /// Session of the writer.
    pub session: SessionContext,
}

impl LocalChange {
    fn new(model: &str, id: LocalId, change_type: ChangeType, fields: FieldSet, session: &SessionContext) -> Self {
        Self {
            model: model.to_string(),
            id,
            change_type,
            fields,
            session: session.clone(),
        }
    }
}

/// Distributes local changes to subscribers, in write order.
#[derive(Debug, Default)]
pub struct ChangeFeed {
    subscribers: RwLock<Vec<Sender<LocalChange>>>,
}

impl ChangeFeed {
    /// Creates a feed without subscribers.
    pub fn new() -> Self {
        Self::default()
    }

    /// Subscribes to the changes emitted from now on.
    pub fn subscribe(&self) -> Receiver<LocalChange> {
        let (sender, receiver) = mpsc::channel();
        self.subscribers.write().push(sender);
        receiver
    }

    /// Number of live subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.read().len()
    }

    /// Sends a change to every subscriber, dropping the disconnected ones.
    pub fn emit(&self, change: LocalChange) {
        let mut subscribers = self.subscribers.write();
        if subscribers.is_empty() {
            return;
        }
        subscribers.retain(|sender| sender.send(change.clone()).is_ok());
    }
}

/// A [`LocalStore`] that reports its successful writes on a [`ChangeFeed`]
/// under one session.
pub struct SessionStore {
    inner: Arc<dyn LocalStore>,
    feed: Arc<ChangeFeed>,
    session: SessionContext,
}

impl SessionStore {
    /// Wraps `inner`.
    pub fn new(inner: Arc<dyn LocalStore>, feed: Arc<ChangeFeed>, session: SessionContext) -> Self {
        Self { inner, feed, session }
    }

    /// Session the writes are reported with.
    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    fn emit(&self, model: &str, id: LocalId, change_type: ChangeType, fields: FieldSet) {
        self.feed
            .emit(LocalChange::new(model, id, change_type, fields, &self.session));
    }
}

impl LocalStore for SessionStore {
    fn create(&self, model: &str, values: Record) -> StorageResult<LocalId> {
        let fields = fields_of(&values);
        let id = self.inner.create(model, values)?;
        self.emit(model, id, ChangeType::Create, fields);
        Ok(id)
    }

    fn read(&self, model: &str, id: LocalId) -> StorageResult<Record> {
        self.inner.read(model, id)
    }

    fn write(&self, model: &str, id: LocalId, values: Record) -> StorageResult<()> {
        let fields = fields_of(&values);
        self.inner.write(model, id, values)?;
        self.emit(model, id, ChangeType::Write, fields);
        Ok(())
    }

    fn unlink(&self, model: &str, id: LocalId) -> StorageResult<()> {
        self.inner.unlink(model, id)?;
        self.emit(model, id, ChangeType::Unlink, FieldSet::new());
        Ok(())
    }

    fn search(&self, model: &str, domain: &Domain) -> StorageResult<Vec<LocalId>> {
        self.inner.search(model, domain)
    }

    fn ensure_unique(&self, model: &str, name: &str, fields: &[&str]) -> StorageResult<()> {
        self.inner.ensure_unique(model, name, fields)
    }

    fn write_translation(&self, model: &str, id: LocalId, lang: &str, values: Record) -> StorageResult<()> {
        let fields = fields_of(&values);
        self.inner.write_translation(model, id, lang, values)?;
        self.emit(model, id, ChangeType::Write, fields);
        Ok(())
    }

    fn read_translation(&self, model: &str, id: LocalId, lang: &str) -> StorageResult<Record> {
        self.inner.read_translation(model, id, lang)
    }
}

fn fields_of(values: &Record) -> FieldSet {
    values.keys().map(String::from).collect()
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("session", &self.session)
            .finish()
    }
}

/// Hands a local change to the matching consumer, with the session of the
/// writer.
///
/// Unlinks are not relayed: [`crate::on_record_unlink`] must run before the
/// binding is deleted.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn relay(runtime: &ConnectorRuntime, change: &LocalChange) -> SyncResult<Vec<JobHandle>> {
    match change.change_type {
        ChangeType::Create => on_record_create(runtime, &change.session, &change.model, change.id, &change.fields),
        ChangeType::Write => on_record_write(runtime, &change.session, &change.model, change.id, &change.fields),
        ChangeType::Unlink => Ok(Vec::new()),
    }
}
