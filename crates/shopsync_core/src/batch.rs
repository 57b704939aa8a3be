//! Batch imports.
//!
//! A batch enumerates remote records and imports each of them, either
//! in-line or as one queued `import_record` job per record. Category trees
//! are walked parents first and their jobs prioritized by depth.

use crate::adapter::Filters;
use crate::environment::Environment;
use crate::error::{SyncError, SyncResult};
use crate::import::ImportSynchronizer;
use crate::queue::{JobFunction, JobRequest, JobTarget};
use crate::registry::BatchStrategy;
use crate::state::SyncOutcome;
use crate::types::RemoteId;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use tracing::{debug, info};

/// Where the records of a batch are imported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum BatchMode {
    /// In the batch job itself.
    Direct,
    /// In one queued job per record.
    #[default]
    Delayed,
}

/// Imports every remote record of the model of an environment matching
/// `filters`, restricted to records updated since `from_date`.
pub struct BatchImporter<'e, 'r> {
    env: &'e Environment<'r>,
    mode: BatchMode,
}

impl<'e, 'r> BatchImporter<'e, 'r> {
    /// Creates a batch importer.
    pub fn new(env: &'e Environment<'r>, mode: BatchMode) -> Self {
        Self { env, mode }
    }

    /// Runs the batch.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Unsupported`] if the model has no batch
    /// strategy; propagates adapter, import and queue errors.
    pub fn run(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<SyncOutcome> {
        let env = self.env;
        let strategy = env
            .connector()?
            .batch
            .ok_or_else(|| SyncError::unsupported(env.model(), "batch import"))?;
        let planned = match strategy {
            BatchStrategy::Plain => self.plan_plain(filters, from_date)?,
            BatchStrategy::Tree => self.plan_tree(filters, from_date)?,
        };
        let count = planned.len();
        for (remote_id, priority) in planned {
            self.dispatch(&remote_id, priority)?;
        }
        info!(model = env.model(), count, mode = ?self.mode, "batch import");
        let verb = match self.mode {
            BatchMode::Direct => "imported",
            BatchMode::Delayed => "scheduled for import",
        };
        Ok(SyncOutcome::Done(format!("{} records {}", count, verb)))
    }

    fn plan_plain(
        &self,
        filters: &Filters,
        from_date: Option<DateTime<Utc>>,
    ) -> SyncResult<Vec<(RemoteId, Option<u32>)>> {
        let ids = self.env.adapter()?.search(filters, from_date)?;
        Ok(ids.into_iter().map(|id| (id, None)).collect())
    }

    fn plan_tree(
        &self,
        filters: &Filters,
        from_date: Option<DateTime<Utc>>,
    ) -> SyncResult<Vec<(RemoteId, Option<u32>)>> {
        let adapter = self.env.adapter()?;
        let changed: Option<BTreeSet<RemoteId>> = match from_date {
            Some(date) => Some(adapter.search(filters, Some(date))?.into_iter().collect()),
            None => None,
        };
        let tree = adapter.tree(None, None)?;
        let base = self.env.runtime().tree_base_priority();
        Ok(tree
            .plan(base, changed.as_ref())
            .into_iter()
            .map(|(id, priority)| (id, Some(priority)))
            .collect())
    }

    fn dispatch(&self, remote_id: &RemoteId, priority: Option<u32>) -> SyncResult<()> {
        let env = self.env;
        match self.mode {
            BatchMode::Direct => {
                ImportSynchronizer::new(env).run(remote_id)?;
            }
            BatchMode::Delayed => {
                let mut request = JobRequest::new(
                    JobFunction::ImportRecord,
                    env.backend().id,
                    env.model(),
                    JobTarget::Remote(remote_id.clone()),
                )
                .with_session(env.session().clone());
                if let Some(priority) = priority {
                    request = request.with_priority(priority);
                }
                debug!(model = env.model(), remote = %remote_id, ?priority, "delaying import");
                env.enqueue(request)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::ImportHooks;
    use crate::mapper::Mapper;
    use crate::testing::{TestRuntime, CATEGORY, PARTNER};
    use crate::tree::CategoryTree;
    use chrono::TimeZone;
    use shopsync_codec::Record;

    fn partner_batch(rt: &mut TestRuntime) {
        rt.register(
            rt.connector(PARTNER, "res.partner")
                .with_import(Mapper::new().direct("email", "email"), ImportHooks::new())
                .with_batch(BatchStrategy::Plain),
        );
        rt.adapter.insert(
            "1",
            Record::new().with("email", "a@b.c").with("updated_at", "2026/01/01 00:00:00"),
        );
        rt.adapter.insert(
            "2",
            Record::new().with("email", "d@e.f").with("updated_at", "2026/03/01 00:00:00"),
        );
    }

    fn category_batch(rt: &mut TestRuntime) {
        rt.register(
            rt.connector(CATEGORY, "product.category")
                .with_import(Mapper::new().direct("name", "name"), ImportHooks::new())
                .with_batch(BatchStrategy::Tree),
        );
        rt.adapter.set_tree(CategoryTree::new().with_node(
            "1",
            CategoryTree::new()
                .with_leaf("2")
                .with_node("3", CategoryTree::new().with_leaf("4")),
        ));
        for (id, updated) in [
            ("1", "2026/01/01 00:00:00"),
            ("2", "2026/01/01 00:00:00"),
            ("3", "2026/01/01 00:00:00"),
            ("4", "2026/05/01 00:00:00"),
        ] {
            rt.adapter.insert(id, Record::new().with("name", id).with("updated_at", updated));
        }
    }

    #[test]
    fn delayed_plain_batch_enqueues_one_job_per_record() {
        let mut rt = TestRuntime::new();
        partner_batch(&mut rt);
        let env = rt.env(PARTNER);

        let since = Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap();
        let outcome = BatchImporter::new(&env, BatchMode::Delayed)
            .run(&Filters::new(), Some(since))
            .unwrap();

        assert_eq!(outcome.message(), "1 records scheduled for import");
        let jobs = rt.queue.pending().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].1.function, JobFunction::ImportRecord);
        assert_eq!(jobs[0].1.target, JobTarget::Remote("2".into()));
        assert_eq!(rt.store.count("res.partner"), 0);
    }

    #[test]
    fn direct_plain_batch_imports_in_line() {
        let mut rt = TestRuntime::new();
        partner_batch(&mut rt);
        let env = rt.env(PARTNER);

        BatchImporter::new(&env, BatchMode::Direct)
            .run(&Filters::new(), None)
            .unwrap();

        assert!(rt.queue.is_empty());
        assert_eq!(rt.store.count("res.partner"), 2);
    }

    #[test]
    fn tree_batch_prioritizes_by_depth() {
        let mut rt = TestRuntime::new();
        category_batch(&mut rt);
        let env = rt.env(CATEGORY);

        BatchImporter::new(&env, BatchMode::Delayed)
            .run(&Filters::new(), None)
            .unwrap();

        let priorities: Vec<(String, u32)> = rt
            .queue
            .pending()
            .unwrap()
            .into_iter()
            .map(|(_, job)| (job.remote_target().unwrap().to_string(), job.effective_priority()))
            .collect();
        assert_eq!(
            priorities,
            vec![
                ("1".to_string(), 10),
                ("2".to_string(), 11),
                ("3".to_string(), 11),
                ("4".to_string(), 12),
            ]
        );
    }

    #[test]
    fn tree_batch_since_date_enqueues_changed_nodes_only() {
        let mut rt = TestRuntime::new();
        category_batch(&mut rt);
        let env = rt.env(CATEGORY);

        let since = Utc.with_ymd_and_hms(2026, 4, 1, 0, 0, 0).unwrap();
        BatchImporter::new(&env, BatchMode::Delayed)
            .run(&Filters::new(), Some(since))
            .unwrap();

        let jobs = rt.queue.pending().unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs[0].1.target, JobTarget::Remote("4".into()));
        assert_eq!(jobs[0].1.priority, Some(12));
    }

    #[test]
    fn model_without_batch() {
        let mut rt = TestRuntime::new();
        rt.register(rt.connector(PARTNER, "res.partner"));
        let env = rt.env(PARTNER);
        let err = BatchImporter::new(&env, BatchMode::Direct)
            .run(&Filters::new(), None)
            .unwrap_err();
        assert!(matches!(err, SyncError::Unsupported { .. }));
    }
}
