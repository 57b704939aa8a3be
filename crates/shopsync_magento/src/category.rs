//! Product categories.
//!
//! Imported from the remote tree, parents first. A category whose parent
//! is not bound yet imports the parent in-line before mapping itself.

use crate::adapter::CategoryAdapter;
use crate::backend::CATEGORY;
use shopsync_codec::{Record, Value};
use shopsync_core::{
    BatchStrategy, BindingModel, Environment, ImportHooks, Mapper, ModelConnector, RemoteId,
    SyncError, SyncResult,
};
use std::sync::Arc;

/// Parent id of the remote root categories.
pub const ROOT_PARENT: &str = "0";

/// Binding field holding the binding of the parent category.
pub const PARENT_BINDING_FIELD: &str = "magento_parent_id";

/// Remote parent of a category record, `None` for a root.
pub fn remote_parent(record: &Record) -> Option<RemoteId> {
    record
        .get("parent_id")
        .and_then(RemoteId::from_value)
        .filter(|id| id.as_str() != ROOT_PARENT)
}

fn is_root_level(record: &Record) -> bool {
    record.get("level").and_then(Value::as_integer) == Some(0)
}

fn map_name(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    if is_root_level(record) {
        return Ok(Some(Record::new().with("name", env.backend().name.as_str())));
    }
    Ok(record
        .get("name")
        .filter(|name| name.is_truthy())
        .map(|name| Record::new().with("name", name.clone())))
}

fn map_parent(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let Some(parent) = remote_parent(record) else {
        return Ok(None);
    };
    let binder = env.binder_for(CATEGORY)?;
    let binding = binder.to_local(&parent, false)?.ok_or_else(|| {
        SyncError::mapping(format!(
            "The product category with magento id {} is not imported.",
            parent
        ))
    })?;
    let local = binder.binding(binding)?.local_id;
    Ok(Some(
        Record::new()
            .with("parent_id", local)
            .with(PARENT_BINDING_FIELD, binding),
    ))
}

/// Remote to local category mapper.
pub fn category_import_mapper() -> Mapper {
    Mapper::new()
        .direct("description", "description")
        .computed("name", map_name)
        .computed("parent", map_parent)
}

/// Category connector.
pub fn category_connector() -> ModelConnector {
    let binding = BindingModel::new(CATEGORY, "product.category")
        .with_binding_fields([PARENT_BINDING_FIELD]);
    let hooks = ImportHooks::new()
        .with_dependencies(|env, record| match remote_parent(record) {
            Some(parent) => env.import_dependency(CATEGORY, &parent),
            None => Ok(()),
        })
        .with_translations();
    ModelConnector::new(binding, |_, transport| Arc::new(CategoryAdapter::new(transport)))
        .with_import(category_import_mapper(), hooks)
        .with_batch(BatchStrategy::Tree)
        .with_translatable(["name", "description"])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{map_of, Harness};
    use shopsync_core::{
        BatchImporter, BatchMode, Filters, ImportSynchronizer, JobFunction, JobTarget, SyncOutcome,
    };
    use shopsync_storage::LocalStore;
    use std::collections::BTreeMap;

    fn remote_categories() -> BTreeMap<&'static str, Value> {
        BTreeMap::from([
            (
                "1",
                map_of(&[
                    ("category_id", "1".into()),
                    ("parent_id", "0".into()),
                    ("level", "0".into()),
                    ("name", "Root Catalog".into()),
                ]),
            ),
            (
                "2",
                map_of(&[
                    ("category_id", "2".into()),
                    ("parent_id", "1".into()),
                    ("level", "1".into()),
                    ("name", "Shoes".into()),
                    ("description", "All shoes".into()),
                ]),
            ),
            (
                "3",
                map_of(&[
                    ("category_id", "3".into()),
                    ("parent_id", "2".into()),
                    ("level", "2".into()),
                    ("name", "Sneakers".into()),
                ]),
            ),
        ])
    }

    fn harness() -> Harness {
        let categories = remote_categories();
        Harness::new(move |method, params| match method {
            "catalog_category.info" => {
                let id = params[0].as_text().unwrap_or_default();
                let mut record = categories
                    .get(id)
                    .cloned()
                    .ok_or_else(|| SyncError::remote_fault(102, "Category not exists."))?;
                if params[1] == Value::from("2") {
                    if let Value::Map(fields) = &mut record {
                        fields.insert("name".into(), Value::from(format!("fr {}", id)));
                    }
                }
                Ok(record)
            }
            _ => Err(SyncError::remote_fault(1, format!("unexpected call {}", method))),
        })
    }

    #[test]
    fn import_brings_missing_parents_first() {
        let h = harness();
        let env = h.env(CATEGORY);

        let mut importer = ImportSynchronizer::new(&env);
        importer.run(&"3".into()).unwrap();
        let child = importer.binding_id().unwrap();

        let binder = env.binder().unwrap();
        let parent = binder.to_local(&"2".into(), false).unwrap().unwrap();
        let root = binder.to_local(&"1".into(), false).unwrap().unwrap();

        let child_binding = binder.binding(child).unwrap();
        assert_eq!(
            child_binding.extra.get(PARENT_BINDING_FIELD),
            Some(&Value::from(parent))
        );
        let child_record = h.store.read("product.category", child_binding.local_id).unwrap();
        assert_eq!(
            child_record.get("parent_id"),
            Some(&Value::from(binder.binding(parent).unwrap().local_id))
        );

        let root_record = h
            .store
            .read("product.category", binder.binding(root).unwrap().local_id)
            .unwrap();
        assert_eq!(root_record.text("name"), Some("Demo shop"));
        assert!(root_record.get("parent_id").is_none());
    }

    #[test]
    fn translations_are_imported_per_storeview() {
        let h = harness();
        let env = h.env(CATEGORY);

        ImportSynchronizer::new(&env).run(&"2".into()).unwrap();

        let local = env.binder().unwrap().to_local(&"2".into(), true).unwrap().unwrap();
        let translated = h.store.read_translation("product.category", local, "fr_FR").unwrap();
        assert_eq!(translated.text("name"), Some("fr 2"));
        assert_eq!(translated.text("description"), Some("All shoes"));
        assert!(translated.get("parent_id").is_none());
    }

    #[test]
    fn reimport_updates_in_place() {
        let h = harness();
        let env = h.env(CATEGORY);

        ImportSynchronizer::new(&env).run(&"2".into()).unwrap();
        let outcome = ImportSynchronizer::new(&env).run(&"2".into()).unwrap();

        assert!(matches!(outcome, SyncOutcome::Done(_)));
        assert_eq!(h.store.count("product.category"), 2);
        assert_eq!(h.store.count(CATEGORY), 2);
    }

    #[test]
    fn unbound_parent_is_a_mapping_error() {
        let h = harness();
        let env = h.env(CATEGORY);
        let record = Record::new().with("parent_id", "2").with("name", "Sneakers");

        let err = category_import_mapper().convert(&record, None, &env).unwrap_err();

        assert_eq!(
            err,
            SyncError::mapping("The product category with magento id 2 is not imported.")
        );
    }

    #[test]
    fn root_parent_is_not_a_reference() {
        assert_eq!(remote_parent(&Record::new().with("parent_id", "0")), None);
        assert_eq!(remote_parent(&Record::new()), None);
        assert_eq!(
            remote_parent(&Record::new().with("parent_id", 4i64)),
            Some(RemoteId::from("4"))
        );
    }

    #[test]
    fn tree_batch_is_prioritized() {
        let tree = map_of(&[
            ("category_id", "1".into()),
            (
                "children",
                Value::Array(vec![
                    map_of(&[("category_id", "2".into()), ("children", Value::Array(vec![]))]),
                    map_of(&[
                        ("category_id", "3".into()),
                        (
                            "children",
                            Value::Array(vec![map_of(&[("category_id", "4".into())])]),
                        ),
                    ]),
                ]),
            ),
        ]);
        let h = Harness::new(move |_, _| Ok(tree.clone()));
        let env = h.env(CATEGORY);

        BatchImporter::new(&env, BatchMode::Delayed)
            .run(&Filters::new(), None)
            .unwrap();

        let jobs: Vec<(String, Option<u32>)> = h
            .queue
            .pending()
            .unwrap()
            .into_iter()
            .inspect(|(_, job)| assert_eq!(job.function, JobFunction::ImportRecord))
            .map(|(_, job)| match job.target {
                JobTarget::Remote(id) => (id.to_string(), job.priority),
                other => panic!("unexpected target {}", other),
            })
            .collect();
        assert_eq!(
            jobs,
            vec![
                ("1".to_string(), Some(10)),
                ("2".to_string(), Some(11)),
                ("3".to_string(), Some(11)),
                ("4".to_string(), Some(12)),
            ]
        );
        assert_eq!(h.transport.methods(), vec!["catalog_category.tree"]);
    }
}
