//! Products.

use crate::adapter::ProductAdapter;
use crate::backend::{CATEGORY, PRODUCT, WEBSITE};
use shopsync_codec::{Record, Value};
use shopsync_core::{
    BatchStrategy, BindingModel, Environment, ImportHooks, Mapper, ModelConnector, RemoteId,
    SyncError, SyncResult,
};
use shopsync_storage::LocalId;
use std::sync::Arc;

/// Remote product types the connector imports.
pub const SUPPORTED_PRODUCT_TYPES: [&str; 1] = ["simple"];

fn remote_ids(record: &Record, field: &str) -> Vec<RemoteId> {
    record
        .get(field)
        .and_then(Value::as_array)
        .map(|ids| ids.iter().filter_map(RemoteId::from_value).collect())
        .unwrap_or_default()
}

fn map_type(record: &Record, _env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let local_type = match record.text("type_id") {
        Some("simple") => "product",
        _ => return Ok(None),
    };
    Ok(Some(Record::new().with("type", local_type)))
}

fn map_websites(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let binder = env.binder_for(WEBSITE)?;
    let mut websites = Vec::new();
    for remote_id in remote_ids(record, "websites") {
        if let Some(binding) = binder.to_local(&remote_id, false)? {
            websites.push(Value::from(binding));
        }
    }
    Ok(Some(Record::new().with("website_ids", Value::Array(websites))))
}

fn map_categories(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let binder = env.binder_for(CATEGORY)?;
    let mut locals: Vec<LocalId> = Vec::new();
    for remote_id in remote_ids(record, "categories") {
        let local = binder.to_local(&remote_id, true)?.ok_or_else(|| {
            SyncError::mapping(format!(
                "The product category with magento id {} is not imported.",
                remote_id
            ))
        })?;
        locals.push(local);
    }
    let mut locals = locals.into_iter();
    let main = locals.next().or(env.backend().default_category_id);
    let Some(main) = main else {
        return Ok(None);
    };
    let others: Vec<Value> = locals.map(Value::from).collect();
    Ok(Some(
        Record::new()
            .with("categ_id", main)
            .with("categ_ids", Value::Array(others)),
    ))
}

/// Remote to local product mapper.
pub fn product_import_mapper() -> Mapper {
    Mapper::new()
        .direct("name", "name")
        .direct("description", "description")
        .direct("weight", "weight")
        .direct("price", "list_price")
        .direct("cost", "standard_price")
        .direct("short_description", "description_sale")
        .direct("sku", "default_code")
        .direct("type_id", "product_type")
        .direct("created_at", "created_at")
        .direct("updated_at", "updated_at")
        .computed("type", map_type)
        .computed("website_ids", map_websites)
        .computed("categories", map_categories)
}

fn validate_product_type(_env: &Environment<'_>, data: &Record) -> SyncResult<()> {
    match data.text("product_type") {
        Some(kind) if SUPPORTED_PRODUCT_TYPES.contains(&kind) => Ok(()),
        other => Err(SyncError::validation(
            "product_type",
            format!(
                "The product type '{}' is not yet supported in the connector.",
                other.unwrap_or_default()
            ),
        )),
    }
}

/// Product connector.
pub fn product_connector() -> ModelConnector {
    let binding = BindingModel::new(PRODUCT, "product.product").with_binding_fields([
        "website_ids",
        "created_at",
        "updated_at",
        "product_type",
    ]);
    let hooks = ImportHooks::new()
        .with_dependencies(|env, record| {
            for category in remote_ids(record, "categories") {
                env.import_dependency(CATEGORY, &category)?;
            }
            Ok(())
        })
        .with_validate(validate_product_type)
        .with_translations()
        .with_main_image();
    ModelConnector::new(binding, |_, transport| Arc::new(ProductAdapter::new(transport)))
        .with_import(product_import_mapper(), hooks)
        .with_batch(BatchStrategy::Plain)
        .with_translatable(["name", "description", "description_sale"])
}
