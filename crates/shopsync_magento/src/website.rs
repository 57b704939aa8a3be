//! Websites.

use crate::adapter::GenericAdapter;
use crate::backend::WEBSITE;
use shopsync_core::{BatchStrategy, BindingModel, ImportHooks, Mapper, ModelConnector};
use std::sync::Arc;

/// Website connector. Imported only; products reference website bindings.
pub fn website_connector() -> ModelConnector {
    let mapper = Mapper::new()
        .required("name", "name")
        .direct("code", "code");
    ModelConnector::new(BindingModel::new(WEBSITE, "shop.website"), |_, transport| {
        Arc::new(GenericAdapter::new("ol_websites", transport))
    })
    .with_import(mapper, ImportHooks::new())
    .with_batch(BatchStrategy::Plain)
}
