//! Customer and address exports through the job queue.

use shopsync_codec::{Record, Value};
use shopsync_core::{
    field_set, on_record_create, on_record_unlink, on_record_write, BackendKind, BindingModel,
    ExportHooks, ExportSynchronizer, FieldSet, Mapper, ModelConnector, SkipReason, SyncError,
    SyncOutcome,
};
use shopsync_magento::{
    magento_registry, GenericAdapter, ADDRESS, ADDRESS_PARTNER_FIELD, PARTNER,
};
use shopsync_storage::{LocalId, LocalStore};
use shopsync_testkit::prelude::*;
use std::sync::Arc;

fn customer(shop: &TestShop) -> LocalId {
    let france = shop.record("res.country", Record::new().with("code", "FR"));
    shop.record(
        "res.partner",
        Record::new()
            .with("name", "Marie Curie")
            .with("email", "marie@example.com")
            .with("street", "1 rue de la Paix")
            .with("zip", "69001")
            .with("city", "Lyon")
            .with("phone", "0400000000")
            .with("country_id", france),
    )
}

#[test]
fn new_customer_is_exported_with_its_address() {
    let shop = TestShop::new();
    let partner = customer(&shop);
    let binding = shop.binding(PARTNER, partner, Record::new().with("website_id", 1i64));

    let handles = on_record_create(&shop.runtime, &shop.session(), PARTNER, binding, &FieldSet::new()).unwrap();
    assert_eq!(handles.len(), 1);
    let reports = shop.drain();

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|(_, _, result)| result.is_ok()));
    assert_eq!(shop.magento.methods(), vec!["customer.create", "customer_address.create"]);

    let remote = shop.remote_id(PARTNER, binding).unwrap();
    let created = shop.magento.record("customer", remote.as_str()).unwrap();
    assert_eq!(created.text("email"), Some("marie@example.com"));
    assert_eq!(created.text("firstname"), Some("Marie"));
    assert_eq!(created.text("lastname"), Some("Curie"));
    assert_eq!(created.integer("website_id"), Some(1));

    let address = shop.magento.records("customer_address").remove(0);
    assert_eq!(address.get("customer_id"), Some(&Value::Integer(1)));
    assert_eq!(address.text("postcode"), Some("69001"));
    assert_eq!(address.text("country_id"), Some("FR"));
    assert_eq!(address.text("telephone"), Some("0400000000"));
    assert_eq!(address.get("street"), Some(&Value::Array(vec!["1 rue de la Paix".into()])));
    assert_eq!(address.get("is_default_billing"), Some(&Value::Bool(true)));
}

#[test]
fn name_change_sends_the_names_and_the_email() {
    let shop = TestShop::new();
    let partner = customer(&shop);
    shop.magento.insert(
        "customer",
        "7",
        Record::new()
            .with("email", "marie@example.com")
            .with("firstname", "M")
            .with("group_id", 3i64),
    );
    shop.bound(PARTNER, partner, "7", Record::new());
    shop.store
        .write("res.partner", partner, Record::new().with("name", "Marie Sklodowska Curie"))
        .unwrap();

    let handles = on_record_write(&shop.runtime, &shop.session(), "res.partner", partner, &field_set(["name"])).unwrap();
    assert_eq!(handles.len(), 1);
    shop.drain();

    let update = shop.magento.calls_to("customer.update").remove(0);
    let keys: Vec<&str> = update[1].as_map().unwrap().keys().map(String::as_str).collect();
    assert_eq!(keys, vec!["email", "firstname", "lastname"]);
    let stored = shop.magento.record("customer", "7").unwrap();
    assert_eq!(stored.text("lastname"), Some("Sklodowska Curie"));
    assert_eq!(stored.integer("group_id"), Some(3));
}

#[test]
fn importing_sessions_export_nothing() {
    let shop = TestShop::new();
    let partner = customer(&shop);
    shop.bound(PARTNER, partner, "7", Record::new());
    let session = shop.session().with_no_export(true);

    let handles = on_record_write(&shop.runtime, &session, "res.partner", partner, &field_set(["name"])).unwrap();

    assert!(handles.is_empty());
    assert!(shop.queue.is_empty());
}

#[test]
fn narrowed_update_without_mapped_field_is_skipped() {
    let mut registry = magento_registry();
    let binding_model = BindingModel::new("magento.note", "note");
    registry.register(
        BackendKind::new("magento"),
        ModelConnector::new(binding_model, |_, transport| Arc::new(GenericAdapter::new("note", transport)))
            .with_export(Mapper::new().direct("title", "title"), ExportHooks::new()),
    );
    let shop = TestShop::with_registry(registry, &demo_config());
    let note = shop.record("note", Record::new().with("title", "Hello").with("body", "World"));
    let binding = shop.bound("magento.note", note, "5", Record::new());

    let outcome = ExportSynchronizer::new(&shop.env("magento.note"))
        .run(binding, Some(&field_set(["body"])))
        .unwrap();

    assert_eq!(outcome, SyncOutcome::Skipped(SkipReason::NothingToDo));
    assert!(shop.magento.calls().is_empty());
    assert_eq!(shop.remote_id("magento.note", binding).unwrap().as_str(), "5");
}

#[test]
fn address_without_postcode_is_not_sent() {
    let shop = TestShop::new();
    let partner = customer(&shop);
    let partner_binding = shop.bound(PARTNER, partner, "7", Record::new());
    let home = shop.record(
        "res.partner",
        Record::new()
            .with("name", "Pierre Curie")
            .with("parent_id", partner)
            .with("street", "2 rue Cuvier")
            .with("city", "Paris")
            .with("mobile", "0600000000"),
    );
    let binding = shop.binding(ADDRESS, home, Record::new().with(ADDRESS_PARTNER_FIELD, partner_binding));

    let err = ExportSynchronizer::new(&shop.env(ADDRESS)).run(binding, None).unwrap_err();

    assert_eq!(
        err,
        SyncError::validation("postcode", "The address does not contain postcode but it is mandatory for magento")
    );
    assert!(shop.magento.calls_to("customer_address.create").is_empty());
    assert_eq!(shop.remote_id(ADDRESS, binding), None);
}

#[test]
fn unlinked_address_is_deleted_remotely() {
    let shop = TestShop::new();
    let partner = customer(&shop);
    let partner_binding = shop.bound(PARTNER, partner, "7", Record::new());
    shop.magento.insert("customer_address", "70", Record::new().with("customer_id", 7i64));
    let binding = shop.bound(
        ADDRESS,
        partner,
        "70",
        Record::new().with(ADDRESS_PARTNER_FIELD, partner_binding),
    );

    let handle = on_record_unlink(&shop.runtime, &shop.session(), ADDRESS, binding).unwrap();
    assert!(handle.is_some());
    let reports = shop.drain();

    let outcome = reports[0].2.as_ref().unwrap();
    assert_eq!(outcome.message(), "Record 70 deleted on Magento");
    assert_eq!(shop.magento.count("customer_address"), 0);
}

#[test]
fn transport_failure_is_reported_as_retryable() {
    let shop = TestShop::new();
    let partner = customer(&shop);
    let binding = shop.binding(PARTNER, partner, Record::new());
    shop.magento.fail_once("customer.create", SyncError::transport("connection reset"));

    on_record_create(&shop.runtime, &shop.session(), PARTNER, binding, &FieldSet::new()).unwrap();
    let reports = shop.drain();

    let failure = reports[0].2.as_ref().unwrap_err();
    assert!(failure.retryable);
    assert_eq!(shop.remote_id(PARTNER, binding), None);

    on_record_create(&shop.runtime, &shop.session(), PARTNER, binding, &FieldSet::new()).unwrap();
    let reports = shop.drain();
    assert!(reports.iter().all(|(_, _, result)| result.is_ok()));
    assert!(shop.remote_id(PARTNER, binding).is_some());
}
