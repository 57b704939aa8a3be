//! Customers and their addresses.
//!
//! A partner is exported as a Magento customer. Once bound, it gets an
//! address binding for itself (the default billing and shipping address)
//! and one for each of its contacts; those are exported by their own jobs.

use crate::adapter::{AddressAdapter, GenericAdapter};
use crate::backend::{ADDRESS, PARTNER};
use shopsync_codec::{Record, Value};
use shopsync_core::{
    delay_export, BindingModel, Environment, ExportHooks, JobFunction, Mapper, ModelConnector,
    SyncError, SyncResult,
};
use shopsync_storage::{Domain, LocalId};
use std::sync::Arc;
use tracing::debug;

/// Binding field of an address holding the binding of its customer.
pub const ADDRESS_PARTNER_FIELD: &str = "magento_partner_id";

/// Fields Magento requires on an address.
pub const REQUIRED_ADDRESS_FIELDS: [&str; 5] = ["city", "street", "postcode", "country_id", "telephone"];

/// Splits a full name into Magento first and last names.
///
/// The first word is the first name. A single word is the last name, the
/// first name being `-`.
pub fn split_name(name: &str) -> (String, String) {
    let mut words = name.split_whitespace();
    match (words.next(), words.clone().next()) {
        (Some(first), Some(_)) => (first.to_string(), words.collect::<Vec<_>>().join(" ")),
        _ => ("-".to_string(), name.trim().to_string()),
    }
}

fn map_names(record: &Record, _env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let Some(name) = record.text("name") else {
        return Ok(None);
    };
    let (firstname, lastname) = split_name(name);
    Ok(Some(
        Record::new()
            .with("firstname", firstname)
            .with("lastname", lastname),
    ))
}

fn copy(record: &Record, source: &str, target: &str) -> Record {
    Record::new().with(target, record.get(source).cloned().unwrap_or(Value::Null))
}

/// Local to remote customer mapper.
pub fn partner_export_mapper() -> Mapper {
    Mapper::new()
        .direct("birthday", "dob")
        .direct("created_at", "created_at")
        .direct("updated_at", "updated_at")
        .direct("taxvat", "taxvat")
        .direct("group_id", "group_id")
        .direct("website_id", "website_id")
        .computed("email", |record, _| Ok(Some(copy(record, "email", "email"))))
        .changed_by("names", ["name"], map_names)
        .with_schema([
            "dob",
            "created_at",
            "updated_at",
            "taxvat",
            "group_id",
            "website_id",
            "email",
            "firstname",
            "lastname",
        ])
}

fn validate_partner(_env: &Environment<'_>, data: &Record) -> SyncResult<()> {
    if !data.is_set("email") {
        return Err(SyncError::validation(
            "email",
            "The partner does not have email but it is mandatory for magento",
        ));
    }
    Ok(())
}

fn create_address_bindings(env: &Environment<'_>, binding_id: LocalId, _view: &Record) -> SyncResult<()> {
    let partner = env.binder()?.binding(binding_id)?.local_id;
    let addresses = env.without_export().binder_for(ADDRESS)?;
    let defaults = |is_default: bool| {
        Record::new()
            .with(ADDRESS_PARTNER_FIELD, binding_id)
            .with("is_default_billing", is_default)
            .with("is_default_shipping", is_default)
    };

    let mut created = Vec::new();
    if addresses.bindings_of(partner)?.is_empty() {
        created.push(addresses.create_binding(partner, defaults(true))?);
    }
    let contacts = env
        .store()
        .search("res.partner", &Domain::new().eq("parent_id", partner))?;
    for contact in contacts {
        if addresses.bindings_of(contact)?.is_empty() {
            created.push(addresses.create_binding(contact, defaults(false))?);
        }
    }

    for address in created {
        debug!(partner = %binding_id, address = %address, "address binding created");
        delay_export(
            env.runtime(),
            env.session(),
            env.backend().id,
            ADDRESS,
            address,
            None,
        )?;
    }
    Ok(())
}

/// Customer connector.
pub fn partner_connector() -> ModelConnector {
    let binding = BindingModel::new(PARTNER, "res.partner").with_binding_fields([
        "website_id",
        "group_id",
        "created_at",
        "updated_at",
        "taxvat",
        "birthday",
    ]);
    let hooks = ExportHooks::new()
        .with_validate(validate_partner)
        .with_after_export(create_address_bindings);
    ModelConnector::new(binding, |_, transport| {
        Arc::new(GenericAdapter::new("customer", transport))
    })
    .with_export(partner_export_mapper(), hooks)
    .with_deleter()
    .export_on_event(JobFunction::ExportRecord)
}

fn address_partner(record: &Record) -> SyncResult<LocalId> {
    record
        .get(ADDRESS_PARTNER_FIELD)
        .and_then(LocalId::from_value)
        .ok_or_else(|| SyncError::mapping("the address has no customer binding"))
}

fn map_partner(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let partner = address_partner(record)?;
    let remote = env.binder_for(PARTNER)?.to_remote(partner)?.ok_or_else(|| {
        SyncError::mapping(format!("The customer binding {} is not exported.", partner))
    })?;
    let remote = match remote.as_str().parse::<i64>() {
        Ok(id) => Value::Integer(id),
        Err(_) => Value::from(remote),
    };
    Ok(Some(Record::new().with("partner_id", remote)))
}

fn map_location(record: &Record, _env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let mut data = copy(record, "zip", "postcode");
    data.merge(copy(record, "city", "city"));
    Ok(Some(data))
}

fn map_telephone(record: &Record, _env: &Environment<'_>) -> SyncResult<Option<Record>> {
    let phone = [record.get("phone"), record.get("mobile")]
        .into_iter()
        .flatten()
        .find(|v| v.is_truthy())
        .cloned()
        .unwrap_or(Value::Null);
    Ok(Some(Record::new().with("telephone", phone)))
}

fn related_field(
    env: &Environment<'_>,
    record: &Record,
    field: &str,
    model: &str,
    related: &str,
) -> SyncResult<Option<Value>> {
    let Some(id) = record.get(field).and_then(LocalId::from_value) else {
        return Ok(None);
    };
    Ok(env.store().read(model, id)?.get(related).cloned())
}

fn map_country(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    Ok(related_field(env, record, "country_id", "res.country", "code")?
        .map(|code| Record::new().with("country_id", code)))
}

fn map_region(record: &Record, env: &Environment<'_>) -> SyncResult<Option<Record>> {
    Ok(related_field(env, record, "state_id", "res.country.state", "name")?
        .map(|name| Record::new().with("region", name)))
}

fn map_street(record: &Record, _env: &Environment<'_>) -> SyncResult<Option<Record>> {
    Ok(record
        .get("street")
        .filter(|street| street.is_truthy())
        .map(|street| Record::new().with("street", Value::Array(vec![street.clone()]))))
}

/// Local to remote address mapper.
pub fn address_export_mapper() -> Mapper {
    Mapper::new()
        .direct("is_default_billing", "is_default_billing")
        .direct("is_default_shipping", "is_default_shipping")
        .computed("partner", map_partner)
        .computed("location", map_location)
        .computed("names", map_names)
        .computed("telephone", map_telephone)
        .computed("country", map_country)
        .computed("region", map_region)
        .computed("street", map_street)
        .with_schema([
            "is_default_billing",
            "is_default_shipping",
            "partner_id",
            "postcode",
            "city",
            "firstname",
            "lastname",
            "telephone",
            "country_id",
            "region",
            "street",
        ])
}

fn validate_address(_env: &Environment<'_>, data: &Record) -> SyncResult<()> {
    match REQUIRED_ADDRESS_FIELDS.iter().find(|f| !data.is_set(f)) {
        Some(field) => Err(SyncError::validation(
            *field,
            format!("The address does not contain {} but it is mandatory for magento", field),
        )),
        None => Ok(()),
    }
}

/// Address connector.
pub fn address_connector() -> ModelConnector {
    let binding = BindingModel::new(ADDRESS, "res.partner").with_binding_fields([
        ADDRESS_PARTNER_FIELD,
        "is_default_billing",
        "is_default_shipping",
    ]);
    let hooks = ExportHooks::new()
        .with_dependencies(|env, record| env.export_dependency(PARTNER, address_partner(record)?))
        .with_validate(validate_address);
    ModelConnector::new(binding, |_, transport| Arc::new(AddressAdapter::new(transport)))
        .with_export(address_export_mapper(), hooks)
        .with_deleter()
        .export_on_event(JobFunction::ExportRecord)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use proptest::prelude::*;
    use shopsync_core::{
        field_set, DeleteSynchronizer, ExportSynchronizer, JobTarget, LocalStore, SyncOutcome,
    };

    fn harness() -> Harness {
        Harness::new(|method, _| match method {
            "customer.create" => Ok(Value::Integer(42)),
            "customer.update" | "customer_address.update" => Ok(Value::Bool(true)),
            "customer_address.create" => Ok(Value::Integer(77)),
            "customer_address.delete" => Ok(Value::Bool(true)),
            _ => Err(SyncError::remote_fault(1, format!("unexpected call {}", method))),
        })
    }

    fn address(h: &Harness, parent: Option<LocalId>) -> LocalId {
        let france = h.record("res.country", Record::new().with("code", "FR"));
        let rhone = h.record("res.country.state", Record::new().with("name", "Rhône"));
        let mut values = Record::new()
            .with("name", "Marie Curie")
            .with("street", "1 rue de la Paix")
            .with("zip", "69001")
            .with("city", "Lyon")
            .with("mobile", "0600000000")
            .with("country_id", france)
            .with("state_id", rhone);
        if let Some(parent) = parent {
            values.insert("parent_id", parent);
        }
        h.record("res.partner", values)
    }

    #[test]
    fn names_are_split_on_the_first_word() {
        assert_eq!(split_name("Ada Lovelace"), ("Ada".into(), "Lovelace".into()));
        assert_eq!(
            split_name("Jean  Paul Sartre"),
            ("Jean".into(), "Paul Sartre".into())
        );
        assert_eq!(split_name("Plato"), ("-".into(), "Plato".into()));
    }

    proptest! {
        #[test]
        fn split_names_keep_every_word(name in "[A-Za-z]{1,8}( {1,2}[A-Za-z'-]{1,8}){0,3}") {
            let (first, last) = split_name(&name);
            let words: Vec<&str> = name.split_whitespace().collect();

            prop_assert!(!last.is_empty());
            if words.len() == 1 {
                prop_assert_eq!(first.as_str(), "-");
                prop_assert_eq!(last.as_str(), words[0]);
            } else {
                prop_assert_eq!(first.as_str(), words[0]);
                prop_assert_eq!(last, words[1..].join(" "));
            }
        }
    }

    #[test]
    fn customer_mapper_rejects_fields_outside_the_customer_api() {
        let h = harness();
        let env = h.env(PARTNER);
        let record = Record::new().with("name", "Ada Lovelace").with("email", "ada@example.com");

        let data = partner_export_mapper().convert(&record, None, &env).unwrap();
        assert_eq!(data.text("firstname"), Some("Ada"));

        let err = partner_export_mapper()
            .computed("nickname", |_, _| Ok(Some(Record::new().with("nickname", "Ada"))))
            .convert(&record, None, &env)
            .unwrap_err();
        assert!(err.to_string().contains("nickname"));
    }

    #[test]
    fn partner_export_creates_address_bindings() {
        let h = harness();
        let partner = address(&h, None);
        h.store
            .write("res.partner", partner, Record::new().with("email", "marie@example.com"))
            .unwrap();
        let contact = address(&h, Some(partner));
        let binding = h.binding(PARTNER, partner, Record::new().with("website_id", 1i64));

        let env = h.env(PARTNER);
        let outcome = ExportSynchronizer::new(&env).run(binding, None).unwrap();

        assert_eq!(
            outcome,
            SyncOutcome::Done("Record exported with ID 42 on Magento.".into())
        );
        let (method, params) = h.transport.last_call().unwrap();
        assert_eq!(method, "customer.create");
        assert_eq!(params[0].get("firstname"), Some(&Value::from("Marie")));
        assert_eq!(params[0].get("lastname"), Some(&Value::from("Curie")));
        assert_eq!(params[0].get("website_id"), Some(&Value::Integer(1)));

        let addresses = env.binder_for(ADDRESS).unwrap();
        let own = addresses.bindings_of(partner).unwrap();
        let other = addresses.bindings_of(contact).unwrap();
        assert_eq!((own.len(), other.len()), (1, 1));
        let own = addresses.binding(own[0]).unwrap();
        assert_eq!(own.extra.get("is_default_billing"), Some(&Value::Bool(true)));
        assert_eq!(own.extra.get(ADDRESS_PARTNER_FIELD), Some(&Value::from(binding)));
        let other = addresses.binding(other[0]).unwrap();
        assert_eq!(other.extra.get("is_default_shipping"), Some(&Value::Bool(false)));

        let targets: Vec<JobTarget> = h
            .queue
            .pending()
            .unwrap()
            .into_iter()
            .map(|(_, job)| job.target)
            .collect();
        assert_eq!(
            targets,
            vec![JobTarget::Local(own.id), JobTarget::Local(other.id)]
        );

        ExportSynchronizer::new(&env).run(binding, None).unwrap();
        assert_eq!(h.queue.len(), 2);
    }

    #[test]
    fn partner_without_email_is_not_exported() {
        let h = harness();
        let partner = h.record("res.partner", Record::new().with("name", "Nobody"));
        let binding = h.binding(PARTNER, partner, Record::new());

        let err = ExportSynchronizer::new(&h.env(PARTNER))
            .run(binding, None)
            .unwrap_err();

        assert_eq!(
            err,
            SyncError::validation("email", "The partner does not have email but it is mandatory for magento")
        );
        assert!(h.transport.calls().is_empty());
    }

    #[test]
    fn name_change_sends_names_and_email_only() {
        let h = harness();
        let partner = h.record(
            "res.partner",
            Record::new().with("name", "Ada Lovelace").with("email", "ada@example.com"),
        );
        let binding = h.bound(PARTNER, partner, "42", Record::new().with("taxvat", "FR1"));

        ExportSynchronizer::new(&h.env(PARTNER))
            .run(binding, Some(&field_set(["name"])))
            .unwrap();

        let (method, params) = h.transport.last_call().unwrap();
        assert_eq!(method, "customer.update");
        assert_eq!(params[0], Value::from("42"));
        let keys: Vec<&str> = params[1].as_map().unwrap().keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["email", "firstname", "lastname"]);
    }

    #[test]
    fn address_export_brings_its_customer_first() {
        let h = harness();
        let partner = h.record(
            "res.partner",
            Record::new().with("name", "Marie Curie").with("email", "marie@example.com"),
        );
        let partner_binding = h.binding(PARTNER, partner, Record::new());
        let home = address(&h, Some(partner));
        let binding = h.binding(
            ADDRESS,
            home,
            Record::new()
                .with(ADDRESS_PARTNER_FIELD, partner_binding)
                .with("is_default_billing", false)
                .with("is_default_shipping", true),
        );

        let env = h.env(ADDRESS);
        ExportSynchronizer::new(&env).run(binding, None).unwrap();

        assert_eq!(h.remote_id(PARTNER, partner_binding).as_deref(), Some("42"));
        assert_eq!(h.remote_id(ADDRESS, binding).as_deref(), Some("77"));
        let (method, params) = h.transport.last_call().unwrap();
        assert_eq!(method, "customer_address.create");
        assert_eq!(params[0], Value::Integer(42));
        let data = &params[1];
        assert_eq!(data.get("postcode"), Some(&Value::from("69001")));
        assert_eq!(data.get("telephone"), Some(&Value::from("0600000000")));
        assert_eq!(data.get("country_id"), Some(&Value::from("FR")));
        assert_eq!(data.get("region"), Some(&Value::from("Rhône")));
        assert_eq!(data.get("street"), Some(&Value::Array(vec!["1 rue de la Paix".into()])));
        assert_eq!(data.get("is_default_shipping"), Some(&Value::Bool(true)));
    }

    #[test]
    fn address_without_postcode_is_rejected() {
        let h = harness();
        let partner = h.record("res.partner", Record::new().with("email", "x@example.com"));
        let partner_binding = h.bound(PARTNER, partner, "42", Record::new());
        let home = address(&h, Some(partner));
        h.store
            .write("res.partner", home, Record::new().with("zip", Value::Null))
            .unwrap();
        let binding = h.binding(ADDRESS, home, Record::new().with(ADDRESS_PARTNER_FIELD, partner_binding));

        let err = ExportSynchronizer::new(&h.env(ADDRESS))
            .run(binding, None)
            .unwrap_err();

        assert_eq!(
            err,
            SyncError::validation(
                "postcode",
                "The address does not contain postcode but it is mandatory for magento"
            )
        );
        assert!(h.transport.calls().is_empty());
        assert_eq!(h.remote_id(ADDRESS, binding), None);
    }

    #[test]
    fn address_is_deleted_remotely() {
        let h = harness();
        let outcome = DeleteSynchronizer::new(&h.env(ADDRESS)).run(&"77".into()).unwrap();

        assert!(matches!(outcome, SyncOutcome::Done(_)));
        assert_eq!(
            h.transport.last_call(),
            Some(("customer_address.delete".to_string(), vec![Value::from("77")]))
        );
    }
}
