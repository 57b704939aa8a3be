//! Binding round trips and uniqueness against the in-memory store.

use proptest::prelude::*;
use shopsync_codec::Record;
use shopsync_core::{ErrorKind, RemoteId};
use shopsync_magento::{CATEGORY, PARTNER};
use shopsync_testkit::prelude::*;

proptest! {
    #![proptest_config(Thoroughness::Quick.config())]

    #[test]
    fn bound_remote_id_resolves_both_ways(remote in remote_id_strategy()) {
        let shop = TestShop::new();
        let partner = shop.record("res.partner", Record::new().with("name", "Ada"));
        let binding = shop.bound(PARTNER, partner, remote.as_str(), Record::new());

        let binder = shop.env(PARTNER).binder().unwrap();
        prop_assert_eq!(binder.to_remote(binding).unwrap(), Some(remote.clone()));
        prop_assert_eq!(binder.to_local(&remote, false).unwrap(), Some(binding));
        prop_assert_eq!(binder.to_local(&remote, true).unwrap(), Some(partner));
        prop_assert_eq!(binder.to_remote_wrapped(partner).unwrap(), Some(remote));
    }
}

#[test]
fn binding_twice_to_the_same_id_is_idempotent() {
    let shop = TestShop::new();
    let partner = shop.record("res.partner", Record::new());
    let binding = shop.bound(PARTNER, partner, "42", Record::new());
    let binder = shop.env(PARTNER).binder().unwrap();
    let first = binder.binding(binding).unwrap().sync_date;

    binder.bind(&RemoteId::from("42"), binding).unwrap();

    let again = binder.binding(binding).unwrap();
    assert_eq!(again.remote_id, Some(RemoteId::from("42")));
    assert!(again.sync_date >= first);
    assert_eq!(binder.to_local(&"42".into(), true).unwrap(), Some(partner));
}

#[test]
fn remote_id_is_unique_per_backend_and_model() {
    let shop = TestShop::new();
    let ada = shop.record("res.partner", Record::new());
    let bob = shop.record("res.partner", Record::new());
    shop.bound(PARTNER, ada, "42", Record::new());
    let other = shop.binding(PARTNER, bob, Record::new());

    let err = shop
        .env(PARTNER)
        .binder()
        .unwrap()
        .bind(&"42".into(), other)
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::ConstraintViolation);
    assert!(err.is_retryable());
    let category = shop.record("product.category", Record::new());
    shop.bound(CATEGORY, category, "42", Record::new());
}

#[test]
fn unknown_remote_id_resolves_to_nothing() {
    let shop = TestShop::new();

    let binder = shop.env(PARTNER).binder().unwrap();

    assert_eq!(binder.to_local(&"404".into(), true).unwrap(), None);
}
