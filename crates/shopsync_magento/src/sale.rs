//! Sale orders and their lines.
//!
//! Both are binding-only models here: invoices and pickings read them to
//! address the remote order and its items.

use crate::adapter::GenericAdapter;
use crate::backend::{SALE_ORDER, SALE_ORDER_LINE};
use shopsync_core::{BindingModel, Environment, ModelConnector, RemoteId, SyncResult, BACKEND_FIELD};
use shopsync_storage::{Domain, LocalId};
use std::sync::Arc;

/// Binding field of a sale order holding the internal remote order id;
/// on a sale order line, the binding of its order.
pub const ORDER_ID_FIELD: &str = "magento_order_id";

/// Sale order connector.
pub fn sale_order_connector() -> ModelConnector {
    let binding = BindingModel::new(SALE_ORDER, "sale.order").with_binding_fields([ORDER_ID_FIELD]);
    ModelConnector::new(binding, |_, transport| {
        Arc::new(GenericAdapter::new("sales_order", transport))
    })
}

/// Sale order line connector.
pub fn sale_order_line_connector() -> ModelConnector {
    let binding =
        BindingModel::new(SALE_ORDER_LINE, "sale.order.line").with_binding_fields([ORDER_ID_FIELD]);
    ModelConnector::new(binding, |_, transport| {
        Arc::new(GenericAdapter::new("sales_order", transport))
    })
}

/// A bound line of a sale order.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    /// Line binding.
    pub binding_id: LocalId,
    /// Remote item id.
    pub remote_id: RemoteId,
    /// Local product of the line.
    pub product_id: Option<LocalId>,
}

/// Bound lines of a sale order binding, on the backend of `env`.
///
/// # Errors
///
/// Propagates store errors.
pub fn order_lines(env: &Environment<'_>, order_binding: LocalId) -> SyncResult<Vec<OrderLine>> {
    let binder = env.binder_for(SALE_ORDER_LINE)?;
    let domain = Domain::new()
        .eq(BACKEND_FIELD, env.backend().id)
        .eq(ORDER_ID_FIELD, order_binding);
    let mut lines = Vec::new();
    for binding_id in env.store().search(SALE_ORDER_LINE, &domain)? {
        let binding = binder.binding(binding_id)?;
        let Some(remote_id) = binding.remote_id else {
            continue;
        };
        let line = env.store().read("sale.order.line", binding.local_id)?;
        lines.push(OrderLine {
            binding_id,
            remote_id,
            product_id: line.get("product_id").and_then(LocalId::from_value),
        });
    }
    Ok(lines)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::Harness;
    use shopsync_codec::Record;
    use shopsync_core::SyncError;

    #[test]
    fn only_bound_lines_of_the_order_are_listed() {
        let h = Harness::new(|_, _| Err(SyncError::transport("offline")));
        let order = h.record("sale.order", Record::new().with("name", "SO001"));
        let order_binding = h.bound(SALE_ORDER, order, "100000001", Record::new().with(ORDER_ID_FIELD, 7i64));
        let other = h.bound(SALE_ORDER, h.record("sale.order", Record::new()), "100000002", Record::new());

        let product = h.record("product.product", Record::new());
        let line = |order_id: LocalId| {
            h.record(
                "sale.order.line",
                Record::new().with("order_id", order_id).with("product_id", product),
            )
        };
        let bound = h.bound(
            SALE_ORDER_LINE,
            line(order),
            "31",
            Record::new().with(ORDER_ID_FIELD, order_binding),
        );
        h.binding(SALE_ORDER_LINE, line(order), Record::new().with(ORDER_ID_FIELD, order_binding));
        h.bound(SALE_ORDER_LINE, line(order), "32", Record::new().with(ORDER_ID_FIELD, other));

        let lines = order_lines(&h.env(SALE_ORDER), order_binding).unwrap();

        assert_eq!(
            lines,
            vec![OrderLine {
                binding_id: bound,
                remote_id: "31".into(),
                product_id: Some(product),
            }]
        );
    }
}
