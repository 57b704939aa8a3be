//! Magento backend: model names and connector registration.

use crate::category::category_connector;
use crate::invoice::invoice_connector;
use crate::partner::{address_connector, partner_connector};
use crate::picking::picking_connector;
use crate::product::product_connector;
use crate::sale::{sale_order_connector, sale_order_line_connector};
use crate::website::website_connector;
use shopsync_core::{BackendKind, Registry};
use tracing::debug;

/// Service name of Magento backends.
pub const MAGENTO: &str = "magento";

/// Websites.
pub const WEBSITE: &str = "magento.website";
/// Product categories.
pub const CATEGORY: &str = "magento.product.category";
/// Products.
pub const PRODUCT: &str = "magento.product.product";
/// Customers.
pub const PARTNER: &str = "magento.res.partner";
/// Customer addresses.
pub const ADDRESS: &str = "magento.address";
/// Sale orders.
pub const SALE_ORDER: &str = "magento.sale.order";
/// Sale order lines.
pub const SALE_ORDER_LINE: &str = "magento.sale.order.line";
/// Invoices.
pub const INVOICE: &str = "magento.account.invoice";
/// Delivery orders.
pub const PICKING: &str = "magento.stock.picking";

/// Every binding model of the Magento connector.
pub const MAGENTO_MODELS: [&str; 9] = [
    WEBSITE,
    CATEGORY,
    PRODUCT,
    PARTNER,
    ADDRESS,
    SALE_ORDER,
    SALE_ORDER_LINE,
    INVOICE,
    PICKING,
];

/// Unversioned Magento backend kind; its connectors serve every version.
pub fn magento_kind() -> BackendKind {
    BackendKind::new(MAGENTO)
}

/// Registers the Magento connectors.
pub fn register_magento(registry: &mut Registry) -> &mut Registry {
    let kind = magento_kind();
    for connector in [
        website_connector(),
        category_connector(),
        product_connector(),
        partner_connector(),
        address_connector(),
        sale_order_connector(),
        sale_order_line_connector(),
        invoice_connector(),
        picking_connector(),
    ] {
        debug!(model = connector.model(), kind = %kind, "registering connector");
        registry.register(kind.clone(), connector);
    }
    registry
}

/// A registry holding the Magento connectors only.
pub fn magento_registry() -> Registry {
    let mut registry = Registry::new();
    register_magento(&mut registry);
    registry
}
