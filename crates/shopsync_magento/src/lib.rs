//! # shopsync magento
//!
//! Magento 1.x connectors: remote adapters, mappers and exporters for
//! websites, categories, products, customers and their addresses, sale
//! orders, invoices and pickings.
//!
//! ```text
//! magento_registry()
//!   ├─ website, category, product        import
//!   ├─ partner, address                  export, delete
//!   ├─ sale order, sale order line       bindings only
//!   └─ invoice, picking                  custom export
//! ```
//!
//! Register the connectors once at startup with [`register_magento`]
//! and hand the registry to a [`shopsync_core::ConnectorRuntime`].

#![deny(unsafe_code)]
#![warn(missing_docs)]

mod adapter;
mod backend;
mod category;
mod invoice;
mod partner;
mod picking;
mod product;
mod sale;
mod website;

#[cfg(test)]
mod testing;

pub use adapter::{
    tree_from_value, AddressAdapter, CategoryAdapter, GenericAdapter, OrderDocumentAdapter,
    ProductAdapter,
};
pub use backend::{
    magento_kind, magento_registry, register_magento, ADDRESS, CATEGORY, INVOICE, MAGENTO,
    MAGENTO_MODELS, PARTNER, PICKING, PRODUCT, SALE_ORDER, SALE_ORDER_LINE, WEBSITE,
};
pub use category::{
    category_connector, category_import_mapper, remote_parent, PARENT_BINDING_FIELD, ROOT_PARENT,
};
pub use invoice::{export_invoice, invoice_connector, invoice_lines, on_invoice_paid};
pub use partner::{
    address_connector, address_export_mapper, partner_connector, partner_export_mapper,
    split_name, ADDRESS_PARTNER_FIELD, REQUIRED_ADDRESS_FIELDS,
};
pub use picking::{
    export_picking, on_picking_done, picking_connector, picking_lines, PickingType,
    PICKING_METHOD_FIELD,
};
pub use product::{product_connector, product_import_mapper, SUPPORTED_PRODUCT_TYPES};
pub use sale::{order_lines, sale_order_connector, sale_order_line_connector, OrderLine, ORDER_ID_FIELD};
pub use website::website_connector;
