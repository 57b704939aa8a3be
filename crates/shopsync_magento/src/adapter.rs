//! Magento 1.x remote adapters.
//!
//! Every adapter calls `{remote model}.{verb}` on the backend transport.
//! [`GenericAdapter`] covers the CRUD resources; the other adapters wrap it
//! where a resource deviates from the generic signatures.

use chrono::{DateTime, Utc};
use shopsync_codec::{CodecError, Record, Value};
use shopsync_core::{
    BackendAdapter, CategoryTree, Filters, ItemQuantities, RemoteId, RemoteTransport, SyncError,
    SyncResult,
};
use std::sync::Arc;
use tracing::debug;

/// Identifier type argument of product calls: ids, not skus.
const PRODUCT_IDENTIFIER_TYPE: &str = "id";

fn malformed(method: &str, expected: &str, found: &Value) -> SyncError {
    SyncError::Codec(CodecError::decoding_failed(format!(
        "{} returned {} instead of {}",
        method,
        found.type_name(),
        expected
    )))
}

fn optional(value: Option<&RemoteId>) -> Value {
    value.map_or(Value::Null, Value::from)
}

fn attributes_value(attributes: Option<&[String]>) -> Value {
    attributes.map_or(Value::Null, |a| {
        Value::Array(a.iter().map(|s| Value::from(s.as_str())).collect())
    })
}

fn items_value(items: &ItemQuantities) -> Value {
    Value::Map(
        items
            .iter()
            .map(|(id, qty)| (id.to_string(), Value::Float(*qty)))
            .collect(),
    )
}

fn with_date(filters: &Filters, from_date: Option<DateTime<Utc>>) -> Filters {
    match from_date {
        Some(date) => filters.clone().updated_since(date),
        None => filters.clone(),
    }
}

/// CRUD adapter of one Magento resource.
#[derive(Clone)]
pub struct GenericAdapter {
    model: String,
    transport: Arc<dyn RemoteTransport>,
}

impl GenericAdapter {
    /// Creates an adapter of the remote `model`, e.g. `customer`.
    pub fn new(model: impl Into<String>, transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            model: model.into(),
            transport,
        }
    }

    /// Calls `{model}.{verb}`.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub fn call(&self, verb: &str, params: Vec<Value>) -> SyncResult<Value> {
        self.call_method(&format!("{}.{}", self.model, verb), params)
    }

    /// Calls any remote method.
    ///
    /// # Errors
    ///
    /// Propagates the transport error.
    pub fn call_method(&self, method: &str, params: Vec<Value>) -> SyncResult<Value> {
        debug!(method, params = params.len(), "remote call");
        self.transport.call(method, params)
    }

    fn ids(&self, method: &str, value: Value) -> SyncResult<Vec<RemoteId>> {
        match value {
            Value::Array(items) => items
                .iter()
                .map(|v| RemoteId::from_value(v).ok_or_else(|| malformed(method, "an id", v)))
                .collect(),
            other => Err(malformed(method, "an array of ids", &other)),
        }
    }

    fn records(&self, method: &str, value: Value) -> SyncResult<Vec<Record>> {
        match value {
            Value::Array(items) => items
                .into_iter()
                .map(|v| Record::from_value(v).map_err(SyncError::from))
                .collect(),
            other => Err(malformed(method, "an array of records", &other)),
        }
    }

    fn id(&self, method: &str, value: Value) -> SyncResult<RemoteId> {
        RemoteId::from_value(&value).ok_or_else(|| malformed(method, "an id", &value))
    }
}

impl std::fmt::Debug for GenericAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenericAdapter").field("model", &self.model).finish()
    }
}

impl BackendAdapter for GenericAdapter {
    fn remote_model(&self) -> &str {
        &self.model
    }

    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>> {
        let filters = with_date(filters, from_date);
        let result = self.call("search", vec![filters.to_value()])?;
        self.ids(&format!("{}.search", self.model), result)
    }

    fn read(
        &self,
        id: &RemoteId,
        _storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record> {
        let result = self.call("info", vec![id.into(), attributes_value(attributes)])?;
        Ok(Record::from_value(result)?)
    }

    fn create(&self, data: Record) -> SyncResult<RemoteId> {
        let result = self.call("create", vec![data.into_value()])?;
        self.id(&format!("{}.create", self.model), result)
    }

    fn update(&self, id: &RemoteId, data: Record) -> SyncResult<()> {
        self.call("update", vec![id.into(), data.into_value()])?;
        Ok(())
    }

    fn delete(&self, id: &RemoteId) -> SyncResult<()> {
        self.call("delete", vec![id.into()])?;
        Ok(())
    }

    fn search_read(&self, filters: &Filters) -> SyncResult<Vec<Record>> {
        let result = self.call("list", vec![filters.to_value()])?;
        self.records(&format!("{}.list", self.model), result)
    }
}

/// `catalog_category`: searched through the `oerp_catalog_category`
/// extension, read per store view, with a tree verb.
#[derive(Debug, Clone)]
pub struct CategoryAdapter {
    inner: GenericAdapter,
}

impl CategoryAdapter {
    /// Creates the adapter.
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            inner: GenericAdapter::new("catalog_category", transport),
        }
    }
}

/// Converts a remote tree node, `{category_id, children: [...]}`.
///
/// # Errors
///
/// Returns a codec error if a node has no `category_id`.
pub fn tree_from_value(node: &Value) -> SyncResult<CategoryTree> {
    let (id, children) = node_from_value(node)?;
    Ok(CategoryTree::new().with_node(id, children))
}

fn node_from_value(node: &Value) -> SyncResult<(RemoteId, CategoryTree)> {
    let id = node
        .get("category_id")
        .and_then(RemoteId::from_value)
        .ok_or_else(|| malformed("catalog_category.tree", "a node with category_id", node))?;
    let mut children = CategoryTree::new();
    for child in node.get("children").and_then(Value::as_array).unwrap_or_default() {
        let (child_id, grandchildren) = node_from_value(child)?;
        children = children.with_node(child_id, grandchildren);
    }
    Ok((id, children))
}

impl BackendAdapter for CategoryAdapter {
    fn remote_model(&self) -> &str {
        self.inner.remote_model()
    }

    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>> {
        let method = "oerp_catalog_category.search";
        let filters = with_date(filters, from_date);
        let result = self.inner.call_method(method, vec![filters.to_value()])?;
        self.inner.ids(method, result)
    }

    fn read(
        &self,
        id: &RemoteId,
        storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record> {
        let params = vec![id.into(), optional(storeview), attributes_value(attributes)];
        Ok(Record::from_value(self.inner.call("info", params)?)?)
    }

    fn create(&self, data: Record) -> SyncResult<RemoteId> {
        self.inner.create(data)
    }

    fn update(&self, id: &RemoteId, data: Record) -> SyncResult<()> {
        self.inner.update(id, data)
    }

    fn delete(&self, id: &RemoteId) -> SyncResult<()> {
        self.inner.delete(id)
    }

    fn tree(&self, parent: Option<&RemoteId>, storeview: Option<&RemoteId>) -> SyncResult<CategoryTree> {
        let node = self
            .inner
            .call("tree", vec![optional(parent), optional(storeview)])?;
        tree_from_value(&node)
    }
}

/// `catalog_product`: listed rather than searched, read by id per store
/// view, with media listing.
#[derive(Debug, Clone)]
pub struct ProductAdapter {
    inner: GenericAdapter,
}

impl ProductAdapter {
    /// Creates the adapter.
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            inner: GenericAdapter::new("catalog_product", transport),
        }
    }
}

impl BackendAdapter for ProductAdapter {
    fn remote_model(&self) -> &str {
        self.inner.remote_model()
    }

    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>> {
        let filters = with_date(filters, from_date);
        let rows = self.search_read(&filters)?;
        rows.iter()
            .map(|row| {
                row.get("product_id")
                    .and_then(RemoteId::from_value)
                    .ok_or_else(|| {
                        malformed("catalog_product.list", "rows with product_id", &row.clone().into_value())
                    })
            })
            .collect()
    }

    fn read(
        &self,
        id: &RemoteId,
        storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record> {
        let params = vec![
            id.into(),
            optional(storeview),
            attributes_value(attributes),
            PRODUCT_IDENTIFIER_TYPE.into(),
        ];
        Ok(Record::from_value(self.inner.call("info", params)?)?)
    }

    fn create(&self, data: Record) -> SyncResult<RemoteId> {
        self.inner.create(data)
    }

    fn update(&self, id: &RemoteId, data: Record) -> SyncResult<()> {
        let params = vec![id.into(), data.into_value(), Value::Null, PRODUCT_IDENTIFIER_TYPE.into()];
        self.inner.call("update", params)?;
        Ok(())
    }

    fn delete(&self, id: &RemoteId) -> SyncResult<()> {
        self.inner.call("delete", vec![id.into(), PRODUCT_IDENTIFIER_TYPE.into()])?;
        Ok(())
    }

    fn search_read(&self, filters: &Filters) -> SyncResult<Vec<Record>> {
        self.inner.search_read(filters)
    }

    fn images(&self, id: &RemoteId, storeview: Option<&RemoteId>) -> SyncResult<Vec<Record>> {
        let method = "product_media.list";
        let params = vec![id.into(), optional(storeview), PRODUCT_IDENTIFIER_TYPE.into()];
        let result = self.inner.call_method(method, params)?;
        self.inner.records(method, result)
    }
}

/// `customer_address`: created under the customer given in `partner_id`.
#[derive(Debug, Clone)]
pub struct AddressAdapter {
    inner: GenericAdapter,
}

impl AddressAdapter {
    /// Creates the adapter.
    pub fn new(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            inner: GenericAdapter::new("customer_address", transport),
        }
    }
}

impl BackendAdapter for AddressAdapter {
    fn remote_model(&self) -> &str {
        self.inner.remote_model()
    }

    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>> {
        self.inner.search(filters, from_date)
    }

    fn read(
        &self,
        id: &RemoteId,
        storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record> {
        self.inner.read(id, storeview, attributes)
    }

    fn create(&self, mut data: Record) -> SyncResult<RemoteId> {
        let customer = data
            .remove("partner_id")
            .filter(Value::is_truthy)
            .ok_or_else(|| SyncError::validation("partner_id", "an address is created under a customer"))?;
        let result = self.inner.call("create", vec![customer, data.into_value()])?;
        self.inner.id("customer_address.create", result)
    }

    fn update(&self, id: &RemoteId, mut data: Record) -> SyncResult<()> {
        data.remove("partner_id");
        self.inner.update(id, data)
    }

    fn delete(&self, id: &RemoteId) -> SyncResult<()> {
        self.inner.delete(id)
    }

    fn search_read(&self, filters: &Filters) -> SyncResult<Vec<Record>> {
        self.inner.search_read(filters)
    }
}

/// `sales_order_invoice` and `sales_order_shipment`: documents created
/// from an order increment id and item quantities.
#[derive(Debug, Clone)]
pub struct OrderDocumentAdapter {
    inner: GenericAdapter,
}

impl OrderDocumentAdapter {
    /// Invoices.
    pub fn invoices(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            inner: GenericAdapter::new("sales_order_invoice", transport),
        }
    }

    /// Shipments.
    pub fn shipments(transport: Arc<dyn RemoteTransport>) -> Self {
        Self {
            inner: GenericAdapter::new("sales_order_shipment", transport),
        }
    }

    fn create_document(
        &self,
        order: &str,
        items: &ItemQuantities,
        comment: &str,
        notify: bool,
        include_comment: bool,
    ) -> SyncResult<RemoteId> {
        let params = vec![
            order.into(),
            items_value(items),
            comment.into(),
            notify.into(),
            include_comment.into(),
        ];
        let result = self.inner.call("create", params)?;
        self.inner.id(&format!("{}.create", self.inner.model), result)
    }
}

impl BackendAdapter for OrderDocumentAdapter {
    fn remote_model(&self) -> &str {
        self.inner.remote_model()
    }

    fn search(&self, filters: &Filters, from_date: Option<DateTime<Utc>>) -> SyncResult<Vec<RemoteId>> {
        self.inner.search(filters, from_date)
    }

    fn read(
        &self,
        id: &RemoteId,
        storeview: Option<&RemoteId>,
        attributes: Option<&[String]>,
    ) -> SyncResult<Record> {
        self.inner.read(id, storeview, attributes)
    }

    fn create(&self, _data: Record) -> SyncResult<RemoteId> {
        Err(SyncError::unsupported(self.remote_model(), "create without order"))
    }

    fn update(&self, id: &RemoteId, data: Record) -> SyncResult<()> {
        self.inner.update(id, data)
    }

    fn delete(&self, _id: &RemoteId) -> SyncResult<()> {
        Err(SyncError::unsupported(self.remote_model(), "delete"))
    }

    fn search_read(&self, filters: &Filters) -> SyncResult<Vec<Record>> {
        self.inner.search_read(filters)
    }

    fn create_invoice(
        &self,
        order: &str,
        items: &ItemQuantities,
        comment: &str,
        notify: bool,
        include_comment: bool,
    ) -> SyncResult<RemoteId> {
        self.create_document(order, items, comment, notify, include_comment)
    }

    fn create_shipment(
        &self,
        order: &str,
        items: &ItemQuantities,
        comment: &str,
        notify: bool,
        include_comment: bool,
    ) -> SyncResult<RemoteId> {
        self.create_document(order, items, comment, notify, include_comment)
    }
}
