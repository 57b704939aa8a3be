//! An in-memory Magento.
//!
//! [`FakeMagento`] answers the XML-RPC methods the Magento adapters call,
//! keeps every record it is given or creates, logs every call and can be
//! told to fail.

use parking_lot::Mutex;
use shopsync_codec::{Record, Value};
use shopsync_core::{Filters, RemoteTransport, SyncError, SyncResult};
use std::collections::BTreeMap;

/// Fault code of a missing record.
pub const NOT_EXISTS_FAULT: i64 = 101;

/// Fault code of an order that cannot be invoiced anymore.
pub const CANNOT_INVOICE_FAULT: i64 = 102;

/// Fault code of an unknown method.
pub const UNKNOWN_METHOD_FAULT: i64 = 3;

/// A logged remote call.
#[derive(Debug, Clone, PartialEq)]
pub struct Call {
    /// Full method name, e.g. `customer.create`.
    pub method: String,
    /// Positional parameters.
    pub params: Vec<Value>,
}

#[derive(Debug, Clone)]
struct Fault {
    method: String,
    error: SyncError,
    once: bool,
}

#[derive(Debug, Default)]
struct State {
    models: BTreeMap<String, BTreeMap<String, Record>>,
    translations: BTreeMap<(String, String, String), Record>,
    images: BTreeMap<String, Vec<Record>>,
    tree: Option<Value>,
    next_id: u64,
    calls: Vec<Call>,
    faults: Vec<Fault>,
}

/// Identifier field of the records of a remote model.
pub fn id_field(model: &str) -> &'static str {
    match model {
        "customer" => "customer_id",
        "customer_address" => "customer_address_id",
        "catalog_category" => "category_id",
        "catalog_product" => "product_id",
        "ol_websites" => "website_id",
        "sales_order" => "increment_id",
        "sales_order_invoice" | "sales_order_shipment" => "increment_id",
        _ => "id",
    }
}

fn remote_model(model: &str) -> &str {
    match model {
        "oerp_catalog_category" => "catalog_category",
        other => other,
    }
}

fn is_per_storeview(model: &str) -> bool {
    matches!(model, "catalog_category" | "catalog_product")
}

fn param(params: &[Value], index: usize) -> Value {
    params.get(index).cloned().unwrap_or(Value::Null)
}

fn id_param(method: &str, params: &[Value], index: usize) -> SyncResult<String> {
    param(params, index)
        .to_id_string()
        .ok_or_else(|| SyncError::remote_fault(NOT_EXISTS_FAULT, format!("{}: missing id", method)))
}

fn record_param(method: &str, params: &[Value], index: usize) -> SyncResult<Record> {
    Record::from_value(param(params, index))
        .map_err(|e| SyncError::remote_fault(UNKNOWN_METHOD_FAULT, format!("{}: {}", method, e)))
}

fn not_exists(model: &str, id: &str) -> SyncError {
    SyncError::remote_fault(NOT_EXISTS_FAULT, format!("{} {} does not exist.", model, id))
}

/// An in-memory Magento reachable through [`RemoteTransport`].
#[derive(Debug, Default)]
pub struct FakeMagento {
    state: Mutex<State>,
}

impl FakeMagento {
    /// An empty shop.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a record of `model` under `id`, filling its id field.
    pub fn insert(&self, model: &str, id: impl Into<String>, record: Record) {
        let id = id.into();
        let mut record = record;
        if !record.contains(id_field(model)) {
            record.insert(id_field(model), id.as_str());
        }
        self.state
            .lock()
            .models
            .entry(model.to_string())
            .or_default()
            .insert(id, record);
    }

    /// Stores the values a record shows in a store view.
    pub fn insert_translation(&self, model: &str, id: &str, storeview: &str, values: Record) {
        self.state.lock().translations.insert(
            (model.to_string(), id.to_string(), storeview.to_string()),
            values,
        );
    }

    /// Stores the images of a product.
    pub fn insert_images(&self, product: &str, images: Vec<Record>) {
        self.state.lock().images.insert(product.to_string(), images);
    }

    /// Sets the answer of `catalog_category.tree`.
    pub fn set_category_tree(&self, tree: Value) {
        self.state.lock().tree = Some(tree);
    }

    /// A stored record.
    pub fn record(&self, model: &str, id: &str) -> Option<Record> {
        self.state.lock().models.get(model)?.get(id).cloned()
    }

    /// Every stored record of a model.
    pub fn records(&self, model: &str) -> Vec<Record> {
        self.state
            .lock()
            .models
            .get(model)
            .map(|rows| rows.values().cloned().collect())
            .unwrap_or_default()
    }

    /// Number of stored records of a model.
    pub fn count(&self, model: &str) -> usize {
        self.state.lock().models.get(model).map_or(0, BTreeMap::len)
    }

    /// Fails every call of `method` with `error`.
    pub fn fail_on(&self, method: &str, error: SyncError) {
        self.push_fault(method, error, false);
    }

    /// Fails the next call of `method` with `error`.
    pub fn fail_once(&self, method: &str, error: SyncError) {
        self.push_fault(method, error, true);
    }

    fn push_fault(&self, method: &str, error: SyncError, once: bool) {
        self.state.lock().faults.push(Fault {
            method: method.to_string(),
            error,
            once,
        });
    }

    /// Every call so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// Method names of every call so far.
    pub fn methods(&self) -> Vec<String> {
        self.state.lock().calls.iter().map(|c| c.method.clone()).collect()
    }

    /// Parameters of every call of `method`.
    pub fn calls_to(&self, method: &str) -> Vec<Vec<Value>> {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|c| c.method == method)
            .map(|c| c.params.clone())
            .collect()
    }

    /// Forgets the calls made so far.
    pub fn clear_calls(&self) {
        self.state.lock().calls.clear();
    }

    fn dispatch(state: &mut State, method: &str, params: &[Value]) -> SyncResult<Value> {
        if method == "product_media.list" {
            let id = id_param(method, params, 0)?;
            let images = state.images.get(&id).cloned().unwrap_or_default();
            return Ok(Value::Array(images.into_iter().map(Record::into_value).collect()));
        }
        let Some((model, verb)) = method.rsplit_once('.') else {
            return Err(SyncError::remote_fault(UNKNOWN_METHOD_FAULT, format!("unknown method {}", method)));
        };
        let model = remote_model(model);
        match verb {
            "search" => {
                let filters = Filters::from_value(&param(params, 0))?;
                let ids = state
                    .models
                    .get(model)
                    .map(|rows| {
                        rows.iter()
                            .filter(|(_, r)| filters.matches(r))
                            .map(|(id, _)| Value::from(id.as_str()))
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Value::Array(ids))
            }
            "list" => {
                let filters = Filters::from_value(&param(params, 0))?;
                let rows = state
                    .models
                    .get(model)
                    .map(|rows| {
                        rows.values()
                            .filter(|r| filters.matches(r))
                            .map(|r| r.clone().into_value())
                            .collect()
                    })
                    .unwrap_or_default();
                Ok(Value::Array(rows))
            }
            "info" => {
                let id = id_param(method, params, 0)?;
                let mut record = state
                    .models
                    .get(model)
                    .and_then(|rows| rows.get(&id))
                    .cloned()
                    .ok_or_else(|| not_exists(model, &id))?;
                if is_per_storeview(model) {
                    if let Some(storeview) = param(params, 1).to_id_string() {
                        let key = (model.to_string(), id, storeview);
                        if let Some(values) = state.translations.get(&key) {
                            record.merge(values.clone());
                        }
                    }
                }
                Ok(record.into_value())
            }
            "tree" => state
                .tree
                .clone()
                .ok_or_else(|| SyncError::remote_fault(NOT_EXISTS_FAULT, "no category tree")),
            "create" => Self::create(state, model, params),
            "update" => {
                let id = id_param(method, params, 0)?;
                let values = record_param(method, params, 1)?;
                let record = state
                    .models
                    .get_mut(model)
                    .and_then(|rows| rows.get_mut(&id))
                    .ok_or_else(|| not_exists(model, &id))?;
                record.merge(values);
                Ok(Value::Bool(true))
            }
            "delete" => {
                let id = id_param(method, params, 0)?;
                state
                    .models
                    .get_mut(model)
                    .and_then(|rows| rows.remove(&id))
                    .ok_or_else(|| not_exists(model, &id))?;
                Ok(Value::Bool(true))
            }
            _ => Err(SyncError::remote_fault(UNKNOWN_METHOD_FAULT, format!("unknown method {}", method))),
        }
    }

    fn create(state: &mut State, model: &str, params: &[Value]) -> SyncResult<Value> {
        state.next_id += 1;
        let seq = state.next_id;
        let (id, record, answer) = match model {
            "customer_address" => {
                let mut record = record_param(model, params, 1)?;
                record.insert("customer_id", param(params, 0));
                (seq.to_string(), record, Value::Integer(seq as i64))
            }
            "sales_order_invoice" | "sales_order_shipment" => {
                let order = id_param(model, params, 0)?;
                let order_id = state
                    .models
                    .get("sales_order")
                    .and_then(|rows| rows.get(&order))
                    .map(|r| r.get("order_id").cloned().unwrap_or(Value::Null))
                    .ok_or_else(|| not_exists("sales_order", &order))?;
                let invoiced = state
                    .models
                    .get(model)
                    .is_some_and(|rows| rows.values().any(|r| r.text("order_increment_id") == Some(order.as_str())));
                if model == "sales_order_invoice" && invoiced {
                    return Err(SyncError::remote_fault(CANNOT_INVOICE_FAULT, "Cannot do invoice for order."));
                }
                let prefix = if model == "sales_order_invoice" { 2 } else { 3 };
                let id = format!("{}{:08}", prefix, seq);
                let record = Record::new()
                    .with("order_increment_id", order)
                    .with("order_id", order_id)
                    .with("items", param(params, 1))
                    .with("comment", param(params, 2))
                    .with("email", param(params, 3))
                    .with("include_comment", param(params, 4));
                (id.clone(), record, Value::from(id))
            }
            _ => {
                let record = record_param(model, params, 0)?;
                (seq.to_string(), record, Value::Integer(seq as i64))
            }
        };
        let mut record = record;
        record.insert(id_field(model), id.as_str());
        state.models.entry(model.to_string()).or_default().insert(id, record);
        Ok(answer)
    }
}

impl RemoteTransport for FakeMagento {
    fn call(&self, method: &str, params: Vec<Value>) -> SyncResult<Value> {
        let mut state = self.state.lock();
        state.calls.push(Call {
            method: method.to_string(),
            params: params.clone(),
        });
        if let Some(index) = state.faults.iter().position(|f| f.method == method) {
            let error = state.faults[index].error.clone();
            if state.faults[index].once {
                state.faults.remove(index);
            }
            return Err(error);
        }
        Self::dispatch(&mut state, method, &params)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_info() {
        let magento = FakeMagento::new();
        let id = magento
            .call("customer.create", vec![Record::new().with("email", "a@b.c").into_value()])
            .unwrap();

        let record = magento.call("customer.info", vec![id.clone(), Value::Null]).unwrap();

        assert_eq!(record.get("email"), Some(&Value::from("a@b.c")));
        assert_eq!(record.get("customer_id").and_then(Value::to_id_string), id.to_id_string());
    }

    #[test]
    fn search_applies_filters() {
        let magento = FakeMagento::new();
        magento.insert("customer", "1", Record::new().with("group_id", 1i64));
        magento.insert("customer", "2", Record::new().with("group_id", 2i64));

        let ids = magento
            .call("customer.search", vec![Filters::new().eq("group_id", 2i64).to_value()])
            .unwrap();

        assert_eq!(ids, Value::Array(vec!["2".into()]));
    }

    #[test]
    fn storeview_values_overlay_catalog_records() {
        let magento = FakeMagento::new();
        magento.insert("catalog_category", "3", Record::new().with("name", "Shoes"));
        magento.insert_translation("catalog_category", "3", "2", Record::new().with("name", "Chaussures"));

        let default = magento.call("catalog_category.info", vec!["3".into(), Value::Null]).unwrap();
        let french = magento.call("catalog_category.info", vec!["3".into(), "2".into()]).unwrap();

        assert_eq!(default.get("name"), Some(&Value::from("Shoes")));
        assert_eq!(french.get("name"), Some(&Value::from("Chaussures")));
    }

    #[test]
    fn second_invoice_of_an_order_is_refused() {
        let magento = FakeMagento::new();
        magento.insert("sales_order", "100000001", Record::new().with("order_id", 9i64));
        let create = || {
            magento.call(
                "sales_order_invoice.create",
                vec!["100000001".into(), Value::Map(Default::default()), "c".into(), false.into(), false.into()],
            )
        };

        create().unwrap();
        assert_eq!(create().unwrap_err().fault_code(), Some(CANNOT_INVOICE_FAULT));
        assert_eq!(magento.records("sales_order_invoice")[0].integer("order_id"), Some(9));
    }

    #[test]
    fn injected_faults() {
        let magento = FakeMagento::new();
        magento.fail_once("customer.delete", SyncError::transport("reset"));
        magento.insert("customer", "1", Record::new());

        assert!(magento.call("customer.delete", vec!["1".into()]).unwrap_err().is_retryable());
        assert!(magento.call("customer.delete", vec!["1".into()]).is_ok());
        assert_eq!(
            magento.call("customer.delete", vec!["1".into()]).unwrap_err().fault_code(),
            Some(NOT_EXISTS_FAULT)
        );
        assert_eq!(magento.calls_to("customer.delete").len(), 3);
    }
}
