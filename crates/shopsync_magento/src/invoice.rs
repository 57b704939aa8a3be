//! Invoices.
//!
//! A paid invoice gets one binding per Magento sale order it invoices.
//! Each binding is exported by creating the remote invoice from the order
//! items; a remote "already invoiced" fault is recovered by binding the
//! existing remote invoice.

use crate::adapter::OrderDocumentAdapter;
use crate::backend::{INVOICE, SALE_ORDER};
use crate::sale::{order_lines, ORDER_ID_FIELD};
use shopsync_codec::Record;
use shopsync_core::{
    on_record_create, BindingModel, ConnectorRuntime, Environment, FieldSet, Filters,
    ItemQuantities, JobFunction, JobHandle, ModelConnector, RemoteId, SessionContext, SkipReason,
    SyncError, SyncOutcome, SyncResult,
};
use shopsync_storage::{Domain, LocalId};
use std::sync::Arc;
use tracing::{debug, info};

/// Item quantities of an invoice: its lines matched by product against the
/// bound lines of the order. Unmatched lines are left out.
///
/// # Errors
///
/// Propagates store errors.
pub fn invoice_lines(
    env: &Environment<'_>,
    invoice: LocalId,
    order_binding: LocalId,
) -> SyncResult<ItemQuantities> {
    let order = order_lines(env, order_binding)?;
    let mut items = ItemQuantities::new();
    let store = env.store();
    let domain = Domain::new().eq("invoice_id", invoice);
    for line_id in store.search("account.invoice.line", &domain)? {
        let line = store.read("account.invoice.line", line_id)?;
        let product = line.get("product_id").and_then(LocalId::from_value);
        let Some(matched) = order.iter().find(|l| product.is_some() && l.product_id == product) else {
            debug!(invoice = %invoice, line = %line_id, "no matching order line");
            continue;
        };
        *items.entry(matched.remote_id.clone()).or_insert(0.0) += line.float("quantity").unwrap_or(0.0);
    }
    Ok(items)
}

fn existing_invoice(env: &Environment<'_>, order: &Record) -> SyncResult<RemoteId> {
    let order_id = order.get(ORDER_ID_FIELD).cloned().ok_or_else(|| {
        SyncError::UnrecoverableFault("the sale order has no internal Magento id".into())
    })?;
    let found = env
        .adapter()?
        .search_read(&Filters::new().eq("order_id", order_id.clone()))?;
    match found.as_slice() {
        [invoice] => invoice
            .get("increment_id")
            .and_then(RemoteId::from_value)
            .ok_or_else(|| SyncError::UnrecoverableFault("the existing invoice has no increment id".into())),
        [] => Err(SyncError::UnrecoverableFault(format!(
            "no invoice found on Magento for the order {}",
            order_id.to_id_string().unwrap_or_default()
        ))),
        _ => Err(SyncError::UnrecoverableFault(format!(
            "{} invoices found on Magento for the order {}",
            found.len(),
            order_id.to_id_string().unwrap_or_default()
        ))),
    }
}

/// Exports an invoice binding.
///
/// # Errors
///
/// Returns [`SyncError::Mapping`] if the sale order is not bound,
/// [`SyncError::UnrecoverableFault`] when an existing remote invoice cannot
/// be found, and propagates other remote faults.
pub fn export_invoice(env: &Environment<'_>, binding_id: LocalId, _extra: &Record) -> SyncResult<SyncOutcome> {
    let _entry = env.guard().enter(env.model(), format!("export {}", binding_id))?;
    let binder = env.binder()?;
    let binding = binder.binding(binding_id)?;
    if binding.is_bound() {
        debug!(binding = %binding_id, "invoice already exported");
        return Ok(SyncOutcome::Skipped(SkipReason::NothingToDo));
    }

    let order_binding = binding
        .extra
        .get(ORDER_ID_FIELD)
        .and_then(LocalId::from_value)
        .ok_or_else(|| SyncError::mapping(format!("the invoice binding {} has no sale order", binding_id)))?;
    let orders = env.binder_for(SALE_ORDER)?;
    let increment_id = orders.to_remote(order_binding)?.ok_or_else(|| {
        SyncError::mapping(format!("The sale order binding {} is not imported.", order_binding))
    })?;

    let items = invoice_lines(env, binding.local_id, order_binding)?;
    if items.is_empty() {
        debug!(binding = %binding_id, order = %increment_id, "no line to invoice");
        return Ok(SyncOutcome::Skipped(SkipReason::NothingToDo));
    }

    let backend = env.backend();
    let created = env.adapter()?.create_invoice(
        increment_id.as_str(),
        &items,
        "Invoice Created",
        backend.send_invoice_paid_mail,
        false,
    );
    let remote_id = match created {
        Ok(remote_id) => remote_id,
        Err(err) if err.fault_code() == Some(backend.fault_codes.invoice_already_exists) => {
            debug!(order = %increment_id, "invoice already exists, searching it");
            let order = env.store().read(SALE_ORDER, order_binding)?;
            existing_invoice(env, &order)?
        }
        Err(err) => return Err(err),
    };

    binder.bind(&remote_id, binding_id)?;
    info!(binding = %binding_id, remote = %remote_id, "invoice exported");
    Ok(SyncOutcome::Done(format!(
        "Record exported with ID {} on {}.",
        remote_id,
        backend.kind.label()
    )))
}

/// Invoice connector.
pub fn invoice_connector() -> ModelConnector {
    let binding = BindingModel::new(INVOICE, "account.invoice").with_binding_fields([ORDER_ID_FIELD]);
    ModelConnector::new(binding, |_, transport| Arc::new(OrderDocumentAdapter::invoices(transport)))
        .with_custom_export(export_invoice)
        .export_on_event(JobFunction::ExportInvoicePaid)
}

/// An invoice was paid: creates an invoice binding for each Magento sale
/// order it invoices, on each backend, and enqueues their export.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn on_invoice_paid(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    invoice: LocalId,
) -> SyncResult<Vec<JobHandle>> {
    let record = runtime.store().read("account.invoice", invoice)?;
    let sales: Vec<LocalId> = record
        .get("sale_ids")
        .and_then(|v| v.as_array())
        .map(|ids| ids.iter().filter_map(LocalId::from_value).collect())
        .unwrap_or_default();

    let mut handles = Vec::new();
    for backend in runtime.backends() {
        if !runtime.registry().contains(INVOICE, &backend.kind) {
            continue;
        }
        let env = runtime.environment(backend.id, session.clone().with_no_export(true), INVOICE)?;
        let invoices = env.binder()?;
        let orders = env.binder_for(SALE_ORDER)?;
        for sale in &sales {
            for order_binding in orders.bindings_of(*sale)? {
                let existing = invoices.bindings_of(invoice)?.into_iter().any(|id| {
                    invoices
                        .binding(id)
                        .is_ok_and(|b| b.extra.get(ORDER_ID_FIELD).and_then(LocalId::from_value) == Some(order_binding))
                });
                if existing {
                    continue;
                }
                let binding_id =
                    invoices.create_binding(invoice, Record::new().with(ORDER_ID_FIELD, order_binding))?;
                debug!(invoice = %invoice, binding = %binding_id, backend = %backend.id, "invoice binding created");
                handles.extend(on_record_create(runtime, session, INVOICE, binding_id, &FieldSet::new())?);
            }
        }
    }
    Ok(handles)
}
