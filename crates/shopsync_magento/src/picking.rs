//! Delivery orders, exported as Magento shipments.

use crate::adapter::OrderDocumentAdapter;
use crate::backend::{PICKING, SALE_ORDER, SALE_ORDER_LINE};
use crate::sale::ORDER_ID_FIELD;
use shopsync_codec::{Record, Value};
use shopsync_core::{
    BindingModel, ConnectorRuntime, Environment, ItemQuantities, JobFunction, JobHandle,
    JobRequest, JobTarget, ModelConnector, SessionContext, SkipReason, SyncError, SyncOutcome,
    SyncResult, PICKING_TYPE_ARG,
};
use shopsync_storage::{Domain, LocalId};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info};

/// Binding field holding how the picking was shipped.
pub const PICKING_METHOD_FIELD: &str = "picking_method";

/// How a picking is shipped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickingType {
    /// Every remaining item of the order.
    Complete,
    /// The items of the picking moves only.
    Partial,
}

impl PickingType {
    /// Parses `complete` or `partial`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidArgument`] for any other value.
    pub fn parse(value: &str) -> SyncResult<Self> {
        match value {
            "complete" => Ok(PickingType::Complete),
            "partial" => Ok(PickingType::Partial),
            other => Err(SyncError::InvalidArgument(format!(
                "Wrong value for picking_type, authorized values are 'partial' or 'complete', found: {}",
                other
            ))),
        }
    }

    /// Wire name.
    pub fn as_str(&self) -> &'static str {
        match self {
            PickingType::Complete => "complete",
            PickingType::Partial => "partial",
        }
    }
}

impl fmt::Display for PickingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Item quantities of the moves of a picking, keyed by the remote id of
/// their sale order line. Moves without a bound order line are left out.
///
/// # Errors
///
/// Propagates store errors.
pub fn picking_lines(env: &Environment<'_>, picking: LocalId) -> SyncResult<ItemQuantities> {
    let lines = env.binder_for(SALE_ORDER_LINE)?;
    let store = env.store();
    let mut items = ItemQuantities::new();
    for move_id in store.search("stock.move", &Domain::new().eq("picking_id", picking))? {
        let line = store.read("stock.move", move_id)?;
        let Some(sale_line) = line.get("sale_line_id").and_then(LocalId::from_value) else {
            continue;
        };
        let Some(item) = lines.to_remote_wrapped(sale_line)? else {
            continue;
        };
        *items.entry(item).or_insert(0.0) += line.float("product_qty").unwrap_or(0.0);
    }
    Ok(items)
}

/// Exports a picking binding as a shipment. The `picking_type` argument
/// of `extra` selects a complete or partial shipment.
///
/// # Errors
///
/// Returns [`SyncError::InvalidArgument`] for a bad picking type,
/// [`SyncError::Mapping`] if the sale order is not bound, and propagates
/// remote faults.
pub fn export_picking(env: &Environment<'_>, binding_id: LocalId, extra: &Record) -> SyncResult<SyncOutcome> {
    let picking_type = PickingType::parse(extra.text(PICKING_TYPE_ARG).unwrap_or_default())?;
    let _entry = env.guard().enter(env.model(), format!("export {}", binding_id))?;
    let binder = env.binder()?;
    let binding = binder.binding(binding_id)?;
    if binding.is_bound() {
        debug!(binding = %binding_id, "picking already exported");
        return Ok(SyncOutcome::Skipped(SkipReason::NothingToDo));
    }

    let picking = env.store().read("stock.picking", binding.local_id)?;
    let sale = picking
        .get("sale_id")
        .and_then(LocalId::from_value)
        .ok_or_else(|| SyncError::mapping(format!("the picking {} has no sale order", binding.local_id)))?;
    let order = env
        .binder_for(SALE_ORDER)?
        .to_remote_wrapped(sale)?
        .ok_or_else(|| SyncError::mapping(format!("The sale order {} is not imported.", sale)))?;

    let items = match picking_type {
        PickingType::Complete => ItemQuantities::new(),
        PickingType::Partial => {
            let items = picking_lines(env, binding.local_id)?;
            if items.is_empty() {
                debug!(binding = %binding_id, "no move to ship");
                return Ok(SyncOutcome::Skipped(SkipReason::NothingToDo));
            }
            items
        }
    };

    let backend = env.backend();
    let remote_id = env.adapter()?.create_shipment(
        order.as_str(),
        &items,
        "Shipping Created",
        backend.send_picking_done_mail,
        true,
    )?;
    binder.bind(&remote_id, binding_id)?;
    info!(binding = %binding_id, remote = %remote_id, %picking_type, "picking exported");
    Ok(SyncOutcome::Done(format!(
        "Record exported with ID {} on {}.",
        remote_id,
        backend.kind.label()
    )))
}

/// Picking connector.
pub fn picking_connector() -> ModelConnector {
    let binding = BindingModel::new(PICKING, "stock.picking")
        .with_binding_fields([ORDER_ID_FIELD, PICKING_METHOD_FIELD]);
    ModelConnector::new(binding, |_, transport| Arc::new(OrderDocumentAdapter::shipments(transport)))
        .with_custom_export(export_picking)
}

/// A picking is done: binds it on every backend holding its sale order and
/// enqueues the shipment export.
///
/// # Errors
///
/// Returns an error if the store or the queue fails.
pub fn on_picking_done(
    runtime: &ConnectorRuntime,
    session: &SessionContext,
    picking: LocalId,
    picking_type: PickingType,
) -> SyncResult<Vec<JobHandle>> {
    if session.no_export {
        return Ok(Vec::new());
    }
    let record = runtime.store().read("stock.picking", picking)?;
    let Some(sale) = record.get("sale_id").and_then(LocalId::from_value) else {
        return Ok(Vec::new());
    };

    let mut handles = Vec::new();
    for backend in runtime.backends() {
        if !runtime.registry().contains(PICKING, &backend.kind) {
            continue;
        }
        let env = runtime.environment(backend.id, session.clone().with_no_export(true), PICKING)?;
        let Some(order_binding) = env.binder_for(SALE_ORDER)?.bindings_of(sale)?.first().copied() else {
            continue;
        };
        let pickings = env.binder()?;
        if !pickings.bindings_of(picking)?.is_empty() {
            continue;
        }
        let binding_id = pickings.create_binding(
            picking,
            Record::new()
                .with(ORDER_ID_FIELD, order_binding)
                .with(PICKING_METHOD_FIELD, picking_type.as_str()),
        )?;
        debug!(picking = %picking, binding = %binding_id, backend = %backend.id, "picking binding created");
        let request = JobRequest::new(
            JobFunction::ExportPickingDone,
            backend.id,
            PICKING,
            JobTarget::Local(binding_id),
        )
        .with_extra(PICKING_TYPE_ARG, Value::from(picking_type.as_str()))
        .with_session(session.clone());
        handles.push(runtime.enqueue(request)?);
    }
    Ok(handles)
}
