//! Order lifecycle: replenishment orders, merchandise receipts and the
//! automatic completion of fully received orders

use std::sync::Arc;

use chrono::{NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::cache::{keys, CacheEvent, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::services::{incident, movement, stock};
use crate::store::Store;
use shared::{
    count_per_day, incident_description, incident_details, open_order_products,
    validate_line_items, validate_new_order_lines, BusinessClock, DailyCount, Incident, LineItem,
    Movement, MovementKind, NewIncident, NewLineItem, NewOrderLine, Order, OrderLine, OrderStatus,
    PurchaseRecord, ReceiptLine,
};

#[derive(Debug, Clone, Deserialize)]
pub struct CreateOrderInput {
    pub supplier_id: i64,
    pub lines: Vec<NewOrderLine>,
}

/// Merchandise arriving from a supplier, optionally against an order
#[derive(Debug, Clone, Deserialize)]
pub struct ReceivePurchaseInput {
    pub supplier_id: i64,
    pub order_id: Option<i64>,
    pub total: Decimal,
    pub note: Option<String>,
    pub lines: Vec<ReceiptLine>,
}

/// Everything written by a purchase receipt
#[derive(Debug, Clone, Serialize)]
pub struct PurchaseReceipt {
    pub movement: Movement,
    pub purchase: PurchaseRecord,
    pub lines: Vec<LineItem>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub order: Option<Order>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub incident: Option<Incident>,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    pub order: Order,
    pub incidents: Vec<Incident>,
}

/// Order service
#[derive(Clone)]
pub struct OrderService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
    clock: BusinessClock,
}

impl OrderService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache, clock: BusinessClock) -> Self {
        Self {
            store,
            cache,
            clock,
        }
    }

    /// Create an order in progress with nothing received yet
    pub async fn create(&self, requester: i64, input: CreateOrderInput) -> AppResult<Order> {
        validate_new_order_lines(&input.lines)?;
        self.require_supplier(input.supplier_id).await?;

        let mut uow = self.store.begin().await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for requested in &input.lines {
            let product = uow
                .get_product(requested.product_id)
                .await?
                .ok_or_else(|| AppError::NotFound(format!("Product {}", requested.product_id)))?;
            let mut line = OrderLine::new(product.id, requested.quantity);
            line.product_name = Some(product.name);
            lines.push(line);
        }

        let order = uow
            .insert_order(input.supplier_id, requester, lines, Utc::now())
            .await?;

        uow.commit().await?;
        self.cache.invalidate(CacheEvent::OrderChanged).await;

        tracing::info!(
            order_id = order.id,
            supplier_id = order.supplier_id,
            lines = order.lines.len(),
            "order created"
        );

        Ok(order)
    }

    /// Register incoming merchandise as one unit of work: the purchase
    /// movement, the stock increase, the order's received quantities, any
    /// incident and the order's completion either all happen or none do.
    pub async fn receive_purchase(
        &self,
        actor: i64,
        input: ReceivePurchaseInput,
    ) -> AppResult<PurchaseReceipt> {
        let items: Vec<NewLineItem> = input
            .lines
            .iter()
            .map(|line| NewLineItem {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        validate_line_items(&items)?;
        movement::check_stated_total(MovementKind::Purchase, input.total, &items);
        self.require_supplier(input.supplier_id).await?;

        let mut uow = self.store.begin().await?;

        // Lock first so two receipts of the same order serialize
        let mut order = match input.order_id {
            Some(order_id) => {
                let order = uow
                    .lock_order(order_id)
                    .await?
                    .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
                if !order.status.can_receive() {
                    return Err(AppError::InvalidStateTransition(format!(
                        "order {} is {} and cannot receive merchandise",
                        order.id, order.status
                    )));
                }
                Some(order)
            }
            None => None,
        };

        let recorded = movement::record(
            uow.as_mut(),
            actor,
            MovementKind::Purchase,
            Utc::now(),
            input.note.clone(),
        )
        .await?;
        let purchase = movement::record_purchase(
            uow.as_mut(),
            recorded.id,
            input.supplier_id,
            input.total,
            input.order_id,
        )
        .await?;

        let mut lines = Vec::with_capacity(items.len());
        for item in &items {
            lines.push(
                movement::record_line_item(
                    uow.as_mut(),
                    recorded.id,
                    item.product_id,
                    item.quantity,
                    item.unit_price,
                )
                .await?,
            );
            stock::increase(uow.as_mut(), item.product_id, item.quantity).await?;
        }

        let mut registered_incident = None;
        if let Some(order) = order.as_mut() {
            let outcome = order.apply_receipt(&input.lines)?;
            if !outcome.skipped.is_empty() {
                tracing::warn!(
                    order_id = order.id,
                    skipped = ?outcome.skipped,
                    "received products not present in the order"
                );
            }
            uow.update_order_lines(order.id, &order.lines).await?;
        }

        let details = incident_details(&input.lines);
        if !details.is_empty() {
            registered_incident = Some(
                incident::register(
                    uow.as_mut(),
                    NewIncident {
                        movement_id: recorded.id,
                        order_id: input.order_id,
                        description: incident_description(input.note.as_deref()),
                        details,
                        occurred_at: Utc::now(),
                    },
                )
                .await?,
            );
        } else if let Some(order) = order.as_mut() {
            if order.complete_if_received() {
                uow.set_order_status(order.id, OrderStatus::Completed)
                    .await?;
                tracing::info!(order_id = order.id, "order fully received and completed");
            }
        }

        uow.commit().await?;
        self.cache.invalidate(CacheEvent::PurchaseRecorded).await;

        tracing::info!(
            movement_id = recorded.id,
            supplier_id = input.supplier_id,
            order_id = ?input.order_id,
            incident = registered_incident.is_some(),
            "purchase received"
        );

        Ok(PurchaseReceipt {
            movement: recorded,
            purchase,
            lines,
            order,
            incident: registered_incident,
        })
    }

    /// Mark an order cancelled. The prior status is not checked.
    pub async fn cancel(&self, id: i64) -> AppResult<Order> {
        let mut uow = self.store.begin().await?;

        let mut order = uow
            .lock_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        if order.status.is_terminal() {
            tracing::warn!(
                order_id = id,
                status = %order.status,
                "cancelling an order that already finished"
            );
        }
        uow.set_order_status(id, OrderStatus::Cancelled).await?;
        order.status = OrderStatus::Cancelled;

        uow.commit().await?;
        self.cache.invalidate(CacheEvent::OrderChanged).await;

        tracing::info!(order_id = id, "order cancelled");
        Ok(order)
    }

    /// First in-progress order, lowest id first, that requests the product
    pub async fn find_open_order_for_product(&self, product_id: i64) -> AppResult<Option<Order>> {
        let open = self.store.orders_with_status(OrderStatus::InProgress).await?;
        Ok(open.into_iter().find(|o| o.contains_product(product_id)))
    }

    pub async fn list_orders(&self) -> AppResult<Vec<Order>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::ORDERS_ALL, || async move { store.list_orders().await })
            .await
    }

    pub async fn get_order(&self, id: i64) -> AppResult<OrderDetail> {
        let order = self
            .store
            .get_order(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Order".to_string()))?;
        let incidents = self.store.incidents_for_order(id).await?;
        Ok(OrderDetail { order, incidents })
    }

    /// Orders created on a business-local date
    pub async fn orders_on_date(&self, date: NaiveDate) -> AppResult<Vec<Order>> {
        let (start, end) = self.clock.day_bounds(date);
        self.store.orders_between(start, end).await
    }

    /// Distinct products currently requested by in-progress orders
    pub async fn open_order_products(&self) -> AppResult<Vec<i64>> {
        let open = self.store.orders_with_status(OrderStatus::InProgress).await?;
        Ok(open_order_products(&open))
    }

    /// Orders created per day over the last 30 business days
    pub async fn orders_summary_30_days(&self) -> AppResult<Vec<DailyCount>> {
        let store = self.store.clone();
        let clock = self.clock;
        self.cache
            .get_or_set(keys::ORDERS_30_DAYS, || async move {
                let (start, end) = clock.range_bounds(clock.last_days(30));
                let orders = store.orders_between(start, end).await?;
                Ok::<_, AppError>(count_per_day(&clock, orders.iter().map(|o| o.created_at)))
            })
            .await
    }

    async fn require_supplier(&self, supplier_id: i64) -> AppResult<()> {
        match self.store.get_supplier(supplier_id).await? {
            Some(_) => Ok(()),
            None => Err(AppError::NotFound("Supplier".to_string())),
        }
    }
}
