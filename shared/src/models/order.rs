//! Replenishment order models and lifecycle rules

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ParseEnumError;

/// Status of a replenishment order.
///
/// `InProgress` is the only state that accepts receipts. `Completed` and
/// `Cancelled` are terminal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::InProgress => "in_progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn can_receive(&self) -> bool {
        matches!(self, OrderStatus::InProgress)
    }

    pub fn is_terminal(&self) -> bool {
        !self.can_receive()
    }
}

impl FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "in_progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(ParseEnumError::new("order status", other)),
        }
    }
}

impl fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A requested product inside an order, with the running received total
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct OrderLine {
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: i32,
    #[serde(default)]
    pub received: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub incident: Option<String>,
}

impl OrderLine {
    pub fn new(product_id: i64, quantity: i32) -> Self {
        Self {
            product_id,
            product_name: None,
            quantity,
            received: 0,
            incident: None,
        }
    }

    pub fn is_fully_received(&self) -> bool {
        self.received >= self.quantity
    }

    pub fn pending(&self) -> i32 {
        (self.quantity - self.received).max(0)
    }
}

/// A replenishment order sent to a supplier
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Order {
    pub id: i64,
    pub supplier_id: i64,
    pub requested_by: i64,
    pub status: OrderStatus,
    pub lines: Vec<OrderLine>,
    pub created_at: DateTime<Utc>,
}

/// A line of merchandise arriving for an order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ReceiptLine {
    pub product_id: i64,
    #[serde(default)]
    pub product_name: Option<String>,
    pub quantity: i32,
    #[serde(default)]
    pub unit_price: Decimal,
    /// Free-text note when the goods arrived short or damaged
    #[serde(default)]
    pub incident: Option<String>,
}

impl ReceiptLine {
    /// A note made only of whitespace is not an incident
    pub fn has_incident(&self) -> bool {
        self.incident_note().is_some()
    }

    pub fn incident_note(&self) -> Option<&str> {
        self.incident
            .as_deref()
            .map(str::trim)
            .filter(|note| !note.is_empty())
    }
}

/// Result of applying a receipt to an order's lines
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReceiptOutcome {
    /// Product ids whose line received quantity
    pub applied: Vec<i64>,
    /// Product ids that matched no order line
    pub skipped: Vec<i64>,
}

impl Order {
    /// Add each incoming quantity to the first line with the same product.
    ///
    /// Lines with no counterpart in the order are reported in `skipped` and
    /// leave the order untouched. Received totals are not clamped to the
    /// ordered quantity.
    pub fn apply_receipt(&mut self, incoming: &[ReceiptLine]) -> Result<ReceiptOutcome, OrderError> {
        if !self.status.can_receive() {
            return Err(OrderError::NotReceivable(self.status));
        }

        // Work on a copy so an overflowing line leaves the order untouched
        let mut lines = self.lines.clone();
        let mut outcome = ReceiptOutcome::default();
        for line in incoming {
            match lines.iter_mut().find(|l| l.product_id == line.product_id) {
                Some(order_line) => {
                    order_line.received = order_line
                        .received
                        .checked_add(line.quantity)
                        .ok_or(OrderError::QuantityOverflow(line.product_id))?;
                    if let Some(note) = line.incident_note() {
                        order_line.incident = Some(note.to_string());
                    }
                    outcome.applied.push(line.product_id);
                }
                None => outcome.skipped.push(line.product_id),
            }
        }
        self.lines = lines;
        Ok(outcome)
    }

    pub fn is_fully_received(&self) -> bool {
        !self.lines.is_empty() && self.lines.iter().all(OrderLine::is_fully_received)
    }

    pub fn contains_product(&self, product_id: i64) -> bool {
        self.lines.iter().any(|l| l.product_id == product_id)
    }

    /// Move to completed when every line is covered. Returns true only on the
    /// transition itself, so an order completes exactly once.
    pub fn complete_if_received(&mut self) -> bool {
        if self.status == OrderStatus::InProgress && self.is_fully_received() {
            self.status = OrderStatus::Completed;
            true
        } else {
            false
        }
    }
}

/// Input for a new order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrder {
    pub supplier_id: i64,
    pub lines: Vec<NewOrderLine>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewOrderLine {
    pub product_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrderError {
    #[error("an order needs at least one line")]
    Empty,
    #[error("quantity for product {0} must be positive")]
    NonPositiveQuantity(i64),
    #[error("product {0} appears more than once")]
    DuplicateProduct(i64),
    #[error("order is {0} and cannot receive merchandise")]
    NotReceivable(OrderStatus),
    #[error("received quantity for product {0} is too large")]
    QuantityOverflow(i64),
}

/// Check requested lines before an order is stored
pub fn validate_new_order_lines(lines: &[NewOrderLine]) -> Result<(), OrderError> {
    if lines.is_empty() {
        return Err(OrderError::Empty);
    }
    let mut seen = Vec::with_capacity(lines.len());
    for line in lines {
        if line.quantity <= 0 {
            return Err(OrderError::NonPositiveQuantity(line.product_id));
        }
        if seen.contains(&line.product_id) {
            return Err(OrderError::DuplicateProduct(line.product_id));
        }
        seen.push(line.product_id);
    }
    Ok(())
}

/// Distinct product ids across in-progress orders, in first-seen order
pub fn open_order_products(orders: &[Order]) -> Vec<i64> {
    let mut ids = Vec::new();
    for order in orders.iter().filter(|o| o.status == OrderStatus::InProgress) {
        for line in &order.lines {
            if !ids.contains(&line.product_id) {
                ids.push(line.product_id);
            }
        }
    }
    ids
}
