//! Stock movement models: sales, purchases and adjustments

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::ParseEnumError;

/// What kind of stock-affecting event a movement records
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Sale,
    Purchase,
    /// Stock lost to damage, theft or expiry
    Shortage,
    /// Stock found beyond what the ledger says
    Overage,
}

impl MovementKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovementKind::Sale => "sale",
            MovementKind::Purchase => "purchase",
            MovementKind::Shortage => "shortage",
            MovementKind::Overage => "overage",
        }
    }

    /// Whether the movement takes units out of stock
    pub fn decreases_stock(&self) -> bool {
        matches!(self, MovementKind::Sale | MovementKind::Shortage)
    }
}

impl FromStr for MovementKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "sale" => Ok(MovementKind::Sale),
            "purchase" => Ok(MovementKind::Purchase),
            "shortage" => Ok(MovementKind::Shortage),
            "overage" => Ok(MovementKind::Overage),
            other => Err(ParseEnumError::new("movement kind", other)),
        }
    }
}

impl fmt::Display for MovementKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tax document issued for a sale
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum DocumentType {
    /// Boleta, issued to a person identified by DNI
    Receipt,
    /// Factura, issued to a business identified by RUC
    Invoice,
}

impl DocumentType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentType::Receipt => "receipt",
            DocumentType::Invoice => "invoice",
        }
    }

    pub fn series(&self) -> &'static str {
        match self {
            DocumentType::Receipt => "B001",
            DocumentType::Invoice => "F001",
        }
    }
}

impl FromStr for DocumentType {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "receipt" | "boleta" => Ok(DocumentType::Receipt),
            "invoice" | "factura" => Ok(DocumentType::Invoice),
            other => Err(ParseEnumError::new("document type", other)),
        }
    }
}

impl fmt::Display for DocumentType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentKind {
    Shortage,
    Overage,
}

impl AdjustmentKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdjustmentKind::Shortage => "shortage",
            AdjustmentKind::Overage => "overage",
        }
    }

    pub fn movement_kind(&self) -> MovementKind {
        match self {
            AdjustmentKind::Shortage => MovementKind::Shortage,
            AdjustmentKind::Overage => MovementKind::Overage,
        }
    }
}

impl FromStr for AdjustmentKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "shortage" => Ok(AdjustmentKind::Shortage),
            "overage" => Ok(AdjustmentKind::Overage),
            other => Err(ParseEnumError::new("adjustment kind", other)),
        }
    }
}

/// An immutable record of one stock-affecting event
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Movement {
    pub id: i64,
    pub user_id: i64,
    pub kind: MovementKind,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewMovement {
    pub user_id: i64,
    pub kind: MovementKind,
    pub occurred_at: DateTime<Utc>,
    pub note: Option<String>,
}

/// A product line of a movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LineItem {
    pub movement_id: i64,
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: i32,
    pub unit_price: Decimal,
    pub subtotal: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewLineItem {
    pub product_id: i64,
    pub quantity: i32,
    pub unit_price: Decimal,
}

impl NewLineItem {
    pub fn subtotal(&self) -> Result<Decimal, MovementError> {
        line_subtotal(self.quantity, self.unit_price)
            .ok_or(MovementError::AmountOverflow(self.product_id))
    }
}

/// `quantity * unit_price`, or `None` when the product does not fit a `Decimal`
pub fn line_subtotal(quantity: i32, unit_price: Decimal) -> Option<Decimal> {
    Decimal::from(quantity).checked_mul(unit_price)
}

/// Sum of `quantity * unit_price` over all lines
pub fn lines_total(lines: &[NewLineItem]) -> Result<Decimal, MovementError> {
    lines.iter().try_fold(Decimal::ZERO, |total, line| {
        total
            .checked_add(line.subtotal()?)
            .ok_or(MovementError::AmountOverflow(line.product_id))
    })
}

/// Reject empty line lists, non-positive quantities, negative prices and
/// amounts too large to total
pub fn validate_line_items(lines: &[NewLineItem]) -> Result<(), MovementError> {
    if lines.is_empty() {
        return Err(MovementError::NoLines);
    }
    for line in lines {
        if line.quantity <= 0 {
            return Err(MovementError::NonPositiveQuantity(line.product_id));
        }
        if line.unit_price < Decimal::ZERO {
            return Err(MovementError::NegativePrice(line.product_id));
        }
    }
    lines_total(lines).map(|_| ())
}

/// Next correlative number within a document type
pub fn next_sequence_number(current_max: Option<i32>) -> i32 {
    current_max.unwrap_or(0) + 1
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SaleRecord {
    pub movement_id: i64,
    pub client_id: i64,
    pub document_type: DocumentType,
    pub series: String,
    pub sequence_number: i32,
    pub total: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PurchaseRecord {
    pub movement_id: i64,
    pub supplier_id: i64,
    pub total: Decimal,
    pub order_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AdjustmentRecord {
    pub movement_id: i64,
    pub adjustment_kind: AdjustmentKind,
    pub reason: String,
}

/// The kind-specific part of a movement
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum MovementSpecialization {
    Sale(SaleRecord),
    Purchase(PurchaseRecord),
    Adjustment(AdjustmentRecord),
}

impl MovementSpecialization {
    pub fn total(&self) -> Option<Decimal> {
        match self {
            MovementSpecialization::Sale(sale) => Some(sale.total),
            MovementSpecialization::Purchase(purchase) => Some(purchase.total),
            MovementSpecialization::Adjustment(_) => None,
        }
    }
}

/// A movement with its specialization and lines
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MovementDetail {
    pub movement: Movement,
    pub specialization: Option<MovementSpecialization>,
    pub lines: Vec<LineItem>,
}

impl MovementDetail {
    pub fn lines_total(&self) -> Decimal {
        self.lines
            .iter()
            .fold(Decimal::ZERO, |total, l| total.saturating_add(l.subtotal))
    }
}

/// Movement kinds a report can be filtered by
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum ReportKind {
    #[serde(rename = "Venta")]
    Sales,
    #[serde(rename = "Compra")]
    Purchases,
    #[serde(rename = "Merma")]
    Shortages,
    #[serde(rename = "Sobrante")]
    Overages,
    #[serde(rename = "Todos")]
    All,
}

impl ReportKind {
    pub fn includes(&self, kind: MovementKind) -> bool {
        match self {
            ReportKind::Sales => kind == MovementKind::Sale,
            ReportKind::Purchases => kind == MovementKind::Purchase,
            ReportKind::Shortages => kind == MovementKind::Shortage,
            ReportKind::Overages => kind == MovementKind::Overage,
            ReportKind::All => true,
        }
    }
}

impl FromStr for ReportKind {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Venta" => Ok(ReportKind::Sales),
            "Compra" => Ok(ReportKind::Purchases),
            "Merma" => Ok(ReportKind::Shortages),
            "Sobrante" => Ok(ReportKind::Overages),
            "Todos" => Ok(ReportKind::All),
            other => Err(ParseEnumError::new("report kind", other)),
        }
    }
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MovementError {
    #[error("a movement needs at least one product line")]
    NoLines,
    #[error("quantity for product {0} must be positive")]
    NonPositiveQuantity(i64),
    #[error("unit price for product {0} cannot be negative")]
    NegativePrice(i64),
    #[error("amount for product {0} is too large")]
    AmountOverflow(i64),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_series_per_document_type() {
        assert_eq!(DocumentType::Receipt.series(), "B001");
        assert_eq!(DocumentType::Invoice.series(), "F001");
        assert_eq!("boleta".parse::<DocumentType>().unwrap(), DocumentType::Receipt);
        assert_eq!("factura".parse::<DocumentType>().unwrap(), DocumentType::Invoice);
    }

    #[test]
    fn test_next_sequence_number() {
        assert_eq!(next_sequence_number(None), 1);
        assert_eq!(next_sequence_number(Some(41)), 42);
    }

    #[test]
    fn test_lines_total() {
        let lines = vec![
            NewLineItem { product_id: 1, quantity: 2, unit_price: dec("3.50") },
            NewLineItem { product_id: 2, quantity: 3, unit_price: dec("1.10") },
        ];
        assert_eq!(lines_total(&lines), Ok(dec("10.30")));
    }

    #[test]
    fn test_oversized_amounts_are_rejected() {
        let single = [NewLineItem { product_id: 4, quantity: 2, unit_price: Decimal::MAX }];
        assert_eq!(
            validate_line_items(&single),
            Err(MovementError::AmountOverflow(4))
        );

        // Each line fits on its own, the sum does not
        let half = Decimal::MAX / Decimal::from(2) + Decimal::ONE;
        let pair = [
            NewLineItem { product_id: 5, quantity: 1, unit_price: half },
            NewLineItem { product_id: 6, quantity: 1, unit_price: half },
        ];
        assert!(pair[0].subtotal().is_ok());
        assert_eq!(
            validate_line_items(&pair),
            Err(MovementError::AmountOverflow(6))
        );
    }

    #[test]
    fn test_validate_line_items() {
        assert_eq!(validate_line_items(&[]), Err(MovementError::NoLines));
        let bad = [NewLineItem { product_id: 7, quantity: 0, unit_price: Decimal::ONE }];
        assert_eq!(
            validate_line_items(&bad),
            Err(MovementError::NonPositiveQuantity(7))
        );
        let negative = [NewLineItem { product_id: 3, quantity: 1, unit_price: dec("-1") }];
        assert_eq!(
            validate_line_items(&negative),
            Err(MovementError::NegativePrice(3))
        );
    }

    #[test]
    fn test_report_kind_filters() {
        assert!(ReportKind::All.includes(MovementKind::Overage));
        assert!(ReportKind::Shortages.includes(MovementKind::Shortage));
        assert!(!ReportKind::Sales.includes(MovementKind::Purchase));
        assert!("Otro".parse::<ReportKind>().is_err());
    }

    #[test]
    fn test_adjustment_maps_to_movement_kind() {
        assert_eq!(AdjustmentKind::Shortage.movement_kind(), MovementKind::Shortage);
        assert!(MovementKind::Shortage.decreases_stock());
        assert!(!AdjustmentKind::Overage.movement_kind().decreases_stock());
    }
}
