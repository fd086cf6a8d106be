//! Catalog models: products, categories, suppliers and clients

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::ActiveStatus;

/// A product in the catalog.
///
/// `stock` is only changed through stock ledger operations; catalog edits
/// never touch it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Product {
    pub id: i64,
    pub name: String,
    pub stock: i32,
    /// Threshold below which the product is considered critical
    pub min_stock: i32,
    pub unit_price: Decimal,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
    pub status: ActiveStatus,
}

impl Product {
    /// Active and below its minimum stock threshold
    pub fn is_below_minimum(&self) -> bool {
        self.status.is_active() && self.stock < self.min_stock
    }
}

/// Product grouping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub status: ActiveStatus,
}

/// A supplier that receives replenishment orders
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Supplier {
    pub id: i64,
    pub business_name: String,
    /// Peruvian taxpayer number (RUC), 11 digits
    pub tax_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

/// A customer identified by DNI (receipts) or RUC (invoices)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Client {
    pub id: i64,
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub national_id: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

impl Client {
    /// Whether submitted contact details differ from the stored ones.
    /// Blank submissions never count as a change.
    pub fn contact_changed(&self, email: Option<&str>, address: Option<&str>) -> bool {
        let differs = |new: Option<&str>, old: &Option<String>| match new {
            Some(value) if !value.trim().is_empty() => old.as_deref() != Some(value),
            _ => false,
        };
        differs(email, &self.email) || differs(address, &self.address)
    }
}

/// Fields of a product being added to the catalog
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProduct {
    pub name: String,
    #[serde(default)]
    pub stock: i32,
    pub min_stock: i32,
    pub unit_price: Decimal,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
}

/// Editable product fields. Stock is deliberately absent.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductChanges {
    pub name: String,
    pub min_stock: i32,
    pub unit_price: Decimal,
    pub category_id: Option<i64>,
    pub supplier_id: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSupplier {
    pub business_name: String,
    pub tax_id: String,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub address: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewClient {
    pub name: Option<String>,
    pub business_name: Option<String>,
    pub national_id: Option<String>,
    pub tax_id: Option<String>,
    pub address: Option<String>,
    pub email: Option<String>,
}

/// Products that are below minimum and not already covered by an open order
pub fn critical_products<'a>(products: &'a [Product], on_order: &[i64]) -> Vec<&'a Product> {
    products
        .iter()
        .filter(|p| p.is_below_minimum() && !on_order.contains(&p.id))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn product(id: i64, stock: i32, min_stock: i32, status: ActiveStatus) -> Product {
        Product {
            id,
            name: format!("P{}", id),
            stock,
            min_stock,
            unit_price: Decimal::from(10),
            category_id: None,
            supplier_id: None,
            status,
        }
    }

    #[test]
    fn test_critical_excludes_products_on_order() {
        let products = vec![
            product(1, 2, 5, ActiveStatus::Active),
            product(2, 1, 5, ActiveStatus::Active),
            product(3, 9, 5, ActiveStatus::Active),
            product(4, 0, 5, ActiveStatus::Inactive),
        ];
        let critical = critical_products(&products, &[2]);
        let ids: Vec<i64> = critical.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1]);
    }

    #[test]
    fn test_stock_equal_to_minimum_is_not_critical() {
        assert!(!product(1, 5, 5, ActiveStatus::Active).is_below_minimum());
    }

    #[test]
    fn test_client_contact_changed() {
        let client = Client {
            id: 1,
            name: Some("Ana".into()),
            business_name: None,
            national_id: Some("12345678".into()),
            tax_id: None,
            address: Some("Av. Lima 123".into()),
            email: Some("ana@example.com".into()),
        };
        assert!(!client.contact_changed(Some("ana@example.com"), None));
        assert!(!client.contact_changed(Some("  "), Some("")));
        assert!(client.contact_changed(None, Some("Jr. Cusco 45")));
    }
}
