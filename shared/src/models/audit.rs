//! Product audit trail

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{Product, ProductChanges};
use crate::types::{ActiveStatus, ParseEnumError};

/// What was done to a product
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    Create,
    Update,
    StatusChange,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::Create => "create",
            AuditAction::Update => "update",
            AuditAction::StatusChange => "status_change",
        }
    }
}

impl FromStr for AuditAction {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "create" => Ok(AuditAction::Create),
            "update" => Ok(AuditAction::Update),
            "status_change" => Ok(AuditAction::StatusChange),
            other => Err(ParseEnumError::new("audit action", other)),
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Old and new value of one field; `None` is an empty value
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldChange {
    pub before: Option<String>,
    pub after: Option<String>,
}

/// Changed fields keyed by field name
pub type ChangedFields = BTreeMap<String, FieldChange>;

/// One recorded change to a product
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProductAudit {
    pub id: i64,
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub user_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    pub action: AuditAction,
    pub changed_fields: ChangedFields,
    pub recorded_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewProductAudit {
    pub product_id: i64,
    pub user_id: i64,
    pub action: AuditAction,
    pub changed_fields: ChangedFields,
}

fn diff<T: PartialEq + ToString>(
    fields: &mut ChangedFields,
    name: &str,
    before: Option<&T>,
    after: Option<&T>,
) {
    if before != after {
        fields.insert(
            name.to_string(),
            FieldChange {
                before: before.map(ToString::to_string),
                after: after.map(ToString::to_string),
            },
        );
    }
}

/// Every field of a newly created product, with no previous value
pub fn created_fields(product: &Product) -> ChangedFields {
    let mut fields = ChangedFields::new();
    diff(&mut fields, "name", None, Some(&product.name));
    diff(&mut fields, "stock", None, Some(&product.stock));
    diff(&mut fields, "min_stock", None, Some(&product.min_stock));
    diff(&mut fields, "unit_price", None, Some(&product.unit_price));
    diff(&mut fields, "category_id", None, product.category_id.as_ref());
    diff(&mut fields, "supplier_id", None, product.supplier_id.as_ref());
    fields
}

/// Editable fields whose value differs between `before` and `changes`.
/// Prices are compared by value, so `7.1` and `7.10` are not a change.
pub fn changed_fields(before: &Product, changes: &ProductChanges) -> ChangedFields {
    let mut fields = ChangedFields::new();
    diff(&mut fields, "name", Some(&before.name), Some(&changes.name));
    diff(&mut fields, "min_stock", Some(&before.min_stock), Some(&changes.min_stock));
    diff(&mut fields, "unit_price", Some(&before.unit_price), Some(&changes.unit_price));
    diff(
        &mut fields,
        "category_id",
        before.category_id.as_ref(),
        changes.category_id.as_ref(),
    );
    diff(
        &mut fields,
        "supplier_id",
        before.supplier_id.as_ref(),
        changes.supplier_id.as_ref(),
    );
    fields
}

pub fn status_change(before: ActiveStatus, after: ActiveStatus) -> ChangedFields {
    let mut fields = ChangedFields::new();
    diff(&mut fields, "status", Some(&before), Some(&after));
    fields
}
