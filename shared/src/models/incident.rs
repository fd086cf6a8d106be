//! Incident models for short or damaged deliveries

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ReceiptLine;

/// Description used when the receipt carries no general note
pub const DEFAULT_INCIDENT_DESCRIPTION: &str = "Complicaciones en la Llegada de la Entrada";

/// A recorded discrepancy between what was ordered and what arrived
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Incident {
    pub id: i64,
    pub movement_id: i64,
    pub order_id: Option<i64>,
    pub description: String,
    pub details: Vec<IncidentDetail>,
    pub registered_at: DateTime<Utc>,
    /// Business date the goods arrived
    pub occurred_at: DateTime<Utc>,
}

/// One flagged product inside an incident
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IncidentDetail {
    pub product_id: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_name: Option<String>,
    pub quantity: i32,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewIncident {
    pub movement_id: i64,
    pub order_id: Option<i64>,
    pub description: String,
    pub details: Vec<IncidentDetail>,
    pub occurred_at: DateTime<Utc>,
}

/// Details for every receipt line carrying a non-blank incident note
pub fn incident_details(lines: &[ReceiptLine]) -> Vec<IncidentDetail> {
    lines
        .iter()
        .filter_map(|line| {
            line.incident_note().map(|note| IncidentDetail {
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                quantity: line.quantity,
                description: note.to_string(),
            })
        })
        .collect()
}

/// General description for an incident, falling back to the default text
pub fn incident_description(note: Option<&str>) -> String {
    note.map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_INCIDENT_DESCRIPTION)
        .to_string()
}
