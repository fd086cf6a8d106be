//! Movement recorder: sales, adjustments and the building blocks every
//! stock-affecting workflow uses to append its immutable record

use std::sync::Arc;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::cache::{keys, CacheEvent, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::services::stock;
use crate::store::{Store, UnitOfWork};
use shared::{
    lines_total, validate_dni, validate_line_items, validate_ruc, AdjustmentKind,
    AdjustmentRecord, Client, DocumentType, LineItem, Movement, MovementDetail, MovementKind,
    NewClient, NewLineItem, NewMovement, PurchaseRecord, SaleRecord,
};

// ============================================================================
// Recorder primitives
// ============================================================================

/// Append the movement header
pub async fn record(
    uow: &mut dyn UnitOfWork,
    actor: i64,
    kind: MovementKind,
    occurred_at: DateTime<Utc>,
    note: Option<String>,
) -> AppResult<Movement> {
    uow.insert_movement(NewMovement {
        user_id: actor,
        kind,
        occurred_at,
        note: note.filter(|n| !n.trim().is_empty()),
    })
    .await
}

/// Attach the sale specialization, numbering it within its document type
pub async fn record_sale(
    uow: &mut dyn UnitOfWork,
    movement_id: i64,
    client_id: i64,
    document_type: DocumentType,
    total: Decimal,
) -> AppResult<SaleRecord> {
    uow.insert_sale(movement_id, client_id, document_type, total)
        .await
}

pub async fn record_purchase(
    uow: &mut dyn UnitOfWork,
    movement_id: i64,
    supplier_id: i64,
    total: Decimal,
    order_id: Option<i64>,
) -> AppResult<PurchaseRecord> {
    uow.insert_purchase(PurchaseRecord {
        movement_id,
        supplier_id,
        total,
        order_id,
    })
    .await
}

pub async fn record_adjustment(
    uow: &mut dyn UnitOfWork,
    movement_id: i64,
    kind: AdjustmentKind,
    reason: &str,
) -> AppResult<AdjustmentRecord> {
    uow.insert_adjustment(movement_id, kind, reason).await
}

/// Store one line; the subtotal is always `quantity * unit_price`
pub async fn record_line_item(
    uow: &mut dyn UnitOfWork,
    movement_id: i64,
    product_id: i64,
    quantity: i32,
    unit_price: Decimal,
) -> AppResult<LineItem> {
    let line = NewLineItem {
        product_id,
        quantity,
        unit_price,
    };
    validate_line_items(std::slice::from_ref(&line))?;
    uow.insert_line_item(movement_id, line).await
}

/// Log when the stated total differs from the sum of the lines
pub(crate) fn check_stated_total(kind: MovementKind, stated: Decimal, lines: &[NewLineItem]) {
    let Ok(computed) = lines_total(lines) else {
        return;
    };
    if computed != stated {
        tracing::warn!(
            kind = %kind,
            stated = %stated,
            computed = %computed,
            "movement total does not match its lines"
        );
    }
}

// ============================================================================
// Workflows
// ============================================================================

/// Customer details captured at the point of sale
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct SaleClientInput {
    #[validate(length(max = 150))]
    pub name: Option<String>,
    #[validate(length(max = 200))]
    pub business_name: Option<String>,
    /// DNI, required for receipts
    pub national_id: Option<String>,
    /// RUC, required for invoices
    pub tax_id: Option<String>,
    #[validate(length(max = 250))]
    pub address: Option<String>,
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterSaleInput {
    pub document_type: DocumentType,
    #[validate]
    pub client: SaleClientInput,
    pub lines: Vec<NewLineItem>,
    pub total: Decimal,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// A shortage or overage of one product
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterAdjustmentInput {
    pub product_id: i64,
    #[validate(range(min = 1, message = "Quantity must be greater than zero"))]
    pub quantity: i32,
    #[validate(length(min = 1, max = 250, message = "A reason is required"))]
    pub reason: String,
    #[validate(length(max = 500))]
    pub note: Option<String>,
}

/// Everything written by a sale
#[derive(Debug, Clone, Serialize)]
pub struct SaleReceipt {
    pub movement: Movement,
    pub sale: SaleRecord,
    pub client: Client,
    pub lines: Vec<LineItem>,
}

/// Movement service
#[derive(Clone)]
pub struct MovementService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
}

impl MovementService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache) -> Self {
        Self { store, cache }
    }

    /// Record a sale: resolve the client, write the movement with its lines
    /// and take the units out of stock, all in one unit of work
    pub async fn register_sale(&self, actor: i64, input: RegisterSaleInput) -> AppResult<SaleReceipt> {
        input.validate()?;
        validate_line_items(&input.lines)?;
        check_stated_total(MovementKind::Sale, input.total, &input.lines);

        let mut uow = self.store.begin().await?;

        let client = resolve_client(uow.as_mut(), input.document_type, &input.client).await?;
        let movement = record(uow.as_mut(), actor, MovementKind::Sale, Utc::now(), input.note).await?;
        let sale = record_sale(
            uow.as_mut(),
            movement.id,
            client.id,
            input.document_type,
            input.total,
        )
        .await?;

        let mut lines = Vec::with_capacity(input.lines.len());
        for line in &input.lines {
            lines.push(
                record_line_item(
                    uow.as_mut(),
                    movement.id,
                    line.product_id,
                    line.quantity,
                    line.unit_price,
                )
                .await?,
            );
            stock::decrease(uow.as_mut(), line.product_id, line.quantity).await?;
        }

        uow.commit().await?;
        self.cache.invalidate(CacheEvent::SaleRecorded).await;

        tracing::info!(
            movement_id = movement.id,
            series = %sale.series,
            sequence = sale.sequence_number,
            "sale registered"
        );

        Ok(SaleReceipt {
            movement,
            sale,
            client,
            lines,
        })
    }

    /// Record units lost from stock
    pub async fn register_shortage(
        &self,
        actor: i64,
        input: RegisterAdjustmentInput,
    ) -> AppResult<MovementDetail> {
        self.register_adjustment(actor, AdjustmentKind::Shortage, input)
            .await
    }

    /// Record units found beyond the ledger
    pub async fn register_overage(
        &self,
        actor: i64,
        input: RegisterAdjustmentInput,
    ) -> AppResult<MovementDetail> {
        self.register_adjustment(actor, AdjustmentKind::Overage, input)
            .await
    }

    async fn register_adjustment(
        &self,
        actor: i64,
        kind: AdjustmentKind,
        input: RegisterAdjustmentInput,
    ) -> AppResult<MovementDetail> {
        input.validate()?;

        let mut uow = self.store.begin().await?;

        let product = uow
            .get_product(input.product_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;

        let movement = record(
            uow.as_mut(),
            actor,
            kind.movement_kind(),
            Utc::now(),
            input.note,
        )
        .await?;
        let adjustment = record_adjustment(uow.as_mut(), movement.id, kind, &input.reason).await?;
        let line = record_line_item(
            uow.as_mut(),
            movement.id,
            product.id,
            input.quantity,
            product.unit_price,
        )
        .await?;

        match kind {
            AdjustmentKind::Shortage => {
                stock::decrease(uow.as_mut(), product.id, input.quantity).await?
            }
            AdjustmentKind::Overage => {
                stock::increase(uow.as_mut(), product.id, input.quantity).await?
            }
        };

        uow.commit().await?;
        self.cache
            .invalidate(match kind {
                AdjustmentKind::Shortage => CacheEvent::ShortageRecorded,
                AdjustmentKind::Overage => CacheEvent::OverageRecorded,
            })
            .await;

        tracing::info!(
            movement_id = movement.id,
            product_id = product.id,
            quantity = input.quantity,
            kind = kind.as_str(),
            "stock adjustment registered"
        );

        Ok(MovementDetail {
            movement,
            specialization: Some(shared::MovementSpecialization::Adjustment(adjustment)),
            lines: vec![line],
        })
    }

    /// All movements, newest first
    pub async fn list_movements(&self) -> AppResult<Vec<Movement>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::MOVEMENTS_ALL, || async move { store.list_movements().await })
            .await
    }

    pub async fn movement_detail(&self, id: i64) -> AppResult<MovementDetail> {
        self.store
            .movement_detail(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Movement".to_string()))
    }
}

/// Find the client by the document the sale requires, registering it when
/// unknown and refreshing changed contact details when known
async fn resolve_client(
    uow: &mut dyn UnitOfWork,
    document_type: DocumentType,
    input: &SaleClientInput,
) -> AppResult<Client> {
    let existing = match document_type {
        DocumentType::Receipt => {
            let dni = input
                .national_id
                .as_deref()
                .ok_or_else(|| AppError::validation("national_id", "A DNI is required"))?;
            validate_dni(dni).map_err(|e| AppError::validation("national_id", e))?;
            uow.find_client_by_national_id(dni).await?
        }
        DocumentType::Invoice => {
            let ruc = input
                .tax_id
                .as_deref()
                .ok_or_else(|| AppError::validation("tax_id", "A RUC is required"))?;
            validate_ruc(ruc).map_err(|e| AppError::validation("tax_id", e))?;
            uow.find_client_by_tax_id(ruc).await?
        }
    };

    let email = input.email.as_deref();
    let address = input.address.as_deref();

    match existing {
        Some(mut client) => {
            if client.contact_changed(email, address) {
                let email = email.filter(|v| !v.trim().is_empty());
                let address = address.filter(|v| !v.trim().is_empty());
                uow.update_client_contact(client.id, email, address).await?;
                if let Some(email) = email {
                    client.email = Some(email.to_string());
                }
                if let Some(address) = address {
                    client.address = Some(address.to_string());
                }
                tracing::debug!(client_id = client.id, "client contact details updated");
            }
            Ok(client)
        }
        None => {
            let client = uow
                .insert_client(NewClient {
                    name: input.name.clone(),
                    business_name: input.business_name.clone(),
                    national_id: input.national_id.clone(),
                    tax_id: input.tax_id.clone(),
                    address: input.address.clone(),
                    email: input.email.clone(),
                })
                .await?;
            tracing::info!(client_id = client.id, "client registered");
            Ok(client)
        }
    }
}
