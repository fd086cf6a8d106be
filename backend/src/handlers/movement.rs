//! Movement handlers: sales, purchases and stock adjustments

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};

use crate::error::AppResult;
use crate::middleware::AuthUser;
use crate::services::movement::{RegisterAdjustmentInput, RegisterSaleInput, SaleReceipt};
use crate::services::order::{PurchaseReceipt, ReceivePurchaseInput};
use crate::services::{MovementService, OrderService};
use crate::AppState;
use shared::{Movement, MovementDetail};

fn movements(state: &AppState) -> MovementService {
    MovementService::new(state.store.clone(), state.cache.clone())
}

pub async fn list_movements(State(state): State<AppState>) -> AppResult<Json<Vec<Movement>>> {
    Ok(Json(movements(&state).list_movements().await?))
}

pub async fn get_movement(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<MovementDetail>> {
    Ok(Json(movements(&state).movement_detail(id).await?))
}

/// Register a sale and take its units out of stock
pub async fn register_sale(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterSaleInput>,
) -> AppResult<(StatusCode, Json<SaleReceipt>)> {
    let receipt = movements(&state).register_sale(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

/// Register incoming merchandise, optionally against an order
pub async fn register_purchase(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<ReceivePurchaseInput>,
) -> AppResult<(StatusCode, Json<PurchaseReceipt>)> {
    let service = OrderService::new(state.store.clone(), state.cache.clone(), state.clock);
    let receipt = service.receive_purchase(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(receipt)))
}

pub async fn register_shortage(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterAdjustmentInput>,
) -> AppResult<(StatusCode, Json<MovementDetail>)> {
    let detail = movements(&state).register_shortage(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}

pub async fn register_overage(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<RegisterAdjustmentInput>,
) -> AppResult<(StatusCode, Json<MovementDetail>)> {
    let detail = movements(&state).register_overage(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(detail)))
}
