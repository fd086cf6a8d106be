//! Replenishment order handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use chrono::NaiveDate;
use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::middleware::AuthUser;
use crate::services::order::{CreateOrderInput, OrderDetail};
use crate::services::OrderService;
use crate::AppState;
use shared::{DailyCount, Order};

fn orders(state: &AppState) -> OrderService {
    OrderService::new(state.store.clone(), state.cache.clone(), state.clock)
}

#[derive(Serialize)]
pub struct OpenOrderProducts {
    pub product_ids: Vec<i64>,
}

pub async fn list_orders(State(state): State<AppState>) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(orders(&state).list_orders().await?))
}

pub async fn get_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<OrderDetail>> {
    Ok(Json(orders(&state).get_order(id).await?))
}

pub async fn create_order(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<CreateOrderInput>,
) -> AppResult<(StatusCode, Json<Order>)> {
    let order = orders(&state).create(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(order)))
}

pub async fn cancel_order(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Order>> {
    Ok(Json(orders(&state).cancel(id).await?))
}

/// The open order a product is waiting on
pub async fn open_order_for_product(
    State(state): State<AppState>,
    Path(product_id): Path<i64>,
) -> AppResult<Json<Order>> {
    orders(&state)
        .find_open_order_for_product(product_id)
        .await?
        .map(Json)
        .ok_or_else(|| AppError::NotFound("Open order for product".to_string()))
}

pub async fn open_order_products(
    State(state): State<AppState>,
) -> AppResult<Json<OpenOrderProducts>> {
    let product_ids = orders(&state).open_order_products().await?;
    Ok(Json(OpenOrderProducts { product_ids }))
}

pub async fn orders_on_date(
    State(state): State<AppState>,
    Path(date): Path<NaiveDate>,
) -> AppResult<Json<Vec<Order>>> {
    Ok(Json(orders(&state).orders_on_date(date).await?))
}

pub async fn orders_summary(State(state): State<AppState>) -> AppResult<Json<Vec<DailyCount>>> {
    Ok(Json(orders(&state).orders_summary_30_days().await?))
}
