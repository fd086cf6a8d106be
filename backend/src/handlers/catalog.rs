//! Product, category, supplier and client handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::Deserialize;

use crate::error::AppResult;
use crate::middleware::{require_admin, AuthUser};
use crate::services::{CategoryService, ClientService, ProductService, SupplierService};
use crate::AppState;
use shared::{
    ActiveStatus, Category, Client, NewProduct, NewSupplier, Product, ProductAudit,
    ProductChanges, Supplier,
};

#[derive(Deserialize)]
pub struct StatusRequest {
    pub status: ActiveStatus,
}

#[derive(Deserialize)]
pub struct CategoryRequest {
    pub name: String,
}

fn products(state: &AppState) -> ProductService {
    ProductService::new(state.store.clone(), state.cache.clone())
}

fn categories(state: &AppState) -> CategoryService {
    CategoryService::new(state.store.clone(), state.cache.clone())
}

fn suppliers(state: &AppState) -> SupplierService {
    SupplierService::new(state.store.clone(), state.cache.clone())
}

// ============================================================================
// Products
// ============================================================================

pub async fn list_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(products(&state).list().await?))
}

pub async fn get_product(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Product>> {
    Ok(Json(products(&state).get(id).await?))
}

pub async fn create_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Json(body): Json<NewProduct>,
) -> AppResult<(StatusCode, Json<Product>)> {
    let product = products(&state).create(user.user_id, body).await?;
    Ok((StatusCode::CREATED, Json(product)))
}

pub async fn update_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<ProductChanges>,
) -> AppResult<Json<Product>> {
    Ok(Json(products(&state).update(user.user_id, id, body).await?))
}

pub async fn set_product_status(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> AppResult<StatusCode> {
    products(&state).set_status(user.user_id, id, body.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Active products offered when building an order
pub async fn products_for_order(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(products(&state).products_for_order().await?))
}

pub async fn critical_products(State(state): State<AppState>) -> AppResult<Json<Vec<Product>>> {
    Ok(Json(products(&state).critical_products().await?))
}

// ============================================================================
// Product audit trail (admin only)
// ============================================================================

pub async fn list_product_audits(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
) -> AppResult<Json<Vec<ProductAudit>>> {
    require_admin(&user)?;
    Ok(Json(products(&state).audits().await?))
}

pub async fn product_audits_for_product(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<ProductAudit>>> {
    require_admin(&user)?;
    Ok(Json(products(&state).audits_for_product(id).await?))
}

pub async fn product_audits_by_user(
    State(state): State<AppState>,
    Extension(user): Extension<AuthUser>,
    Path(id): Path<i64>,
) -> AppResult<Json<Vec<ProductAudit>>> {
    require_admin(&user)?;
    Ok(Json(products(&state).audits_by_user(id).await?))
}

// ============================================================================
// Categories
// ============================================================================

pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(categories(&state).list().await?))
}

pub async fn list_active_categories(
    State(state): State<AppState>,
) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(categories(&state).list_active().await?))
}

pub async fn create_category(
    State(state): State<AppState>,
    Json(body): Json<CategoryRequest>,
) -> AppResult<(StatusCode, Json<Category>)> {
    let category = categories(&state).create(&body.name).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub async fn rename_category(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<CategoryRequest>,
) -> AppResult<Json<Category>> {
    Ok(Json(categories(&state).rename(id, &body.name).await?))
}

pub async fn set_category_status(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<StatusRequest>,
) -> AppResult<StatusCode> {
    categories(&state).set_status(id, body.status).await?;
    Ok(StatusCode::NO_CONTENT)
}

// ============================================================================
// Suppliers and clients
// ============================================================================

pub async fn list_suppliers(State(state): State<AppState>) -> AppResult<Json<Vec<Supplier>>> {
    Ok(Json(suppliers(&state).list().await?))
}

pub async fn get_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
) -> AppResult<Json<Supplier>> {
    Ok(Json(suppliers(&state).get(id).await?))
}

pub async fn create_supplier(
    State(state): State<AppState>,
    Json(body): Json<NewSupplier>,
) -> AppResult<(StatusCode, Json<Supplier>)> {
    let supplier = suppliers(&state).create(body).await?;
    Ok((StatusCode::CREATED, Json(supplier)))
}

pub async fn update_supplier(
    State(state): State<AppState>,
    Path(id): Path<i64>,
    Json(body): Json<NewSupplier>,
) -> AppResult<Json<Supplier>> {
    Ok(Json(suppliers(&state).update(id, body).await?))
}

pub async fn list_clients(State(state): State<AppState>) -> AppResult<Json<Vec<Client>>> {
    let service = ClientService::new(state.store.clone(), state.cache.clone());
    Ok(Json(service.list().await?))
}
