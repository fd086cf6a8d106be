//! Product catalog service

use std::sync::Arc;

use crate::cache::{keys, CacheEvent, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::store::{Store, UnitOfWork};
use shared::{
    changed_fields, created_fields, critical_products, open_order_products, status_change,
    validate_required, validate_stock_level, validate_unit_price, ActiveStatus, AuditAction,
    ChangedFields, NewProduct, NewProductAudit, OrderStatus, Product, ProductAudit,
    ProductChanges,
};

/// Product service
#[derive(Clone)]
pub struct ProductService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
}

impl ProductService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Product>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::PRODUCTS_ALL, || async move { store.list_products().await })
            .await
    }

    pub async fn get(&self, id: i64) -> AppResult<Product> {
        self.store
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    /// Add an active product with its opening stock
    pub async fn create(&self, user_id: i64, input: NewProduct) -> AppResult<Product> {
        validate_required(&input.name).map_err(|e| AppError::validation("name", e))?;
        validate_stock_level(input.stock).map_err(|e| AppError::validation("stock", e))?;
        validate_stock_level(input.min_stock).map_err(|e| AppError::validation("min_stock", e))?;
        validate_unit_price(input.unit_price).map_err(|e| AppError::validation("unit_price", e))?;
        self.check_references(input.category_id, input.supplier_id)
            .await?;

        let mut uow = self.store.begin().await?;
        let product = uow.insert_product(input).await?;
        record_audit(
            uow.as_mut(),
            product.id,
            user_id,
            AuditAction::Create,
            created_fields(&product),
        )
        .await?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::ProductChanged).await;

        tracing::info!(product_id = product.id, name = %product.name, "product created");
        Ok(product)
    }

    /// Edit descriptive fields. Stock only moves through the ledger.
    ///
    /// An audit entry listing the changed fields is written when anything
    /// actually differs.
    pub async fn update(
        &self,
        user_id: i64,
        id: i64,
        changes: ProductChanges,
    ) -> AppResult<Product> {
        validate_required(&changes.name).map_err(|e| AppError::validation("name", e))?;
        validate_stock_level(changes.min_stock)
            .map_err(|e| AppError::validation("min_stock", e))?;
        validate_unit_price(changes.unit_price)
            .map_err(|e| AppError::validation("unit_price", e))?;
        self.check_references(changes.category_id, changes.supplier_id)
            .await?;

        let mut uow = self.store.begin().await?;
        let before = uow
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        let fields = changed_fields(&before, &changes);
        let product = uow
            .update_product(id, changes)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        record_audit(uow.as_mut(), id, user_id, AuditAction::Update, fields).await?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::ProductChanged).await;

        tracing::info!(product_id = id, "product updated");
        Ok(product)
    }

    pub async fn set_status(&self, user_id: i64, id: i64, status: ActiveStatus) -> AppResult<()> {
        let mut uow = self.store.begin().await?;
        let before = uow
            .get_product(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Product".to_string()))?;
        if !uow.set_product_status(id, status).await? {
            return Err(AppError::NotFound("Product".to_string()));
        }
        record_audit(
            uow.as_mut(),
            id,
            user_id,
            AuditAction::StatusChange,
            status_change(before.status, status),
        )
        .await?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::ProductChanged).await;

        tracing::info!(product_id = id, status = %status, "product status changed");
        Ok(())
    }

    /// Active products that can be placed on an order
    pub async fn products_for_order(&self) -> AppResult<Vec<Product>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::PRODUCTS_FOR_ORDER, || async move {
                let products = store.list_products().await?;
                Ok::<_, AppError>(
                    products
                        .into_iter()
                        .filter(|p| p.status.is_active())
                        .collect::<Vec<_>>(),
                )
            })
            .await
    }

    /// Active products below minimum stock that no in-progress order covers
    pub async fn critical_products(&self) -> AppResult<Vec<Product>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::PRODUCTS_CRITICAL, || async move {
                let products = store.list_products().await?;
                let open = store.orders_with_status(OrderStatus::InProgress).await?;
                let on_order = open_order_products(&open);
                Ok::<_, AppError>(
                    critical_products(&products, &on_order)
                        .into_iter()
                        .cloned()
                        .collect::<Vec<_>>(),
                )
            })
            .await
    }

    /// Full audit trail, newest first
    pub async fn audits(&self) -> AppResult<Vec<ProductAudit>> {
        self.store.list_product_audits().await
    }

    pub async fn audits_for_product(&self, product_id: i64) -> AppResult<Vec<ProductAudit>> {
        self.store.product_audits_for_product(product_id).await
    }

    pub async fn audits_by_user(&self, user_id: i64) -> AppResult<Vec<ProductAudit>> {
        self.store.product_audits_for_user(user_id).await
    }

    async fn check_references(
        &self,
        category_id: Option<i64>,
        supplier_id: Option<i64>,
    ) -> AppResult<()> {
        if let Some(id) = category_id {
            if self.store.get_category(id).await?.is_none() {
                return Err(AppError::NotFound("Category".to_string()));
            }
        }
        if let Some(id) = supplier_id {
            if self.store.get_supplier(id).await?.is_none() {
                return Err(AppError::NotFound("Supplier".to_string()));
            }
        }
        Ok(())
    }
}

/// Write an audit entry unless no field changed
async fn record_audit(
    uow: &mut dyn UnitOfWork,
    product_id: i64,
    user_id: i64,
    action: AuditAction,
    changed_fields: ChangedFields,
) -> AppResult<()> {
    if changed_fields.is_empty() {
        return Ok(());
    }
    uow.insert_product_audit(NewProductAudit {
        product_id,
        user_id,
        action,
        changed_fields,
    })
    .await?;
    Ok(())
}
