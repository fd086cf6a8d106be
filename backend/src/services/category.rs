//! Category service

use std::sync::Arc;

use crate::cache::{keys, CacheEvent, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::store::Store;
use shared::{validate_required, ActiveStatus, Category};

#[derive(Clone)]
pub struct CategoryService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
}

impl CategoryService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Category>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::CATEGORIES_ALL, || async move { store.list_categories().await })
            .await
    }

    pub async fn list_active(&self) -> AppResult<Vec<Category>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::CATEGORIES_ACTIVE, || async move {
                let categories = store.list_categories().await?;
                Ok::<_, AppError>(
                    categories
                        .into_iter()
                        .filter(|c| c.status.is_active())
                        .collect::<Vec<_>>(),
                )
            })
            .await
    }

    pub async fn create(&self, name: &str) -> AppResult<Category> {
        validate_required(name).map_err(|e| AppError::validation("name", e))?;

        let mut uow = self.store.begin().await?;
        let category = uow.insert_category(name.trim()).await?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::CategoryChanged).await;

        tracing::info!(category_id = category.id, "category created");
        Ok(category)
    }

    pub async fn rename(&self, id: i64, name: &str) -> AppResult<Category> {
        validate_required(name).map_err(|e| AppError::validation("name", e))?;

        let mut uow = self.store.begin().await?;
        let category = uow
            .rename_category(id, name.trim())
            .await?
            .ok_or_else(|| AppError::NotFound("Category".to_string()))?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::CategoryChanged).await;

        tracing::info!(category_id = id, "category renamed");
        Ok(category)
    }

    /// Change a category's status. Deactivation is refused while any active
    /// product of the category still has stock; otherwise its products are
    /// deactivated with it.
    pub async fn set_status(&self, id: i64, status: ActiveStatus) -> AppResult<()> {
        let mut uow = self.store.begin().await?;

        if status == ActiveStatus::Inactive {
            let stocked = uow
                .products_in_category(id)
                .await?
                .into_iter()
                .filter(|p| p.status.is_active() && p.stock > 0)
                .count();
            if stocked > 0 {
                return Err(AppError::Conflict {
                    resource: "Category".to_string(),
                    message: format!(
                        "category still has {} active product(s) with stock",
                        stocked
                    ),
                });
            }
        }

        if !uow.set_category_status(id, status).await? {
            return Err(AppError::NotFound("Category".to_string()));
        }

        let deactivated = if status == ActiveStatus::Inactive {
            uow.deactivate_category_products(id).await?
        } else {
            0
        };

        uow.commit().await?;
        self.cache.invalidate(CacheEvent::CategoryChanged).await;

        tracing::info!(
            category_id = id,
            status = %status,
            deactivated_products = deactivated,
            "category status changed"
        );
        Ok(())
    }
}
