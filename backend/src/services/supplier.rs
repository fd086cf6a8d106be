//! Supplier and client registries

use std::sync::Arc;

use crate::cache::{keys, CacheEvent, ReadThroughCache};
use crate::error::{AppError, AppResult};
use crate::store::Store;
use shared::{
    validate_email, validate_peru_phone, validate_required, validate_ruc, Client, NewSupplier,
    Supplier,
};

#[derive(Clone)]
pub struct SupplierService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
}

impl SupplierService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Supplier>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::SUPPLIERS_ALL, || async move { store.list_suppliers().await })
            .await
    }

    pub async fn get(&self, id: i64) -> AppResult<Supplier> {
        self.store
            .get_supplier(id)
            .await?
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))
    }

    pub async fn create(&self, input: NewSupplier) -> AppResult<Supplier> {
        validate_supplier(&input)?;

        let mut uow = self.store.begin().await?;
        let supplier = uow.insert_supplier(input).await?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::SupplierChanged).await;

        tracing::info!(supplier_id = supplier.id, "supplier registered");
        Ok(supplier)
    }

    pub async fn update(&self, id: i64, input: NewSupplier) -> AppResult<Supplier> {
        validate_supplier(&input)?;

        let mut uow = self.store.begin().await?;
        let supplier = uow
            .update_supplier(id, input)
            .await?
            .ok_or_else(|| AppError::NotFound("Supplier".to_string()))?;
        uow.commit().await?;
        self.cache.invalidate(CacheEvent::SupplierChanged).await;

        tracing::info!(supplier_id = id, "supplier updated");
        Ok(supplier)
    }
}

fn validate_supplier(input: &NewSupplier) -> AppResult<()> {
    validate_required(&input.business_name)
        .map_err(|e| AppError::validation("business_name", e))?;
    validate_ruc(&input.tax_id).map_err(|e| AppError::validation("tax_id", e))?;
    if let Some(phone) = input.phone.as_deref().filter(|p| !p.trim().is_empty()) {
        validate_peru_phone(phone).map_err(|e| AppError::validation("phone", e))?;
    }
    if let Some(email) = input.email.as_deref().filter(|e| !e.trim().is_empty()) {
        validate_email(email).map_err(|e| AppError::validation("email", e))?;
    }
    Ok(())
}

/// Clients are registered by the sale workflow; this only reads them
#[derive(Clone)]
pub struct ClientService {
    store: Arc<dyn Store>,
    cache: ReadThroughCache,
}

impl ClientService {
    pub fn new(store: Arc<dyn Store>, cache: ReadThroughCache) -> Self {
        Self { store, cache }
    }

    pub async fn list(&self) -> AppResult<Vec<Client>> {
        let store = self.store.clone();
        self.cache
            .get_or_set(keys::CLIENTS_ALL, || async move { store.list_clients().await })
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn supplier(tax_id: &str) -> NewSupplier {
        NewSupplier {
            business_name: "Distribuidora Andina SAC".into(),
            tax_id: tax_id.into(),
            phone: Some("987 654 321".into()),
            email: None,
            address: None,
        }
    }

    #[test]
    fn test_validate_supplier() {
        assert!(validate_supplier(&supplier("20123456789")).is_ok());
        assert!(matches!(
            validate_supplier(&supplier("2012345678")),
            Err(AppError::Validation { field, .. }) if field == "tax_id"
        ));
    }
}
