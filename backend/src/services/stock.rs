//! Stock ledger: the only path through which on-hand quantities change

use crate::error::{AppError, AppResult};
use crate::store::UnitOfWork;
use shared::validate_quantity;

/// Add units to a product inside the caller's unit of work
pub async fn increase(uow: &mut dyn UnitOfWork, product_id: i64, quantity: i32) -> AppResult<i32> {
    validate_quantity(quantity).map_err(|e| AppError::validation("quantity", e))?;
    let stock = uow.increase_stock(product_id, quantity).await?;
    tracing::debug!(product_id, quantity, stock, "stock increased");
    Ok(stock)
}

/// Remove units from a product. Fails with `InsufficientStock` rather than
/// letting the level go negative.
pub async fn decrease(uow: &mut dyn UnitOfWork, product_id: i64, quantity: i32) -> AppResult<i32> {
    validate_quantity(quantity).map_err(|e| AppError::validation("quantity", e))?;
    let stock = uow.decrease_stock(product_id, quantity).await?;
    tracing::debug!(product_id, quantity, stock, "stock decreased");
    Ok(stock)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryStore, Store};
    use rust_decimal::Decimal;
    use shared::NewProduct;

    #[tokio::test]
    async fn test_increase_then_decrease() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        let product = uow
            .insert_product(NewProduct {
                name: "Azúcar".into(),
                stock: 5,
                min_stock: 1,
                unit_price: Decimal::from(3),
                category_id: None,
                supplier_id: None,
            })
            .await
            .unwrap();
        assert_eq!(increase(uow.as_mut(), product.id, 4).await.unwrap(), 9);
        assert_eq!(decrease(uow.as_mut(), product.id, 9).await.unwrap(), 0);
        assert!(matches!(
            decrease(uow.as_mut(), product.id, 1).await,
            Err(AppError::InsufficientStock { .. })
        ));
    }

    #[tokio::test]
    async fn test_unknown_product_and_zero_quantity() {
        let store = MemoryStore::new();
        let mut uow = store.begin().await.unwrap();
        assert!(matches!(
            increase(uow.as_mut(), 42, 1).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            decrease(uow.as_mut(), 42, 0).await,
            Err(AppError::Validation { .. })
        ));
    }
}
