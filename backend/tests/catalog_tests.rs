//! Catalog tests: products, categories, suppliers and users

mod common;

use common::{dec, TestEnv};
use shared::{ActiveStatus, AuditAction, NewProduct, NewSupplier, ProductChanges, UserRole};
use stockcloud_backend::cache::keys;
use stockcloud_backend::error::AppError;
use stockcloud_backend::services::user::{CreateUserInput, UpdateUserInput};
use stockcloud_backend::services::{CategoryService, SupplierService, UserService};

fn new_product(name: &str, stock: i32, category_id: Option<i64>) -> NewProduct {
    NewProduct {
        name: name.into(),
        stock,
        min_stock: 2,
        unit_price: dec("6.40"),
        category_id,
        supplier_id: None,
    }
}

#[tokio::test]
async fn test_product_update_never_touches_stock() {
    let env = TestEnv::new();
    let products = env.products();
    let product = products.create(1, new_product("Detergente", 9, None)).await.unwrap();
    assert_eq!(product.status, ActiveStatus::Active);

    let updated = products
        .update(
            1,
            product.id,
            ProductChanges {
                name: "Detergente 1kg".into(),
                min_stock: 4,
                unit_price: dec("7.10"),
                category_id: None,
                supplier_id: None,
            },
        )
        .await
        .unwrap();

    assert_eq!(updated.name, "Detergente 1kg");
    assert_eq!(updated.unit_price, dec("7.10"));
    assert_eq!(updated.stock, 9);
}

#[tokio::test]
async fn test_product_validation() {
    let env = TestEnv::new();
    let products = env.products();

    assert!(matches!(
        products.create(1, new_product("  ", 1, None)).await,
        Err(AppError::Validation { field, .. }) if field == "name"
    ));
    assert!(matches!(
        products.create(1, new_product("Jabón", -1, None)).await,
        Err(AppError::Validation { field, .. }) if field == "stock"
    ));
    assert!(matches!(
        products.create(1, new_product("Jabón", 1, Some(77))).await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_products_for_order_lists_only_active() {
    let env = TestEnv::new();
    let products = env.products();
    let kept = products.create(1, new_product("Vinagre", 3, None)).await.unwrap();
    let retired = products.create(1, new_product("Kerosene", 0, None)).await.unwrap();
    products
        .set_status(1, retired.id, ActiveStatus::Inactive)
        .await
        .unwrap();

    let for_order = products.products_for_order().await.unwrap();
    assert_eq!(for_order.iter().map(|p| p.id).collect::<Vec<_>>(), vec![kept.id]);
    assert!(env.cache_entries.contains(keys::PRODUCTS_FOR_ORDER).await);
}

#[tokio::test]
async fn test_product_changes_are_audited() {
    let env = TestEnv::new();
    let almacenero = env.user("almacenero", UserRole::Employee).await;
    let gerente = env.user("gerente", UserRole::Admin).await;
    let products = env.products();
    let product = products
        .create(almacenero.id, new_product("Avena Quaker", 7, None))
        .await
        .unwrap();

    let mut changes = ProductChanges {
        name: "Avena Quaker".into(),
        min_stock: 2,
        unit_price: dec("6.9"),
        category_id: None,
        supplier_id: None,
    };
    products.update(gerente.id, product.id, changes.clone()).await.unwrap();
    // Same values again: nothing to record
    products.update(gerente.id, product.id, changes.clone()).await.unwrap();
    changes.unit_price = dec("6.90");
    products.update(gerente.id, product.id, changes).await.unwrap();
    products
        .set_status(gerente.id, product.id, ActiveStatus::Inactive)
        .await
        .unwrap();
    products
        .set_status(gerente.id, product.id, ActiveStatus::Inactive)
        .await
        .unwrap();

    let trail = products.audits_for_product(product.id).await.unwrap();
    let actions: Vec<_> = trail.iter().map(|a| a.action).collect();
    assert_eq!(
        actions,
        vec![AuditAction::StatusChange, AuditAction::Update, AuditAction::Create]
    );

    let update = &trail[1];
    assert_eq!(update.username.as_deref(), Some("gerente"));
    assert_eq!(update.product_name.as_deref(), Some("Avena Quaker"));
    assert_eq!(update.changed_fields.len(), 1);
    assert_eq!(update.changed_fields["unit_price"].before.as_deref(), Some("6.40"));
    assert_eq!(update.changed_fields["unit_price"].after.as_deref(), Some("6.9"));
    assert_eq!(trail[0].changed_fields["status"].after.as_deref(), Some("inactive"));
    assert_eq!(trail[2].changed_fields["stock"].after.as_deref(), Some("7"));

    let by_manager = products.audits_by_user(gerente.id).await.unwrap();
    assert_eq!(by_manager.len(), 2);
    assert_eq!(products.audits_by_user(almacenero.id).await.unwrap().len(), 1);
    assert_eq!(products.audits().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_rejected_product_edit_leaves_no_audit() {
    let env = TestEnv::new();
    let products = env.products();
    let product = products.create(1, new_product("Sal Emsal", 5, None)).await.unwrap();

    let refused = products
        .update(
            1,
            product.id,
            ProductChanges {
                name: "Sal Emsal".into(),
                min_stock: 2,
                unit_price: dec("6.40"),
                category_id: Some(404),
                supplier_id: None,
            },
        )
        .await;
    assert!(matches!(refused, Err(AppError::NotFound(_))));
    assert!(matches!(
        products.set_status(1, 404, ActiveStatus::Inactive).await,
        Err(AppError::NotFound(_))
    ));

    assert_eq!(products.audits().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_category_with_stocked_products_cannot_be_deactivated() {
    let env = TestEnv::new();
    let categories = CategoryService::new(env.store.clone(), env.cache.clone());
    let products = env.products();
    let lacteos = categories.create("Lácteos").await.unwrap();
    let stocked = products
        .create(1, new_product("Mantequilla", 4, Some(lacteos.id)))
        .await
        .unwrap();

    let refused = categories.set_status(lacteos.id, ActiveStatus::Inactive).await;
    assert!(matches!(refused, Err(AppError::Conflict { .. })));
    assert_eq!(categories.list_active().await.unwrap().len(), 1);

    env.movements()
        .register_shortage(
            1,
            stockcloud_backend::services::movement::RegisterAdjustmentInput {
                product_id: stocked.id,
                quantity: 4,
                reason: "Vencido".into(),
                note: None,
            },
        )
        .await
        .unwrap();

    categories
        .set_status(lacteos.id, ActiveStatus::Inactive)
        .await
        .unwrap();
    assert!(categories.list_active().await.unwrap().is_empty());
    assert_eq!(products.get(stocked.id).await.unwrap().status, ActiveStatus::Inactive);
}

#[tokio::test]
async fn test_category_rename_evicts_lists() {
    let env = TestEnv::new();
    let categories = CategoryService::new(env.store.clone(), env.cache.clone());
    let abarrotes = categories.create("Abarrotes").await.unwrap();
    categories.list().await.unwrap();
    assert!(env.cache_entries.contains(keys::CATEGORIES_ALL).await);

    categories.rename(abarrotes.id, "Abarrotes secos").await.unwrap();

    assert!(!env.cache_entries.contains(keys::CATEGORIES_ALL).await);
    assert_eq!(categories.list().await.unwrap()[0].name, "Abarrotes secos");
    assert!(matches!(
        categories.rename(404, "Nada").await,
        Err(AppError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_supplier_ruc_rules() {
    let env = TestEnv::new();
    let suppliers = SupplierService::new(env.store.clone(), env.cache.clone());
    let supplier = |ruc: &str| NewSupplier {
        business_name: "Alicorp SAA".into(),
        tax_id: ruc.into(),
        phone: None,
        email: None,
        address: None,
    };

    let created = suppliers.create(supplier("20100055237")).await.unwrap();
    assert!(matches!(
        suppliers.create(supplier("2010005523")).await,
        Err(AppError::Validation { .. })
    ));
    assert!(matches!(
        suppliers.create(supplier("20100055237")).await,
        Err(AppError::DuplicateEntry(_))
    ));

    let mut changed = supplier("20100055237");
    changed.phone = Some("315 0800".into());
    let updated = suppliers.update(created.id, changed).await.unwrap();
    assert_eq!(updated.phone.as_deref(), Some("315 0800"));
}

#[tokio::test]
async fn test_user_administration() {
    let env = TestEnv::new();
    let users = UserService::new(env.store.clone(), env.cache.clone());

    let short_password = users
        .create(CreateUserInput {
            username: "vendedor".into(),
            email: "vendedor@stockcloud.pe".into(),
            password: "corta".into(),
            role: UserRole::Employee,
        })
        .await;
    assert!(matches!(short_password, Err(AppError::Validation { field, .. }) if field == "password"));

    let created = users
        .create(CreateUserInput {
            username: "vendedor".into(),
            email: "Vendedor@StockCloud.pe".into(),
            password: "suficiente-larga".into(),
            role: UserRole::Employee,
        })
        .await
        .unwrap();
    assert_eq!(created.email, "vendedor@stockcloud.pe");

    let promoted = users
        .update(
            created.id,
            UpdateUserInput {
                role: Some(UserRole::Admin),
                status: Some(ActiveStatus::Inactive),
            },
        )
        .await
        .unwrap();
    assert_eq!(promoted.role, UserRole::Admin);
    assert_eq!(promoted.status, ActiveStatus::Inactive);
    assert_eq!(users.list().await.unwrap().len(), 1);
}
