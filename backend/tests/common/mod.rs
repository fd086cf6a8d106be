//! Shared fixtures for the integration suites: an in-memory store and cache
//! seeded through the same unit-of-work API the services use.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use rust_decimal::Decimal;
use shared::{BusinessClock, NewProduct, NewSupplier, NewUser, Product, Supplier, User, UserRole};
use stockcloud_backend::{
    cache::{InMemoryCache, ReadThroughCache},
    services::{auth::hash_password, MovementService, OrderService, ProductService},
    store::{MemoryStore, Store},
    AppState, Config,
};

pub const PASSWORD: &str = "clave-segura-1";

pub struct TestEnv {
    pub store: Arc<MemoryStore>,
    /// Same entries the read-through cache sees
    pub cache_entries: InMemoryCache,
    pub cache: ReadThroughCache,
    pub clock: BusinessClock,
}

impl TestEnv {
    pub fn new() -> Self {
        let cache_entries = InMemoryCache::new();
        let cache = ReadThroughCache::new(Arc::new(cache_entries.clone()), Duration::from_secs(3600));
        Self {
            store: Arc::new(MemoryStore::new()),
            cache_entries,
            cache,
            clock: BusinessClock::default(),
        }
    }

    pub fn state(&self) -> AppState {
        AppState::new(self.store.clone(), self.cache.clone(), Config::default())
    }

    pub fn orders(&self) -> OrderService {
        OrderService::new(self.store.clone(), self.cache.clone(), self.clock)
    }

    pub fn movements(&self) -> MovementService {
        MovementService::new(self.store.clone(), self.cache.clone())
    }

    pub fn products(&self) -> ProductService {
        ProductService::new(self.store.clone(), self.cache.clone())
    }

    pub async fn supplier(&self) -> Supplier {
        let mut uow = self.store.begin().await.unwrap();
        let supplier = uow
            .insert_supplier(NewSupplier {
                business_name: "Distribuidora Andina SAC".into(),
                tax_id: "20100047218".into(),
                phone: Some("987654321".into()),
                email: Some("ventas@andina.pe".into()),
                address: Some("Av. Argentina 1450, Lima".into()),
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        supplier
    }

    pub async fn product(&self, name: &str, stock: i32, min_stock: i32, price: &str) -> Product {
        let mut uow = self.store.begin().await.unwrap();
        let product = uow
            .insert_product(NewProduct {
                name: name.into(),
                stock,
                min_stock,
                unit_price: price.parse::<Decimal>().unwrap(),
                category_id: None,
                supplier_id: None,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        product
    }

    pub async fn user(&self, username: &str, role: UserRole) -> User {
        let mut uow = self.store.begin().await.unwrap();
        let user = uow
            .insert_user(NewUser {
                username: username.into(),
                email: format!("{}@stockcloud.pe", username),
                password_hash: hash_password(PASSWORD).unwrap(),
                role,
            })
            .await
            .unwrap();
        uow.commit().await.unwrap();
        user
    }

    pub async fn stock_of(&self, product_id: i64) -> i32 {
        self.store
            .get_product(product_id)
            .await
            .unwrap()
            .unwrap()
            .stock
    }
}

pub fn dec(s: &str) -> Decimal {
    s.parse().unwrap()
}
