//! Persistence traits
//!
//! Reads go through [`Store`]. Every mutation runs inside a [`UnitOfWork`]
//! obtained from [`Store::begin`]; nothing is visible to other readers until
//! [`UnitOfWork::commit`] succeeds, and dropping a unit of work without
//! committing discards its writes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use crate::error::AppResult;
use shared::{
    ActiveStatus, AdjustmentKind, AdjustmentRecord, Category, Client, DocumentType, Incident,
    LineItem, Movement, MovementDetail, NewClient, NewIncident, NewLineItem, NewMovement,
    NewProduct, NewProductAudit, NewSupplier, NewUser, Order, OrderLine, OrderStatus, Product,
    ProductAudit, ProductChanges, PurchaseRecord, SaleRecord, Supplier, User, UserCredentials, UserRole,
};

mod memory;
mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Read access plus the entry point for transactional writes
#[async_trait]
pub trait Store: Send + Sync {
    /// Start a unit of work
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>>;

    // Catalog
    async fn list_products(&self) -> AppResult<Vec<Product>>;
    async fn get_product(&self, id: i64) -> AppResult<Option<Product>>;
    async fn list_categories(&self) -> AppResult<Vec<Category>>;
    async fn get_category(&self, id: i64) -> AppResult<Option<Category>>;
    async fn list_suppliers(&self) -> AppResult<Vec<Supplier>>;
    async fn get_supplier(&self, id: i64) -> AppResult<Option<Supplier>>;
    async fn list_clients(&self) -> AppResult<Vec<Client>>;

    // Product audit trail, newest first
    async fn list_product_audits(&self) -> AppResult<Vec<ProductAudit>>;
    async fn product_audits_for_product(&self, product_id: i64) -> AppResult<Vec<ProductAudit>>;
    async fn product_audits_for_user(&self, user_id: i64) -> AppResult<Vec<ProductAudit>>;

    // Users
    async fn list_users(&self) -> AppResult<Vec<User>>;
    async fn get_user(&self, id: i64) -> AppResult<Option<User>>;
    /// Look a user up by username or email
    async fn find_credentials(&self, login: &str) -> AppResult<Option<UserCredentials>>;

    // Movements, newest first
    async fn list_movements(&self) -> AppResult<Vec<Movement>>;
    async fn movement_detail(&self, id: i64) -> AppResult<Option<MovementDetail>>;
    /// Movements with `start <= occurred_at <= end`, oldest first
    async fn movements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<MovementDetail>>;

    // Orders
    /// All orders, newest first
    async fn list_orders(&self) -> AppResult<Vec<Order>>;
    async fn get_order(&self, id: i64) -> AppResult<Option<Order>>;
    /// Orders with the given status, lowest id first
    async fn orders_with_status(&self, status: OrderStatus) -> AppResult<Vec<Order>>;
    async fn orders_between(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> AppResult<Vec<Order>>;

    // Incidents, newest first
    async fn list_incidents(&self) -> AppResult<Vec<Incident>>;
    async fn get_incident(&self, id: i64) -> AppResult<Option<Incident>>;
    async fn incidents_for_order(&self, order_id: i64) -> AppResult<Vec<Incident>>;
    async fn incidents_for_movement(&self, movement_id: i64) -> AppResult<Vec<Incident>>;
    async fn incidents_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Incident>>;
}

/// A set of writes applied atomically on commit
#[async_trait]
pub trait UnitOfWork: Send {
    async fn commit(self: Box<Self>) -> AppResult<()>;

    // Stock ledger
    /// Add `quantity` to stock, returning the new level
    async fn increase_stock(&mut self, product_id: i64, quantity: i32) -> AppResult<i32>;
    /// Remove `quantity` from stock, refusing to go below zero
    async fn decrease_stock(&mut self, product_id: i64, quantity: i32) -> AppResult<i32>;

    // Catalog
    /// Load a product and hold it against concurrent writers until commit
    async fn get_product(&mut self, id: i64) -> AppResult<Option<Product>>;
    async fn insert_product(&mut self, product: NewProduct) -> AppResult<Product>;
    async fn update_product(&mut self, id: i64, changes: ProductChanges)
        -> AppResult<Option<Product>>;
    async fn set_product_status(&mut self, id: i64, status: ActiveStatus) -> AppResult<bool>;
    async fn insert_category(&mut self, name: &str) -> AppResult<Category>;
    async fn rename_category(&mut self, id: i64, name: &str) -> AppResult<Option<Category>>;
    async fn set_category_status(&mut self, id: i64, status: ActiveStatus) -> AppResult<bool>;
    async fn products_in_category(&mut self, category_id: i64) -> AppResult<Vec<Product>>;
    /// Deactivate every product of a category, returning how many changed
    async fn deactivate_category_products(&mut self, category_id: i64) -> AppResult<u64>;
    async fn insert_supplier(&mut self, supplier: NewSupplier) -> AppResult<Supplier>;
    async fn update_supplier(&mut self, id: i64, supplier: NewSupplier)
        -> AppResult<Option<Supplier>>;
    async fn insert_product_audit(&mut self, audit: NewProductAudit) -> AppResult<ProductAudit>;

    // Clients
    async fn find_client_by_national_id(&mut self, dni: &str) -> AppResult<Option<Client>>;
    async fn find_client_by_tax_id(&mut self, ruc: &str) -> AppResult<Option<Client>>;
    async fn insert_client(&mut self, client: NewClient) -> AppResult<Client>;
    async fn update_client_contact(
        &mut self,
        id: i64,
        email: Option<&str>,
        address: Option<&str>,
    ) -> AppResult<()>;

    // Users
    async fn insert_user(&mut self, user: NewUser) -> AppResult<User>;
    async fn update_user(
        &mut self,
        id: i64,
        role: Option<UserRole>,
        status: Option<ActiveStatus>,
    ) -> AppResult<Option<User>>;

    // Movement recorder
    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<Movement>;
    /// Store the sale specialization, assigning the next sequence number of
    /// its document type while holding that type's lock
    async fn insert_sale(
        &mut self,
        movement_id: i64,
        client_id: i64,
        document_type: DocumentType,
        total: Decimal,
    ) -> AppResult<SaleRecord>;
    async fn insert_purchase(&mut self, record: PurchaseRecord) -> AppResult<PurchaseRecord>;
    async fn insert_adjustment(
        &mut self,
        movement_id: i64,
        kind: AdjustmentKind,
        reason: &str,
    ) -> AppResult<AdjustmentRecord>;
    async fn insert_line_item(&mut self, movement_id: i64, line: NewLineItem)
        -> AppResult<LineItem>;

    // Orders
    async fn insert_order(
        &mut self,
        supplier_id: i64,
        requested_by: i64,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Order>;
    /// Load an order and hold it against concurrent receipts until commit
    async fn lock_order(&mut self, id: i64) -> AppResult<Option<Order>>;
    async fn update_order_lines(&mut self, id: i64, lines: &[OrderLine]) -> AppResult<()>;
    async fn set_order_status(&mut self, id: i64, status: OrderStatus) -> AppResult<bool>;

    // Incidents
    async fn insert_incident(&mut self, incident: NewIncident) -> AppResult<Incident>;
}
