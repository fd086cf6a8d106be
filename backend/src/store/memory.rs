use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock};

use super::{Store, UnitOfWork};
use crate::error::{AppError, AppResult};
use shared::{
    next_sequence_number, ActiveStatus, AdjustmentKind, AdjustmentRecord, Category, Client,
    DocumentType, Incident, LineItem, Movement, MovementDetail, MovementSpecialization, NewClient,
    NewIncident, NewLineItem, NewMovement, NewProduct, NewProductAudit, NewSupplier, NewUser,
    Order, OrderLine, OrderStatus, Product, ProductAudit, ProductChanges, PurchaseRecord, SaleRecord, Supplier, User,
    UserCredentials, UserRole,
};

#[derive(Debug, Clone, Default)]
struct Sequences {
    product: i64,
    category: i64,
    supplier: i64,
    client: i64,
    user: i64,
    movement: i64,
    order: i64,
    incident: i64,
    product_audit: i64,
}

fn next(counter: &mut i64) -> i64 {
    *counter += 1;
    *counter
}

#[derive(Debug, Clone, Default)]
struct MemoryState {
    seq: Sequences,
    products: Vec<Product>,
    categories: Vec<Category>,
    suppliers: Vec<Supplier>,
    clients: Vec<Client>,
    users: Vec<UserCredentials>,
    movements: Vec<Movement>,
    sales: Vec<SaleRecord>,
    purchases: Vec<PurchaseRecord>,
    adjustments: Vec<AdjustmentRecord>,
    line_items: Vec<LineItem>,
    orders: Vec<Order>,
    incidents: Vec<Incident>,
    product_audits: Vec<ProductAudit>,
}

impl MemoryState {
    fn product_name(&self, id: i64) -> Option<String> {
        self.products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.name.clone())
    }

    fn username(&self, id: i64) -> Option<String> {
        self.users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.username.clone())
    }

    /// Audits matching `keep`, newest first, with product and user names filled in
    fn audits(&self, keep: impl Fn(&ProductAudit) -> bool) -> Vec<ProductAudit> {
        let mut audits: Vec<ProductAudit> = self
            .product_audits
            .iter()
            .filter(|a| keep(a))
            .map(|a| ProductAudit {
                product_name: self.product_name(a.product_id),
                username: self.username(a.user_id),
                ..a.clone()
            })
            .collect();
        audits.sort_by_key(|a| std::cmp::Reverse(a.id));
        audits
    }

    fn product_mut(&mut self, id: i64) -> AppResult<&mut Product> {
        self.products
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    fn detail(&self, movement: &Movement) -> MovementDetail {
        let id = movement.id;
        let specialization = self
            .sales
            .iter()
            .find(|s| s.movement_id == id)
            .cloned()
            .map(MovementSpecialization::Sale)
            .or_else(|| {
                self.purchases
                    .iter()
                    .find(|p| p.movement_id == id)
                    .cloned()
                    .map(MovementSpecialization::Purchase)
            })
            .or_else(|| {
                self.adjustments
                    .iter()
                    .find(|a| a.movement_id == id)
                    .cloned()
                    .map(MovementSpecialization::Adjustment)
            });
        let lines = self
            .line_items
            .iter()
            .filter(|l| l.movement_id == id)
            .cloned()
            .collect();
        MovementDetail {
            movement: movement.clone(),
            specialization,
            lines,
        }
    }
}

/// In-process store with the same semantics as [`super::PgStore`].
///
/// Units of work are serialized: `begin` takes the writer lock and works on a
/// copy of the state that replaces the shared one on commit.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<RwLock<MemoryState>>,
    writer: Arc<Mutex<()>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

pub struct MemoryUnitOfWork {
    working: MemoryState,
    shared: Arc<RwLock<MemoryState>>,
    _writer: OwnedMutexGuard<()>,
}

fn newest_first<T: Clone>(items: &[T], key: impl Fn(&T) -> i64) -> Vec<T> {
    let mut items = items.to_vec();
    items.sort_by_key(|item| std::cmp::Reverse(key(item)));
    items
}

#[async_trait]
impl Store for MemoryStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let writer = self.writer.clone().lock_owned().await;
        let working = self.state.read().await.clone();
        Ok(Box::new(MemoryUnitOfWork {
            working,
            shared: self.state.clone(),
            _writer: writer,
        }))
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let mut products = self.state.read().await.products.clone();
        products.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(products)
    }

    async fn get_product(&self, id: i64) -> AppResult<Option<Product>> {
        let state = self.state.read().await;
        Ok(state.products.iter().find(|p| p.id == id).cloned())
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let mut categories = self.state.read().await.categories.clone();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn get_category(&self, id: i64) -> AppResult<Option<Category>> {
        let state = self.state.read().await;
        Ok(state.categories.iter().find(|c| c.id == id).cloned())
    }

    async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let mut suppliers = self.state.read().await.suppliers.clone();
        suppliers.sort_by(|a, b| a.business_name.cmp(&b.business_name));
        Ok(suppliers)
    }

    async fn get_supplier(&self, id: i64) -> AppResult<Option<Supplier>> {
        let state = self.state.read().await;
        Ok(state.suppliers.iter().find(|s| s.id == id).cloned())
    }

    async fn list_clients(&self) -> AppResult<Vec<Client>> {
        Ok(self.state.read().await.clients.clone())
    }

    async fn list_product_audits(&self) -> AppResult<Vec<ProductAudit>> {
        Ok(self.state.read().await.audits(|_| true))
    }

    async fn product_audits_for_product(&self, product_id: i64) -> AppResult<Vec<ProductAudit>> {
        Ok(self
            .state
            .read()
            .await
            .audits(|a| a.product_id == product_id))
    }

    async fn product_audits_for_user(&self, user_id: i64) -> AppResult<Vec<ProductAudit>> {
        Ok(self.state.read().await.audits(|a| a.user_id == user_id))
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let state = self.state.read().await;
        Ok(state.users.iter().map(|u| u.user.clone()).collect())
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.user.id == id)
            .map(|u| u.user.clone()))
    }

    async fn find_credentials(&self, login: &str) -> AppResult<Option<UserCredentials>> {
        let state = self.state.read().await;
        Ok(state
            .users
            .iter()
            .find(|u| u.user.username == login || u.user.email == login)
            .cloned())
    }

    async fn list_movements(&self) -> AppResult<Vec<Movement>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.movements, |m| m.id))
    }

    async fn movement_detail(&self, id: i64) -> AppResult<Option<MovementDetail>> {
        let state = self.state.read().await;
        Ok(state
            .movements
            .iter()
            .find(|m| m.id == id)
            .map(|m| state.detail(m)))
    }

    async fn movements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<MovementDetail>> {
        let state = self.state.read().await;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.occurred_at >= start && m.occurred_at <= end)
            .map(|m| state.detail(m))
            .collect())
    }

    async fn list_orders(&self) -> AppResult<Vec<Order>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.orders, |o| o.id))
    }

    async fn get_order(&self, id: i64) -> AppResult<Option<Order>> {
        let state = self.state.read().await;
        Ok(state.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn orders_with_status(&self, status: OrderStatus) -> AppResult<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.status == status)
            .cloned()
            .collect())
    }

    async fn orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Order>> {
        let state = self.state.read().await;
        Ok(state
            .orders
            .iter()
            .filter(|o| o.created_at >= start && o.created_at <= end)
            .cloned()
            .collect())
    }

    async fn list_incidents(&self) -> AppResult<Vec<Incident>> {
        let state = self.state.read().await;
        Ok(newest_first(&state.incidents, |i| i.id))
    }

    async fn get_incident(&self, id: i64) -> AppResult<Option<Incident>> {
        let state = self.state.read().await;
        Ok(state.incidents.iter().find(|i| i.id == id).cloned())
    }

    async fn incidents_for_order(&self, order_id: i64) -> AppResult<Vec<Incident>> {
        let state = self.state.read().await;
        let matching: Vec<Incident> = state
            .incidents
            .iter()
            .filter(|i| i.order_id == Some(order_id))
            .cloned()
            .collect();
        Ok(newest_first(&matching, |i| i.id))
    }

    async fn incidents_for_movement(&self, movement_id: i64) -> AppResult<Vec<Incident>> {
        let state = self.state.read().await;
        Ok(state
            .incidents
            .iter()
            .filter(|i| i.movement_id == movement_id)
            .cloned()
            .collect())
    }

    async fn incidents_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Incident>> {
        let state = self.state.read().await;
        Ok(state
            .incidents
            .iter()
            .filter(|i| i.occurred_at >= start && i.occurred_at <= end)
            .cloned()
            .collect())
    }
}

#[async_trait]
impl UnitOfWork for MemoryUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let MemoryUnitOfWork {
            working,
            shared,
            _writer,
        } = *self;
        *shared.write().await = working;
        Ok(())
    }

    async fn increase_stock(&mut self, product_id: i64, quantity: i32) -> AppResult<i32> {
        let product = self.working.product_mut(product_id)?;
        product.stock = product
            .stock
            .checked_add(quantity)
            .ok_or_else(|| AppError::validation("quantity", "Stock level would exceed its limit"))?;
        Ok(product.stock)
    }

    async fn decrease_stock(&mut self, product_id: i64, quantity: i32) -> AppResult<i32> {
        let product = self.working.product_mut(product_id)?;
        if product.stock < quantity {
            return Err(AppError::InsufficientStock {
                product_id,
                requested: quantity,
            });
        }
        product.stock -= quantity;
        Ok(product.stock)
    }

    async fn get_product(&mut self, id: i64) -> AppResult<Option<Product>> {
        Ok(self.working.products.iter().find(|p| p.id == id).cloned())
    }

    async fn insert_product(&mut self, product: NewProduct) -> AppResult<Product> {
        let product = Product {
            id: next(&mut self.working.seq.product),
            name: product.name,
            stock: product.stock,
            min_stock: product.min_stock,
            unit_price: product.unit_price,
            category_id: product.category_id,
            supplier_id: product.supplier_id,
            status: ActiveStatus::Active,
        };
        self.working.products.push(product.clone());
        Ok(product)
    }

    async fn update_product(
        &mut self,
        id: i64,
        changes: ProductChanges,
    ) -> AppResult<Option<Product>> {
        let Some(product) = self.working.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        product.name = changes.name;
        product.min_stock = changes.min_stock;
        product.unit_price = changes.unit_price;
        product.category_id = changes.category_id;
        product.supplier_id = changes.supplier_id;
        Ok(Some(product.clone()))
    }

    async fn set_product_status(&mut self, id: i64, status: ActiveStatus) -> AppResult<bool> {
        Ok(match self.working.products.iter_mut().find(|p| p.id == id) {
            Some(product) => {
                product.status = status;
                true
            }
            None => false,
        })
    }

    async fn insert_category(&mut self, name: &str) -> AppResult<Category> {
        let category = Category {
            id: next(&mut self.working.seq.category),
            name: name.to_string(),
            status: ActiveStatus::Active,
        };
        self.working.categories.push(category.clone());
        Ok(category)
    }

    async fn rename_category(&mut self, id: i64, name: &str) -> AppResult<Option<Category>> {
        Ok(self
            .working
            .categories
            .iter_mut()
            .find(|c| c.id == id)
            .map(|category| {
                category.name = name.to_string();
                category.clone()
            }))
    }

    async fn set_category_status(&mut self, id: i64, status: ActiveStatus) -> AppResult<bool> {
        Ok(match self.working.categories.iter_mut().find(|c| c.id == id) {
            Some(category) => {
                category.status = status;
                true
            }
            None => false,
        })
    }

    async fn products_in_category(&mut self, category_id: i64) -> AppResult<Vec<Product>> {
        Ok(self
            .working
            .products
            .iter()
            .filter(|p| p.category_id == Some(category_id))
            .cloned()
            .collect())
    }

    async fn deactivate_category_products(&mut self, category_id: i64) -> AppResult<u64> {
        let mut changed = 0;
        for product in self
            .working
            .products
            .iter_mut()
            .filter(|p| p.category_id == Some(category_id) && p.status.is_active())
        {
            product.status = ActiveStatus::Inactive;
            changed += 1;
        }
        Ok(changed)
    }

    async fn insert_supplier(&mut self, supplier: NewSupplier) -> AppResult<Supplier> {
        if self
            .working
            .suppliers
            .iter()
            .any(|s| s.tax_id == supplier.tax_id)
        {
            return Err(AppError::DuplicateEntry("RUC".to_string()));
        }
        let supplier = Supplier {
            id: next(&mut self.working.seq.supplier),
            business_name: supplier.business_name,
            tax_id: supplier.tax_id,
            phone: supplier.phone,
            email: supplier.email,
            address: supplier.address,
        };
        self.working.suppliers.push(supplier.clone());
        Ok(supplier)
    }

    async fn update_supplier(
        &mut self,
        id: i64,
        changes: NewSupplier,
    ) -> AppResult<Option<Supplier>> {
        if self
            .working
            .suppliers
            .iter()
            .any(|s| s.id != id && s.tax_id == changes.tax_id)
        {
            return Err(AppError::DuplicateEntry("RUC".to_string()));
        }
        Ok(self
            .working
            .suppliers
            .iter_mut()
            .find(|s| s.id == id)
            .map(|supplier| {
                supplier.business_name = changes.business_name;
                supplier.tax_id = changes.tax_id;
                supplier.phone = changes.phone;
                supplier.email = changes.email;
                supplier.address = changes.address;
                supplier.clone()
            }))
    }

    async fn insert_product_audit(&mut self, audit: NewProductAudit) -> AppResult<ProductAudit> {
        let audit = ProductAudit {
            id: next(&mut self.working.seq.product_audit),
            product_id: audit.product_id,
            product_name: self.working.product_name(audit.product_id),
            user_id: audit.user_id,
            username: self.working.username(audit.user_id),
            action: audit.action,
            changed_fields: audit.changed_fields,
            recorded_at: Utc::now(),
        };
        self.working.product_audits.push(audit.clone());
        Ok(audit)
    }

    async fn find_client_by_national_id(&mut self, dni: &str) -> AppResult<Option<Client>> {
        Ok(self
            .working
            .clients
            .iter()
            .find(|c| c.national_id.as_deref() == Some(dni))
            .cloned())
    }

    async fn find_client_by_tax_id(&mut self, ruc: &str) -> AppResult<Option<Client>> {
        Ok(self
            .working
            .clients
            .iter()
            .find(|c| c.tax_id.as_deref() == Some(ruc))
            .cloned())
    }

    async fn insert_client(&mut self, client: NewClient) -> AppResult<Client> {
        let client = Client {
            id: next(&mut self.working.seq.client),
            name: client.name,
            business_name: client.business_name,
            national_id: client.national_id,
            tax_id: client.tax_id,
            address: client.address,
            email: client.email,
        };
        self.working.clients.push(client.clone());
        Ok(client)
    }

    async fn update_client_contact(
        &mut self,
        id: i64,
        email: Option<&str>,
        address: Option<&str>,
    ) -> AppResult<()> {
        if let Some(client) = self.working.clients.iter_mut().find(|c| c.id == id) {
            if let Some(email) = email {
                client.email = Some(email.to_string());
            }
            if let Some(address) = address {
                client.address = Some(address.to_string());
            }
        }
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> AppResult<User> {
        if self
            .working
            .users
            .iter()
            .any(|u| u.user.username == user.username || u.user.email == user.email)
        {
            return Err(AppError::DuplicateEntry("username or email".to_string()));
        }
        let created = User {
            id: next(&mut self.working.seq.user),
            username: user.username,
            email: user.email,
            role: user.role,
            status: ActiveStatus::Active,
        };
        self.working.users.push(UserCredentials {
            user: created.clone(),
            password_hash: user.password_hash,
        });
        Ok(created)
    }

    async fn update_user(
        &mut self,
        id: i64,
        role: Option<UserRole>,
        status: Option<ActiveStatus>,
    ) -> AppResult<Option<User>> {
        Ok(self
            .working
            .users
            .iter_mut()
            .find(|u| u.user.id == id)
            .map(|credentials| {
                if let Some(role) = role {
                    credentials.user.role = role;
                }
                if let Some(status) = status {
                    credentials.user.status = status;
                }
                credentials.user.clone()
            }))
    }

    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<Movement> {
        let movement = Movement {
            id: next(&mut self.working.seq.movement),
            user_id: movement.user_id,
            kind: movement.kind,
            occurred_at: movement.occurred_at,
            note: movement.note,
        };
        self.working.movements.push(movement.clone());
        Ok(movement)
    }

    async fn insert_sale(
        &mut self,
        movement_id: i64,
        client_id: i64,
        document_type: DocumentType,
        total: Decimal,
    ) -> AppResult<SaleRecord> {
        let current_max = self
            .working
            .sales
            .iter()
            .filter(|s| s.document_type == document_type)
            .map(|s| s.sequence_number)
            .max();
        let sale = SaleRecord {
            movement_id,
            client_id,
            document_type,
            series: document_type.series().to_string(),
            sequence_number: next_sequence_number(current_max),
            total,
        };
        self.working.sales.push(sale.clone());
        Ok(sale)
    }

    async fn insert_purchase(&mut self, record: PurchaseRecord) -> AppResult<PurchaseRecord> {
        self.working.purchases.push(record.clone());
        Ok(record)
    }

    async fn insert_adjustment(
        &mut self,
        movement_id: i64,
        kind: AdjustmentKind,
        reason: &str,
    ) -> AppResult<AdjustmentRecord> {
        let record = AdjustmentRecord {
            movement_id,
            adjustment_kind: kind,
            reason: reason.to_string(),
        };
        self.working.adjustments.push(record.clone());
        Ok(record)
    }

    async fn insert_line_item(
        &mut self,
        movement_id: i64,
        line: NewLineItem,
    ) -> AppResult<LineItem> {
        let subtotal = line.subtotal()?;
        let item = LineItem {
            movement_id,
            product_id: line.product_id,
            product_name: self.working.product_name(line.product_id),
            quantity: line.quantity,
            unit_price: line.unit_price,
            subtotal,
        };
        self.working.line_items.push(item.clone());
        Ok(item)
    }

    async fn insert_order(
        &mut self,
        supplier_id: i64,
        requested_by: i64,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Order> {
        let order = Order {
            id: next(&mut self.working.seq.order),
            supplier_id,
            requested_by,
            status: OrderStatus::InProgress,
            lines,
            created_at,
        };
        self.working.orders.push(order.clone());
        Ok(order)
    }

    async fn lock_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        Ok(self.working.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn update_order_lines(&mut self, id: i64, lines: &[OrderLine]) -> AppResult<()> {
        if let Some(order) = self.working.orders.iter_mut().find(|o| o.id == id) {
            order.lines = lines.to_vec();
        }
        Ok(())
    }

    async fn set_order_status(&mut self, id: i64, status: OrderStatus) -> AppResult<bool> {
        Ok(match self.working.orders.iter_mut().find(|o| o.id == id) {
            Some(order) => {
                order.status = status;
                true
            }
            None => false,
        })
    }

    async fn insert_incident(&mut self, incident: NewIncident) -> AppResult<Incident> {
        let incident = Incident {
            id: next(&mut self.working.seq.incident),
            movement_id: incident.movement_id,
            order_id: incident.order_id,
            description: incident.description,
            details: incident.details,
            registered_at: Utc::now(),
            occurred_at: incident.occurred_at,
        };
        self.working.incidents.push(incident.clone());
        Ok(incident)
    }
}
