use std::collections::HashMap;
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{types::Json, FromRow, PgPool, Postgres, Transaction};

use super::{Store, UnitOfWork};
use crate::error::{AppError, AppResult};
use shared::{
    next_sequence_number, ActiveStatus, AdjustmentKind, AdjustmentRecord, Category, ChangedFields,
    Client, DocumentType, Incident, IncidentDetail, LineItem, Movement, MovementDetail,
    MovementSpecialization, NewClient, NewIncident, NewLineItem, NewMovement, NewProduct,
    NewProductAudit, NewSupplier, NewUser, Order, OrderLine, OrderStatus, ParseEnumError, Product,
    ProductAudit, ProductChanges, PurchaseRecord, SaleRecord, Supplier, User, UserCredentials, UserRole,
};

const PRODUCT_COLUMNS: &str =
    "id, name, stock, min_stock, unit_price, category_id, supplier_id, status";
const SUPPLIER_COLUMNS: &str = "id, business_name, tax_id, phone, email, address";
const CLIENT_COLUMNS: &str = "id, name, business_name, national_id, tax_id, address, email";
const USER_COLUMNS: &str = "id, username, email, password_hash, role, status";
const MOVEMENT_COLUMNS: &str = "id, user_id, kind, occurred_at, note";
const ORDER_COLUMNS: &str = "id, supplier_id, requested_by, status, lines, created_at";
const INCIDENT_COLUMNS: &str =
    "id, movement_id, order_id, description, details, registered_at, occurred_at";
const AUDIT_SELECT: &str = r#"
    SELECT a.id, a.product_id, p.name AS product_name, a.user_id, u.username,
           a.action, a.changed_fields, a.recorded_at
    FROM product_audits a
    LEFT JOIN products p ON p.id = a.product_id
    LEFT JOIN users u ON u.id = a.user_id
"#;

/// Advisory lock keys serializing sale numbering per document type
fn sequence_lock_key(document_type: DocumentType) -> i64 {
    match document_type {
        DocumentType::Receipt => 7_100_001,
        DocumentType::Invoice => 7_100_002,
    }
}

fn parse<T>(value: &str) -> AppResult<T>
where
    T: FromStr<Err = ParseEnumError>,
{
    value
        .parse()
        .map_err(|e: ParseEnumError| AppError::Internal(format!("Corrupt row: {}", e)))
}

/// Map a unique-constraint violation to `DuplicateEntry`
fn duplicate_as(field: &str) -> impl FnOnce(sqlx::Error) -> AppError + '_ {
    move |err| match &err {
        sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
            AppError::DuplicateEntry(field.to_string())
        }
        _ => AppError::DatabaseError(err),
    }
}

#[derive(Debug, FromRow)]
struct ProductRow {
    id: i64,
    name: String,
    stock: i32,
    min_stock: i32,
    unit_price: Decimal,
    category_id: Option<i64>,
    supplier_id: Option<i64>,
    status: String,
}

impl TryFrom<ProductRow> for Product {
    type Error = AppError;

    fn try_from(row: ProductRow) -> AppResult<Self> {
        Ok(Product {
            id: row.id,
            name: row.name,
            stock: row.stock,
            min_stock: row.min_stock,
            unit_price: row.unit_price,
            category_id: row.category_id,
            supplier_id: row.supplier_id,
            status: parse(&row.status)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct CategoryRow {
    id: i64,
    name: String,
    status: String,
}

impl TryFrom<CategoryRow> for Category {
    type Error = AppError;

    fn try_from(row: CategoryRow) -> AppResult<Self> {
        Ok(Category {
            id: row.id,
            name: row.name,
            status: parse(&row.status)?,
        })
    }
}

#[derive(Debug, FromRow)]
struct SupplierRow {
    id: i64,
    business_name: String,
    tax_id: String,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
}

impl From<SupplierRow> for Supplier {
    fn from(row: SupplierRow) -> Self {
        Supplier {
            id: row.id,
            business_name: row.business_name,
            tax_id: row.tax_id,
            phone: row.phone,
            email: row.email,
            address: row.address,
        }
    }
}

#[derive(Debug, FromRow)]
struct ClientRow {
    id: i64,
    name: Option<String>,
    business_name: Option<String>,
    national_id: Option<String>,
    tax_id: Option<String>,
    address: Option<String>,
    email: Option<String>,
}

impl From<ClientRow> for Client {
    fn from(row: ClientRow) -> Self {
        Client {
            id: row.id,
            name: row.name,
            business_name: row.business_name,
            national_id: row.national_id,
            tax_id: row.tax_id,
            address: row.address,
            email: row.email,
        }
    }
}

#[derive(Debug, FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    password_hash: String,
    role: String,
    status: String,
}

impl TryFrom<UserRow> for UserCredentials {
    type Error = AppError;

    fn try_from(row: UserRow) -> AppResult<Self> {
        Ok(UserCredentials {
            user: User {
                id: row.id,
                username: row.username,
                email: row.email,
                role: parse(&row.role)?,
                status: parse(&row.status)?,
            },
            password_hash: row.password_hash,
        })
    }
}

#[derive(Debug, FromRow)]
struct MovementRow {
    id: i64,
    user_id: i64,
    kind: String,
    occurred_at: DateTime<Utc>,
    note: Option<String>,
}

impl TryFrom<MovementRow> for Movement {
    type Error = AppError;

    fn try_from(row: MovementRow) -> AppResult<Self> {
        Ok(Movement {
            id: row.id,
            user_id: row.user_id,
            kind: parse(&row.kind)?,
            occurred_at: row.occurred_at,
            note: row.note,
        })
    }
}

#[derive(Debug, FromRow)]
struct SaleRow {
    movement_id: i64,
    client_id: i64,
    document_type: String,
    series: String,
    sequence_number: i32,
    total: Decimal,
}

impl TryFrom<SaleRow> for SaleRecord {
    type Error = AppError;

    fn try_from(row: SaleRow) -> AppResult<Self> {
        Ok(SaleRecord {
            movement_id: row.movement_id,
            client_id: row.client_id,
            document_type: parse(&row.document_type)?,
            series: row.series,
            sequence_number: row.sequence_number,
            total: row.total,
        })
    }
}

#[derive(Debug, FromRow)]
struct PurchaseRow {
    movement_id: i64,
    supplier_id: i64,
    total: Decimal,
    order_id: Option<i64>,
}

impl From<PurchaseRow> for PurchaseRecord {
    fn from(row: PurchaseRow) -> Self {
        PurchaseRecord {
            movement_id: row.movement_id,
            supplier_id: row.supplier_id,
            total: row.total,
            order_id: row.order_id,
        }
    }
}

#[derive(Debug, FromRow)]
struct AdjustmentRow {
    movement_id: i64,
    adjustment_kind: String,
    reason: String,
}

impl TryFrom<AdjustmentRow> for AdjustmentRecord {
    type Error = AppError;

    fn try_from(row: AdjustmentRow) -> AppResult<Self> {
        Ok(AdjustmentRecord {
            movement_id: row.movement_id,
            adjustment_kind: parse(&row.adjustment_kind)?,
            reason: row.reason,
        })
    }
}

#[derive(Debug, FromRow)]
struct LineRow {
    movement_id: i64,
    product_id: i64,
    product_name: Option<String>,
    quantity: i32,
    unit_price: Decimal,
    subtotal: Decimal,
}

impl From<LineRow> for LineItem {
    fn from(row: LineRow) -> Self {
        LineItem {
            movement_id: row.movement_id,
            product_id: row.product_id,
            product_name: row.product_name,
            quantity: row.quantity,
            unit_price: row.unit_price,
            subtotal: row.subtotal,
        }
    }
}

#[derive(Debug, FromRow)]
struct OrderRow {
    id: i64,
    supplier_id: i64,
    requested_by: i64,
    status: String,
    lines: Json<Vec<OrderLine>>,
    created_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = AppError;

    fn try_from(row: OrderRow) -> AppResult<Self> {
        Ok(Order {
            id: row.id,
            supplier_id: row.supplier_id,
            requested_by: row.requested_by,
            status: parse(&row.status)?,
            lines: row.lines.0,
            created_at: row.created_at,
        })
    }
}

#[derive(Debug, FromRow)]
struct IncidentRow {
    id: i64,
    movement_id: i64,
    order_id: Option<i64>,
    description: String,
    details: Json<Vec<IncidentDetail>>,
    registered_at: DateTime<Utc>,
    occurred_at: DateTime<Utc>,
}

impl From<IncidentRow> for Incident {
    fn from(row: IncidentRow) -> Self {
        Incident {
            id: row.id,
            movement_id: row.movement_id,
            order_id: row.order_id,
            description: row.description,
            details: row.details.0,
            registered_at: row.registered_at,
            occurred_at: row.occurred_at,
        }
    }
}

#[derive(Debug, FromRow)]
struct ProductAuditRow {
    id: i64,
    product_id: i64,
    product_name: Option<String>,
    user_id: i64,
    username: Option<String>,
    action: String,
    changed_fields: Json<ChangedFields>,
    recorded_at: DateTime<Utc>,
}

impl TryFrom<ProductAuditRow> for ProductAudit {
    type Error = AppError;

    fn try_from(row: ProductAuditRow) -> AppResult<Self> {
        Ok(ProductAudit {
            id: row.id,
            product_id: row.product_id,
            product_name: row.product_name,
            user_id: row.user_id,
            username: row.username,
            action: parse(&row.action)?,
            changed_fields: row.changed_fields.0,
            recorded_at: row.recorded_at,
        })
    }
}

fn convert_all<R, T>(rows: Vec<R>) -> AppResult<Vec<T>>
where
    T: TryFrom<R, Error = AppError>,
{
    rows.into_iter().map(T::try_from).collect()
}

/// PostgreSQL-backed store
#[derive(Clone)]
pub struct PgStore {
    db: PgPool,
}

impl PgStore {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    /// Attach specializations and lines to movement rows with one query each
    async fn load_details(&self, rows: Vec<MovementRow>) -> AppResult<Vec<MovementDetail>> {
        let ids: Vec<i64> = rows.iter().map(|r| r.id).collect();

        let sales = sqlx::query_as::<_, SaleRow>(
            "SELECT movement_id, client_id, document_type, series, sequence_number, total \
             FROM sale_movements WHERE movement_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;
        let purchases = sqlx::query_as::<_, PurchaseRow>(
            "SELECT movement_id, supplier_id, total, order_id \
             FROM purchase_movements WHERE movement_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;
        let adjustments = sqlx::query_as::<_, AdjustmentRow>(
            "SELECT movement_id, adjustment_kind, reason \
             FROM adjustment_movements WHERE movement_id = ANY($1)",
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;
        let lines = sqlx::query_as::<_, LineRow>(
            r#"
            SELECT ml.movement_id, ml.product_id, p.name AS product_name,
                   ml.quantity, ml.unit_price, ml.subtotal
            FROM movement_lines ml
            LEFT JOIN products p ON p.id = ml.product_id
            WHERE ml.movement_id = ANY($1)
            ORDER BY ml.id
            "#,
        )
        .bind(&ids)
        .fetch_all(&self.db)
        .await?;

        let mut specializations: HashMap<i64, MovementSpecialization> = HashMap::new();
        for sale in sales {
            let sale = SaleRecord::try_from(sale)?;
            specializations.insert(sale.movement_id, MovementSpecialization::Sale(sale));
        }
        for purchase in purchases {
            let purchase = PurchaseRecord::from(purchase);
            specializations.insert(purchase.movement_id, MovementSpecialization::Purchase(purchase));
        }
        for adjustment in adjustments {
            let adjustment = AdjustmentRecord::try_from(adjustment)?;
            specializations.insert(
                adjustment.movement_id,
                MovementSpecialization::Adjustment(adjustment),
            );
        }

        let mut lines_by_movement: HashMap<i64, Vec<LineItem>> = HashMap::new();
        for line in lines {
            lines_by_movement
                .entry(line.movement_id)
                .or_default()
                .push(line.into());
        }

        rows.into_iter()
            .map(|row| {
                let id = row.id;
                Ok(MovementDetail {
                    movement: Movement::try_from(row)?,
                    specialization: specializations.remove(&id),
                    lines: lines_by_movement.remove(&id).unwrap_or_default(),
                })
            })
            .collect()
    }
}

#[async_trait]
impl Store for PgStore {
    async fn begin(&self) -> AppResult<Box<dyn UnitOfWork>> {
        let tx = self.db.begin().await?;
        Ok(Box::new(PgUnitOfWork { tx }))
    }

    async fn list_products(&self) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products ORDER BY name",
            PRODUCT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn get_product(&self, id: i64) -> AppResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn list_categories(&self) -> AppResult<Vec<Category>> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, status FROM categories ORDER BY name",
        )
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn get_category(&self, id: i64) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, CategoryRow>("SELECT id, name, status FROM categories WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .map(Category::try_from)
            .transpose()
    }

    async fn list_suppliers(&self) -> AppResult<Vec<Supplier>> {
        let rows = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {} FROM suppliers ORDER BY business_name",
            SUPPLIER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Supplier::from).collect())
    }

    async fn get_supplier(&self, id: i64) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            "SELECT {} FROM suppliers WHERE id = $1",
            SUPPLIER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Supplier::from))
    }

    async fn list_clients(&self) -> AppResult<Vec<Client>> {
        let rows = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {} FROM clients ORDER BY id",
            CLIENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Client::from).collect())
    }

    async fn list_product_audits(&self) -> AppResult<Vec<ProductAudit>> {
        let rows = sqlx::query_as::<_, ProductAuditRow>(&format!(
            "{} ORDER BY a.recorded_at DESC, a.id DESC",
            AUDIT_SELECT
        ))
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn product_audits_for_product(&self, product_id: i64) -> AppResult<Vec<ProductAudit>> {
        let rows = sqlx::query_as::<_, ProductAuditRow>(&format!(
            "{} WHERE a.product_id = $1 ORDER BY a.recorded_at DESC, a.id DESC",
            AUDIT_SELECT
        ))
        .bind(product_id)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn product_audits_for_user(&self, user_id: i64) -> AppResult<Vec<ProductAudit>> {
        let rows = sqlx::query_as::<_, ProductAuditRow>(&format!(
            "{} WHERE a.user_id = $1 ORDER BY a.recorded_at DESC, a.id DESC",
            AUDIT_SELECT
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn list_users(&self) -> AppResult<Vec<User>> {
        let rows = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users ORDER BY id",
            USER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        let credentials: Vec<UserCredentials> = convert_all(rows)?;
        Ok(credentials.into_iter().map(|c| c.user).collect())
    }

    async fn get_user(&self, id: i64) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE id = $1",
            USER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row
            .map(UserCredentials::try_from)
            .transpose()?
            .map(|c| c.user))
    }

    async fn find_credentials(&self, login: &str) -> AppResult<Option<UserCredentials>> {
        sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {} FROM users WHERE username = $1 OR email = $1",
            USER_COLUMNS
        ))
        .bind(login)
        .fetch_optional(&self.db)
        .await?
        .map(UserCredentials::try_from)
        .transpose()
    }

    async fn list_movements(&self) -> AppResult<Vec<Movement>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM movements ORDER BY occurred_at DESC, id DESC",
            MOVEMENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn movement_detail(&self, id: i64) -> AppResult<Option<MovementDetail>> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM movements WHERE id = $1",
            MOVEMENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        match row {
            Some(row) => Ok(self.load_details(vec![row]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn movements_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<MovementDetail>> {
        let rows = sqlx::query_as::<_, MovementRow>(&format!(
            "SELECT {} FROM movements WHERE occurred_at BETWEEN $1 AND $2 \
             ORDER BY occurred_at, id",
            MOVEMENT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        self.load_details(rows).await
    }

    async fn list_orders(&self) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders ORDER BY id DESC",
            ORDER_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn get_order(&self, id: i64) -> AppResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn orders_with_status(&self, status: OrderStatus) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE status = $1 ORDER BY id",
            ORDER_COLUMNS
        ))
        .bind(status.as_str())
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn orders_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE created_at BETWEEN $1 AND $2 ORDER BY created_at",
            ORDER_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        convert_all(rows)
    }

    async fn list_incidents(&self) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {} FROM incidents ORDER BY id DESC",
            INCIDENT_COLUMNS
        ))
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Incident::from).collect())
    }

    async fn get_incident(&self, id: i64) -> AppResult<Option<Incident>> {
        let row = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {} FROM incidents WHERE id = $1",
            INCIDENT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.db)
        .await?;
        Ok(row.map(Incident::from))
    }

    async fn incidents_for_order(&self, order_id: i64) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {} FROM incidents WHERE order_id = $1 ORDER BY id DESC",
            INCIDENT_COLUMNS
        ))
        .bind(order_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Incident::from).collect())
    }

    async fn incidents_for_movement(&self, movement_id: i64) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {} FROM incidents WHERE movement_id = $1 ORDER BY id",
            INCIDENT_COLUMNS
        ))
        .bind(movement_id)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Incident::from).collect())
    }

    async fn incidents_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> AppResult<Vec<Incident>> {
        let rows = sqlx::query_as::<_, IncidentRow>(&format!(
            "SELECT {} FROM incidents WHERE occurred_at BETWEEN $1 AND $2 ORDER BY occurred_at",
            INCIDENT_COLUMNS
        ))
        .bind(start)
        .bind(end)
        .fetch_all(&self.db)
        .await?;
        Ok(rows.into_iter().map(Incident::from).collect())
    }
}

/// A Postgres transaction; rolled back when dropped uncommitted
pub struct PgUnitOfWork {
    tx: Transaction<'static, Postgres>,
}

#[async_trait]
impl UnitOfWork for PgUnitOfWork {
    async fn commit(self: Box<Self>) -> AppResult<()> {
        let PgUnitOfWork { tx } = *self;
        tx.commit().await?;
        Ok(())
    }

    async fn increase_stock(&mut self, product_id: i64, quantity: i32) -> AppResult<i32> {
        sqlx::query_scalar::<_, i32>(
            "UPDATE products SET stock = stock + $2 WHERE id = $1 RETURNING stock",
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?
        .ok_or_else(|| AppError::NotFound("Product".to_string()))
    }

    async fn decrease_stock(&mut self, product_id: i64, quantity: i32) -> AppResult<i32> {
        let updated = sqlx::query_scalar::<_, i32>(
            "UPDATE products SET stock = stock - $2 WHERE id = $1 AND stock >= $2 RETURNING stock",
        )
        .bind(product_id)
        .bind(quantity)
        .fetch_optional(&mut *self.tx)
        .await?;

        match updated {
            Some(stock) => Ok(stock),
            None => {
                let exists = sqlx::query_scalar::<_, bool>(
                    "SELECT EXISTS(SELECT 1 FROM products WHERE id = $1)",
                )
                .bind(product_id)
                .fetch_one(&mut *self.tx)
                .await?;
                if exists {
                    Err(AppError::InsufficientStock {
                        product_id,
                        requested: quantity,
                    })
                } else {
                    Err(AppError::NotFound("Product".to_string()))
                }
            }
        }
    }

    async fn get_product(&mut self, id: i64) -> AppResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn insert_product(&mut self, product: NewProduct) -> AppResult<Product> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            INSERT INTO products (name, stock, min_stock, unit_price, category_id, supplier_id)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(&product.name)
        .bind(product.stock)
        .bind(product.min_stock)
        .bind(product.unit_price)
        .bind(product.category_id)
        .bind(product.supplier_id)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn update_product(
        &mut self,
        id: i64,
        changes: ProductChanges,
    ) -> AppResult<Option<Product>> {
        sqlx::query_as::<_, ProductRow>(&format!(
            r#"
            UPDATE products
            SET name = $2, min_stock = $3, unit_price = $4, category_id = $5, supplier_id = $6
            WHERE id = $1
            RETURNING {}
            "#,
            PRODUCT_COLUMNS
        ))
        .bind(id)
        .bind(&changes.name)
        .bind(changes.min_stock)
        .bind(changes.unit_price)
        .bind(changes.category_id)
        .bind(changes.supplier_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Product::try_from)
        .transpose()
    }

    async fn set_product_status(&mut self, id: i64, status: ActiveStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE products SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_category(&mut self, name: &str) -> AppResult<Category> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "INSERT INTO categories (name) VALUES ($1) RETURNING id, name, status",
        )
        .bind(name)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn rename_category(&mut self, id: i64, name: &str) -> AppResult<Option<Category>> {
        sqlx::query_as::<_, CategoryRow>(
            "UPDATE categories SET name = $2 WHERE id = $1 RETURNING id, name, status",
        )
        .bind(id)
        .bind(name)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Category::try_from)
        .transpose()
    }

    async fn set_category_status(&mut self, id: i64, status: ActiveStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE categories SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn products_in_category(&mut self, category_id: i64) -> AppResult<Vec<Product>> {
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {} FROM products WHERE category_id = $1 FOR UPDATE",
            PRODUCT_COLUMNS
        ))
        .bind(category_id)
        .fetch_all(&mut *self.tx)
        .await?;
        convert_all(rows)
    }

    async fn deactivate_category_products(&mut self, category_id: i64) -> AppResult<u64> {
        let result = sqlx::query(
            "UPDATE products SET status = 'inactive' WHERE category_id = $1 AND status = 'active'",
        )
        .bind(category_id)
        .execute(&mut *self.tx)
        .await?;
        Ok(result.rows_affected())
    }

    async fn insert_supplier(&mut self, supplier: NewSupplier) -> AppResult<Supplier> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            INSERT INTO suppliers (business_name, tax_id, phone, email, address)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(&supplier.business_name)
        .bind(&supplier.tax_id)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(duplicate_as("RUC"))?;
        Ok(row.into())
    }

    async fn update_supplier(
        &mut self,
        id: i64,
        supplier: NewSupplier,
    ) -> AppResult<Option<Supplier>> {
        let row = sqlx::query_as::<_, SupplierRow>(&format!(
            r#"
            UPDATE suppliers
            SET business_name = $2, tax_id = $3, phone = $4, email = $5, address = $6
            WHERE id = $1
            RETURNING {}
            "#,
            SUPPLIER_COLUMNS
        ))
        .bind(id)
        .bind(&supplier.business_name)
        .bind(&supplier.tax_id)
        .bind(&supplier.phone)
        .bind(&supplier.email)
        .bind(&supplier.address)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(duplicate_as("RUC"))?;
        Ok(row.map(Supplier::from))
    }

    async fn insert_product_audit(&mut self, audit: NewProductAudit) -> AppResult<ProductAudit> {
        let row = sqlx::query_as::<_, ProductAuditRow>(
            r#"
            WITH a AS (
                INSERT INTO product_audits (product_id, user_id, action, changed_fields)
                VALUES ($1, $2, $3, $4)
                RETURNING *
            )
            SELECT a.id, a.product_id, p.name AS product_name, a.user_id, u.username,
                   a.action, a.changed_fields, a.recorded_at
            FROM a
            LEFT JOIN products p ON p.id = a.product_id
            LEFT JOIN users u ON u.id = a.user_id
            "#,
        )
        .bind(audit.product_id)
        .bind(audit.user_id)
        .bind(audit.action.as_str())
        .bind(Json(&audit.changed_fields))
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn find_client_by_national_id(&mut self, dni: &str) -> AppResult<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {} FROM clients WHERE national_id = $1",
            CLIENT_COLUMNS
        ))
        .bind(dni)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Client::from))
    }

    async fn find_client_by_tax_id(&mut self, ruc: &str) -> AppResult<Option<Client>> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            "SELECT {} FROM clients WHERE tax_id = $1",
            CLIENT_COLUMNS
        ))
        .bind(ruc)
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row.map(Client::from))
    }

    async fn insert_client(&mut self, client: NewClient) -> AppResult<Client> {
        let row = sqlx::query_as::<_, ClientRow>(&format!(
            r#"
            INSERT INTO clients (name, business_name, national_id, tax_id, address, email)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {}
            "#,
            CLIENT_COLUMNS
        ))
        .bind(&client.name)
        .bind(&client.business_name)
        .bind(&client.national_id)
        .bind(&client.tax_id)
        .bind(&client.address)
        .bind(&client.email)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(duplicate_as("client document"))?;
        Ok(row.into())
    }

    async fn update_client_contact(
        &mut self,
        id: i64,
        email: Option<&str>,
        address: Option<&str>,
    ) -> AppResult<()> {
        sqlx::query(
            r#"
            UPDATE clients
            SET email = COALESCE($2, email), address = COALESCE($3, address)
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(email)
        .bind(address)
        .execute(&mut *self.tx)
        .await?;
        Ok(())
    }

    async fn insert_user(&mut self, user: NewUser) -> AppResult<User> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            INSERT INTO users (username, email, password_hash, role)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(&user.username)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.role.as_str())
        .fetch_one(&mut *self.tx)
        .await
        .map_err(duplicate_as("username or email"))?;
        Ok(UserCredentials::try_from(row)?.user)
    }

    async fn update_user(
        &mut self,
        id: i64,
        role: Option<UserRole>,
        status: Option<ActiveStatus>,
    ) -> AppResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users
            SET role = COALESCE($2, role), status = COALESCE($3, status)
            WHERE id = $1
            RETURNING {}
            "#,
            USER_COLUMNS
        ))
        .bind(id)
        .bind(role.map(|r| r.as_str()))
        .bind(status.map(|s| s.as_str()))
        .fetch_optional(&mut *self.tx)
        .await?;
        Ok(row
            .map(UserCredentials::try_from)
            .transpose()?
            .map(|c| c.user))
    }

    async fn insert_movement(&mut self, movement: NewMovement) -> AppResult<Movement> {
        let row = sqlx::query_as::<_, MovementRow>(&format!(
            r#"
            INSERT INTO movements (user_id, kind, occurred_at, note)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            MOVEMENT_COLUMNS
        ))
        .bind(movement.user_id)
        .bind(movement.kind.as_str())
        .bind(movement.occurred_at)
        .bind(&movement.note)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn insert_sale(
        &mut self,
        movement_id: i64,
        client_id: i64,
        document_type: DocumentType,
        total: Decimal,
    ) -> AppResult<SaleRecord> {
        // Held until the transaction ends, so max + 1 cannot race.
        sqlx::query("SELECT pg_advisory_xact_lock($1)")
            .bind(sequence_lock_key(document_type))
            .execute(&mut *self.tx)
            .await?;

        let current_max = sqlx::query_scalar::<_, Option<i32>>(
            "SELECT MAX(sequence_number) FROM sale_movements WHERE document_type = $1",
        )
        .bind(document_type.as_str())
        .fetch_one(&mut *self.tx)
        .await?;

        let row = sqlx::query_as::<_, SaleRow>(
            r#"
            INSERT INTO sale_movements
                (movement_id, client_id, document_type, series, sequence_number, total)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING movement_id, client_id, document_type, series, sequence_number, total
            "#,
        )
        .bind(movement_id)
        .bind(client_id)
        .bind(document_type.as_str())
        .bind(document_type.series())
        .bind(next_sequence_number(current_max))
        .bind(total)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn insert_purchase(&mut self, record: PurchaseRecord) -> AppResult<PurchaseRecord> {
        let row = sqlx::query_as::<_, PurchaseRow>(
            r#"
            INSERT INTO purchase_movements (movement_id, supplier_id, total, order_id)
            VALUES ($1, $2, $3, $4)
            RETURNING movement_id, supplier_id, total, order_id
            "#,
        )
        .bind(record.movement_id)
        .bind(record.supplier_id)
        .bind(record.total)
        .bind(record.order_id)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn insert_adjustment(
        &mut self,
        movement_id: i64,
        kind: AdjustmentKind,
        reason: &str,
    ) -> AppResult<AdjustmentRecord> {
        let row = sqlx::query_as::<_, AdjustmentRow>(
            r#"
            INSERT INTO adjustment_movements (movement_id, adjustment_kind, reason)
            VALUES ($1, $2, $3)
            RETURNING movement_id, adjustment_kind, reason
            "#,
        )
        .bind(movement_id)
        .bind(kind.as_str())
        .bind(reason)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn insert_line_item(
        &mut self,
        movement_id: i64,
        line: NewLineItem,
    ) -> AppResult<LineItem> {
        let subtotal = line.subtotal()?;
        let row = sqlx::query_as::<_, LineRow>(
            r#"
            WITH inserted AS (
                INSERT INTO movement_lines (movement_id, product_id, quantity, unit_price, subtotal)
                VALUES ($1, $2, $3, $4, $5)
                RETURNING movement_id, product_id, quantity, unit_price, subtotal
            )
            SELECT i.movement_id, i.product_id, p.name AS product_name,
                   i.quantity, i.unit_price, i.subtotal
            FROM inserted i
            LEFT JOIN products p ON p.id = i.product_id
            "#,
        )
        .bind(movement_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .bind(subtotal)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }

    async fn insert_order(
        &mut self,
        supplier_id: i64,
        requested_by: i64,
        lines: Vec<OrderLine>,
        created_at: DateTime<Utc>,
    ) -> AppResult<Order> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            r#"
            INSERT INTO orders (supplier_id, requested_by, lines, created_at)
            VALUES ($1, $2, $3, $4)
            RETURNING {}
            "#,
            ORDER_COLUMNS
        ))
        .bind(supplier_id)
        .bind(requested_by)
        .bind(Json(lines))
        .bind(created_at)
        .fetch_one(&mut *self.tx)
        .await?;
        row.try_into()
    }

    async fn lock_order(&mut self, id: i64) -> AppResult<Option<Order>> {
        sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {} FROM orders WHERE id = $1 FOR UPDATE",
            ORDER_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(Order::try_from)
        .transpose()
    }

    async fn update_order_lines(&mut self, id: i64, lines: &[OrderLine]) -> AppResult<()> {
        sqlx::query("UPDATE orders SET lines = $2 WHERE id = $1")
            .bind(id)
            .bind(Json(lines))
            .execute(&mut *self.tx)
            .await?;
        Ok(())
    }

    async fn set_order_status(&mut self, id: i64, status: OrderStatus) -> AppResult<bool> {
        let result = sqlx::query("UPDATE orders SET status = $2 WHERE id = $1")
            .bind(id)
            .bind(status.as_str())
            .execute(&mut *self.tx)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn insert_incident(&mut self, incident: NewIncident) -> AppResult<Incident> {
        let row = sqlx::query_as::<_, IncidentRow>(&format!(
            r#"
            INSERT INTO incidents (movement_id, order_id, description, details, occurred_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {}
            "#,
            INCIDENT_COLUMNS
        ))
        .bind(incident.movement_id)
        .bind(incident.order_id)
        .bind(&incident.description)
        .bind(Json(&incident.details))
        .bind(incident.occurred_at)
        .fetch_one(&mut *self.tx)
        .await?;
        Ok(row.into())
    }
}
