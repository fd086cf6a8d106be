//! Cache keys and the eviction set of every mutating use case

/// Keys of cached read models
pub mod keys {
    pub const PRODUCTS_ALL: &str = "productos:all";
    pub const PRODUCTS_CRITICAL: &str = "productos:criticos";
    pub const PRODUCTS_FOR_ORDER: &str = "productos:paraOrden";
    pub const MOVEMENTS_ALL: &str = "movimientos:all";
    pub const SHORTAGES_30_DAYS: &str = "movimientos:mermas30d";
    pub const OVERAGES_30_DAYS: &str = "movimientos:sobrantes30d";
    pub const CLIENTS_ALL: &str = "clientes:all";
    pub const ORDERS_ALL: &str = "ordenes:all";
    pub const ORDERS_30_DAYS: &str = "ordenes:ultimos30dias";
    pub const INCIDENTS_ALL: &str = "incidencias:all";
    pub const INCIDENTS_30_DAYS: &str = "incidencias:ultimos30dias";
    pub const CATEGORIES_ALL: &str = "categorias:all";
    pub const CATEGORIES_ACTIVE: &str = "categorias:activas";
    pub const SUPPLIERS_ALL: &str = "proveedores:all";
    pub const USERS_ALL: &str = "usuarios:all";
}

use keys::*;

/// A committed mutation whose dependent read models must be evicted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    SaleRecorded,
    PurchaseRecorded,
    ShortageRecorded,
    OverageRecorded,
    /// Order created or cancelled
    OrderChanged,
    ProductChanged,
    CategoryChanged,
    SupplierChanged,
    UserChanged,
}

impl CacheEvent {
    pub fn keys(&self) -> &'static [&'static str] {
        match self {
            CacheEvent::SaleRecorded => &[
                PRODUCTS_ALL,
                MOVEMENTS_ALL,
                CLIENTS_ALL,
                PRODUCTS_CRITICAL,
                PRODUCTS_FOR_ORDER,
            ],
            // The 30-day incident summary is not evicted here; it catches up
            // with new receipt incidents when its TTL runs out.
            CacheEvent::PurchaseRecorded => &[
                MOVEMENTS_ALL,
                ORDERS_ALL,
                PRODUCTS_ALL,
                INCIDENTS_ALL,
                PRODUCTS_CRITICAL,
                PRODUCTS_FOR_ORDER,
            ],
            CacheEvent::ShortageRecorded => &[MOVEMENTS_ALL, SHORTAGES_30_DAYS, PRODUCTS_ALL],
            CacheEvent::OverageRecorded => &[MOVEMENTS_ALL, OVERAGES_30_DAYS, PRODUCTS_ALL],
            CacheEvent::OrderChanged => &[ORDERS_ALL, ORDERS_30_DAYS, PRODUCTS_CRITICAL],
            CacheEvent::ProductChanged => &[PRODUCTS_ALL, PRODUCTS_CRITICAL, PRODUCTS_FOR_ORDER],
            CacheEvent::CategoryChanged => &[
                CATEGORIES_ALL,
                CATEGORIES_ACTIVE,
                PRODUCTS_ALL,
                PRODUCTS_FOR_ORDER,
            ],
            CacheEvent::SupplierChanged => &[SUPPLIERS_ALL],
            CacheEvent::UserChanged => &[USERS_ALL],
        }
    }
}
