//! Route definitions for StockCloud

use axum::{
    middleware,
    routing::{get, patch, post, put},
    Router,
};

use crate::{handlers, middleware::auth_middleware, AppState};

/// Create API routes
pub fn api_routes(state: AppState) -> Router<AppState> {
    Router::new()
        // Health check (public)
        .route("/health", get(handlers::health_check))
        // Auth routes (login is public)
        .nest("/auth", auth_routes(state.clone()))
        // Protected routes - catalog
        .nest("/products", product_routes(state.clone()))
        .nest("/categories", category_routes(state.clone()))
        .nest("/suppliers", supplier_routes(state.clone()))
        .nest("/clients", client_routes(state.clone()))
        // Protected routes - stock movements
        .nest("/movements", movement_routes(state.clone()))
        .nest("/orders", order_routes(state.clone()))
        .nest("/incidents", incident_routes(state.clone()))
        // Protected routes - reports and dashboard
        .nest("/reports", report_routes(state.clone()))
        // Protected routes - user administration
        .nest("/users", user_routes(state.clone()))
        .nest("/audits", audit_routes(state))
}

fn auth_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            "/me",
            get(handlers::me).route_layer(middleware::from_fn_with_state(state, auth_middleware)),
        )
        .route("/login", post(handlers::login))
}

fn product_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_products).post(handlers::create_product))
        .route("/critical", get(handlers::critical_products))
        .route("/for-order", get(handlers::products_for_order))
        .route(
            "/:id",
            get(handlers::get_product).put(handlers::update_product),
        )
        .route("/:id/status", patch(handlers::set_product_status))
        .route("/:id/open-order", get(handlers::open_order_for_product))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn category_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_categories).post(handlers::create_category))
        .route("/active", get(handlers::list_active_categories))
        .route("/:id", put(handlers::rename_category))
        .route("/:id/status", patch(handlers::set_category_status))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn supplier_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_suppliers).post(handlers::create_supplier))
        .route(
            "/:id",
            get(handlers::get_supplier).put(handlers::update_supplier),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn client_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_clients))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn movement_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_movements))
        .route("/:id", get(handlers::get_movement))
        .route("/sales", post(handlers::register_sale))
        .route("/purchases", post(handlers::register_purchase))
        .route("/shortages", post(handlers::register_shortage))
        .route("/overages", post(handlers::register_overage))
        .route("/:id/incidents", get(handlers::incidents_for_movement))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn order_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_orders).post(handlers::create_order))
        .route("/summary", get(handlers::orders_summary))
        .route("/open-products", get(handlers::open_order_products))
        .route("/date/:date", get(handlers::orders_on_date))
        .route("/:id", get(handlers::get_order))
        .route("/:id/cancel", post(handlers::cancel_order))
        .route("/:id/incidents", get(handlers::incidents_for_order))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn incident_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_incidents))
        .route("/summary", get(handlers::incidents_summary))
        .route("/date/:date", get(handlers::incidents_on_date))
        .route("/:id", get(handlers::get_incident))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn report_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/movements", get(handlers::export_movements))
        .route("/dashboard", get(handlers::get_dashboard))
        .route("/adjustments/:date", get(handlers::adjustments_on_date))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn user_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_users).post(handlers::create_user))
        .route("/:id", put(handlers::update_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

fn audit_routes(state: AppState) -> Router<AppState> {
    Router::new()
        .route("/", get(handlers::list_product_audits))
        .route("/products/:id", get(handlers::product_audits_for_product))
        .route("/users/:id", get(handlers::product_audits_by_user))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}
