//! Business logic services for StockCloud
//!
//! `stock`, `movement` and `incident` expose free functions that run inside a
//! caller's unit of work; the service structs own whole workflows.

pub mod auth;
pub mod catalog;
pub mod category;
pub mod incident;
pub mod movement;
pub mod order;
pub mod reporting;
pub mod stock;
pub mod supplier;
pub mod user;

pub use auth::AuthService;
pub use catalog::ProductService;
pub use category::CategoryService;
pub use incident::IncidentService;
pub use movement::MovementService;
pub use order::OrderService;
pub use reporting::ReportingService;
pub use supplier::{ClientService, SupplierService};
pub use user::UserService;
