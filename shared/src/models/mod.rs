//! Domain models for the StockCloud inventory platform

mod audit;
mod catalog;
mod incident;
mod movement;
mod order;
mod user;

pub use audit::*;
pub use catalog::*;
pub use incident::*;
pub use movement::*;
pub use order::*;
pub use user::*;
