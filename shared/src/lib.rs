//! Shared types and models for the StockCloud inventory platform
//!
//! This crate holds the domain model and the pure rules of the order
//! lifecycle, movement arithmetic and input validation. It performs no I/O.

pub mod models;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
