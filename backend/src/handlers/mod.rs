//! HTTP handlers

pub mod auth;
pub mod catalog;
pub mod health;
pub mod incident;
pub mod movement;
pub mod order;
pub mod reporting;
pub mod user;

pub use auth::*;
pub use catalog::*;
pub use health::*;
pub use incident::*;
pub use movement::*;
pub use order::*;
pub use reporting::*;
pub use user::*;
