//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod alerts;
pub mod audit;
pub mod auth;
pub mod backup;
pub mod categories;
pub mod export;
pub mod health;
pub mod kasa;
pub mod reports;
pub mod transactions;

// Re-export all handlers for use in router
pub use alerts::*;
pub use audit::*;
pub use auth::*;
pub use backup::*;
pub use categories::*;
pub use export::*;
pub use health::*;
pub use kasa::*;
pub use reports::*;
pub use transactions::*;
