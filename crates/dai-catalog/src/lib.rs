//! Read side of the bot/provider/model/integration store.
//!
//! CRUD lives outside this workspace; the core only reads, plus flips the
//! `is_active` flag of a bot after a lifecycle transition.

pub mod db;
pub mod error;
pub mod store;

pub use error::CatalogError;
pub use store::{Catalog, SqliteCatalog};
