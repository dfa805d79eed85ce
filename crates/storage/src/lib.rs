//! Catalog backends for the geocube loading engine.
//!
//! Provides:
//! - The `Catalog` trait used by the query layer
//! - PostgreSQL-backed catalog (`PgCatalog`)
//! - In-memory catalog for tests and file-based deployments (`MemoryCatalog`)

pub mod catalog;
pub mod error;
pub mod memory;
pub mod postgres;

pub use catalog::{Catalog, DatasetQuery, DatasetRecord};
pub use error::{StorageError, StorageResult};
pub use memory::MemoryCatalog;
pub use postgres::PgCatalog;
