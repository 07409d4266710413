pub mod catalog;
pub mod pool;
pub mod result_store;

pub use catalog::{CatalogStore, SqlCatalogStore};
pub use pool::SqliteHandle;
pub use result_store::{ResultStore, SqlResultStore};
