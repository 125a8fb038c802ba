//! Storage crate: persistence behind the relay store traits.
//!
//! ## Modules
//!
//! - [`SqliteStore`] – SQLite via sqlx; one pool, all relay tables
//! - [`InMemoryStore`] – same traits over in-process collections (tests, dry runs)
//! - [`SqlitePoolManager`] – pool construction, including single-connection `sqlite::memory:`

mod error;
mod inmemory;
mod log_repo;
mod models;
mod notification_repo;
mod queue_repo;
mod schema;
mod sqlite_pool;
mod sqlite_store;


pub use inmemory::InMemoryStore;
pub use sqlite_pool::SqlitePoolManager;
pub use sqlite_store::SqliteStore;
