pub mod memory;
pub mod pool;
pub mod queries;
pub mod schema;
pub mod store;

pub use memory::InMemoryLedgerStore;
pub use pool::create_pool;
pub use schema::ensure_schema;
pub use store::{LedgerStore, PgLedgerStore};
