pub mod api;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod service;
pub mod sheet;

pub use config::AppConfig;
pub use db::{create_pool, ensure_schema, InMemoryLedgerStore, LedgerStore, PgLedgerStore};
pub use error::{FailureKind, ImportError, RowError, StoreError};
pub use models::{ImportPreview, ImportReport};
pub use service::{ImportSettings, PayoutImportService};
