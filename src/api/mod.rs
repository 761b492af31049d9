pub mod handlers;

pub use handlers::{health_check, import_payout, preview_payout};
