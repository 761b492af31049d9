pub mod cell;
pub mod ledger;
pub mod report;

pub use cell::{cell_at, Cell, Grid};
pub use ledger::{normalize_sku, NormalizedPayout, PayoutKey, PayoutLine, SalesLine, StatusSync};
pub use report::{export_errors_csv, ImportPreview, ImportReport, RowIssue};
