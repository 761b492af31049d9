pub mod committer;
pub mod importer;
pub mod matcher;
pub mod normalizer;

pub use committer::{CommitSummary, UpsertCommitter};
pub use importer::{ImportSettings, PayoutImportService};
pub use matcher::ReconciliationMatcher;
pub use normalizer::{normalize_rows, step, FoldState, RowContext, RowOutcome};
