pub mod coerce;
pub mod header;
pub mod reader;

pub use header::{locate_header, Field, HeaderLayout, DEFAULT_HEADER_TOKENS, DEFAULT_SCAN_ROWS};
pub use reader::{build_grid, read_grid};
