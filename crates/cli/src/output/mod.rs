//! Output formatting for CLI results.

pub mod detail;
pub mod table;

pub use detail::format_reallocation;
pub use table::{format_funding_table, format_simulation};
