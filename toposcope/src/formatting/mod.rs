//! CLI output formatting.
//!
//! Colors come from `owo-colors`; tables are drawn with `comfy-table`.

mod headers;
mod output;
mod status;
mod tables;

pub use headers::{print_section_header, SectionStyle};
pub use output::{print_key_value, print_summary_box};
pub use status::{print_success, print_warning, Status};
pub use tables::{print_change_table, print_package_list, print_package_table};
