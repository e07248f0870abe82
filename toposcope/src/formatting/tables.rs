//! Table formatting utilities using comfy-table.

use comfy_table::{Attribute, Cell, Color, ContentArrangement, Table};
use owo_colors::OwoColorize;

use super::Status;

fn new_table(headers: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .set_header(
            headers
                .iter()
                .map(|h| Cell::new(*h).add_attribute(Attribute::Bold))
                .collect::<Vec<_>>(),
        )
        .load_preset(comfy_table::presets::UTF8_FULL)
        .apply_modifier(comfy_table::modifiers::UTF8_ROUND_CORNERS)
        .set_content_arrangement(ContentArrangement::Dynamic);
    table
}

/// Prints resolved packages as `(name, version, private, path)` rows.
pub fn print_package_table(packages: &[(String, String, bool, String)]) {
    let mut table = new_table(&["#", "Package", "Version", "Private", "Path"]);

    for (idx, (name, version, private, path)) in packages.iter().enumerate() {
        let private_cell = if *private {
            Cell::new("yes").fg(Color::Yellow)
        } else {
            Cell::new("no").fg(Color::DarkGrey)
        };
        table.add_row(vec![
            Cell::new(idx + 1).fg(Color::DarkGrey),
            Cell::new(name).fg(Color::White),
            Cell::new(version),
            private_cell,
            Cell::new(path).fg(Color::DarkGrey),
        ]);
    }

    println!("{}", table);
}

/// Prints changed files as `(path, origins, owning package)` rows.
pub fn print_change_table(files: &[(String, String, String)]) {
    let mut table = new_table(&["File", "Origin", "Package"]);

    for (path, origins, owner) in files {
        let owner_cell = if owner.is_empty() {
            Cell::new("(none)").fg(Color::DarkGrey)
        } else {
            Cell::new(owner).fg(Color::White)
        };
        table.add_row(vec![Cell::new(path), Cell::new(origins).fg(Color::Cyan), owner_cell]);
    }

    println!("{}", table);
}

/// Prints package names one per line.
pub fn print_package_list(packages: &[String]) {
    if packages.is_empty() {
        println!("  {} {}", Status::Info.symbol().cyan(), "(none)".bright_black());
        return;
    }

    for pkg in packages {
        println!("  {} {}", Status::Info.symbol().cyan(), pkg.bold().white());
    }
}
