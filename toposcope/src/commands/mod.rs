//! Command implementations for the CLI.

mod changes;
mod discovery;

use std::path::{Path, PathBuf};

use toposcope_core::Workspace;

use crate::formatting::{print_section_header, print_warning, SectionStyle};

pub use changes::cmd_changed;
pub use discovery::{cmd_graph, cmd_list};

/// Path of `path` relative to the workspace root, for display.
fn relative(root: &Path, path: &Path) -> PathBuf {
    path.strip_prefix(root).unwrap_or(path).to_path_buf()
}

/// Reports manifests that were skipped while scanning.
fn print_skipped(workspace: &Workspace) {
    if workspace.skipped.is_empty() {
        return;
    }

    print_section_header("[Skipped Manifests]", SectionStyle::Warning);
    for skipped in &workspace.skipped {
        print_warning(&format!(
            "{}: {}",
            relative(&workspace.root, &skipped.path).display(),
            skipped.error
        ));
    }
    println!();
}
