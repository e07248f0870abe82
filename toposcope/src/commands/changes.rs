//! Change inspection command.

use std::path::PathBuf;

use anyhow::Result;
use serde_json::json;
use toposcope_core::{ChangeDetector, PackageOwners, Resolver};

use super::relative;
use crate::formatting::{
    print_change_table, print_key_value, print_package_list, print_section_header, print_success,
    SectionStyle, Status,
};

pub fn cmd_changed(root: PathBuf, since: String, json: bool) -> Result<()> {
    let resolver = Resolver::new(&root);
    let workspace = resolver.load()?;
    let graph = &workspace.graph;

    let detector = ChangeDetector::new(resolver.vcs());
    let changes = detector.changed_files(&workspace.root, &since)?;
    let owners = PackageOwners::new(graph.all_packages());
    let changed: Vec<_> = changes
        .iter()
        .map(|(path, origins)| (path, origins, owners.owner_of(path).map(|p| p.name.as_str())))
        .collect();
    let packages = graph.sort(changed.iter().filter_map(|(_, _, owner)| *owner))?;

    if json {
        let files: Vec<_> = changed
            .iter()
            .map(|(path, origins, owner)| {
                json!({
                    "path": relative(&workspace.root, path),
                    "origins": origins,
                    "package": owner,
                })
            })
            .collect();
        let data = json!({
            "since": since,
            "files": files,
            "packages": packages,
        });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    print_section_header("[Changed Files]", SectionStyle::Primary);
    print_key_value("Since:", &since);
    println!();

    if changes.is_empty() {
        println!("  {}", Status::Info.format("No changes"));
        println!();
        return Ok(());
    }

    let rows: Vec<(String, String, String)> = changed
        .iter()
        .map(|(path, origins, owner)| {
            let origins: Vec<&str> = origins.iter().map(|o| o.as_str()).collect();
            (
                relative(&workspace.root, path).display().to_string(),
                origins.join(", "),
                owner.unwrap_or_default().to_string(),
            )
        })
        .collect();
    print_change_table(&rows);
    println!();

    print_section_header("[Changed Packages]", SectionStyle::Primary);
    if !packages.is_empty() {
        print_success(&format!("{} packages changed", packages.len()));
    }
    print_package_list(&packages);
    println!();

    Ok(())
}
