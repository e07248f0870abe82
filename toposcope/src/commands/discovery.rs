//! Resolution and graph inspection commands.

use std::path::PathBuf;

use anyhow::Result;
use owo_colors::OwoColorize;
use serde_json::json;
use toposcope_core::{ResolveOptions, Resolver};

use super::{print_skipped, relative};
use crate::formatting::{
    print_package_table, print_section_header, print_success, print_summary_box, print_warning,
    SectionStyle,
};

pub fn cmd_list(root: PathBuf, options: ResolveOptions, json: bool) -> Result<()> {
    let resolver = Resolver::new(&root);
    let packages = resolver.resolve(&options)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&packages)?);
        return Ok(());
    }

    print_section_header("[Resolved Packages]", SectionStyle::Primary);
    if packages.is_empty() {
        print_warning("No packages selected");
    } else {
        print_success(&format!("{} packages in dependency order", packages.len()));
        println!();

        let root = root.canonicalize().unwrap_or(root);
        let rows: Vec<(String, String, bool, String)> = packages
            .iter()
            .map(|pkg| {
                (
                    pkg.name.clone(),
                    pkg.version.clone(),
                    pkg.private,
                    relative(&root, &pkg.path).display().to_string(),
                )
            })
            .collect();
        print_package_table(&rows);
    }
    println!();

    Ok(())
}

pub fn cmd_graph(root: PathBuf, json: bool) -> Result<()> {
    let workspace = Resolver::new(&root).load()?;
    let graph = &workspace.graph;
    let edges = graph.edges();

    if json {
        let edges: Vec<_> = edges
            .iter()
            .map(|(from, to)| json!({ "from": from, "to": to }))
            .collect();
        let graph_data = json!({
            "order": graph.topological_order(),
            "levels": graph.dependency_levels(),
            "edges": edges,
        });
        println!("{}", serde_json::to_string_pretty(&graph_data)?);
        return Ok(());
    }

    print_skipped(&workspace);
    print_section_header("[Dependency Graph]", SectionStyle::Primary);

    if graph.is_empty() {
        print_warning("No packages found");
        println!();
        return Ok(());
    }

    for (level, names) in graph.dependency_levels().iter().enumerate() {
        println!(
            "  {} {}",
            format!("level {:2}", level).bright_black(),
            names.join(", ").bold().white()
        );
    }
    println!();

    if !edges.is_empty() {
        print_section_header("[Edges]", SectionStyle::Primary);
        for (from, to) in &edges {
            println!("  {} {} {}", from.bold().white(), "->".cyan(), to);
        }
        println!();
    }

    print_summary_box(
        "Workspace",
        &[
            ("Root", &workspace.root.display().to_string()),
            ("Packages", &graph.len().to_string()),
            ("Edges", &edges.len().to_string()),
            ("Levels", &graph.dependency_levels().len().to_string()),
        ],
    );
    println!();

    Ok(())
}
