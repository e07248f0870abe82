mod commands;
mod formatting;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use toposcope_core::ResolveOptions;
use tracing::Level;

#[derive(Parser)]
#[command(name = "toposcope")]
#[command(about = "Resolve monorepo workspace packages in dependency order")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Workspace root containing the root package.json or toposcope.toml.
    #[arg(long, global = true, default_value = ".")]
    root: PathBuf,

    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    verbose: u8,

    #[arg(short, long, global = true, action)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the selected packages in dependency order.
    List {
        /// Package name or glob to include (repeatable).
        #[arg(long = "scope", value_name = "PATTERN")]
        scope: Vec<String>,
        /// Package name or glob to exclude (repeatable).
        #[arg(long = "ignore", value_name = "PATTERN")]
        ignore: Vec<String>,
        #[arg(long, action)]
        include_dependencies: bool,
        #[arg(long, action)]
        include_dependents: bool,
        /// Drop packages marked private.
        #[arg(long, action)]
        no_private: bool,
        /// Only packages changed since REF (default HEAD).
        #[arg(long, value_name = "REF", num_args = 0..=1, default_missing_value = "HEAD")]
        since: Option<String>,
        /// Predicate expression, e.g. `!private && "react" in dependencies`.
        #[arg(long = "where", value_name = "EXPR")]
        where_expr: Option<String>,
        #[arg(long, action)]
        json: bool,
    },
    /// Show the topological order, levels and edges.
    Graph {
        #[arg(long, action)]
        json: bool,
    },
    /// Show files and packages changed since a reference.
    Changed {
        #[arg(long, value_name = "REF", default_value = "HEAD")]
        since: String,
        #[arg(long, action)]
        json: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.quiet {
        Level::ERROR
    } else {
        match cli.verbose {
            0 => Level::WARN,
            1 => Level::DEBUG,
            _ => Level::TRACE,
        }
    };

    // stdout carries command output only.
    tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::List {
            scope,
            ignore,
            include_dependencies,
            include_dependents,
            no_private,
            since,
            where_expr,
            json,
        } => {
            let mut options = ResolveOptions::new()
                .with_include(scope)
                .with_exclude(ignore)
                .with_dependencies(include_dependencies)
                .with_dependents(include_dependents)
                .with_exclude_private(no_private);
            if let Some(expression) = where_expr {
                options = options.with_where(&expression)?;
            }
            if let Some(reference) = since {
                options = options.with_since(reference);
            }
            commands::cmd_list(cli.root, options, json)?
        }
        Commands::Graph { json } => commands::cmd_graph(cli.root, json)?,
        Commands::Changed { since, json } => commands::cmd_changed(cli.root, since, json)?,
    }

    Ok(())
}
