//! Resolution entry point tying scanning, sorting, change detection and
//! filtering together.

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::change::ChangeDetector;
use crate::error::{Error, Result};
use crate::filter::{filter, is_glob, ResolveOptions};
use crate::graph::DependencyGraph;
use crate::manifest::ManifestReader;
use crate::package::Package;
use crate::scanner::{ScanReport, Scanner, SkippedManifest};
use crate::vcs::{GitVcs, Vcs};

/// A scanned and sorted workspace.
#[derive(Debug)]
pub struct Workspace {
    /// Canonical workspace root.
    pub root: PathBuf,
    pub graph: DependencyGraph,
    /// Directories whose manifest was malformed.
    pub skipped: Vec<SkippedManifest>,
}

/// Resolves workspace packages with injectable collaborators.
pub struct Resolver {
    scanner: Scanner,
    vcs: Box<dyn Vcs>,
}

impl Resolver {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            scanner: Scanner::new(root),
            vcs: Box::new(GitVcs),
        }
    }

    pub fn with_reader(mut self, reader: impl ManifestReader + 'static) -> Self {
        self.scanner = self.scanner.with_reader(reader);
        self
    }

    pub fn with_vcs(mut self, vcs: impl Vcs + 'static) -> Self {
        self.vcs = Box::new(vcs);
        self
    }

    pub fn vcs(&self) -> &dyn Vcs {
        self.vcs.as_ref()
    }

    /// Scans the workspace and builds its dependency graph.
    ///
    /// # Errors
    ///
    /// Returns workspace discovery, duplicate package and cycle errors.
    pub fn load(&self) -> Result<Workspace> {
        let ScanReport {
            root,
            packages,
            skipped,
        } = self.scanner.scan()?;
        debug!(
            "Found {} packages under {} ({} skipped)",
            packages.len(),
            root.display(),
            skipped.len()
        );

        let graph = DependencyGraph::new(packages)?;
        Ok(Workspace {
            root,
            graph,
            skipped,
        })
    }

    /// Resolves the packages selected by `options` in dependency order.
    ///
    /// The repository is only queried when `options.since` is set.
    ///
    /// # Errors
    ///
    /// Structural errors (workspace discovery, duplicate names, cycles)
    /// always abort. VCS errors surface only with `since`, predicate errors
    /// only with a predicate. A plain name in `include` that matches no
    /// package fails with the manifest error of a skipped directory of the
    /// same name, or `Error::PackageNotFound`.
    pub fn resolve(&self, options: &ResolveOptions) -> Result<Vec<Package>> {
        let Workspace {
            root,
            graph,
            skipped,
        } = self.load()?;
        check_requested(&options.include, &graph, skipped)?;

        let changed: Option<HashSet<String>> = match &options.since {
            Some(since) => Some(ChangeDetector::new(self.vcs()).find_changed_packages(
                &root,
                since,
                graph.all_packages(),
            )?),
            None => None,
        };

        let ordered = graph.ordered_packages();
        let selected = filter(&ordered, &graph, options, changed.as_ref())?;
        debug!("Resolved {} of {} packages", selected.len(), graph.len());

        Ok(selected.into_iter().cloned().collect())
    }
}

/// Resolves the workspace at `root` with the default `package.json` reader
/// and git.
pub fn resolve(root: impl AsRef<Path>, options: &ResolveOptions) -> Result<Vec<Package>> {
    Resolver::new(root).resolve(options)
}

/// Escalates a skipped manifest when the caller explicitly asked for the
/// package it would have defined.
///
/// A skipped manifest matches by its recovered `name`, or by directory name
/// when no name could be recovered.
fn check_requested(
    include: &[String],
    graph: &DependencyGraph,
    mut skipped: Vec<SkippedManifest>,
) -> Result<()> {
    for name in include.iter().filter(|name| !is_glob(name)) {
        if graph.contains(name) {
            continue;
        }

        let dir_name = name.rsplit('/').next().unwrap_or(name);
        let position = skipped
            .iter()
            .position(|s| s.name.as_deref() == Some(name.as_str()))
            .or_else(|| {
                skipped.iter().position(|s| {
                    s.name.is_none() && s.path.file_name().is_some_and(|f| f == dir_name)
                })
            });
        if let Some(position) = position {
            return Err(skipped.swap_remove(position).error);
        }

        let mut available: Vec<&str> = graph
            .topological_order()
            .iter()
            .map(String::as_str)
            .collect();
        available.sort_unstable();
        return Err(Error::PackageNotFound {
            name: name.clone(),
            available: available.join(", "),
        });
    }
    Ok(())
}
