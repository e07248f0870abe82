//! Workspace scanner for discovering packages.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use glob::Pattern;
use rayon::prelude::*;
use tracing::{debug, warn};

use crate::config::WorkspaceConfig;
use crate::error::{Error, Result};
use crate::manifest::{ManifestReader, PackageJsonReader, MANIFEST_FILE};
use crate::package::Package;

/// A workspace directory whose manifest exists but could not be read.
#[derive(Debug)]
pub struct SkippedManifest {
    pub path: PathBuf,
    /// Package name recovered from the unparsable manifest, if any.
    pub name: Option<String>,
    pub error: Error,
}

/// Outcome of a workspace scan.
#[derive(Debug)]
pub struct ScanReport {
    /// Canonical workspace root.
    pub root: PathBuf,
    /// Packages sorted by name.
    pub packages: Vec<Package>,
    /// Directories skipped because their manifest was malformed.
    pub skipped: Vec<SkippedManifest>,
}

/// Scans a workspace root for packages.
///
/// Workspace globs come from `toposcope.toml` when present, otherwise from
/// the `workspaces` field of the root `package.json`.
pub struct Scanner {
    root: PathBuf,
    reader: Arc<dyn ManifestReader>,
}

struct WorkspacePatterns {
    include: Vec<String>,
    ignore: Vec<String>,
}

impl Scanner {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            reader: Arc::new(PackageJsonReader),
        }
    }

    pub fn with_reader(mut self, reader: impl ManifestReader + 'static) -> Self {
        self.reader = Arc::new(reader);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn canonical_root(&self) -> Result<PathBuf> {
        self.root
            .canonicalize()
            .map_err(|e| Error::WorkspaceDiscovery {
                root: self.root.clone(),
                message: format!("Cannot access workspace root: {}", e),
            })
    }

    fn workspace_patterns(&self, root: &Path) -> Result<WorkspacePatterns> {
        let (declared, mut ignore) = match WorkspaceConfig::load(root)? {
            Some(config) if !config.packages.is_empty() => {
                debug!(
                    "Using workspace patterns from {}",
                    config
                        .config_path
                        .as_deref()
                        .unwrap_or(root)
                        .display()
                );
                (config.packages, config.ignore)
            }
            _ => {
                let manifest = self
                    .reader
                    .read_manifest(root)
                    .map_err(|e| Error::WorkspaceDiscovery {
                        root: root.to_path_buf(),
                        message: e.to_string(),
                    })?
                    .ok_or_else(|| Error::WorkspaceDiscovery {
                        root: root.to_path_buf(),
                        message: format!("No {} found at workspace root", MANIFEST_FILE),
                    })?;
                let patterns = manifest
                    .workspaces
                    .map(|w| w.patterns().to_vec())
                    .unwrap_or_default();
                (patterns, Vec::new())
            }
        };

        let mut include = Vec::new();
        for pattern in declared {
            match pattern.strip_prefix('!') {
                Some(negated) => ignore.push(negated.to_string()),
                None => include.push(pattern),
            }
        }

        if include.is_empty() {
            return Err(Error::WorkspaceDiscovery {
                root: root.to_path_buf(),
                message: "No workspace patterns declared".to_string(),
            });
        }

        Ok(WorkspacePatterns { include, ignore })
    }

    /// Lists the directories matched by the workspace globs, sorted and
    /// deduplicated.
    ///
    /// # Errors
    ///
    /// Returns `Error::WorkspaceDiscovery` if the root manifest cannot be
    /// read, declares no patterns, or a pattern is invalid.
    pub fn package_paths(&self) -> Result<Vec<PathBuf>> {
        let root = self.canonical_root()?;
        self.package_paths_in(&root)
    }

    fn package_paths_in(&self, root: &Path) -> Result<Vec<PathBuf>> {
        let patterns = self.workspace_patterns(root)?;
        let invalid = |pattern: &str, e: glob::PatternError| Error::WorkspaceDiscovery {
            root: root.to_path_buf(),
            message: format!("Invalid workspace pattern '{}': {}", pattern, e),
        };

        let ignore: Vec<Pattern> = patterns
            .ignore
            .iter()
            .map(|p| Pattern::new(normalize_pattern(p)).map_err(|e| invalid(p, e)))
            .collect::<Result<_>>()?;

        let escaped_root = Pattern::escape(&root.to_string_lossy());
        let mut dirs = BTreeSet::new();

        for pattern in &patterns.include {
            let full = format!("{}/{}", escaped_root, normalize_pattern(pattern));
            let entries = glob::glob(&full).map_err(|e| invalid(pattern, e))?;

            for entry in entries.filter_map(|e| e.ok()) {
                if !entry.is_dir() {
                    continue;
                }
                let relative = entry.strip_prefix(root).unwrap_or(&entry);
                if ignore.iter().any(|p| p.matches_path(relative)) {
                    debug!("Ignoring workspace directory {}", relative.display());
                    continue;
                }
                dirs.insert(entry);
            }
        }

        Ok(dirs.into_iter().collect())
    }

    /// Reads every workspace directory's manifest.
    ///
    /// Directories without a manifest, or whose manifest has no `name`, are
    /// not packages and are skipped silently. Malformed manifests are
    /// recorded in [`ScanReport::skipped`].
    pub fn scan(&self) -> Result<ScanReport> {
        let root = self.canonical_root()?;
        let dirs = self.package_paths_in(&root)?;
        debug!("Scanning {} workspace directories", dirs.len());

        let results: Vec<(PathBuf, Result<Option<Package>>)> = dirs
            .into_par_iter()
            .map(|dir| {
                let package = self
                    .reader
                    .read_manifest(&dir)
                    .map(|manifest| manifest.and_then(|m| m.into_package(&dir)));
                (dir, package)
            })
            .collect();

        let mut packages = Vec::new();
        let mut skipped = Vec::new();
        for (dir, result) in results {
            match result {
                Ok(Some(package)) => packages.push(package),
                Ok(None) => debug!("{} is not a package", dir.display()),
                Err(error) => {
                    warn!("Skipping {}: {}", dir.display(), error);
                    let name = self.reader.recover_name(&dir);
                    skipped.push(SkippedManifest {
                        path: dir,
                        name,
                        error,
                    });
                }
            }
        }

        packages.sort_by(|a, b| a.name.cmp(&b.name).then_with(|| a.path.cmp(&b.path)));
        Ok(ScanReport {
            root,
            packages,
            skipped,
        })
    }
}

fn normalize_pattern(pattern: &str) -> &str {
    let trimmed = pattern.trim_start_matches("./").trim_end_matches('/');
    if trimmed.is_empty() {
        "."
    } else {
        trimmed
    }
}
