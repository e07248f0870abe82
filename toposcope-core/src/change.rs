//! Change detection for restricting resolution to touched packages.

use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::debug;

use crate::error::Result;
use crate::package::Package;
use crate::vcs::{GitVcs, Vcs};

/// Where a changed file was observed. Diagnostic only: a file counts as
/// changed whatever its origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeOrigin {
    Committed,
    Staged,
    Unstaged,
    Untracked,
}

impl ChangeOrigin {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeOrigin::Committed => "committed",
            ChangeOrigin::Staged => "staged",
            ChangeOrigin::Unstaged => "unstaged",
            ChangeOrigin::Untracked => "untracked",
        }
    }
}

impl fmt::Display for ChangeOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Union of changed files, keyed by absolute path.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ChangeSet {
    files: BTreeMap<PathBuf, BTreeSet<ChangeOrigin>>,
}

impl ChangeSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, path: impl Into<PathBuf>, origin: ChangeOrigin) {
        self.files.entry(path.into()).or_default().insert(origin);
    }

    pub fn extend<I>(&mut self, paths: I, origin: ChangeOrigin)
    where
        I: IntoIterator<Item = PathBuf>,
    {
        for path in paths {
            self.insert(path, origin);
        }
    }

    pub fn contains(&self, path: &Path) -> bool {
        self.files.contains_key(path)
    }

    pub fn origins(&self, path: &Path) -> Option<&BTreeSet<ChangeOrigin>> {
        self.files.get(path)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Path, &BTreeSet<ChangeOrigin>)> {
        self.files.iter().map(|(path, origins)| (path.as_path(), origins))
    }

    pub fn paths(&self) -> impl Iterator<Item = &Path> {
        self.files.keys().map(PathBuf::as_path)
    }
}

/// Detects packages touched since a reference point.
pub struct ChangeDetector<'a> {
    vcs: &'a dyn Vcs,
}

impl Default for ChangeDetector<'static> {
    fn default() -> Self {
        static GIT: GitVcs = GitVcs;
        Self { vcs: &GIT }
    }
}

impl<'a> ChangeDetector<'a> {
    pub fn new(vcs: &'a dyn Vcs) -> Self {
        Self { vcs }
    }

    /// Collects committed, staged, unstaged and untracked changes relative
    /// to `since` into one set of absolute paths.
    ///
    /// The four queries are independent and run concurrently.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidReference` if `since` does not resolve, or
    /// `Error::VcsUnavailable` if `repo_path` is not inside a repository.
    pub fn changed_files(&self, repo_path: &Path, since: &str) -> Result<ChangeSet> {
        let workdir = self.vcs.workdir(repo_path)?;
        let vcs = self.vcs;

        let ((committed, staged), (unstaged, untracked)) = rayon::join(
            || {
                rayon::join(
                    || vcs.diff_tree_to_tree(repo_path, since, "HEAD"),
                    || vcs.diff_tree_to_index(repo_path, "HEAD"),
                )
            },
            || {
                rayon::join(
                    || vcs.diff_index_to_workdir(repo_path),
                    || vcs.list_untracked_files(repo_path),
                )
            },
        );

        let mut changes = ChangeSet::new();
        let absolute = |paths: Vec<PathBuf>| -> Vec<PathBuf> {
            paths.into_iter().map(|p| workdir.join(p)).collect()
        };
        changes.extend(absolute(committed?), ChangeOrigin::Committed);
        changes.extend(absolute(staged?), ChangeOrigin::Staged);
        changes.extend(absolute(unstaged?), ChangeOrigin::Unstaged);
        changes.extend(absolute(untracked?), ChangeOrigin::Untracked);

        debug!("{} files changed since {}", changes.len(), since);
        Ok(changes)
    }

    /// Returns the names of packages owning at least one file changed since
    /// `since`.
    pub fn find_changed_packages<'p, I>(
        &self,
        repo_path: &Path,
        since: &str,
        packages: I,
    ) -> Result<HashSet<String>>
    where
        I: IntoIterator<Item = &'p Package>,
    {
        let changes = self.changed_files(repo_path, since)?;
        Ok(Self::packages_for_changes(&changes, packages))
    }

    /// Maps changed files to the packages owning them.
    pub fn packages_for_changes<'p, I>(changes: &ChangeSet, packages: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'p Package>,
    {
        let owners = PackageOwners::new(packages);
        changes
            .paths()
            .filter_map(|path| owners.owner_of(path))
            .map(|package| package.name.clone())
            .collect()
    }

    /// Returns the package whose directory is the nearest ancestor of
    /// `file_path`, if any.
    ///
    /// For many lookups against the same packages, build a
    /// [`PackageOwners`] once instead.
    pub fn owning_package<'p, I>(file_path: &Path, packages: I) -> Option<&'p Package>
    where
        I: IntoIterator<Item = &'p Package>,
    {
        PackageOwners::new(packages).owner_of(file_path)
    }
}

/// Packages ordered deepest directory first, so the first ancestor found is
/// the nearest enclosing package.
#[derive(Debug, Clone)]
pub struct PackageOwners<'p> {
    owners: Vec<&'p Package>,
}

impl<'p> PackageOwners<'p> {
    pub fn new<I>(packages: I) -> Self
    where
        I: IntoIterator<Item = &'p Package>,
    {
        let mut owners: Vec<&'p Package> = packages.into_iter().collect();
        owners.sort_by_key(|p| std::cmp::Reverse(p.path.components().count()));
        Self { owners }
    }

    /// The package owning `file_path`, if any.
    pub fn owner_of(&self, file_path: &Path) -> Option<&'p Package> {
        self.owners
            .iter()
            .find(|package| file_path.starts_with(&package.path))
            .copied()
    }
}
