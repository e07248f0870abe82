//! Version-control queries used for change detection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use git2::{Diff, Repository, Status, StatusOptions, Tree};

use crate::error::{Error, Result};

/// Read-only repository queries.
///
/// Returned paths are relative to the repository work directory. Every
/// method may be called concurrently from several threads.
pub trait Vcs: Send + Sync {
    /// Absolute work directory of the repository containing `repo_path`.
    fn workdir(&self, repo_path: &Path) -> Result<PathBuf>;

    /// Files differing between the trees of `from` and `to`.
    fn diff_tree_to_tree(&self, repo_path: &Path, from: &str, to: &str) -> Result<Vec<PathBuf>>;

    /// Files differing between the tree of `reference` and the index.
    fn diff_tree_to_index(&self, repo_path: &Path, reference: &str) -> Result<Vec<PathBuf>>;

    /// Tracked files modified in the working tree but not staged.
    fn diff_index_to_workdir(&self, repo_path: &Path) -> Result<Vec<PathBuf>>;

    /// Files present in the working tree that are neither tracked nor ignored.
    fn list_untracked_files(&self, repo_path: &Path) -> Result<Vec<PathBuf>>;
}

/// [`Vcs`] backed by libgit2.
///
/// `git2::Repository` is not `Sync`, so each query opens its own handle.
#[derive(Debug, Clone, Copy, Default)]
pub struct GitVcs;

impl GitVcs {
    fn open(repo_path: &Path) -> Result<Repository> {
        Repository::discover(repo_path).map_err(|e| {
            Error::VcsUnavailable(format!(
                "No git repository at {}: {}",
                repo_path.display(),
                e.message()
            ))
        })
    }

    fn resolve_tree<'r>(repo: &'r Repository, reference: &str) -> Result<Tree<'r>> {
        repo.revparse_single(reference)
            .and_then(|object| object.peel_to_tree())
            .map_err(|e| Error::InvalidReference {
                reference: reference.to_string(),
                message: e.message().to_string(),
            })
    }

    fn collect_paths(diff: &Diff<'_>) -> Vec<PathBuf> {
        let mut files = BTreeSet::new();
        for delta in diff.deltas() {
            if let Some(path) = delta.new_file().path() {
                files.insert(path.to_path_buf());
            }
            if let Some(path) = delta.old_file().path() {
                files.insert(path.to_path_buf());
            }
        }
        files.into_iter().collect()
    }

    fn head_is_unborn(repo: &Repository, reference: &str) -> bool {
        reference == "HEAD" && repo.head().is_err() && repo.is_empty().unwrap_or(false)
    }
}

impl Vcs for GitVcs {
    fn workdir(&self, repo_path: &Path) -> Result<PathBuf> {
        let repo = Self::open(repo_path)?;
        let workdir = repo.workdir().ok_or_else(|| {
            Error::VcsUnavailable(format!(
                "Repository at {} is bare and has no working tree",
                repo.path().display()
            ))
        })?;
        Ok(workdir.canonicalize()?)
    }

    fn diff_tree_to_tree(&self, repo_path: &Path, from: &str, to: &str) -> Result<Vec<PathBuf>> {
        let repo = Self::open(repo_path)?;
        let old_tree = Self::resolve_tree(&repo, from)?;
        let new_tree = Self::resolve_tree(&repo, to)?;
        let diff = repo.diff_tree_to_tree(Some(&old_tree), Some(&new_tree), None)?;
        Ok(Self::collect_paths(&diff))
    }

    fn diff_tree_to_index(&self, repo_path: &Path, reference: &str) -> Result<Vec<PathBuf>> {
        let repo = Self::open(repo_path)?;
        // Before the first commit every staged file is new.
        let tree = if Self::head_is_unborn(&repo, reference) {
            None
        } else {
            Some(Self::resolve_tree(&repo, reference)?)
        };
        let diff = repo.diff_tree_to_index(tree.as_ref(), None, None)?;
        Ok(Self::collect_paths(&diff))
    }

    fn diff_index_to_workdir(&self, repo_path: &Path) -> Result<Vec<PathBuf>> {
        let repo = Self::open(repo_path)?;
        let diff = repo.diff_index_to_workdir(None, None)?;
        Ok(Self::collect_paths(&diff))
    }

    fn list_untracked_files(&self, repo_path: &Path) -> Result<Vec<PathBuf>> {
        let repo = Self::open(repo_path)?;
        let mut opts = StatusOptions::new();
        opts.include_untracked(true)
            .recurse_untracked_dirs(true)
            .include_ignored(false);

        let statuses = repo.statuses(Some(&mut opts))?;
        let files = statuses
            .iter()
            .filter(|entry| entry.status().contains(Status::WT_NEW))
            .filter_map(|entry| entry.path().map(PathBuf::from))
            .collect();

        Ok(files)
    }
}
