//! Core library for resolving monorepo workspace packages in dependency order.

pub mod change;
pub mod config;
pub mod error;
pub mod filter;
pub mod graph;
pub mod manifest;
pub mod package;
pub mod predicate;
pub mod resolve;
pub mod scanner;
pub mod vcs;

pub use change::{ChangeDetector, ChangeOrigin, ChangeSet, PackageOwners};
pub use config::WorkspaceConfig;
pub use error::{Error, Result};
pub use filter::{filter, ResolveOptions};
pub use graph::DependencyGraph;
pub use manifest::{Manifest, ManifestReader, PackageJsonReader};
pub use package::Package;
pub use predicate::Predicate;
pub use resolve::{resolve, Resolver, Workspace};
pub use scanner::{ScanReport, Scanner, SkippedManifest};
pub use vcs::{GitVcs, Vcs};
