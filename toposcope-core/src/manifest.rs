//! `package.json` parsing and the manifest reader seam.

use std::collections::BTreeMap;
use std::fs;
use std::io::ErrorKind;
use std::path::Path;

use regex::Regex;
use serde::Deserialize;

use crate::error::{Error, Result};
use crate::package::Package;

pub const MANIFEST_FILE: &str = "package.json";

/// Version given to packages whose manifest omits one.
pub const DEFAULT_VERSION: &str = "0.0.0";

/// Workspace globs as declared in a root manifest.
///
/// npm uses a plain array; yarn also accepts `{ "packages": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum Workspaces {
    Patterns(Vec<String>),
    Object {
        #[serde(default)]
        packages: Vec<String>,
    },
}

impl Workspaces {
    pub fn patterns(&self) -> &[String] {
        match self {
            Workspaces::Patterns(patterns) => patterns,
            Workspaces::Object { packages } => packages,
        }
    }
}

/// The subset of `package.json` the resolver cares about.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Manifest {
    pub name: Option<String>,
    pub version: Option<String>,
    #[serde(default)]
    pub dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub dev_dependencies: BTreeMap<String, String>,
    #[serde(default)]
    pub private: bool,
    pub workspaces: Option<Workspaces>,
}

impl Manifest {
    /// Converts the manifest into a package rooted at `path`.
    ///
    /// Returns `None` when the manifest has no `name`, which means the
    /// directory is not a package.
    pub fn into_package(self, path: &Path) -> Option<Package> {
        let name = self.name.filter(|n| !n.trim().is_empty())?;
        Some(Package {
            name,
            version: self
                .version
                .unwrap_or_else(|| DEFAULT_VERSION.to_string()),
            path: path.to_path_buf(),
            dependencies: self.dependencies,
            dev_dependencies: self.dev_dependencies,
            private: self.private,
        })
    }
}

/// Reads a package manifest from a directory.
///
/// Implementations return `Ok(None)` when the directory holds no manifest at
/// all and `Error::Manifest` when one exists but cannot be parsed.
pub trait ManifestReader: Send + Sync {
    fn read_manifest(&self, dir: &Path) -> Result<Option<Manifest>>;

    /// Best-effort package name from a manifest that failed to parse.
    fn recover_name(&self, _dir: &Path) -> Option<String> {
        None
    }
}

/// Reads `package.json` files from disk.
#[derive(Debug, Clone, Copy, Default)]
pub struct PackageJsonReader;

impl ManifestReader for PackageJsonReader {
    fn read_manifest(&self, dir: &Path) -> Result<Option<Manifest>> {
        let manifest_path = dir.join(MANIFEST_FILE);
        let content = match fs::read_to_string(&manifest_path) {
            Ok(content) => content,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Error::Manifest {
                    path: manifest_path,
                    message: format!("Failed to read: {}", e),
                })
            }
        };

        let manifest: Manifest = serde_json::from_str(&content).map_err(|e| Error::Manifest {
            path: manifest_path.clone(),
            message: e.to_string(),
        })?;

        Ok(Some(manifest))
    }

    /// Scans the raw text for the first `"name": "..."` pair.
    fn recover_name(&self, dir: &Path) -> Option<String> {
        let content = fs::read_to_string(dir.join(MANIFEST_FILE)).ok()?;
        let name_re = Regex::new(r#""name"\s*:\s*"((?:[^"\\]|\\.)*)""#).ok()?;
        let name = name_re.captures(&content)?.get(1)?.as_str().trim();
        (!name.is_empty()).then(|| name.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_yarn_workspace_object() {
        let manifest: Manifest =
            serde_json::from_str(r#"{"workspaces": {"packages": ["libs/*"]}}"#).unwrap();
        let workspaces = manifest.workspaces.unwrap();
        assert_eq!(workspaces.patterns(), ["libs/*".to_string()]);
    }

    #[test]
    fn nameless_manifest_is_not_a_package() {
        let manifest: Manifest = serde_json::from_str(r#"{"version": "1.0.0"}"#).unwrap();
        assert!(manifest.into_package(Path::new("/repo/pkg")).is_none());
    }

    #[test]
    fn recovers_name_from_broken_manifest() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(
            dir.path().join(MANIFEST_FILE),
            "{\n  \"name\": \"@acme/web\",\n  \"version\": \n}",
        )
        .unwrap();

        assert!(PackageJsonReader.read_manifest(dir.path()).is_err());
        assert_eq!(
            PackageJsonReader.recover_name(dir.path()).as_deref(),
            Some("@acme/web")
        );
    }

    #[test]
    fn no_name_to_recover() {
        let dir = tempfile::TempDir::new().unwrap();
        fs::write(dir.path().join(MANIFEST_FILE), "{ broken").unwrap();

        assert_eq!(PackageJsonReader.recover_name(dir.path()), None);
    }

    #[test]
    fn missing_version_defaults() {
        let manifest: Manifest = serde_json::from_str(r#"{"name": "a"}"#).unwrap();
        let package = manifest.into_package(Path::new("/repo/a")).unwrap();
        assert_eq!(package.version, DEFAULT_VERSION);
        assert!(!package.private);
    }
}
