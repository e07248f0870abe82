#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use git2::{IndexAddOption, Repository, Signature};
use serde_json::json;
use toposcope_core::package::Package;

/// Writes a root `package.json` declaring `packages/*` as workspaces.
pub fn create_workspace(root: &Path) {
    fs::write(
        root.join("package.json"),
        json!({
            "name": "root",
            "private": true,
            "workspaces": ["packages/*"]
        })
        .to_string(),
    )
    .unwrap();
    fs::create_dir_all(root.join("packages")).unwrap();
}

/// Writes `packages/<name>/package.json` and an `index.js`.
pub fn create_test_package(root: &Path, name: &str, deps: &[&str], private: bool) -> PathBuf {
    let pkg_dir = root.join("packages").join(name);
    fs::create_dir_all(&pkg_dir).unwrap();

    let dependencies: serde_json::Map<String, serde_json::Value> = deps
        .iter()
        .map(|d| (d.to_string(), json!("^1.0.0")))
        .collect();
    let manifest = json!({
        "name": name,
        "version": "1.0.0",
        "private": private,
        "dependencies": dependencies,
    });

    fs::write(pkg_dir.join("package.json"), manifest.to_string()).unwrap();
    fs::write(pkg_dir.join("index.js"), format!("module.exports = '{}';\n", name)).unwrap();
    pkg_dir
}

/// `pkg3` (no deps) <- `pkg2` <- `pkg1`.
pub fn create_chain_workspace(root: &Path, pkg2_private: bool) {
    create_workspace(root);
    create_test_package(root, "pkg1", &["pkg2"], false);
    create_test_package(root, "pkg2", &["pkg3"], pkg2_private);
    create_test_package(root, "pkg3", &[], false);
}

pub fn chain_packages() -> Vec<Package> {
    vec![
        Package::new("pkg1", "1.0.0", "/repo/packages/pkg1").with_dependency("pkg2", "^1.0.0"),
        Package::new("pkg2", "1.0.0", "/repo/packages/pkg2").with_dependency("pkg3", "^1.0.0"),
        Package::new("pkg3", "1.0.0", "/repo/packages/pkg3"),
    ]
}

pub fn names(packages: &[Package]) -> Vec<&str> {
    packages.iter().map(|p| p.name.as_str()).collect()
}

pub fn init_repo(root: &Path) -> Repository {
    Repository::init(root).unwrap()
}

/// Stages one repository-relative path.
pub fn stage(repo: &Repository, path: &str) {
    let mut index = repo.index().unwrap();
    index.add_path(Path::new(path)).unwrap();
    index.write().unwrap();
}

/// Stages everything and commits it on top of `HEAD`.
pub fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();

    let tree_id = index.write_tree().unwrap();
    let tree = repo.find_tree(tree_id).unwrap();
    let signature = Signature::now("Toposcope Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();

    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}
