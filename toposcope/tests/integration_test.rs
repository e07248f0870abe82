use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use git2::{IndexAddOption, Repository, Signature};
use serde_json::{json, Value};
use tempfile::TempDir;

fn create_test_package(root: &Path, name: &str, deps: &[&str], private: bool) {
    let pkg_dir = root.join("packages").join(name);
    fs::create_dir_all(&pkg_dir).unwrap();

    let dependencies: serde_json::Map<String, Value> =
        deps.iter().map(|d| (d.to_string(), json!("^1.0.0"))).collect();
    let manifest = json!({
        "name": name,
        "version": "1.0.0",
        "private": private,
        "dependencies": dependencies,
    });
    fs::write(pkg_dir.join("package.json"), manifest.to_string()).unwrap();
    fs::write(pkg_dir.join("index.js"), "module.exports = {};\n").unwrap();
}

fn chain_workspace(pkg2_private: bool) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    fs::write(
        temp_dir.path().join("package.json"),
        json!({ "private": true, "workspaces": ["packages/*"] }).to_string(),
    )
    .unwrap();
    create_test_package(temp_dir.path(), "pkg1", &["pkg2"], false);
    create_test_package(temp_dir.path(), "pkg2", &["pkg3"], pkg2_private);
    create_test_package(temp_dir.path(), "pkg3", &[], false);
    temp_dir
}

fn commit_all(repo: &Repository, message: &str) {
    let mut index = repo.index().unwrap();
    index
        .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
        .unwrap();
    index.write().unwrap();

    let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
    let signature = Signature::now("Toposcope Test", "test@example.com").unwrap();
    let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
    let parents: Vec<&git2::Commit> = parent.iter().collect();
    repo.commit(Some("HEAD"), &signature, &signature, message, &tree, &parents)
        .unwrap();
}

fn toposcope(root: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_toposcope"))
        .arg("--root")
        .arg(root)
        .args(args)
        .output()
        .expect("failed to run toposcope")
}

fn json_names(output: &Output) -> Vec<String> {
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let packages: Value = serde_json::from_slice(&output.stdout).unwrap();
    packages
        .as_array()
        .unwrap()
        .iter()
        .map(|p| p["name"].as_str().unwrap().to_string())
        .collect()
}

#[test]
fn test_list_json() {
    let temp_dir = chain_workspace(false);

    let output = toposcope(temp_dir.path(), &["list", "--json"]);
    assert_eq!(json_names(&output), ["pkg3", "pkg2", "pkg1"]);
}

#[test]
fn test_list_with_dependencies() {
    let temp_dir = chain_workspace(false);

    let output = toposcope(
        temp_dir.path(),
        &["list", "--scope", "pkg2", "--include-dependencies", "--json"],
    );
    assert_eq!(json_names(&output), ["pkg3", "pkg2"]);
}

#[test]
fn test_list_dependents_ignore_and_private() {
    let temp_dir = chain_workspace(true);

    let output = toposcope(
        temp_dir.path(),
        &["list", "--scope", "pkg2", "--include-dependents", "--no-private", "--json"],
    );
    assert_eq!(json_names(&output), ["pkg1"]);

    let output = toposcope(
        temp_dir.path(),
        &["list", "--scope", "pkg2", "--include-dependents", "--ignore", "pkg1", "--json"],
    );
    assert_eq!(json_names(&output), ["pkg2"]);
}

#[test]
fn test_list_where() {
    let temp_dir = chain_workspace(true);

    let output = toposcope(temp_dir.path(), &["list", "--where", "private", "--json"]);
    assert_eq!(json_names(&output), ["pkg2"]);
}

#[test]
fn test_list_invalid_where_fails() {
    let temp_dir = chain_workspace(false);

    let output = toposcope(temp_dir.path(), &["list", "--where", "owner == \"me\""]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("unknown attribute"));
}

#[test]
fn test_list_table_output() {
    let temp_dir = chain_workspace(false);

    let output = toposcope(temp_dir.path(), &["list"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("pkg1"));
    assert!(stdout.contains("packages/pkg3"));
}

#[test]
fn test_list_since() {
    let temp_dir = chain_workspace(false);
    let repo = Repository::init(temp_dir.path()).unwrap();
    commit_all(&repo, "initial");

    let output = toposcope(temp_dir.path(), &["list", "--since", "--json"]);
    assert!(json_names(&output).is_empty());

    fs::write(temp_dir.path().join("packages/pkg1/new.js"), "// new").unwrap();
    let output = toposcope(temp_dir.path(), &["list", "--since", "HEAD", "--json"]);
    assert_eq!(json_names(&output), ["pkg1"]);
}

#[test]
fn test_list_since_bad_reference() {
    let temp_dir = chain_workspace(false);
    let repo = Repository::init(temp_dir.path()).unwrap();
    commit_all(&repo, "initial");

    let output = toposcope(temp_dir.path(), &["list", "--since", "nope"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Invalid reference 'nope'"));
}

#[test]
fn test_graph_json() {
    let temp_dir = chain_workspace(false);

    let output = toposcope(temp_dir.path(), &["graph", "--json"]);
    assert!(output.status.success());
    let graph: Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(graph["order"], json!(["pkg3", "pkg2", "pkg1"]));
    assert_eq!(graph["levels"], json!([["pkg3"], ["pkg2"], ["pkg1"]]));
    assert_eq!(
        graph["edges"],
        json!([
            { "from": "pkg1", "to": "pkg2" },
            { "from": "pkg2", "to": "pkg3" },
        ])
    );
}

#[test]
fn test_graph_reports_cycle() {
    let temp_dir = chain_workspace(false);
    create_test_package(temp_dir.path(), "pkg3", &["pkg1"], false);

    let output = toposcope(temp_dir.path(), &["graph"]);
    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("pkg1 -> pkg2 -> pkg3 -> pkg1"));
}

#[test]
fn test_changed_json() {
    let temp_dir = chain_workspace(false);
    let repo = Repository::init(temp_dir.path()).unwrap();
    commit_all(&repo, "initial");
    fs::write(temp_dir.path().join("packages/pkg2/extra.js"), "// extra").unwrap();
    fs::write(temp_dir.path().join("README.md"), "# readme").unwrap();

    let output = toposcope(temp_dir.path(), &["changed", "--json"]);
    assert!(output.status.success());
    let data: Value = serde_json::from_slice(&output.stdout).unwrap();

    assert_eq!(data["since"], "HEAD");
    assert_eq!(data["packages"], json!(["pkg2"]));
    let files = data["files"].as_array().unwrap();
    assert_eq!(files.len(), 2);
    let extra = files
        .iter()
        .find(|f| f["path"] == "packages/pkg2/extra.js")
        .unwrap();
    assert_eq!(extra["origins"], json!(["untracked"]));
    assert_eq!(extra["package"], "pkg2");
}

#[test]
fn test_missing_workspace_fails() {
    let temp_dir = TempDir::new().unwrap();

    let output = toposcope(temp_dir.path(), &["list"]);
    assert!(!output.status.success());
    assert!(String::from_utf8_lossy(&output.stderr).contains("Workspace discovery failed"));
}
