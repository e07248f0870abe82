//! Error types and result aliases.

use std::path::PathBuf;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML parse error in {context}: {error}")]
    Toml {
        error: toml::de::Error,
        context: String,
    },

    #[error("Workspace discovery failed at {root}: {message}")]
    WorkspaceDiscovery { root: PathBuf, message: String },

    #[error("Malformed manifest {path}: {message}")]
    Manifest { path: PathBuf, message: String },

    #[error("Duplicate package name '{name}' declared in {first} and {second}")]
    DuplicatePackage {
        name: String,
        first: PathBuf,
        second: PathBuf,
    },

    #[error("Circular dependency detected involving '{package}': {cycle}")]
    CyclicDependency { package: String, cycle: String },

    #[error("Package not found: {name}. Available packages: {available}")]
    PackageNotFound { name: String, available: String },

    #[error("Invalid package pattern '{pattern}': {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("Invalid reference '{reference}': {message}")]
    InvalidReference { reference: String, message: String },

    #[error("Version control unavailable: {0}")]
    VcsUnavailable(String),

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Cannot evaluate predicate `{expression}`: {message}")]
    PredicateEvaluation { expression: String, message: String },
}

impl From<toml::de::Error> for Error {
    fn from(error: toml::de::Error) -> Self {
        Error::Toml {
            error,
            context: "toposcope.toml".to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
