//! Resolution options and the order-preserving filter pipeline.

use std::collections::HashSet;

use glob::Pattern;
use tracing::debug;

use crate::error::{Error, Result};
use crate::graph::DependencyGraph;
use crate::package::Package;
use crate::predicate::Predicate;

/// Caller-supplied selection options. Everything is optional; the default
/// selects every package.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Names or glob patterns to restrict to. Empty means all packages.
    pub include: Vec<String>,
    /// Names or glob patterns removed after all expansion.
    pub exclude: Vec<String>,
    /// Add everything the selected packages transitively depend on.
    pub include_dependencies: bool,
    /// Add everything that transitively depends on a selected package.
    pub include_dependents: bool,
    /// Drop packages marked `"private": true`.
    pub exclude_private: bool,
    /// Keep only packages the predicate accepts.
    pub predicate: Option<Predicate>,
    /// Keep only packages changed since this reference.
    pub since: Option<String>,
}

impl ResolveOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_include<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.include.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_exclude<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclude.extend(names.into_iter().map(Into::into));
        self
    }

    pub fn with_dependencies(mut self, enabled: bool) -> Self {
        self.include_dependencies = enabled;
        self
    }

    pub fn with_dependents(mut self, enabled: bool) -> Self {
        self.include_dependents = enabled;
        self
    }

    pub fn with_exclude_private(mut self, enabled: bool) -> Self {
        self.exclude_private = enabled;
        self
    }

    pub fn with_predicate(mut self, predicate: Predicate) -> Self {
        self.predicate = Some(predicate);
        self
    }

    /// Parses `expression` as the `where` predicate.
    ///
    /// # Errors
    ///
    /// Returns `Error::PredicateEvaluation` if the expression is invalid.
    pub fn with_where(self, expression: &str) -> Result<Self> {
        Ok(self.with_predicate(Predicate::parse(expression)?))
    }

    pub fn with_since(mut self, reference: impl Into<String>) -> Self {
        self.since = Some(reference.into());
        self
    }
}

/// Matches package names against exact names or glob patterns.
#[derive(Debug)]
pub(crate) struct NameMatcher {
    exact: HashSet<String>,
    patterns: Vec<Pattern>,
}

impl NameMatcher {
    pub(crate) fn new(entries: &[String]) -> Result<Self> {
        let mut exact = HashSet::new();
        let mut patterns = Vec::new();

        for entry in entries {
            if is_glob(entry) {
                let pattern = Pattern::new(entry).map_err(|e| Error::InvalidPattern {
                    pattern: entry.clone(),
                    message: e.to_string(),
                })?;
                patterns.push(pattern);
            } else {
                exact.insert(entry.clone());
            }
        }

        Ok(Self { exact, patterns })
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        self.exact.contains(name) || self.patterns.iter().any(|p| p.matches(name))
    }
}

pub(crate) fn is_glob(entry: &str) -> bool {
    entry.contains(['*', '?', '['])
}

/// Applies `options` to packages in canonical topological order.
///
/// Stages run in a fixed order: `changed` (the `since` set, when given),
/// include, predicate, dependency expansion, dependent expansion, exclude,
/// private exclusion. Every stage only narrows or expands a set of names;
/// the result is read back through `ordered`, so it is always a
/// subsequence of it and remains topologically valid.
///
/// `ordered` is expected to be the graph's full topological order.
///
/// # Errors
///
/// Returns `Error::PredicateEvaluation` if the predicate fails on a package
/// and `Error::InvalidPattern` for malformed include or exclude globs.
pub fn filter<'p>(
    ordered: &[&'p Package],
    graph: &DependencyGraph,
    options: &ResolveOptions,
    changed: Option<&HashSet<String>>,
) -> Result<Vec<&'p Package>> {
    let mut selected: HashSet<String> = ordered.iter().map(|p| p.name.clone()).collect();

    if let Some(changed) = changed {
        selected.retain(|name| changed.contains(name));
        debug!("{} packages changed", selected.len());
    }

    if !options.include.is_empty() {
        let matcher = NameMatcher::new(&options.include)?;
        selected.retain(|name| matcher.matches(name));
        debug!("{} packages after include", selected.len());
    }

    if let Some(predicate) = &options.predicate {
        let mut kept = HashSet::with_capacity(selected.len());
        for package in ordered.iter().filter(|p| selected.contains(&p.name)) {
            if predicate.evaluate(package)? {
                kept.insert(package.name.clone());
            }
        }
        selected = kept;
        debug!("{} packages after where", selected.len());
    }

    if options.include_dependencies {
        selected = graph.with_dependencies(selected.iter().map(String::as_str));
        debug!("{} packages after adding dependencies", selected.len());
    }

    if options.include_dependents {
        selected = graph.with_dependents(selected.iter().map(String::as_str));
        debug!("{} packages after adding dependents", selected.len());
    }

    if !options.exclude.is_empty() {
        let matcher = NameMatcher::new(&options.exclude)?;
        selected.retain(|name| !matcher.matches(name));
    }

    if options.exclude_private {
        selected.retain(|name| graph.get_package(name).map_or(true, |p| !p.private));
    }

    Ok(ordered
        .iter()
        .filter(|p| selected.contains(&p.name))
        .copied()
        .collect())
}
