//! Dependency graph management using petgraph.

use std::collections::{HashMap, HashSet, VecDeque};

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;

use crate::error::{Error, Result};
use crate::package::Package;

/// Directed acyclic graph of workspace package dependencies.
///
/// An edge `a -> b` means `a` lists `b` in its runtime `dependencies`. Only
/// dependencies naming another workspace package become edges;
/// `devDependencies` never do.
#[derive(Debug, Clone)]
pub struct DependencyGraph {
    graph: DiGraph<String, ()>,
    node_map: HashMap<String, NodeIndex>,
    packages: HashMap<String, Package>,
    topological_order: Vec<String>,
    dependency_levels: Vec<Vec<String>>,
}

impl DependencyGraph {
    /// Creates a new dependency graph from a list of packages and sorts it.
    ///
    /// # Errors
    ///
    /// Returns `Error::DuplicatePackage` if two packages share a name and
    /// `Error::CyclicDependency` if the dependencies form a cycle.
    pub fn new(packages: Vec<Package>) -> Result<Self> {
        let mut graph = DiGraph::new();
        let mut node_map = HashMap::with_capacity(packages.len());
        let mut packages_map: HashMap<String, Package> = HashMap::with_capacity(packages.len());

        for package in packages {
            if let Some(existing) = packages_map.get(&package.name) {
                return Err(Error::DuplicatePackage {
                    name: package.name.clone(),
                    first: existing.path.clone(),
                    second: package.path,
                });
            }
            let node = graph.add_node(package.name.clone());
            node_map.insert(package.name.clone(), node);
            packages_map.insert(package.name.clone(), package);
        }

        for (name, package) in &packages_map {
            let from_node = node_map[name];
            for dep_name in package.dependencies.keys() {
                if let Some(&to_node) = node_map.get(dep_name) {
                    graph.update_edge(from_node, to_node, ());
                }
            }
        }

        let all_nodes: HashSet<NodeIndex> = node_map.values().copied().collect();
        let dependency_levels = Self::compute_levels(&graph, &all_nodes)?;
        let topological_order = dependency_levels.iter().flatten().cloned().collect();

        Ok(Self {
            graph,
            node_map,
            packages: packages_map,
            topological_order,
            dependency_levels,
        })
    }

    /// Round-based extraction of nodes whose dependencies are all placed.
    ///
    /// Edges leaving `subset` are ignored. Each round is ordered by name.
    fn compute_levels(
        graph: &DiGraph<String, ()>,
        subset: &HashSet<NodeIndex>,
    ) -> Result<Vec<Vec<String>>> {
        let mut pending: HashMap<NodeIndex, usize> = subset
            .iter()
            .map(|&node| {
                let unresolved = graph
                    .neighbors_directed(node, Direction::Outgoing)
                    .filter(|dep| subset.contains(dep))
                    .count();
                (node, unresolved)
            })
            .collect();

        let mut ready: Vec<NodeIndex> = pending
            .iter()
            .filter(|&(_, &count)| count == 0)
            .map(|(&node, _)| node)
            .collect();
        let mut levels = Vec::new();

        while !ready.is_empty() {
            ready.sort_by(|a, b| graph[*a].cmp(&graph[*b]));
            for node in &ready {
                pending.remove(node);
            }

            let mut next = Vec::new();
            for &node in &ready {
                for dependent in graph.neighbors_directed(node, Direction::Incoming) {
                    if let Some(count) = pending.get_mut(&dependent) {
                        *count -= 1;
                        if *count == 0 {
                            next.push(dependent);
                        }
                    }
                }
            }

            levels.push(ready.iter().map(|&node| graph[node].clone()).collect());
            ready = next;
        }

        // Any node left pending sits on, or behind, a cycle.
        let stuck = pending.keys().copied().min_by(|a, b| graph[*a].cmp(&graph[*b]));
        if let Some(start) = stuck {
            return Err(Self::cycle_error(graph, &pending, start));
        }

        Ok(levels)
    }

    /// Walks unresolved edges from `start` until a node repeats. Every stuck
    /// node has at least one stuck dependency.
    fn cycle_error(
        graph: &DiGraph<String, ()>,
        pending: &HashMap<NodeIndex, usize>,
        start: NodeIndex,
    ) -> Error {
        let by_name = |a: &NodeIndex, b: &NodeIndex| graph[*a].cmp(&graph[*b]);

        let mut current = start;
        let mut path: Vec<NodeIndex> = Vec::new();
        let mut position: HashMap<NodeIndex, usize> = HashMap::new();

        let cycle = loop {
            if let Some(&first) = position.get(&current) {
                break path[first..].to_vec();
            }
            position.insert(current, path.len());
            path.push(current);

            let next = graph
                .neighbors_directed(current, Direction::Outgoing)
                .filter(|dep| pending.contains_key(dep))
                .min_by(by_name);
            match next {
                Some(next) => current = next,
                None => break vec![current],
            }
        };

        // Rotate so the report starts at the smallest name.
        let offset = cycle
            .iter()
            .enumerate()
            .min_by(|(_, a), (_, b)| by_name(*a, *b))
            .map(|(i, _)| i)
            .unwrap_or(0);
        let mut names: Vec<&str> = cycle[offset..]
            .iter()
            .chain(&cycle[..offset])
            .map(|&node| graph[node].as_str())
            .collect();
        let package = names[0].to_string();
        names.push(names[0]);

        Error::CyclicDependency {
            package,
            cycle: names.join(" -> "),
        }
    }

    fn node(&self, name: &str) -> Result<NodeIndex> {
        self.node_map
            .get(name)
            .copied()
            .ok_or_else(|| Error::PackageNotFound {
                name: name.to_string(),
                available: self.available(),
            })
    }

    fn available(&self) -> String {
        let mut names: Vec<&str> = self.node_map.keys().map(String::as_str).collect();
        names.sort_unstable();
        names.join(", ")
    }

    /// Retrieves a package by name.
    #[inline]
    pub fn get_package(&self, name: &str) -> Option<&Package> {
        self.packages.get(name)
    }

    #[inline]
    pub fn contains(&self, name: &str) -> bool {
        self.node_map.contains_key(name)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.node_map.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.node_map.is_empty()
    }

    /// Returns package names in topological order (dependencies before
    /// dependents), computed once during construction.
    #[inline]
    pub fn topological_order(&self) -> &[String] {
        &self.topological_order
    }

    /// Returns the packages in topological order.
    pub fn ordered_packages(&self) -> Vec<&Package> {
        self.topological_order
            .iter()
            .filter_map(|name| self.packages.get(name))
            .collect()
    }

    /// Returns the extraction rounds of the sort.
    ///
    /// Packages within one level do not depend on each other.
    #[inline]
    pub fn dependency_levels(&self) -> &[Vec<String>] {
        &self.dependency_levels
    }

    /// Sorts a subset of packages by the subgraph they induce.
    ///
    /// The result depends only on the set of names, not on their order, so
    /// sorting an already sorted sequence returns it unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if a name is not in the graph.
    pub fn sort<'a, I>(&self, names: I) -> Result<Vec<String>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let subset = names
            .into_iter()
            .map(|name| self.node(name))
            .collect::<Result<HashSet<_>>>()?;
        let levels = Self::compute_levels(&self.graph, &subset)?;
        Ok(levels.into_iter().flatten().collect())
    }

    fn neighbors(&self, package_name: &str, direction: Direction) -> Result<Vec<String>> {
        let node = self.node(package_name)?;
        let mut names: Vec<String> = self
            .graph
            .neighbors_directed(node, direction)
            .map(|idx| self.graph[idx].clone())
            .collect();
        names.sort();
        Ok(names)
    }

    /// Returns direct workspace dependencies of a package, sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is not found in the graph.
    pub fn dependencies(&self, package_name: &str) -> Result<Vec<String>> {
        self.neighbors(package_name, Direction::Outgoing)
    }

    /// Returns direct dependents of a package (packages that depend on it),
    /// sorted by name.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is not found in the graph.
    pub fn dependents(&self, package_name: &str) -> Result<Vec<String>> {
        self.neighbors(package_name, Direction::Incoming)
    }

    /// Breadth-first reachability with an explicit visited set. The result
    /// contains the seeds themselves; unknown seed names are ignored.
    fn reachable<'a, I>(&self, seeds: I, direction: Direction) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut visited: HashSet<NodeIndex> = HashSet::new();
        let mut queue: VecDeque<NodeIndex> = seeds
            .into_iter()
            .filter_map(|name| self.node_map.get(name).copied())
            .collect();

        while let Some(node) = queue.pop_front() {
            if !visited.insert(node) {
                continue;
            }
            for next in self.graph.neighbors_directed(node, direction) {
                if !visited.contains(&next) {
                    queue.push_back(next);
                }
            }
        }

        visited
            .into_iter()
            .map(|idx| self.graph[idx].clone())
            .collect()
    }

    /// Returns the seeds plus every package they transitively depend on.
    pub fn with_dependencies<'a, I>(&self, seeds: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.reachable(seeds, Direction::Outgoing)
    }

    /// Returns the seeds plus every package that transitively depends on
    /// one of them.
    pub fn with_dependents<'a, I>(&self, seeds: I) -> HashSet<String>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.reachable(seeds, Direction::Incoming)
    }

    /// Returns all transitive dependents of a package, excluding itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is not found in the graph.
    pub fn all_dependents(&self, package_name: &str) -> Result<HashSet<String>> {
        self.node(package_name)?;
        let mut result = self.with_dependents([package_name]);
        result.remove(package_name);
        Ok(result)
    }

    /// Returns all transitive dependencies of a package, excluding itself.
    ///
    /// # Errors
    ///
    /// Returns an error if the package is not found in the graph.
    pub fn all_dependencies(&self, package_name: &str) -> Result<HashSet<String>> {
        self.node(package_name)?;
        let mut result = self.with_dependencies([package_name]);
        result.remove(package_name);
        Ok(result)
    }

    /// Returns every `(dependent, dependency)` edge, sorted.
    pub fn edges(&self) -> Vec<(String, String)> {
        let mut edges: Vec<(String, String)> = self
            .graph
            .edge_indices()
            .filter_map(|edge| self.graph.edge_endpoints(edge))
            .map(|(from, to)| (self.graph[from].clone(), self.graph[to].clone()))
            .collect();
        edges.sort();
        edges
    }

    /// Returns all packages in the graph, in no particular order.
    pub fn all_packages(&self) -> Vec<&Package> {
        self.packages.values().collect()
    }
}
