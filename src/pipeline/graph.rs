//! Dependency graph for build tasks.
//!
//! Tracks which tasks must finish before which other tasks may start,
//! enabling topological ordering and cycle detection.

use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::fmt;

/// A dependency graph over nodes of type `N`.
///
/// Ordered collections keep traversal order stable, so two runs over the
/// same graph visit ready nodes in the same order.
#[derive(Debug, Clone)]
pub struct DependencyGraph<N: Ord> {
    /// Adjacency list: node -> nodes it depends on.
    dependencies: BTreeMap<N, BTreeSet<N>>,

    /// Reverse adjacency list: node -> nodes that depend on it.
    dependents: BTreeMap<N, BTreeSet<N>>,

    /// All known nodes (including those with no dependencies).
    nodes: BTreeSet<N>,
}

impl<N: Ord> Default for DependencyGraph<N> {
    fn default() -> Self {
        Self {
            dependencies: BTreeMap::new(),
            dependents: BTreeMap::new(),
            nodes: BTreeSet::new(),
        }
    }
}

impl<N: Ord + Clone + fmt::Display> DependencyGraph<N> {
    /// Create a new empty dependency graph.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a node in the graph (even if it has no dependencies).
    pub fn register(&mut self, node: N) {
        self.nodes.insert(node);
    }

    /// Add a dependency: `from` depends on `to`.
    ///
    /// Both nodes are automatically registered in the graph.
    pub fn add_dependency(&mut self, from: N, to: N) {
        self.nodes.insert(from.clone());
        self.nodes.insert(to.clone());

        self.dependencies
            .entry(from.clone())
            .or_default()
            .insert(to.clone());

        self.dependents.entry(to).or_default().insert(from);
    }

    /// Get all nodes that `node` depends on (direct dependencies).
    pub fn dependencies_of(&self, node: &N) -> impl Iterator<Item = &N> {
        self.dependencies
            .get(node)
            .map(|s| s.iter())
            .into_iter()
            .flatten()
    }

    /// Get all nodes that depend on `node` (direct dependents).
    pub fn dependents_of(&self, node: &N) -> impl Iterator<Item = &N> {
        self.dependents
            .get(node)
            .map(|s| s.iter())
            .into_iter()
            .flatten()
    }

    /// Get the number of dependencies for a node.
    pub fn dependency_count(&self, node: &N) -> usize {
        self.dependencies.get(node).map_or(0, |s| s.len())
    }

    /// Whether `node` is part of the graph.
    pub fn contains(&self, node: &N) -> bool {
        self.nodes.contains(node)
    }

    /// Get all registered nodes.
    pub fn nodes(&self) -> impl Iterator<Item = &N> {
        self.nodes.iter()
    }

    /// Get the total number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Check if the graph is empty.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Perform topological sort using Kahn's algorithm.
    ///
    /// Returns nodes in dependency order (dependencies come before dependents).
    /// Returns an error if a cycle is detected, including the cycle path.
    pub fn topological_sort(&self) -> Result<Vec<N>, CycleError<N>> {
        // in_degree[x] = number of nodes x still waits for
        let mut in_degree: BTreeMap<&N, usize> = self
            .nodes
            .iter()
            .map(|node| (node, self.dependency_count(node)))
            .collect();

        let mut queue: VecDeque<&N> = in_degree
            .iter()
            .filter(|(_, &count)| count == 0)
            .map(|(&node, _)| node)
            .collect();

        let mut result = Vec::with_capacity(self.nodes.len());

        while let Some(node) = queue.pop_front() {
            result.push(node.clone());

            for dependent in self.dependents_of(node) {
                if let Some(count) = in_degree.get_mut(dependent) {
                    *count = count.saturating_sub(1);
                    if *count == 0 {
                        queue.push_back(dependent);
                    }
                }
            }
        }

        if result.len() != self.nodes.len() {
            let cycle = self.find_cycle();
            return Err(CycleError { cycle });
        }

        Ok(result)
    }

    /// Find a cycle in the graph (for error reporting).
    fn find_cycle(&self) -> Vec<N> {
        let mut visited = BTreeSet::new();
        let mut rec_stack = BTreeSet::new();
        let mut path = Vec::new();

        for start in &self.nodes {
            if !visited.contains(start) {
                if let Some(cycle) =
                    self.dfs_find_cycle(start, &mut visited, &mut rec_stack, &mut path)
                {
                    return cycle;
                }
            }
        }

        Vec::new()
    }

    fn dfs_find_cycle(
        &self,
        node: &N,
        visited: &mut BTreeSet<N>,
        rec_stack: &mut BTreeSet<N>,
        path: &mut Vec<N>,
    ) -> Option<Vec<N>> {
        visited.insert(node.clone());
        rec_stack.insert(node.clone());
        path.push(node.clone());

        for dep in self.dependencies_of(node) {
            if !visited.contains(dep) {
                if let Some(cycle) = self.dfs_find_cycle(dep, visited, rec_stack, path) {
                    return Some(cycle);
                }
            } else if rec_stack.contains(dep) {
                if let Some(cycle_start) = path.iter().position(|x| x == dep) {
                    let mut cycle: Vec<_> = path[cycle_start..].to_vec();
                    cycle.push(dep.clone());
                    return Some(cycle);
                }
            }
        }

        path.pop();
        rec_stack.remove(node);
        None
    }
}

/// Error returned when a cycle is detected in the dependency graph.
#[derive(Debug)]
pub struct CycleError<N> {
    /// The nodes involved in the cycle.
    pub cycle: Vec<N>,
}

impl<N: fmt::Display> fmt::Display for CycleError<N> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Circular dependency detected: ")?;
        for (i, node) in self.cycle.iter().enumerate() {
            if i > 0 {
                write!(f, " -> ")?;
            }
            write!(f, "{}", node)?;
        }
        Ok(())
    }
}

impl<N: fmt::Debug + fmt::Display> std::error::Error for CycleError<N> {}
