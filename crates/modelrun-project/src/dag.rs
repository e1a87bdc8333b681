//! Dependency graph (DAG) construction and traversal
//!
//! Builds forward and reverse dependency graphs between models and derives
//! the build plan from them.

use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use modelrun_core::ValidationError;

/// Node identifier (model name)
pub type NodeId = String;

/// Dependency graph with forward and reverse edges
#[derive(Debug, Clone, Default)]
pub struct DependencyGraph {
    /// Forward edges: node -> nodes it depends on (parents)
    parents: BTreeMap<NodeId, BTreeSet<NodeId>>,

    /// Reverse edges: node -> nodes that depend on it (children)
    children: BTreeMap<NodeId, BTreeSet<NodeId>>,
}

impl DependencyGraph {
    /// Build a graph from a model -> dependencies map
    ///
    /// Dependencies that are not keys of the map are added as nodes too.
    pub fn from_dependencies(dependencies: &BTreeMap<NodeId, BTreeSet<NodeId>>) -> Self {
        let mut parents: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();
        let mut children: BTreeMap<NodeId, BTreeSet<NodeId>> = BTreeMap::new();

        for (node, deps) in dependencies {
            parents.entry(node.clone()).or_default().extend(deps.iter().cloned());
            children.entry(node.clone()).or_default();

            for dep in deps {
                parents.entry(dep.clone()).or_default();
                children.entry(dep.clone()).or_default().insert(node.clone());
            }
        }

        Self { parents, children }
    }

    /// All nodes, in name order
    pub fn nodes(&self) -> impl Iterator<Item = &NodeId> {
        self.parents.keys()
    }

    pub fn contains(&self, node_id: &str) -> bool {
        self.parents.contains_key(node_id)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    /// Get immediate parents (dependencies) of a node
    pub fn parents(&self, node_id: &str) -> Vec<&NodeId> {
        self.parents
            .get(node_id)
            .map(|deps| deps.iter().collect())
            .unwrap_or_default()
    }

    /// All transitive dependencies of a node, in name order
    pub fn upstream(&self, node_id: &str) -> BTreeSet<NodeId> {
        Self::closure(&self.parents, node_id)
    }

    /// All transitive dependents of a node, in name order
    pub fn downstream(&self, node_id: &str) -> BTreeSet<NodeId> {
        Self::closure(&self.children, node_id)
    }

    /// Check if `target` (transitively) depends on `source`
    pub fn has_path(&self, source: &str, target: &str) -> bool {
        self.downstream(source).contains(target)
    }

    /// BFS over one edge direction, excluding the start node unless it is
    /// reachable through a cycle
    fn closure(edges: &BTreeMap<NodeId, BTreeSet<NodeId>>, node_id: &str) -> BTreeSet<NodeId> {
        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<&NodeId> = edges
            .get(node_id)
            .map(|next| next.iter().collect())
            .unwrap_or_default();

        while let Some(current) = queue.pop_front() {
            if !visited.insert(current.clone()) {
                continue;
            }

            if let Some(next) = edges.get(current) {
                queue.extend(next.iter().filter(|n| !visited.contains(*n)));
            }
        }

        visited
    }

    /// Topological build order, ties broken by name ascending
    ///
    /// Kahn's algorithm over a sorted ready set, so the result is the
    /// lexicographically smallest valid order and does not depend on
    /// discovery order. Fails with the minimal cycle if there is one.
    pub fn build_plan(&self) -> Result<BuildPlan, ValidationError> {
        let mut in_degree: HashMap<&NodeId, usize> = self
            .parents
            .iter()
            .map(|(node, deps)| (node, deps.len()))
            .collect();

        let mut ready: BTreeSet<&NodeId> = in_degree
            .iter()
            .filter(|(_, degree)| **degree == 0)
            .map(|(node, _)| *node)
            .collect();

        let mut steps = Vec::with_capacity(self.parents.len());

        while let Some(node) = ready.pop_first() {
            steps.push(node.clone());

            for child in self.children.get(node).into_iter().flatten() {
                if let Some(degree) = in_degree.get_mut(child) {
                    *degree -= 1;
                    if *degree == 0 {
                        ready.insert(child);
                    }
                }
            }
        }

        if steps.len() == self.parents.len() {
            return Ok(BuildPlan { steps });
        }

        let placed: BTreeSet<&NodeId> = steps.iter().collect();
        let remaining: BTreeSet<&NodeId> = self
            .parents
            .keys()
            .filter(|node| !placed.contains(node))
            .collect();

        let cycle = self
            .minimal_cycle(&remaining)
            .unwrap_or_else(|| remaining.iter().map(|n| (*n).clone()).collect());

        Err(ValidationError::CycleDetected { cycle })
    }

    /// Plan restricted to `target` and its ancestors, in global plan order
    pub fn plan_for(&self, target: &str) -> Result<BuildPlan, ValidationError> {
        if !self.contains(target) {
            return Err(ValidationError::UnknownModel(target.to_string()));
        }

        let mut selected = self.upstream(target);
        selected.insert(target.to_string());

        Ok(self.build_plan()?.retain(|step| selected.contains(step)))
    }

    /// Shortest cycle among `candidates`, as a closed path
    ///
    /// Ties are broken by the cycle's rotation that starts at its smallest
    /// member, compared lexicographically.
    fn minimal_cycle(&self, candidates: &BTreeSet<&NodeId>) -> Option<Vec<NodeId>> {
        let mut best: Option<Vec<NodeId>> = None;

        for start in candidates {
            let Some(cycle) = self.shortest_cycle_through(start, candidates) else {
                continue;
            };

            let better = match &best {
                None => true,
                Some(current) => {
                    cycle.len() < current.len() || (cycle.len() == current.len() && cycle < *current)
                }
            };

            if better {
                best = Some(cycle);
            }
        }

        best.map(|mut cycle| {
            let first = cycle[0].clone();
            cycle.push(first);
            cycle
        })
    }

    /// BFS along dependency edges from `start` back to itself. Returns the
    /// open cycle rotated to begin at its smallest member.
    fn shortest_cycle_through(&self, start: &NodeId, candidates: &BTreeSet<&NodeId>) -> Option<Vec<NodeId>> {
        let mut previous: HashMap<&NodeId, &NodeId> = HashMap::new();
        let mut queue: VecDeque<&NodeId> = VecDeque::new();
        queue.push_back(start);

        while let Some(current) = queue.pop_front() {
            for parent in self.parents.get(current).into_iter().flatten() {
                if parent == start {
                    let mut path = vec![current.clone()];
                    let mut cursor = current;
                    while cursor != start {
                        cursor = previous[cursor];
                        path.push(cursor.clone());
                    }
                    path.reverse();
                    return Some(rotate_to_smallest(path));
                }

                if candidates.contains(parent) && !previous.contains_key(parent) {
                    previous.insert(parent, current);
                    queue.push_back(parent);
                }
            }
        }

        None
    }
}

fn rotate_to_smallest(mut cycle: Vec<NodeId>) -> Vec<NodeId> {
    if let Some(min_index) = cycle
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.cmp(b.1))
        .map(|(i, _)| i)
    {
        cycle.rotate_left(min_index);
    }
    cycle
}

/// Ordered sequence of model names; every model comes after its dependencies
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildPlan {
    steps: Vec<NodeId>,
}

impl BuildPlan {
    pub fn steps(&self) -> &[NodeId] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &NodeId> {
        self.steps.iter()
    }

    pub fn position(&self, node_id: &str) -> Option<usize> {
        self.steps.iter().position(|s| s == node_id)
    }

    fn retain(mut self, keep: impl Fn(&NodeId) -> bool) -> Self {
        self.steps.retain(|s| keep(s));
        self
    }
}

impl<'a> IntoIterator for &'a BuildPlan {
    type Item = &'a NodeId;
    type IntoIter = std::slice::Iter<'a, NodeId>;

    fn into_iter(self) -> Self::IntoIter {
        self.steps.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn graph(edges: &[(&str, &[&str])]) -> DependencyGraph {
        let deps: BTreeMap<NodeId, BTreeSet<NodeId>> = edges
            .iter()
            .map(|(node, deps)| {
                (node.to_string(), deps.iter().map(|d| d.to_string()).collect())
            })
            .collect();
        DependencyGraph::from_dependencies(&deps)
    }

    fn cycle_of(err: ValidationError) -> Vec<String> {
        match err {
            ValidationError::CycleDetected { cycle } => cycle,
            other => panic!("expected a cycle, got {other}"),
        }
    }

    #[test]
    fn linear_chain() {
        let dag = graph(&[
            ("sales_summary", &["refined_orders"]),
            ("refined_orders", &["raw_orders"]),
            ("raw_orders", &[]),
        ]);

        let plan = dag.build_plan().unwrap();
        assert_eq!(plan.steps(), ["raw_orders", "refined_orders", "sales_summary"]);
    }

    #[test]
    fn independent_models_sorted_by_name() {
        let dag = graph(&[("zeta", &[]), ("alpha", &[]), ("mid", &["zeta"])]);
        let plan = dag.build_plan().unwrap();
        assert_eq!(plan.steps(), ["alpha", "zeta", "mid"]);
    }

    #[test]
    fn diamond_respects_every_edge() {
        let dag = graph(&[
            ("d", &["b", "c"]),
            ("b", &["a"]),
            ("c", &["a"]),
            ("a", &[]),
        ]);

        let plan = dag.build_plan().unwrap();
        assert_eq!(plan.steps(), ["a", "b", "c", "d"]);
        for node in dag.nodes() {
            for parent in dag.parents(node) {
                assert!(plan.position(parent) < plan.position(node));
            }
        }
    }

    #[test]
    fn two_node_cycle() {
        let dag = graph(&[("a", &["b"]), ("b", &["a"])]);
        let cycle = cycle_of(dag.build_plan().unwrap_err());
        assert_eq!(cycle, vec!["a", "b", "a"]);
    }

    #[test]
    fn self_reference_is_a_cycle() {
        let dag = graph(&[("a", &["a"]), ("b", &[])]);
        assert_eq!(cycle_of(dag.build_plan().unwrap_err()), vec!["a", "a"]);
    }

    #[test]
    fn reports_shortest_cycle() {
        // Long cycle a -> b -> c -> d -> a, short cycle c -> d -> c
        let dag = graph(&[
            ("a", &["b"]),
            ("b", &["c"]),
            ("c", &["d"]),
            ("d", &["a", "c"]),
            ("downstream", &["a"]),
        ]);

        assert_eq!(cycle_of(dag.build_plan().unwrap_err()), vec!["c", "d", "c"]);
    }

    #[test]
    fn cycle_path_follows_dependency_direction() {
        // x depends on z, z on y, y on x
        let dag = graph(&[("x", &["z"]), ("z", &["y"]), ("y", &["x"])]);
        assert_eq!(cycle_of(dag.build_plan().unwrap_err()), vec!["x", "z", "y", "x"]);
    }

    #[test]
    fn upstream_and_downstream() {
        let dag = graph(&[
            ("c", &["b"]),
            ("b", &["a"]),
            ("a", &[]),
            ("other", &[]),
        ]);

        assert_eq!(dag.upstream("c").into_iter().collect::<Vec<_>>(), vec!["a", "b"]);
        assert_eq!(dag.downstream("a").into_iter().collect::<Vec<_>>(), vec!["b", "c"]);
        assert!(dag.has_path("a", "c"));
        assert!(!dag.has_path("c", "a"));
        assert!(dag.downstream("other").is_empty());
    }

    #[test]
    fn plan_for_selects_ancestors_only() {
        let dag = graph(&[
            ("sales_summary", &["refined_orders"]),
            ("refined_orders", &["raw_orders"]),
            ("raw_orders", &[]),
            ("customers", &[]),
        ]);

        let plan = dag.plan_for("refined_orders").unwrap();
        assert_eq!(plan.steps(), ["raw_orders", "refined_orders"]);

        let err = dag.plan_for("nope").unwrap_err();
        assert_eq!(err, ValidationError::UnknownModel("nope".to_string()));
    }

    #[test]
    fn plan_is_stable_across_insertion_order() {
        let forward = graph(&[("b", &["a"]), ("c", &["a"]), ("a", &[])]);
        let backward = graph(&[("a", &[]), ("c", &["a"]), ("b", &["a"])]);
        assert_eq!(forward.build_plan().unwrap(), backward.build_plan().unwrap());
    }
}
