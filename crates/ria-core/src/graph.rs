//! Static task graph declaration
//!
//! The graph is one entry node fanning out to the leaf tasks:
//!
//! ```text
//!                    ┌─→ property_valuation
//!                    ├─→ risk_percentage
//! convert_currency ──┼─→ business_interruption
//!                    ├─→ current_insurance
//!                    ├─→ multi_currency_risk
//!                    └─→ insurance_recommendation
//! ```
//!
//! The declaration is checked once, when the engine is built; runs never
//! re-validate it.

use crate::error::GraphError;
use crate::state::AnalysisKind;
use crate::task::{AnalysisTask, TaskRegistry};
use std::collections::HashSet;

/// Name of the entry node
pub const ENTRY_NODE: &str = "convert_currency";

/// One declared node
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GraphNode {
    /// Node name
    pub name: &'static str,
    /// Node this one waits for; `None` for the entry node
    pub depends_on: Option<&'static str>,
}

/// Validated fan-out graph
#[derive(Debug, Clone)]
pub struct TaskGraph {
    entry: &'static str,
    leaves: Vec<&'static str>,
}

impl TaskGraph {
    /// Build the standard graph for `registry`
    ///
    /// # Errors
    /// See [`TaskGraph::from_nodes`]
    pub fn standard(registry: &TaskRegistry) -> Result<Self, GraphError> {
        let nodes: Vec<GraphNode> = std::iter::once(GraphNode {
            name: ENTRY_NODE,
            depends_on: None,
        })
        .chain(registry.tasks().iter().map(|task| GraphNode {
            name: task.name(),
            depends_on: Some(ENTRY_NODE),
        }))
        .collect();

        Self::from_nodes(&nodes)
    }

    /// Validate a node declaration
    ///
    /// # Errors
    /// - `GraphError::DuplicateNode` if two nodes share a name
    /// - `GraphError::NoEntry` / `MultipleEntries` unless exactly one node has
    ///   no dependency
    /// - `GraphError::InvalidDependency` if a leaf waits on anything but the
    ///   entry node
    /// - `GraphError::NoLeaves` if nothing fans out
    pub fn from_nodes(nodes: &[GraphNode]) -> Result<Self, GraphError> {
        let mut seen = HashSet::new();
        for node in nodes {
            if !seen.insert(node.name) {
                return Err(GraphError::DuplicateNode(node.name));
            }
        }

        let roots: Vec<&'static str> = nodes
            .iter()
            .filter(|n| n.depends_on.is_none())
            .map(|n| n.name)
            .collect();
        let entry = match roots.as_slice() {
            [] => return Err(GraphError::NoEntry),
            [entry] => *entry,
            _ => return Err(GraphError::MultipleEntries(roots)),
        };

        let mut leaves = Vec::with_capacity(nodes.len().saturating_sub(1));
        for node in nodes {
            match node.depends_on {
                None => {}
                Some(dependency) if dependency == entry => leaves.push(node.name),
                Some(dependency) => {
                    return Err(GraphError::InvalidDependency {
                        node: node.name,
                        dependency,
                    })
                }
            }
        }

        if leaves.is_empty() {
            return Err(GraphError::NoLeaves);
        }

        Ok(Self { entry, leaves })
    }

    /// Entry node name
    #[inline]
    #[must_use]
    pub fn entry(&self) -> &'static str {
        self.entry
    }

    /// Leaf node names, in declaration order
    #[inline]
    #[must_use]
    pub fn leaves(&self) -> &[&'static str] {
        &self.leaves
    }

    /// Registry tasks for every leaf, in declaration order
    ///
    /// # Errors
    /// `GraphError::UnknownTask` if a leaf names no registered task
    pub fn resolve(&self, registry: &TaskRegistry) -> Result<Vec<AnalysisTask>, GraphError> {
        self.leaves
            .iter()
            .map(|&leaf| {
                AnalysisKind::from_task_name(leaf)
                    .and_then(|kind| registry.get(kind))
                    .cloned()
                    .ok_or(GraphError::UnknownTask(leaf))
            })
            .collect()
    }

    /// Dependency edges as `(from, to)`
    pub fn edges(&self) -> impl Iterator<Item = (&'static str, &'static str)> + '_ {
        self.leaves.iter().map(move |leaf| (self.entry, *leaf))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(name: &'static str, depends_on: Option<&'static str>) -> GraphNode {
        GraphNode { name, depends_on }
    }

    #[test]
    fn standard_graph_fans_out_from_entry() {
        let graph = TaskGraph::standard(&TaskRegistry::standard()).unwrap();

        assert_eq!(graph.entry(), ENTRY_NODE);
        assert_eq!(graph.leaves().len(), 6);
        assert!(graph.edges().all(|(from, _)| from == ENTRY_NODE));
        assert!(graph.leaves().contains(&"insurance_recommendation"));
    }

    #[test]
    fn rejects_duplicate_names() {
        let err = TaskGraph::from_nodes(&[
            node("entry", None),
            node("a", Some("entry")),
            node("a", Some("entry")),
        ])
        .unwrap_err();
        assert!(matches!(err, GraphError::DuplicateNode("a")));
    }

    #[test]
    fn rejects_missing_or_multiple_entries() {
        assert!(matches!(
            TaskGraph::from_nodes(&[node("a", Some("b")), node("b", Some("a"))]),
            Err(GraphError::NoEntry)
        ));
        assert!(matches!(
            TaskGraph::from_nodes(&[node("a", None), node("b", None)]),
            Err(GraphError::MultipleEntries(_))
        ));
    }

    #[test]
    fn rejects_chained_leaves() {
        let err = TaskGraph::from_nodes(&[
            node("entry", None),
            node("a", Some("entry")),
            node("b", Some("a")),
        ])
        .unwrap_err();
        assert!(matches!(
            err,
            GraphError::InvalidDependency {
                node: "b",
                dependency: "a"
            }
        ));
    }

    #[test]
    fn rejects_entry_without_leaves() {
        assert!(matches!(
            TaskGraph::from_nodes(&[node("entry", None)]),
            Err(GraphError::NoLeaves)
        ));
    }

    #[test]
    fn standard_leaves_resolve_in_declaration_order() {
        let registry = TaskRegistry::standard();
        let graph = TaskGraph::standard(&registry).unwrap();

        let plan = graph.resolve(&registry).unwrap();

        let names: Vec<_> = plan.iter().map(AnalysisTask::name).collect();
        assert_eq!(names, graph.leaves());
    }
}
