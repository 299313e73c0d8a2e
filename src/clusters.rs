//! Cluster overlay: node id -> cluster label, independent of tree shape.
//!
//! Membership bookkeeping is centralized here so the "prune empty
//! labels" rule cannot be bypassed by ad hoc mutation: a label joins the
//! known set when its first member is assigned and leaves it when its
//! last member is removed.

use crate::node::{Node, NodeId};
use crate::traversal::collect_ids;
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ClusterMap {
    assignments: HashMap<NodeId, String>,
    /// Known labels, in first-assignment order.
    available: Vec<String>,
}

impl ClusterMap {
    pub fn new() -> Self {
        ClusterMap::default()
    }

    pub fn label_of(&self, id: NodeId) -> Option<&str> {
        self.assignments.get(&id).map(String::as_str)
    }

    pub fn is_member(&self, id: NodeId, label: &str) -> bool {
        self.label_of(id) == Some(label)
    }

    pub fn member_count(&self, label: &str) -> usize {
        self.assignments.values().filter(|l| *l == label).count()
    }

    /// Members of a label, sorted by id.
    pub fn members(&self, label: &str) -> Vec<NodeId> {
        let mut ids: Vec<NodeId> = self
            .assignments
            .iter()
            .filter(|(_, l)| *l == label)
            .map(|(id, _)| *id)
            .collect();
        ids.sort_unstable();
        ids
    }

    pub fn available(&self) -> &[String] {
        &self.available
    }

    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// All assignments as (node id, label) pairs, sorted by id.
    pub fn entries(&self) -> Vec<(NodeId, String)> {
        let mut pairs: Vec<(NodeId, String)> = self
            .assignments
            .iter()
            .map(|(id, label)| (*id, label.clone()))
            .collect();
        pairs.sort_unstable_by_key(|(id, _)| *id);
        pairs
    }

    /// Assign a node to a label. Registers the label if unknown and
    /// prunes the node's previous label if it just lost its last member.
    pub fn assign(&mut self, id: NodeId, label: &str) {
        if !self.available.iter().any(|l| l == label) {
            self.available.push(label.to_string());
        }
        let previous = self.assignments.insert(id, label.to_string());
        if let Some(previous) = previous {
            if previous != label {
                self.prune_if_empty(&previous);
            }
        }
    }

    /// Remove a node's assignment, pruning its label if it was the last
    /// member.
    pub fn remove(&mut self, id: NodeId) {
        if let Some(previous) = self.assignments.remove(&id) {
            self.prune_if_empty(&previous);
        }
    }

    /// Drop a label and all of its members.
    pub fn remove_label(&mut self, label: &str) {
        self.assignments.retain(|_, l| l != label);
        self.available.retain(|l| l != label);
    }

    /// Re-tag an entire subtree. `Some(label)` assigns every node in the
    /// subtree to the label; `None` drops every binding. Used when a
    /// subtree is relocated under a differently-labeled parent.
    pub fn retag_subtree(&mut self, subtree: &Node, label: Option<&str>) {
        for id in collect_ids(subtree) {
            match label {
                Some(label) => self.assign(id, label),
                None => self.remove(id),
            }
        }
    }

    fn prune_if_empty(&mut self, label: &str) {
        if self.member_count(label) == 0 {
            self.available.retain(|l| l != label);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_label_registered_on_first_member() {
        let mut clusters = ClusterMap::new();
        assert!(clusters.available().is_empty());
        clusters.assign(1, "HQ");
        clusters.assign(2, "HQ");
        assert_eq!(clusters.available(), ["HQ".to_string()]);
        assert_eq!(clusters.member_count("HQ"), 2);
    }

    #[test]
    fn test_label_pruned_with_last_member() {
        let mut clusters = ClusterMap::new();
        clusters.assign(1, "HQ");
        clusters.assign(2, "Field");
        clusters.remove(1);
        assert!(!clusters.available().contains(&"HQ".to_string()));
        assert!(clusters.available().contains(&"Field".to_string()));
        // Removing an unassigned node is a no-op.
        clusters.remove(42);
        assert_eq!(clusters.len(), 1);
    }

    #[test]
    fn test_reassign_prunes_abandoned_label() {
        let mut clusters = ClusterMap::new();
        clusters.assign(1, "HQ");
        clusters.assign(1, "Field");
        assert_eq!(clusters.label_of(1), Some("Field"));
        assert!(!clusters.available().contains(&"HQ".to_string()));
    }

    #[test]
    fn test_retag_subtree() {
        let mut root = Node::new(1, "root");
        let mut a = Node::new(2, "a");
        a.children.push(Node::new(3, "b"));
        root.children.push(a);

        let mut clusters = ClusterMap::new();
        clusters.assign(2, "Old");
        clusters.retag_subtree(&root.children[0], Some("New"));
        assert_eq!(clusters.label_of(2), Some("New"));
        assert_eq!(clusters.label_of(3), Some("New"));
        assert!(!clusters.available().contains(&"Old".to_string()));

        clusters.retag_subtree(&root.children[0], None);
        assert!(clusters.is_empty());
        assert!(clusters.available().is_empty());
    }

    #[test]
    fn test_remove_label_drops_all_members() {
        let mut clusters = ClusterMap::new();
        clusters.assign(1, "HQ");
        clusters.assign(2, "HQ");
        clusters.assign(3, "Field");
        clusters.remove_label("HQ");
        assert_eq!(clusters.label_of(1), None);
        assert_eq!(clusters.label_of(2), None);
        assert_eq!(clusters.entries(), vec![(3, "Field".to_string())]);
    }
}
