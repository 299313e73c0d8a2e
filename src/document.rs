//! Document context: the unit of engine state.
//!
//! Every engine operation takes an explicit `Document` instead of
//! reaching for a global, so multiple independent documents (and
//! tests) coexist without shared state. The engine owns the tree and
//! cluster overlay exclusively for the lifetime of the open document;
//! collaborators read or request mutations through engine operations.

use crate::clusters::ClusterMap;
use crate::error::EngineError;
use crate::node::{IdCounter, Node, NodeClass, NodeId};
use crate::traversal::find_node_mut;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Metadata for an attached file; the payload itself lives in the blob
/// store under the same id.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileMeta {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub size: Option<u64>,
    #[serde(default)]
    pub mime: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub tree: Node,
    pub counter: IdCounter,
    pub clusters: ClusterMap,
    /// Label currently used as the visibility filter, if any.
    pub active_cluster: Option<String>,
    /// Image ref id -> data URI.
    pub images: HashMap<String, String>,
    /// File ref id -> metadata.
    pub files_data: HashMap<String, FileMeta>,
    pub dark_mode: bool,
}

impl Document {
    /// New document with a single root node holding `root_text`.
    pub fn new(root_text: impl Into<String>) -> Self {
        let mut counter = IdCounter::starting_at(1);
        let root = Node::new(counter.allocate(), root_text);
        Document {
            tree: root,
            counter,
            clusters: ClusterMap::new(),
            active_cluster: None,
            images: HashMap::new(),
            files_data: HashMap::new(),
            dark_mode: false,
        }
    }

    /// Demo document shown when no stored data exists.
    pub fn demo() -> Self {
        let mut doc = Document::new("Organizational structure");
        let root_id = doc.tree.id;
        doc.add_child(root_id, "Administration")
            .expect("root exists");
        doc.add_child(root_id, "IT department").expect("root exists");
        doc
    }

    pub fn root_id(&self) -> NodeId {
        self.tree.id
    }

    pub fn next_id(&mut self) -> NodeId {
        self.counter.allocate()
    }

    /// Allocate a fresh node without attaching it to the tree.
    pub fn create_node(&mut self, text: impl Into<String>) -> Node {
        Node::new(self.counter.allocate(), text)
    }

    /// Create a node and append it under `parent`.
    pub fn add_child(
        &mut self,
        parent: NodeId,
        text: impl Into<String>,
    ) -> Result<NodeId, EngineError> {
        let node = self.create_node(text);
        let id = node.id;
        let parent_node = find_node_mut(&mut self.tree, parent).ok_or_else(|| {
            EngineError::validation(format!("parent node {} not found", parent))
        })?;
        parent_node.children.push(node);
        parent_node.is_expanded = true;
        Ok(id)
    }

    pub fn node_count(&self) -> usize {
        self.tree.subtree_len()
    }

    /// Toggle a classification on a node. Returns the class left active
    /// (`NodeClass::None` when toggled off).
    pub fn toggle_class(&mut self, id: NodeId, class: NodeClass) -> Result<NodeClass, EngineError> {
        let node = find_node_mut(&mut self.tree, id)
            .ok_or_else(|| EngineError::validation(format!("node {} not found", id)))?;
        node.content.toggle_class(class);
        Ok(node.content.class)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traversal::find_node;

    #[test]
    fn test_new_document_has_root_id_one() {
        let doc = Document::new("root");
        assert_eq!(doc.root_id(), 1);
        assert_eq!(doc.node_count(), 1);
    }

    #[test]
    fn test_ids_are_monotonic() {
        let mut doc = Document::new("root");
        let a = doc.add_child(1, "a").unwrap();
        let b = doc.add_child(1, "b").unwrap();
        assert_eq!((a, b), (2, 3));
        let c = doc.add_child(b, "c").unwrap();
        assert_eq!(c, 4);
        assert_eq!(find_node(&doc.tree, c).unwrap().content.text, "c");
    }

    #[test]
    fn test_add_child_rejects_missing_parent() {
        let mut doc = Document::new("root");
        let err = doc.add_child(99, "orphan").unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
    }

    #[test]
    fn test_toggle_class_via_document() {
        let mut doc = Document::demo();
        assert_eq!(doc.toggle_class(2, NodeClass::Okr).unwrap(), NodeClass::Okr);
        // Switching classes never leaves two active.
        assert_eq!(
            doc.toggle_class(2, NodeClass::Indicator).unwrap(),
            NodeClass::Indicator
        );
        assert_eq!(
            doc.toggle_class(2, NodeClass::Indicator).unwrap(),
            NodeClass::None
        );
        assert!(doc.toggle_class(99, NodeClass::Okr).is_err());
    }

    #[test]
    fn test_demo_document() {
        let doc = Document::demo();
        assert_eq!(doc.node_count(), 3);
        assert_eq!(doc.tree.children.len(), 2);
        assert_eq!(doc.tree.children[0].content.text, "Administration");
    }
}
