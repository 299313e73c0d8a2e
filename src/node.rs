//! Node model for the organizational tree.
//!
//! A document is a single tree of `Node`s. Ids are integers assigned by
//! a per-document monotonic counter; they are never reused within a
//! session and are reassigned only when nodes are cloned for
//! paste/duplicate. Child order is semantically meaningful (siblings
//! read left-to-right / top-to-bottom).

use serde::{Deserialize, Serialize};

/// Unique node identifier within one document.
pub type NodeId = u64;

fn default_true() -> bool {
    true
}

/// Mutually-exclusive classification of a node.
///
/// A single tagged value instead of seven boolean flags, so the
/// "at most one active" invariant holds structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeClass {
    #[default]
    None,
    Absent269,
    ForAll,
    Subordinate,
    Authority,
    Okr,
    Indicator,
    Power269,
}

impl NodeClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeClass::None => "none",
            NodeClass::Absent269 => "absent269",
            NodeClass::ForAll => "forAll",
            NodeClass::Subordinate => "subordinate",
            NodeClass::Authority => "authority",
            NodeClass::Okr => "okr",
            NodeClass::Indicator => "indicator",
            NodeClass::Power269 => "power269",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "none" => Some(NodeClass::None),
            "absent269" => Some(NodeClass::Absent269),
            "forAll" => Some(NodeClass::ForAll),
            "subordinate" => Some(NodeClass::Subordinate),
            "authority" => Some(NodeClass::Authority),
            "okr" => Some(NodeClass::Okr),
            "indicator" => Some(NodeClass::Indicator),
            "power269" => Some(NodeClass::Power269),
            _ => None,
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, NodeClass::None)
    }

    /// Protected classes cannot participate in replacement chains.
    pub fn is_protected(&self) -> bool {
        matches!(self, NodeClass::Indicator | NodeClass::Okr)
    }
}

/// File attached to a node. `data` holds the blob payload while the
/// node lives in memory; it is cleared during serialization and
/// reloaded from the blob store by id.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileAttachment {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub data: String,
}

/// One named row of per-period indicator cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorRow {
    pub name: String,
    #[serde(default)]
    pub values: Vec<String>,
}

/// Time-series table attached to a node: period headers plus named rows.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IndicatorTable {
    #[serde(default)]
    pub periods: Vec<String>,
    #[serde(default)]
    pub rows: Vec<IndicatorRow>,
}

/// Plan/fact quarterly series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricBlock {
    pub title: String,
    #[serde(default)]
    pub plan: Vec<Option<f64>>,
    #[serde(default)]
    pub fact: Vec<Option<f64>>,
}

impl MetricBlock {
    /// Empty quarterly block (four plan and four fact cells).
    pub fn quarterly(title: impl Into<String>) -> Self {
        MetricBlock {
            title: title.into(),
            plan: vec![None; 4],
            fact: vec![None; 4],
        }
    }
}

/// Display and business fields of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NodeContent {
    pub text: String,
    /// Job-title string.
    #[serde(default)]
    pub position: Option<String>,
    /// Opaque image ref id; the data URI lives in the document image table.
    #[serde(default)]
    pub img: Option<String>,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
    #[serde(default)]
    pub hide_icon: bool,
    #[serde(default)]
    pub class: NodeClass,
    /// Designated master node for `Subordinate` visibility inheritance.
    #[serde(default)]
    pub master_id: Option<NodeId>,
    #[serde(default)]
    pub indicators: Option<IndicatorTable>,
    #[serde(default)]
    pub metric_blocks: Vec<MetricBlock>,
    /// Free-text list rendered under the node.
    #[serde(default)]
    pub sub_blocks: Vec<String>,
}

impl NodeContent {
    pub fn titled(text: impl Into<String>) -> Self {
        NodeContent {
            text: text.into(),
            position: None,
            img: None,
            files: Vec::new(),
            hide_icon: false,
            class: NodeClass::None,
            master_id: None,
            indicators: None,
            metric_blocks: Vec::new(),
            sub_blocks: Vec::new(),
        }
    }

    /// Fixed synthetic content substituted for the last member of a
    /// circular replacement chain.
    pub fn organizational_event() -> Self {
        NodeContent::titled("Organizational event")
    }

    /// Set a classification, clearing whatever was active. Toggling the
    /// class that is already active clears it to `None`.
    pub fn toggle_class(&mut self, class: NodeClass) {
        if self.class == class {
            self.class = NodeClass::None;
        } else {
            self.class = class;
        }
        if !matches!(self.class, NodeClass::Subordinate) {
            self.master_id = None;
        }
    }
}

/// A node of the organizational tree.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: NodeId,
    pub content: NodeContent,
    #[serde(default)]
    pub children: Vec<Node>,
    /// Transient UI-visibility flag; persisted but not structural.
    #[serde(default = "default_true")]
    pub is_expanded: bool,
}

impl Node {
    pub fn new(id: NodeId, text: impl Into<String>) -> Self {
        Node {
            id,
            content: NodeContent::titled(text),
            children: Vec::new(),
            is_expanded: true,
        }
    }

    /// Number of nodes in this subtree, including self.
    pub fn subtree_len(&self) -> usize {
        1 + self.children.iter().map(Node::subtree_len).sum::<usize>()
    }

    /// Deep copy with file blob payloads cleared, for serialization and
    /// for working copies handed to the restructure/replacement
    /// algorithms. Payloads are reloaded from the blob store by id.
    pub fn export_clone(&self) -> Node {
        let mut content = self.content.clone();
        for file in &mut content.files {
            file.data.clear();
        }
        Node {
            id: self.id,
            content,
            children: self.children.iter().map(Node::export_clone).collect(),
            is_expanded: self.is_expanded,
        }
    }
}

/// Monotonic id source for one document. Ids are never reused within a
/// session.
#[derive(Debug, Clone, PartialEq)]
pub struct IdCounter {
    next: NodeId,
}

impl IdCounter {
    pub fn starting_at(next: NodeId) -> Self {
        IdCounter { next }
    }

    /// The id the next allocation will return.
    pub fn peek(&self) -> NodeId {
        self.next
    }

    pub fn allocate(&mut self) -> NodeId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// Ensure future allocations land strictly above `id`. Used after
    /// import so restored trees never collide with new nodes.
    pub fn bump_past(&mut self, id: NodeId) {
        if self.next <= id {
            self.next = id + 1;
        }
    }
}

/// Deep-copy a subtree, assigning a fresh id to every copied node.
pub fn clone_subtree(node: &Node, counter: &mut IdCounter) -> Node {
    Node {
        id: counter.allocate(),
        content: node.content.clone(),
        children: node
            .children
            .iter()
            .map(|child| clone_subtree(child, counter))
            .collect(),
        is_expanded: node.is_expanded,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_class_roundtrip() {
        for class in [
            NodeClass::None,
            NodeClass::Absent269,
            NodeClass::ForAll,
            NodeClass::Subordinate,
            NodeClass::Authority,
            NodeClass::Okr,
            NodeClass::Indicator,
            NodeClass::Power269,
        ] {
            assert_eq!(NodeClass::from_str(class.as_str()), Some(class));
        }
        assert_eq!(NodeClass::from_str("absent"), None);
    }

    #[test]
    fn test_toggle_class_is_exclusive() {
        let mut content = NodeContent::titled("Dept");
        content.toggle_class(NodeClass::Authority);
        assert_eq!(content.class, NodeClass::Authority);

        // Switching to another class clears the previous one.
        content.toggle_class(NodeClass::Okr);
        assert_eq!(content.class, NodeClass::Okr);

        // Toggling the active class clears it entirely.
        content.toggle_class(NodeClass::Okr);
        assert_eq!(content.class, NodeClass::None);
    }

    #[test]
    fn test_toggle_away_from_subordinate_drops_master() {
        let mut content = NodeContent::titled("Unit");
        content.toggle_class(NodeClass::Subordinate);
        content.master_id = Some(7);
        content.toggle_class(NodeClass::Authority);
        assert_eq!(content.master_id, None);
    }

    #[test]
    fn test_clone_subtree_assigns_fresh_ids() {
        let mut counter = IdCounter::starting_at(10);
        let mut original = Node::new(1, "root");
        original.children.push(Node::new(2, "a"));
        original.children.push(Node::new(3, "b"));

        let copy = clone_subtree(&original, &mut counter);
        assert_eq!(copy.id, 10);
        assert_eq!(copy.children[0].id, 11);
        assert_eq!(copy.children[1].id, 12);
        assert_eq!(copy.children[0].content.text, "a");
        assert_eq!(counter.peek(), 13);
    }

    #[test]
    fn test_export_clone_clears_file_payloads() {
        let mut node = Node::new(1, "root");
        node.content.files.push(FileAttachment {
            id: "f1".to_string(),
            name: "report.pdf".to_string(),
            data: "base64payload".to_string(),
        });
        let mut child = Node::new(2, "child");
        child.content.files.push(FileAttachment {
            id: "f2".to_string(),
            name: "chart.png".to_string(),
            data: "morebytes".to_string(),
        });
        node.children.push(child);

        let cleared = node.export_clone();
        assert_eq!(cleared.content.files[0].data, "");
        assert_eq!(cleared.children[0].content.files[0].data, "");
        // Ids and names survive; only the payload is dropped.
        assert_eq!(cleared.content.files[0].id, "f1");
        assert_eq!(cleared.children[0].content.files[0].name, "chart.png");
    }

    #[test]
    fn test_bump_past() {
        let mut counter = IdCounter::starting_at(5);
        counter.bump_past(3);
        assert_eq!(counter.peek(), 5);
        counter.bump_past(9);
        assert_eq!(counter.allocate(), 10);
    }
}
