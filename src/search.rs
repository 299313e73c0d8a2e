//! Search match predicate and visibility propagation.
//!
//! A node is visible under a query when it matches directly, is an
//! ancestor of a matching descendant, or is a descendant of a matching
//! ancestor, so the context around a hit stays on screen even when the
//! node's own expansion state would hide it. An active cluster filter
//! composes with the query filter by intersection.

use crate::document::Document;
use crate::node::{Node, NodeClass, NodeId};
use crate::traversal::collect_ids;
use std::collections::HashSet;

/// Case-insensitive, whitespace-tokenized AND match over the node text,
/// sub-block text and (deep mode) attached file names. Every token must
/// appear as a substring somewhere in the concatenation. An empty query
/// matches everything.
pub fn matches(node: &Node, query: &str, deep: bool) -> bool {
    let tokens: Vec<String> = query
        .split_whitespace()
        .map(|token| token.to_lowercase())
        .collect();
    if tokens.is_empty() {
        return true;
    }

    let mut haystack = node.content.text.to_lowercase();
    for block in &node.content.sub_blocks {
        haystack.push(' ');
        haystack.push_str(&block.to_lowercase());
    }
    if deep {
        for file in &node.content.files {
            haystack.push(' ');
            haystack.push_str(&file.name.to_lowercase());
        }
    }
    tokens.iter().all(|token| haystack.contains(token.as_str()))
}

/// Effective membership in the active cluster. A `Subordinate` node
/// inherits membership from its designated master, not just its
/// structural parent.
fn in_cluster(doc: &Document, node: &Node, label: &str) -> bool {
    if doc.clusters.is_member(node.id, label) {
        return true;
    }
    if node.content.class == NodeClass::Subordinate {
        if let Some(master) = node.content.master_id {
            return doc.clusters.is_member(master, label);
        }
    }
    false
}

/// Ids visible under `predicate`: direct hits plus their ancestors and
/// descendants. Returns whether the subtree contains a hit.
fn mark_visible<F>(
    node: &Node,
    predicate: &F,
    under_hit: bool,
    visible: &mut HashSet<NodeId>,
) -> bool
where
    F: Fn(&Node) -> bool,
{
    let hit = predicate(node);
    let mut below_hit = false;
    for child in &node.children {
        below_hit |= mark_visible(child, predicate, under_hit || hit, visible);
    }
    if hit || under_hit || below_hit {
        visible.insert(node.id);
    }
    hit || below_hit
}

fn visibility_set<F>(tree: &Node, predicate: F) -> HashSet<NodeId>
where
    F: Fn(&Node) -> bool,
{
    let mut visible = HashSet::new();
    mark_visible(tree, &predicate, false, &mut visible);
    visible
}

/// Ids visible under the query and the document's active cluster
/// filter. Either filter alone passes everything when inactive.
pub fn visible_ids(doc: &Document, query: &str, deep: bool) -> HashSet<NodeId> {
    let query_visible = if query.trim().is_empty() {
        collect_ids(&doc.tree).into_iter().collect()
    } else {
        visibility_set(&doc.tree, |node| matches(node, query, deep))
    };

    match doc.active_cluster.clone() {
        None => query_visible,
        Some(label) => {
            let cluster_visible =
                visibility_set(&doc.tree, |node| in_cluster(doc, node, &label));
            query_visible
                .intersection(&cluster_visible)
                .copied()
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::node::FileAttachment;

    /// root(1) -> branch(2) -> leaf(3); root -> other(4)
    fn searchable_doc() -> Document {
        let mut doc = Document::new("Head office");
        let branch = doc.add_child(1, "Regional branch").unwrap();
        doc.add_child(branch, "Payroll clerk").unwrap();
        doc.add_child(1, "Security desk").unwrap();
        doc
    }

    #[test]
    fn test_matches_tokenized_and() {
        let node = Node::new(1, "Regional Payroll Office");
        assert!(matches(&node, "payroll", false));
        assert!(matches(&node, "office regional", false));
        assert!(!matches(&node, "payroll security", false));
        assert!(matches(&node, "  ", false));
    }

    #[test]
    fn test_matches_sub_blocks_and_deep_files() {
        let mut node = Node::new(1, "Branch");
        node.content.sub_blocks.push("quarterly audit".to_string());
        node.content.files.push(FileAttachment {
            id: "f1".to_string(),
            name: "Budget-2026.xlsx".to_string(),
            data: String::new(),
        });
        assert!(matches(&node, "audit", false));
        // File names only count in deep mode.
        assert!(!matches(&node, "budget", false));
        assert!(matches(&node, "budget", true));
    }

    #[test]
    fn test_visibility_keeps_context_around_hit() {
        let doc = searchable_doc();
        let visible = visible_ids(&doc, "payroll", false);
        // The hit, its ancestors, and nothing else.
        assert!(visible.contains(&3));
        assert!(visible.contains(&2));
        assert!(visible.contains(&1));
        assert!(!visible.contains(&4));
    }

    #[test]
    fn test_visibility_includes_descendants_of_match() {
        let doc = searchable_doc();
        let visible = visible_ids(&doc, "regional", false);
        assert!(visible.contains(&2));
        // Descendants of the match stay visible as context.
        assert!(visible.contains(&3));
        assert!(!visible.contains(&4));
    }

    #[test]
    fn test_cluster_filter_composes_with_search() {
        let mut doc = searchable_doc();
        doc.clusters.assign(4, "Guards");
        doc.active_cluster = Some("Guards".to_string());

        // No query: cluster members, their ancestors, descendants.
        let visible = visible_ids(&doc, "", false);
        assert!(visible.contains(&4));
        assert!(visible.contains(&1));
        assert!(!visible.contains(&2));

        // Query and cluster intersect: payroll is outside the cluster.
        let visible = visible_ids(&doc, "payroll", false);
        assert!(!visible.contains(&3));
        assert!(!visible.contains(&4));
    }

    #[test]
    fn test_subordinate_inherits_master_membership() {
        let mut doc = searchable_doc();
        doc.clusters.assign(4, "Guards");
        doc.active_cluster = Some("Guards".to_string());

        {
            let leaf = crate::traversal::find_node_mut(&mut doc.tree, 3).unwrap();
            leaf.content.toggle_class(NodeClass::Subordinate);
            leaf.content.master_id = Some(4);
        }
        let visible = visible_ids(&doc, "", false);
        // The subordinate borrows its master's membership.
        assert!(visible.contains(&3));
        // And its ancestors stay visible as context.
        assert!(visible.contains(&2));
    }
}
