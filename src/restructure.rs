//! Structural mutations: move, prune-and-promote, multi-node
//! classify-and-apply, template duplication.
//!
//! Every operation validates up front, then mutates a working copy of
//! the tree (and cluster overlay) and swaps it into the document on
//! success, so callers observe either the full mutation or none of it.

use crate::document::Document;
use crate::error::EngineError;
use crate::node::{clone_subtree, Node, NodeId};
use crate::traversal::{
    collect_ids, detach_subtree, find_node, find_node_mut, find_parent, find_parent_mut,
    is_descendant, nearest_selected_ancestor,
};
use serde::Serialize;
use std::collections::{HashMap, HashSet};

/// Where a dragged node lands relative to the drop target.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MovePosition {
    Before,
    After,
    Child,
}

impl MovePosition {
    pub fn as_str(&self) -> &'static str {
        match self {
            MovePosition::Before => "before",
            MovePosition::After => "after",
            MovePosition::Child => "child",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "before" => Some(MovePosition::Before),
            "after" => Some(MovePosition::After),
            "child" => Some(MovePosition::Child),
            _ => None,
        }
    }
}

/// Per-node action in a multi-node selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SelectionAction {
    Move,
    Delete,
}

/// Result of a classify-and-apply pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassifyOutcome {
    pub moved: usize,
    pub deleted: usize,
}

/// Result of a template duplication.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DuplicateOutcome {
    /// Ids of the clone roots, in document order of their matches.
    pub created: Vec<NodeId>,
}

/// Move a single node relative to a drop target.
///
/// Rejected when the target lies inside the dragged subtree (cycle
/// guard), when dragged and target coincide, or when a sibling insert
/// is requested beside the root. The moved subtree inherits the new
/// parent's cluster label when that parent has one.
pub fn move_node(
    doc: &mut Document,
    dragged: NodeId,
    target: NodeId,
    position: MovePosition,
) -> Result<(), EngineError> {
    if dragged == target {
        return Err(EngineError::validation("cannot drop a node onto itself"));
    }
    if dragged == doc.root_id() {
        return Err(EngineError::validation("the root cannot be moved"));
    }
    let dragged_node = find_node(&doc.tree, dragged)
        .ok_or_else(|| EngineError::validation(format!("node {} not found", dragged)))?;
    if is_descendant(dragged_node, target) {
        return Err(EngineError::validation(
            "cannot move a node into its own subtree",
        ));
    }
    if find_node(&doc.tree, target).is_none() {
        return Err(EngineError::validation(format!(
            "target node {} not found",
            target
        )));
    }
    if position != MovePosition::Child && target == doc.root_id() {
        return Err(EngineError::validation("cannot insert beside the root"));
    }

    let mut tree = doc.tree.clone();
    let mut clusters = doc.clusters.clone();

    let subtree = detach_subtree(&mut tree, dragged)
        .ok_or_else(|| EngineError::integrity(format!("node {} vanished during detach", dragged)))?;

    let new_parent = match position {
        MovePosition::Child => target,
        MovePosition::Before | MovePosition::After => {
            find_parent(&tree, target)
                .ok_or_else(|| {
                    EngineError::integrity(format!("target {} lost its parent", target))
                })?
                .id
        }
    };
    // Relocation into a differently-labeled subtree re-tags recursively.
    if let Some(label) = clusters.label_of(new_parent).map(str::to_string) {
        if clusters.label_of(dragged) != Some(label.as_str()) {
            clusters.retag_subtree(&subtree, Some(&label));
        }
    }

    match position {
        MovePosition::Child => {
            let target_node = find_node_mut(&mut tree, target).ok_or_else(|| {
                EngineError::integrity(format!("target {} vanished during move", target))
            })?;
            target_node.children.push(subtree);
            target_node.is_expanded = true;
        }
        MovePosition::Before | MovePosition::After => {
            let parent = find_parent_mut(&mut tree, target).ok_or_else(|| {
                EngineError::integrity(format!("target {} lost its parent", target))
            })?;
            let index = parent
                .children
                .iter()
                .position(|child| child.id == target)
                .ok_or_else(|| {
                    EngineError::integrity(format!("target {} missing from its parent", target))
                })?;
            let at = match position {
                MovePosition::Before => index,
                _ => index + 1,
            };
            parent.children.insert(at, subtree);
        }
    }

    doc.tree = tree;
    doc.clusters = clusters;
    Ok(())
}

/// Remove each node in `ids` but splice its children into its former
/// slot in the parent's child list, order-preserving. Nested selections
/// resolve in a single recursive pass.
pub fn delete_and_promote(doc: &mut Document, ids: &[NodeId]) -> Result<usize, EngineError> {
    let selected: HashSet<NodeId> = ids.iter().copied().collect();
    if selected.is_empty() {
        return Ok(0);
    }
    validate_selection(doc, &selected)?;

    let mut tree = doc.tree.clone();
    let mut clusters = doc.clusters.clone();
    prune_selected(&mut tree.children, &selected);
    for &id in &selected {
        clusters.remove(id);
    }

    doc.tree = tree;
    doc.clusters = clusters;
    Ok(selected.len())
}

/// Full delete: remove each subtree entirely, discarding descendants.
/// Cluster bindings of every removed node are dropped.
pub fn remove_subtrees(doc: &mut Document, ids: &[NodeId]) -> Result<usize, EngineError> {
    let selected: HashSet<NodeId> = ids.iter().copied().collect();
    if selected.is_empty() {
        return Ok(0);
    }
    validate_selection(doc, &selected)?;

    let mut tree = doc.tree.clone();
    let mut clusters = doc.clusters.clone();
    let mut removed = 0;
    for &id in ids {
        // Ids nested under an earlier removal are already gone.
        if let Some(subtree) = detach_subtree(&mut tree, id) {
            for node_id in collect_ids(&subtree) {
                clusters.remove(node_id);
            }
            removed += 1;
        }
    }

    doc.tree = tree;
    doc.clusters = clusters;
    Ok(removed)
}

/// Multi-node move/delete with target insertion.
///
/// 1. Partition the selection into move and delete sets.
/// 2. Extract the preserved hierarchy for the move set: content copies
///    (children discarded), each re-attached under the copy of its
///    nearest selected ancestor. Selecting a grandparent and a
///    grandchild without the parent nests the grandchild directly
///    under the grandparent.
/// 3. Prune the union from the live tree, splicing non-selected
///    descendants into the vacated slots.
/// 4. Attach the extracted forest under the target, expand it, and
///    re-tag the attached nodes with the target's cluster label.
///
/// Pruning strictly precedes attaching; a target nested inside the
/// deleted set is rejected up front, so the prune cannot take the
/// attach point with it.
pub fn classify_and_apply(
    doc: &mut Document,
    selection: &HashMap<NodeId, SelectionAction>,
    target: Option<NodeId>,
) -> Result<ClassifyOutcome, EngineError> {
    if selection.is_empty() {
        return Ok(ClassifyOutcome {
            moved: 0,
            deleted: 0,
        });
    }
    let union: HashSet<NodeId> = selection.keys().copied().collect();
    validate_selection(doc, &union)?;

    let to_move: HashSet<NodeId> = selection
        .iter()
        .filter(|(_, action)| **action == SelectionAction::Move)
        .map(|(id, _)| *id)
        .collect();
    let deleted = union.len() - to_move.len();

    let target_id = if to_move.is_empty() {
        None
    } else {
        let target_id = target
            .ok_or_else(|| EngineError::validation("moving a selection requires a target node"))?;
        if union.contains(&target_id) {
            return Err(EngineError::validation(
                "the target cannot be part of the moved or deleted selection",
            ));
        }
        if find_node(&doc.tree, target_id).is_none() {
            return Err(EngineError::validation(format!(
                "target node {} not found",
                target_id
            )));
        }
        Some(target_id)
    };

    let mut tree = doc.tree.clone();
    let mut clusters = doc.clusters.clone();

    let forest = build_preserved_forest(&tree, &to_move)?;

    prune_selected(&mut tree.children, &union);
    for &id in &union {
        clusters.remove(id);
    }

    if let Some(target_id) = target_id {
        let label = clusters.label_of(target_id).map(str::to_string);
        for root in &forest {
            clusters.retag_subtree(root, label.as_deref());
        }
        let target_node = find_node_mut(&mut tree, target_id).ok_or_else(|| {
            EngineError::integrity(format!("target {} disappeared during pruning", target_id))
        })?;
        target_node.children.extend(forest);
        target_node.is_expanded = true;
    }

    doc.tree = tree;
    doc.clusters = clusters;
    Ok(ClassifyOutcome {
        moved: to_move.len(),
        deleted,
    })
}

/// Clone the template's subtree next to every node sharing its exact
/// text. Each clone gets fresh ids, the new text on its root, and its
/// own match's cluster label.
pub fn duplicate_by_template_name(
    doc: &mut Document,
    template_id: NodeId,
    new_text: &str,
) -> Result<DuplicateOutcome, EngineError> {
    let template = find_node(&doc.tree, template_id)
        .ok_or_else(|| EngineError::validation(format!("template node {} not found", template_id)))?;
    let template_text = template.content.text.clone();
    // Blob payloads never travel through structural algorithms.
    let template_snapshot = template.export_clone();

    let root_id = doc.root_id();
    let matches: Vec<NodeId> = matching_ids(&doc.tree, &template_text)
        .into_iter()
        .filter(|&id| id != root_id)
        .collect();
    if matches.is_empty() {
        return Err(EngineError::validation(
            "the root cannot be duplicated as a sibling",
        ));
    }

    let mut tree = doc.tree.clone();
    let mut clusters = doc.clusters.clone();
    let mut counter = doc.counter.clone();
    let mut created = Vec::with_capacity(matches.len());

    for match_id in matches {
        let label = clusters.label_of(match_id).map(str::to_string);
        let mut clone = clone_subtree(&template_snapshot, &mut counter);
        clone.content.text = new_text.to_string();
        if let Some(label) = label.as_deref() {
            clusters.retag_subtree(&clone, Some(label));
        }
        created.push(clone.id);

        let parent = find_parent_mut(&mut tree, match_id).ok_or_else(|| {
            EngineError::integrity(format!("match {} lost its parent", match_id))
        })?;
        let index = parent
            .children
            .iter()
            .position(|child| child.id == match_id)
            .ok_or_else(|| {
                EngineError::integrity(format!("match {} missing from its parent", match_id))
            })?;
        parent.children.insert(index + 1, clone);
    }

    doc.tree = tree;
    doc.clusters = clusters;
    doc.counter = counter;
    Ok(DuplicateOutcome { created })
}

/// Ids of all nodes whose text equals `text`, pre-order.
pub fn matching_ids(tree: &Node, text: &str) -> Vec<NodeId> {
    let mut ids = Vec::new();
    fn walk(node: &Node, text: &str, out: &mut Vec<NodeId>) {
        if node.content.text == text {
            out.push(node.id);
        }
        for child in &node.children {
            walk(child, text, out);
        }
    }
    walk(tree, text, &mut ids);
    ids
}

/// The selection must not contain the root and every id must exist.
fn validate_selection(doc: &Document, selected: &HashSet<NodeId>) -> Result<(), EngineError> {
    if selected.contains(&doc.root_id()) {
        return Err(EngineError::validation(
            "the root cannot be moved or deleted",
        ));
    }
    for &id in selected {
        if find_node(&doc.tree, id).is_none() {
            return Err(EngineError::validation(format!("node {} not found", id)));
        }
    }
    Ok(())
}

/// Remove every selected node from `children`, splicing its
/// non-selected descendants into the vacated position. A single
/// recursive pass; child-of-child promotion repeats as deep as the
/// selection nests.
fn prune_selected(children: &mut Vec<Node>, selected: &HashSet<NodeId>) {
    let drained = std::mem::take(children);
    for mut child in drained {
        if selected.contains(&child.id) {
            let mut orphans = std::mem::take(&mut child.children);
            prune_selected(&mut orphans, selected);
            children.extend(orphans);
        } else {
            prune_selected(&mut child.children, selected);
            children.push(child);
        }
    }
}

/// Content copies of the move set, nested by nearest selected ancestor.
/// Ids with no selected ancestor become forest roots.
fn build_preserved_forest(
    tree: &Node,
    to_move: &HashSet<NodeId>,
) -> Result<Vec<Node>, EngineError> {
    if to_move.is_empty() {
        return Ok(Vec::new());
    }
    let ordered: Vec<NodeId> = collect_ids(tree)
        .into_iter()
        .filter(|id| to_move.contains(id))
        .collect();

    let mut children_of: HashMap<NodeId, Vec<NodeId>> = HashMap::new();
    let mut roots: Vec<NodeId> = Vec::new();
    for &id in &ordered {
        match nearest_selected_ancestor(tree, id, to_move) {
            Some(ancestor) => children_of.entry(ancestor).or_default().push(id),
            None => roots.push(id),
        }
    }

    fn build(
        tree: &Node,
        id: NodeId,
        children_of: &HashMap<NodeId, Vec<NodeId>>,
    ) -> Result<Node, EngineError> {
        let source = find_node(tree, id).ok_or_else(|| {
            EngineError::integrity(format!("selected node {} vanished during extraction", id))
        })?;
        let mut copy = Node {
            id: source.id,
            content: source.content.clone(),
            children: Vec::new(),
            is_expanded: true,
        };
        if let Some(nested) = children_of.get(&id) {
            for &child_id in nested {
                copy.children.push(build(tree, child_id, children_of)?);
            }
        }
        Ok(copy)
    }

    roots
        .iter()
        .map(|&id| build(tree, id, &children_of))
        .collect()
}
