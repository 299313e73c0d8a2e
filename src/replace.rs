//! Name-keyed content replacement.
//!
//! Replacement plans are keyed by node *text* and applied to every node
//! in the tree sharing that text, in a single bottom-up pass. A fixed
//! set of sticky fields (files, sub-blocks, position, classification)
//! is always carried forward from the node's own prior content rather
//! than the replacement source, so attachments and flags survive a
//! personnel rotation.

use crate::document::Document;
use crate::error::EngineError;
use crate::node::{clone_subtree, Node, NodeClass, NodeContent, NodeId};
use crate::traversal::{collect_ids, detach_subtree, find_node, find_node_mut, find_parent_mut};
use serde::Serialize;
use std::collections::HashMap;

/// Result of a replacement pass.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReplaceOutcome {
    pub replaced: usize,
}

/// Result of a finished liquidation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiquidationOutcome {
    pub removed: usize,
    pub attached: usize,
}

/// Replace a node's content wholesale, keeping its own sticky fields.
fn replace_content_sticky(node: &mut Node, source: &NodeContent) {
    let files = std::mem::take(&mut node.content.files);
    let sub_blocks = std::mem::take(&mut node.content.sub_blocks);
    let position = node.content.position.take();
    let class = node.content.class;
    let master_id = node.content.master_id;

    node.content = source.clone();
    node.content.files = files;
    node.content.sub_blocks = sub_blocks;
    node.content.position = position;
    node.content.class = class;
    node.content.master_id = master_id;
}

/// Bottom-up pass: children first, then the node itself, so a parent's
/// renamed text cannot create fresh matches mid-walk.
fn apply_plan(node: &mut Node, plan: &HashMap<String, NodeContent>) -> usize {
    let mut replaced = 0;
    for child in &mut node.children {
        replaced += apply_plan(child, plan);
    }
    if let Some(source) = plan.get(&node.content.text) {
        replace_content_sticky(node, source);
        replaced += 1;
    }
    replaced
}

/// A chain member may not be protected and no two members may share a
/// text (a cycle of one is ambiguous).
fn validate_chain(doc: &Document, chain: &[NodeId]) -> Result<Vec<(String, NodeContent)>, EngineError> {
    if chain.is_empty() {
        return Err(EngineError::validation("the replacement chain is empty"));
    }
    let mut members = Vec::with_capacity(chain.len());
    for &id in chain {
        let node = find_node(&doc.tree, id)
            .ok_or_else(|| EngineError::validation(format!("chain member {} not found", id)))?;
        if node.content.class.is_protected() {
            return Err(EngineError::validation(format!(
                "'{}' is flagged {} and cannot be replaced",
                node.content.text,
                node.content.class.as_str()
            )));
        }
        members.push((node.content.text.clone(), node.content.clone()));
    }
    for (i, (text, _)) in members.iter().enumerate() {
        if members.iter().skip(i + 1).any(|(other, _)| other == text) {
            return Err(EngineError::validation(format!(
                "two chain members share the name '{}'",
                text
            )));
        }
    }
    Ok(members)
}

/// Circular replacement over a chain of node ids: every node named like
/// chain member i takes member i+1's content; nodes named like the last
/// member take the fixed organizational-event content.
pub fn circular_replace(doc: &mut Document, chain: &[NodeId]) -> Result<ReplaceOutcome, EngineError> {
    let members = validate_chain(doc, chain)?;

    let mut plan: HashMap<String, NodeContent> = HashMap::new();
    for window in members.windows(2) {
        plan.insert(window[0].0.clone(), window[1].1.clone());
    }
    if let Some((last_text, _)) = members.last() {
        plan.insert(last_text.clone(), NodeContent::organizational_event());
    }

    let mut tree = doc.tree.clone();
    let replaced = apply_plan(&mut tree, &plan);
    doc.tree = tree;
    println!("[Replace] circular chain of {} applied to {} nodes", members.len(), replaced);
    Ok(ReplaceOutcome { replaced })
}

/// Two-name swap: all nodes named like `a` take `b`'s content and vice
/// versa, sticky fields preserved on every target.
pub fn paired_swap(doc: &mut Document, a: NodeId, b: NodeId) -> Result<ReplaceOutcome, EngineError> {
    if a == b {
        return Err(EngineError::validation("cannot swap a node with itself"));
    }
    let members = validate_chain(doc, &[a, b])?;

    let mut plan: HashMap<String, NodeContent> = HashMap::new();
    plan.insert(members[0].0.clone(), members[1].1.clone());
    plan.insert(members[1].0.clone(), members[0].1.clone());

    let mut tree = doc.tree.clone();
    let replaced = apply_plan(&mut tree, &plan);
    doc.tree = tree;
    Ok(ReplaceOutcome { replaced })
}

/// Propagate the source node's content to every node named like the
/// target, then remove the source. The source must have no children of
/// its own (they would be silently discarded otherwise).
pub fn replace_with_delete(
    doc: &mut Document,
    source: NodeId,
    target: NodeId,
) -> Result<ReplaceOutcome, EngineError> {
    if source == doc.root_id() {
        return Err(EngineError::validation("the root cannot be replaced away"));
    }
    let members = validate_chain(doc, &[source, target])?;
    let source_node = find_node(&doc.tree, source)
        .ok_or_else(|| EngineError::validation(format!("node {} not found", source)))?;
    if !source_node.children.is_empty() {
        return Err(EngineError::validation(
            "the source of a replace-with-delete still has subordinates",
        ));
    }

    let mut plan: HashMap<String, NodeContent> = HashMap::new();
    plan.insert(members[1].0.clone(), members[0].1.clone());

    let mut tree = doc.tree.clone();
    let mut clusters = doc.clusters.clone();
    let replaced = apply_plan(&mut tree, &plan);
    detach_subtree(&mut tree, source).ok_or_else(|| {
        EngineError::integrity(format!("source {} vanished during replacement", source))
    })?;
    clusters.remove(source);

    doc.tree = tree;
    doc.clusters = clusters;
    Ok(ReplaceOutcome { replaced })
}

/// Mass liquidation across name-duplicates.
///
/// Collects every node sharing the representative's text and hands out
/// one detached working copy at a time for manual subtree editing.
/// Confirmed copies accumulate; `finish` removes the originals in one
/// pass and appends the accumulated results under a chosen target.
/// Dropping the session before `finish` discards all working state and
/// leaves the tree untouched.
#[derive(Debug)]
pub struct LiquidationSession {
    text: String,
    originals: Vec<NodeId>,
    pending: Vec<Node>,
    current: Option<Node>,
    accumulated: Vec<Node>,
    finished: bool,
}

impl LiquidationSession {
    /// Start a session from a representative node. Every duplicate of
    /// its text (the representative included) joins the queue.
    pub fn begin(doc: &Document, representative: NodeId) -> Result<Self, EngineError> {
        let node = find_node(&doc.tree, representative).ok_or_else(|| {
            EngineError::validation(format!("node {} not found", representative))
        })?;
        let text = node.content.text.clone();
        let originals: Vec<NodeId> = crate::restructure::matching_ids(&doc.tree, &text)
            .into_iter()
            .filter(|&id| id != doc.root_id())
            .collect();
        if originals.is_empty() {
            return Err(EngineError::validation(
                "the root cannot be liquidated",
            ));
        }

        // Working copies are detached up front; blob payloads never
        // travel through structural algorithms.
        let mut pending: Vec<Node> = Vec::with_capacity(originals.len());
        for &id in originals.iter().rev() {
            let source = find_node(&doc.tree, id).ok_or_else(|| {
                EngineError::integrity(format!("duplicate {} vanished while detaching", id))
            })?;
            pending.push(source.export_clone());
        }
        let current = pending.pop();
        Ok(LiquidationSession {
            text,
            originals,
            pending,
            current,
            accumulated: Vec::new(),
            finished: false,
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Duplicates not yet confirmed, the current working copy included.
    pub fn remaining(&self) -> usize {
        self.pending.len() + usize::from(self.current.is_some())
    }

    pub fn is_complete(&self) -> bool {
        self.current.is_none() && self.pending.is_empty()
    }

    /// The working copy currently open for editing.
    pub fn working(&self) -> Option<&Node> {
        self.current.as_ref()
    }

    pub fn working_mut(&mut self) -> Option<&mut Node> {
        self.current.as_mut()
    }

    /// Delete a node inside the working copy, promoting its children
    /// into its slot. The working copy's own root cannot be removed.
    pub fn delete_promote(&mut self, id: NodeId) -> Result<(), EngineError> {
        let working = self.require_working()?;
        if working.id == id {
            return Err(EngineError::validation(
                "the working copy root cannot be deleted",
            ));
        }
        let parent = find_parent_mut(working, id)
            .ok_or_else(|| EngineError::validation(format!("node {} not in the working copy", id)))?;
        let index = parent
            .children
            .iter()
            .position(|child| child.id == id)
            .ok_or_else(|| EngineError::integrity(format!("node {} missing from its parent", id)))?;
        let removed = parent.children.remove(index);
        for (offset, child) in removed.children.into_iter().enumerate() {
            parent.children.insert(index + offset, child);
        }
        Ok(())
    }

    /// Clone a node of the working copy as its next sibling, with fresh
    /// ids drawn from the document counter.
    pub fn duplicate(&mut self, doc: &mut Document, id: NodeId) -> Result<NodeId, EngineError> {
        let working = self
            .current
            .as_mut()
            .ok_or_else(|| EngineError::validation("no working copy open"))?;
        if working.id == id {
            return Err(EngineError::validation(
                "the working copy root cannot be duplicated",
            ));
        }
        let parent = find_parent_mut(working, id)
            .ok_or_else(|| EngineError::validation(format!("node {} not in the working copy", id)))?;
        let index = parent
            .children
            .iter()
            .position(|child| child.id == id)
            .ok_or_else(|| EngineError::integrity(format!("node {} missing from its parent", id)))?;
        let clone = clone_subtree(&parent.children[index], &mut doc.counter);
        let clone_id = clone.id;
        parent.children.insert(index + 1, clone);
        Ok(clone_id)
    }

    /// Move a node to a new index among its siblings in the working copy.
    pub fn reorder(&mut self, id: NodeId, new_index: usize) -> Result<(), EngineError> {
        let working = self.require_working()?;
        let parent = find_parent_mut(working, id)
            .ok_or_else(|| EngineError::validation(format!("node {} not in the working copy", id)))?;
        let index = parent
            .children
            .iter()
            .position(|child| child.id == id)
            .ok_or_else(|| EngineError::integrity(format!("node {} missing from its parent", id)))?;
        let node = parent.children.remove(index);
        let at = new_index.min(parent.children.len());
        parent.children.insert(at, node);
        Ok(())
    }

    /// Accept the current working copy and open the next one. Returns
    /// whether another duplicate is waiting.
    pub fn confirm(&mut self) -> Result<bool, EngineError> {
        let done = self.require_working_owned()?;
        self.accumulated.push(done);
        self.current = self.pending.pop();
        Ok(self.current.is_some())
    }

    /// Remove all originals and append the accumulated results as
    /// children of `target`, re-tagged to the target's label. The
    /// session stays usable (with its accumulated copies) if the target
    /// is invalid.
    pub fn finish(&mut self, doc: &mut Document, target: NodeId) -> Result<LiquidationOutcome, EngineError> {
        if self.finished {
            return Err(EngineError::validation("the liquidation already finished"));
        }
        if !self.is_complete() {
            return Err(EngineError::validation(format!(
                "{} duplicates are still unconfirmed",
                self.remaining()
            )));
        }
        if self.originals.contains(&target) {
            return Err(EngineError::validation(
                "the target cannot be one of the liquidated duplicates",
            ));
        }
        let target_node = find_node(&doc.tree, target)
            .ok_or_else(|| EngineError::validation(format!("target node {} not found", target)))?;
        for &id in &self.originals {
            if crate::traversal::is_descendant(
                find_node(&doc.tree, id).ok_or_else(|| {
                    EngineError::validation(format!("duplicate {} no longer exists", id))
                })?,
                target_node.id,
            ) {
                return Err(EngineError::validation(
                    "the target sits inside a liquidated subtree",
                ));
            }
        }

        let mut tree = doc.tree.clone();
        let mut clusters = doc.clusters.clone();
        let mut removed = 0;
        for &id in &self.originals {
            if let Some(subtree) = detach_subtree(&mut tree, id) {
                for node_id in collect_ids(&subtree) {
                    clusters.remove(node_id);
                }
                removed += 1;
            }
        }

        let label = clusters.label_of(target).map(str::to_string);
        let accumulated = std::mem::take(&mut self.accumulated);
        for node in &accumulated {
            clusters.retag_subtree(node, label.as_deref());
        }
        let attached = accumulated.len();
        let target_node = find_node_mut(&mut tree, target).ok_or_else(|| {
            EngineError::integrity(format!("target {} disappeared during liquidation", target))
        })?;
        target_node.children.extend(accumulated);
        target_node.is_expanded = true;

        doc.tree = tree;
        doc.clusters = clusters;
        self.finished = true;
        println!(
            "[Replace] liquidated {} duplicates of '{}' into node {}",
            removed, self.text, target
        );
        Ok(LiquidationOutcome { removed, attached })
    }

    fn require_working(&mut self) -> Result<&mut Node, EngineError> {
        self.current
            .as_mut()
            .ok_or_else(|| EngineError::validation("no working copy open"))
    }

    fn require_working_owned(&mut self) -> Result<Node, EngineError> {
        self.current
            .take()
            .ok_or_else(|| EngineError::validation("no working copy open"))
    }
}

/// Protected classes refuse replacement; exposed for callers that need
/// to pre-check a candidate before building a chain.
pub fn is_protected(class: NodeClass) -> bool {
    class.is_protected()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::Document;
    use crate::node::FileAttachment;

    /// root(1) -> ivanov(2), petrov(3), sidorov(4); a second "Ivanov"
    /// leaf (5) under petrov.
    fn staffed_doc() -> Document {
        let mut doc = Document::new("root");
        let ivanov = doc.add_child(1, "Ivanov").unwrap();
        let petrov = doc.add_child(1, "Petrov").unwrap();
        doc.add_child(1, "Sidorov").unwrap();
        doc.add_child(petrov, "Ivanov").unwrap();

        let node = find_node_mut(&mut doc.tree, ivanov).unwrap();
        node.content.position = Some("Director".to_string());
        node.content.sub_blocks.push("keeps the seal".to_string());
        node.content.files.push(FileAttachment {
            id: "f1".to_string(),
            name: "contract.pdf".to_string(),
            data: String::new(),
        });
        node.content.toggle_class(NodeClass::Authority);
        doc
    }

    #[test]
    fn test_circular_replace_shifts_contents() {
        let mut doc = staffed_doc();
        // Ivanov <- Petrov <- Sidorov <- organizational event.
        circular_replace(&mut doc, &[2, 3, 4]).unwrap();

        // Both nodes named Ivanov took Petrov's content.
        assert_eq!(find_node(&doc.tree, 2).unwrap().content.text, "Petrov");
        assert_eq!(find_node(&doc.tree, 5).unwrap().content.text, "Petrov");
        assert_eq!(find_node(&doc.tree, 3).unwrap().content.text, "Sidorov");
        // The last chain member becomes the synthetic placeholder.
        assert_eq!(
            find_node(&doc.tree, 4).unwrap().content.text,
            "Organizational event"
        );
    }

    #[test]
    fn test_sticky_fields_survive_replacement() {
        let mut doc = staffed_doc();
        circular_replace(&mut doc, &[2, 3]).unwrap();

        let node = find_node(&doc.tree, 2).unwrap();
        assert_eq!(node.content.text, "Petrov");
        // Own position, sub-blocks, files and class stay put.
        assert_eq!(node.content.position.as_deref(), Some("Director"));
        assert_eq!(node.content.sub_blocks, vec!["keeps the seal".to_string()]);
        assert_eq!(node.content.files[0].name, "contract.pdf");
        assert_eq!(node.content.class, NodeClass::Authority);
    }

    #[test]
    fn test_chain_rejects_protected_and_duplicate_names() {
        let mut doc = staffed_doc();
        find_node_mut(&mut doc.tree, 3)
            .unwrap()
            .content
            .toggle_class(NodeClass::Okr);
        let err = circular_replace(&mut doc, &[2, 3]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));

        // Two members named "Ivanov" are ambiguous.
        find_node_mut(&mut doc.tree, 3)
            .unwrap()
            .content
            .toggle_class(NodeClass::Okr);
        let err = circular_replace(&mut doc, &[2, 5]).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        // The tree was not touched by either refusal.
        assert_eq!(find_node(&doc.tree, 2).unwrap().content.text, "Ivanov");
    }

    #[test]
    fn test_paired_swap() {
        let mut doc = staffed_doc();
        paired_swap(&mut doc, 3, 4).unwrap();
        assert_eq!(find_node(&doc.tree, 3).unwrap().content.text, "Sidorov");
        assert_eq!(find_node(&doc.tree, 4).unwrap().content.text, "Petrov");
    }

    #[test]
    fn test_replace_with_delete() {
        let mut doc = staffed_doc();
        // Sidorov (childless) replaces every Ivanov and leaves the tree.
        replace_with_delete(&mut doc, 4, 2).unwrap();
        assert!(find_node(&doc.tree, 4).is_none());
        assert_eq!(find_node(&doc.tree, 2).unwrap().content.text, "Sidorov");
        assert_eq!(find_node(&doc.tree, 5).unwrap().content.text, "Sidorov");
    }

    #[test]
    fn test_replace_with_delete_requires_childless_source() {
        let mut doc = staffed_doc();
        // Petrov has a child and cannot be liquidated this way.
        let err = replace_with_delete(&mut doc, 3, 2).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert!(find_node(&doc.tree, 3).is_some());
    }

    #[test]
    fn test_liquidation_accumulate_and_finish() {
        let mut doc = staffed_doc();
        let mut session = LiquidationSession::begin(&doc, 2).unwrap();
        assert_eq!(session.text(), "Ivanov");
        assert_eq!(session.remaining(), 2);

        // First working copy: keep as is.
        assert!(session.confirm().unwrap());
        // Second: edit before confirming.
        session.working_mut().unwrap().content.position = Some("acting".to_string());
        assert!(!session.confirm().unwrap());
        assert!(session.is_complete());

        let outcome = session.finish(&mut doc, 4).unwrap();
        assert_eq!(outcome.removed, 2);
        assert_eq!(outcome.attached, 2);

        // Originals are gone; the edited copies hang under Sidorov.
        assert!(find_node(&doc.tree, 2).is_none());
        let target = find_node(&doc.tree, 4).unwrap();
        assert_eq!(target.children.len(), 2);
        assert!(target
            .children
            .iter()
            .any(|c| c.content.position.as_deref() == Some("acting")));
    }

    #[test]
    fn test_liquidation_working_copy_edits() {
        let mut doc = Document::new("root");
        let dept = doc.add_child(1, "Dept").unwrap();
        let staff = doc.add_child(dept, "Staff").unwrap();
        doc.add_child(staff, "Clerk").unwrap();

        let mut session = LiquidationSession::begin(&doc, dept).unwrap();
        // Promote Clerk by deleting Staff inside the working copy.
        session.delete_promote(staff).unwrap();
        let working = session.working().unwrap();
        assert_eq!(working.children.len(), 1);
        assert_eq!(working.children[0].content.text, "Clerk");

        // Duplicate Clerk; fresh id comes from the document counter.
        let clerk_id = working.children[0].id;
        let clone_id = session.duplicate(&mut doc, clerk_id).unwrap();
        assert_ne!(clone_id, clerk_id);
        assert_eq!(session.working().unwrap().children.len(), 2);

        // Reorder the clone to the front.
        session.reorder(clone_id, 0).unwrap();
        assert_eq!(session.working().unwrap().children[0].id, clone_id);
    }

    #[test]
    fn test_liquidation_abort_leaves_tree_untouched() {
        let mut doc = staffed_doc();
        let before = doc.tree.clone();
        {
            let mut session = LiquidationSession::begin(&doc, 2).unwrap();
            session.working_mut().unwrap().content.text = "scribble".to_string();
            // Dropped without finish.
        }
        assert_eq!(doc.tree, before);

        // Unconfirmed duplicates also block finish.
        let mut session = LiquidationSession::begin(&doc, 2).unwrap();
        session.confirm().unwrap();
        let err = session.finish(&mut doc, 4).unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)));
        assert_eq!(doc.tree, before);
    }
}
