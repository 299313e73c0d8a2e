//! Undo/redo history: full-state snapshots on a bounded stack.
//!
//! A snapshot is an explicit structural deep copy of the document (tree,
//! id counter, cluster overlay, blob tables, active cluster), not a JSON
//! round-trip, so non-JSON-safe future field types survive. Snapshots
//! are pushed only for commands on an allow-list; this keeps keystroke
//! noise out of the history.

use crate::document::Document;

/// Maximum retained snapshots. Older entries fall off the front.
pub const MAX_HISTORY: usize = 50;

/// What kind of edit a commit describes. Only structural, classification
/// and cluster edits snapshot by default; content and view edits need
/// `force`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditKind {
    /// Move/delete/duplicate/restructure of nodes.
    Structure,
    /// Classification flag toggles.
    Classification,
    /// Cluster assignment changes.
    Cluster,
    /// Text and field edits.
    Content,
    /// Expansion, theme, filter changes.
    View,
}

impl EditKind {
    pub fn snapshots(&self) -> bool {
        matches!(
            self,
            EditKind::Structure | EditKind::Classification | EditKind::Cluster
        )
    }
}

/// Immutable deep copy of the full document state.
#[derive(Debug, Clone)]
pub struct Snapshot {
    state: Document,
}

impl Snapshot {
    pub fn capture(doc: &Document) -> Self {
        Snapshot { state: doc.clone() }
    }

    /// Replace the live document wholesale by substitution, not merge.
    pub fn restore_into(&self, doc: &mut Document) {
        *doc = self.state.clone();
    }

    pub fn document(&self) -> &Document {
        &self.state
    }
}

#[derive(Debug, Default)]
pub struct HistoryManager {
    stack: Vec<Snapshot>,
    /// Index of the snapshot describing the current state.
    cursor: usize,
}

impl HistoryManager {
    pub fn new() -> Self {
        HistoryManager::default()
    }

    /// Drop all history and record `doc` as the initial state.
    pub fn reset(&mut self, doc: &Document) {
        self.stack.clear();
        self.stack.push(Snapshot::capture(doc));
        self.cursor = 0;
    }

    /// Record the document state after a mutation. Returns whether a
    /// snapshot was pushed. Pushing after an undo truncates the forward
    /// (redo) history.
    pub fn commit(&mut self, doc: &Document, kind: EditKind, force: bool) -> bool {
        if !force && !kind.snapshots() {
            return false;
        }
        if !self.stack.is_empty() {
            self.stack.truncate(self.cursor + 1);
        }
        self.stack.push(Snapshot::capture(doc));
        if self.stack.len() > MAX_HISTORY {
            self.stack.remove(0);
        }
        self.cursor = self.stack.len() - 1;
        true
    }

    pub fn can_undo(&self) -> bool {
        self.cursor > 0
    }

    pub fn can_redo(&self) -> bool {
        !self.stack.is_empty() && self.cursor + 1 < self.stack.len()
    }

    /// Step back one snapshot. `None` at the oldest retained state.
    pub fn undo(&mut self) -> Option<Snapshot> {
        if !self.can_undo() {
            return None;
        }
        self.cursor -= 1;
        Some(self.stack[self.cursor].clone())
    }

    /// Step forward one snapshot. `None` at the newest state.
    pub fn redo(&mut self) -> Option<Snapshot> {
        if !self.can_redo() {
            return None;
        }
        self.cursor += 1;
        Some(self.stack[self.cursor].clone())
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }
}
