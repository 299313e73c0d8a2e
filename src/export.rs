//! Versioned document JSON and the internal clipboard payload.
//!
//! The export format carries the full engine state: serialized tree
//! (blob payloads cleared), image and file tables, cluster overlay as
//! explicit pairs, and settings. Import rejects unknown or
//! older-than-supported versions with a descriptive error instead of
//! silently corrupting state; the caller's previous in-memory document
//! stays authoritative on failure.

use crate::document::{Document, FileMeta};
use crate::error::EngineError;
use crate::node::{clone_subtree, IdCounter, Node, NodeId};
use crate::traversal::{collect_ids, find_node, find_node_mut};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

/// Version written by this engine.
pub const DOCUMENT_VERSION: &str = "2.8";

/// Versions import will accept.
pub const SUPPORTED_VERSIONS: &[&str] = &["2.6", "2.7", "2.8"];

/// Clipboard payloads older than this are stale.
pub const CLIPBOARD_STALE_MS: i64 = 60 * 60 * 1000;

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExportSettings {
    #[serde(default)]
    pub node_counter: NodeId,
    #[serde(default)]
    pub dark_mode: bool,
    #[serde(default)]
    pub active_cluster: Option<String>,
}

/// Provenance block stamped onto documents fetched from elsewhere.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportMetadata {
    #[serde(default)]
    pub source: Option<String>,
    #[serde(default)]
    pub loaded_at: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentExport {
    pub version: String,
    pub tree: Node,
    #[serde(default)]
    pub images: HashMap<String, String>,
    #[serde(default)]
    pub files_data: HashMap<String, FileMeta>,
    /// Cluster overlay as explicit (node id, label) pairs.
    #[serde(default)]
    pub clusters: Vec<(NodeId, String)>,
    #[serde(default)]
    pub available_clusters: Vec<String>,
    #[serde(default)]
    pub settings: ExportSettings,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<ImportMetadata>,
}

impl DocumentExport {
    /// Stamp provenance onto a fetched document.
    pub fn with_source(mut self, source: &str, url: Option<&str>) -> Self {
        self.metadata = Some(ImportMetadata {
            source: Some(source.to_string()),
            loaded_at: Some(Utc::now().to_rfc3339()),
            url: url.map(str::to_string),
        });
        self
    }
}

/// Serialize a single node (and subtree) into a plain JSON record,
/// blob payloads cleared.
pub fn serialize_node(node: &Node) -> Result<serde_json::Value, EngineError> {
    serde_json::to_value(node.export_clone())
        .map_err(|e| EngineError::Import(format!("failed to serialize node {}: {}", node.id, e)))
}

/// Restore a node from a plain record, substituting documented defaults
/// for missing optional fields.
pub fn restore_node(record: &serde_json::Value) -> Result<Node, EngineError> {
    serde_json::from_value(record.clone())
        .map_err(|e| EngineError::Import(format!("malformed node record: {}", e)))
}

/// Serialize the document into the export record. File blob payloads
/// are cleared from the tree copy; they live in the blob store.
pub fn export_document(doc: &Document) -> DocumentExport {
    DocumentExport {
        version: DOCUMENT_VERSION.to_string(),
        tree: doc.tree.export_clone(),
        images: doc.images.clone(),
        files_data: doc.files_data.clone(),
        clusters: doc.clusters.entries(),
        available_clusters: doc.clusters.available().to_vec(),
        settings: ExportSettings {
            node_counter: doc.counter.peek(),
            dark_mode: doc.dark_mode,
            active_cluster: doc.active_cluster.clone(),
        },
        timestamp: Some(Utc::now().to_rfc3339()),
        metadata: None,
    }
}

pub fn export_json(doc: &Document, pretty: bool) -> Result<String, EngineError> {
    let export = export_document(doc);
    let result = if pretty {
        serde_json::to_string_pretty(&export)
    } else {
        serde_json::to_string(&export)
    };
    result.map_err(|e| EngineError::Import(format!("failed to serialize document: {}", e)))
}

/// Parse an export record from JSON, checking the version gate.
pub fn parse_export(json: &str) -> Result<DocumentExport, EngineError> {
    let export: DocumentExport = serde_json::from_str(json)
        .map_err(|e| EngineError::Import(format!("malformed document JSON: {}", e)))?;
    if !SUPPORTED_VERSIONS.contains(&export.version.as_str()) {
        return Err(EngineError::Import(format!(
            "unsupported document version '{}' (supported: {})",
            export.version,
            SUPPORTED_VERSIONS.join(", ")
        )));
    }
    Ok(export)
}

/// Build a live document from an export record.
///
/// Validates id uniqueness, rebuilds the cluster overlay (stale pairs
/// referencing absent nodes are dropped with a warning), and clamps the
/// id counter above every id present in the tree.
pub fn import_document(export: &DocumentExport) -> Result<Document, EngineError> {
    let ids = collect_ids(&export.tree);
    let mut seen: HashSet<NodeId> = HashSet::with_capacity(ids.len());
    let mut max_id = 0;
    for id in &ids {
        if !seen.insert(*id) {
            return Err(EngineError::Import(format!(
                "corrupt tree: duplicate node id {}",
                id
            )));
        }
        max_id = max_id.max(*id);
    }

    let mut doc = Document::new("");
    doc.tree = export.tree.clone();
    doc.images = export.images.clone();
    doc.files_data = export.files_data.clone();
    doc.dark_mode = export.settings.dark_mode;

    let mut counter = IdCounter::starting_at(export.settings.node_counter.max(1));
    counter.bump_past(max_id);
    doc.counter = counter;

    for (id, label) in &export.clusters {
        if seen.contains(id) {
            doc.clusters.assign(*id, label);
        } else {
            eprintln!(
                "[Import] dropping stale cluster binding {} -> '{}'",
                id, label
            );
        }
    }
    // The active filter only survives if its label still has members.
    doc.active_cluster = export
        .settings
        .active_cluster
        .clone()
        .filter(|label| doc.clusters.available().contains(label));

    Ok(doc)
}

/// Parse and import in one step.
pub fn import_json(json: &str) -> Result<Document, EngineError> {
    let export = parse_export(json)?;
    import_document(&export)
}

/// Internal copy/cut payload. Blob payloads are cleared on capture;
/// pasting clones with fresh ids.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClipboardPayload {
    /// Unix milliseconds at capture.
    pub timestamp: i64,
    pub version: String,
    #[serde(default)]
    pub is_cut_operation: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<Node>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nodes: Option<Vec<Node>>,
    #[serde(default)]
    pub is_multi_copy: bool,
}

impl ClipboardPayload {
    pub fn single(node: &Node, is_cut: bool) -> Self {
        ClipboardPayload {
            timestamp: Utc::now().timestamp_millis(),
            version: DOCUMENT_VERSION.to_string(),
            is_cut_operation: is_cut,
            node: Some(node.export_clone()),
            nodes: None,
            is_multi_copy: false,
        }
    }

    pub fn multi(nodes: &[Node], is_cut: bool) -> Self {
        ClipboardPayload {
            timestamp: Utc::now().timestamp_millis(),
            version: DOCUMENT_VERSION.to_string(),
            is_cut_operation: is_cut,
            node: None,
            nodes: Some(nodes.iter().map(Node::export_clone).collect()),
            is_multi_copy: true,
        }
    }

    /// Consumers must prompt before applying a stale payload.
    pub fn is_stale(&self, now_ms: i64) -> bool {
        now_ms.saturating_sub(self.timestamp) > CLIPBOARD_STALE_MS
    }

    /// Append the payload's nodes under `target` as fresh-id clones.
    /// Returns the new clone root ids.
    pub fn paste_into(
        &self,
        doc: &mut Document,
        target: NodeId,
    ) -> Result<Vec<NodeId>, EngineError> {
        let sources: Vec<&Node> = match (&self.node, &self.nodes) {
            (Some(node), _) => vec![node],
            (None, Some(nodes)) => nodes.iter().collect(),
            (None, None) => {
                return Err(EngineError::validation("the clipboard payload is empty"))
            }
        };
        if find_node(&doc.tree, target).is_none() {
            return Err(EngineError::validation(format!(
                "paste target {} not found",
                target
            )));
        }

        let mut counter = doc.counter.clone();
        let clones: Vec<Node> = sources
            .iter()
            .map(|source| clone_subtree(source, &mut counter))
            .collect();
        let ids: Vec<NodeId> = clones.iter().map(|clone| clone.id).collect();

        let target_node = find_node_mut(&mut doc.tree, target).ok_or_else(|| {
            EngineError::integrity(format!("paste target {} vanished", target))
        })?;
        target_node.children.extend(clones);
        target_node.is_expanded = true;
        doc.counter = counter;
        Ok(ids)
    }
}
