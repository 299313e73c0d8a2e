//! orgtree - tree mutation and history engine for organizational
//! hierarchies.
//!
//! The engine owns a single labeled tree per document: node model and
//! identity scheme, structural algorithms (move, prune-and-promote,
//! hierarchy-preserving multi-node restructure, circular content
//! replacement, template duplication), a cluster overlay, bounded
//! undo/redo snapshots, and the search/visibility predicate. Rendering,
//! pointer handling, blob storage internals and remote sync are
//! external collaborators behind the interfaces in `storage` and
//! `export`.
//!
//! Everything runs single-threaded and synchronous: each operation
//! completes on the calling thread, validates up front, and either
//! applies fully (including cluster re-tagging) or leaves the document
//! untouched.

pub mod clusters;
pub mod document;
pub mod error;
pub mod export;
pub mod history;
pub mod node;
pub mod replace;
pub mod restructure;
pub mod search;
pub mod storage;
pub mod traversal;

pub use clusters::ClusterMap;
pub use document::{Document, FileMeta};
pub use error::EngineError;
pub use export::{ClipboardPayload, DocumentExport, DOCUMENT_VERSION};
pub use history::{EditKind, HistoryManager, Snapshot, MAX_HISTORY};
pub use node::{Node, NodeClass, NodeContent, NodeId};
pub use replace::LiquidationSession;
pub use restructure::{MovePosition, SelectionAction};
pub use storage::{DataStore, JsonFileStore, MemoryStore};
