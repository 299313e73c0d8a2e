//! orgtree CLI - command-line interface for the tree engine.
//!
//! Usage: orgtree-cli [OPTIONS] <COMMAND>
//!
//! Documents live in a JSON key-value store under the platform data
//! directory (override with --store). Supports JSON output for
//! scripting.

use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::{generate, Shell};
use orgtree::export::{export_document, export_json, import_document, parse_export};
use orgtree::replace::{circular_replace, paired_swap, replace_with_delete};
use orgtree::restructure::{
    classify_and_apply, delete_and_promote, duplicate_by_template_name, move_node,
    remove_subtrees,
};
use orgtree::search::visible_ids;
use orgtree::traversal::{collect_ids, find_node, node_depth};
use orgtree::{
    DataStore, Document, JsonFileStore, MovePosition, Node, NodeClass, NodeId, SelectionAction,
};
use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "orgtree-cli", about = "Organizational tree editor", version)]
struct Cli {
    /// Store directory (defaults to the platform data directory)
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Document key within the store
    #[arg(long, global = true, default_value = "tree")]
    doc: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create and save a fresh document
    Init {
        /// Start with a bare root instead of the demo tree
        #[arg(long)]
        empty: bool,
        /// Overwrite an existing document under the same key
        #[arg(long)]
        force: bool,
    },
    /// Print the tree
    Show {
        /// Emit the document as JSON instead of the text outline
        #[arg(long)]
        json: bool,
    },
    /// Import a document JSON file into the store
    Import { file: PathBuf },
    /// Export the document JSON
    Export {
        /// Write to a file instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        pretty: bool,
    },
    /// Add a child node under a parent
    Add { parent: NodeId, text: String },
    /// Move a node relative to a target (before | after | child)
    Move {
        node: NodeId,
        target: NodeId,
        #[arg(default_value = "child")]
        position: String,
    },
    /// Delete nodes, promoting their children into the vacated slots
    Delete {
        ids: Vec<NodeId>,
        /// Discard whole subtrees instead of promoting children
        #[arg(long)]
        discard: bool,
    },
    /// Move some nodes and delete others in one restructuring pass
    Restructure {
        /// Node ids to move (hierarchy preserved modulo skipped levels)
        #[arg(long, value_delimiter = ',')]
        r#move: Vec<NodeId>,
        /// Node ids to delete (children promoted)
        #[arg(long, value_delimiter = ',')]
        delete: Vec<NodeId>,
        /// Target that receives the moved nodes
        #[arg(long)]
        target: Option<NodeId>,
    },
    /// Clone a template's subtree next to every node sharing its name
    Duplicate { template: NodeId, new_text: String },
    /// Swap the contents of two names across the whole tree
    Swap { a: NodeId, b: NodeId },
    /// Circular content replacement over a chain of node ids
    Rotate {
        #[arg(value_delimiter = ',')]
        chain: Vec<NodeId>,
    },
    /// Propagate source's content to all nodes named like target, then
    /// remove the source
    ReplaceDelete { source: NodeId, target: NodeId },
    /// Toggle a classification flag on a node
    Classify { id: NodeId, class: String },
    /// Cluster overlay operations
    Cluster {
        #[command(subcommand)]
        action: ClusterCommands,
    },
    /// List nodes visible under a query (and the active cluster filter)
    Search {
        query: String,
        /// Match attached file names too
        #[arg(long)]
        deep: bool,
    },
    /// Generate shell completions
    Completions { shell: Shell },
}

#[derive(Subcommand)]
enum ClusterCommands {
    /// Assign a node to a cluster label
    Assign { id: NodeId, label: String },
    /// Remove a node's cluster assignment
    Remove { id: NodeId },
    /// List known labels and their member counts
    List,
    /// Set (or clear) the active cluster filter
    Activate { label: Option<String> },
}

fn main() {
    let cli = Cli::parse();
    if let Err(e) = run(cli) {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn open_store(path: &Option<PathBuf>) -> Result<JsonFileStore, String> {
    match path {
        Some(path) => JsonFileStore::new(path.clone()),
        None => JsonFileStore::default_location(),
    }
    .map_err(|e| e.to_string())
}

/// Load the document under `key`; absence means a fresh demo document.
fn load_document(store: &JsonFileStore, key: &str) -> Result<Document, String> {
    match store.load_data(key).map_err(|e| e.to_string())? {
        Some(export) => import_document(&export).map_err(|e| e.to_string()),
        None => {
            println!("[CLI] no stored document '{}', starting fresh", key);
            Ok(Document::demo())
        }
    }
}

fn save_document(store: &JsonFileStore, key: &str, doc: &Document) -> Result<(), String> {
    store
        .save_data(key, &export_document(doc))
        .map_err(|e| e.to_string())
}

fn print_tree(doc: &Document, node: &Node, depth: usize) {
    let indent = "  ".repeat(depth);
    let mut line = format!("{}[{}] {}", indent, node.id, node.content.text);
    if let Some(position) = &node.content.position {
        line.push_str(&format!(" <{}>", position));
    }
    if let Some(label) = doc.clusters.label_of(node.id) {
        line.push_str(&format!(" @{}", label));
    }
    if !node.content.class.is_none() {
        line.push_str(&format!(" #{}", node.content.class.as_str()));
    }
    if !node.is_expanded && !node.children.is_empty() {
        line.push_str(&format!(" (+{} hidden)", node.children.len()));
    }
    println!("{}", line);
    for child in &node.children {
        print_tree(doc, child, depth + 1);
    }
}

fn run(cli: Cli) -> Result<(), String> {
    let store = open_store(&cli.store)?;
    let key = cli.doc.as_str();

    match cli.command {
        Commands::Init { empty, force } => {
            if !force && store.load_data(key).map_err(|e| e.to_string())?.is_some() {
                return Err(format!(
                    "document '{}' already exists (use --force to overwrite)",
                    key
                ));
            }
            let doc = if empty {
                Document::new("Organizational structure")
            } else {
                Document::demo()
            };
            save_document(&store, key, &doc)?;
            println!("Created document '{}' with {} nodes", key, doc.node_count());
        }
        Commands::Show { json } => {
            let doc = load_document(&store, key)?;
            if json {
                println!("{}", export_json(&doc, true).map_err(|e| e.to_string())?);
            } else {
                print_tree(&doc, &doc.tree, 0);
                if let Some(label) = &doc.active_cluster {
                    println!("-- active cluster: {}", label);
                }
            }
        }
        Commands::Import { file } => {
            let json = std::fs::read_to_string(&file)
                .map_err(|e| format!("failed to read {:?}: {}", file, e))?;
            let export = parse_export(&json).map_err(|e| e.to_string())?;
            let doc = import_document(&export).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!(
                "Imported document '{}' (version {}, {} nodes)",
                key,
                export.version,
                doc.node_count()
            );
        }
        Commands::Export { output, pretty } => {
            let doc = load_document(&store, key)?;
            let json = export_json(&doc, pretty).map_err(|e| e.to_string())?;
            match output {
                Some(path) => {
                    std::fs::write(&path, json)
                        .map_err(|e| format!("failed to write {:?}: {}", path, e))?;
                    println!("Exported '{}' to {:?}", key, path);
                }
                None => println!("{}", json),
            }
        }
        Commands::Add { parent, text } => {
            let mut doc = load_document(&store, key)?;
            let id = doc.add_child(parent, text).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!("Added node {} under {}", id, parent);
        }
        Commands::Move {
            node,
            target,
            position,
        } => {
            let position = MovePosition::from_str(&position)
                .ok_or_else(|| format!("unknown position '{}'", position))?;
            let mut doc = load_document(&store, key)?;
            move_node(&mut doc, node, target, position).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!("Moved {} {} {}", node, position.as_str(), target);
        }
        Commands::Delete { ids, discard } => {
            let mut doc = load_document(&store, key)?;
            let removed = if discard {
                remove_subtrees(&mut doc, &ids).map_err(|e| e.to_string())?
            } else {
                delete_and_promote(&mut doc, &ids).map_err(|e| e.to_string())?
            };
            save_document(&store, key, &doc)?;
            println!("Deleted {} node(s)", removed);
        }
        Commands::Restructure {
            r#move,
            delete,
            target,
        } => {
            let mut selection: HashMap<NodeId, SelectionAction> = HashMap::new();
            for id in r#move {
                selection.insert(id, SelectionAction::Move);
            }
            for id in delete {
                selection.insert(id, SelectionAction::Delete);
            }
            let mut doc = load_document(&store, key)?;
            let outcome =
                classify_and_apply(&mut doc, &selection, target).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!(
                "Restructured: {} moved, {} deleted",
                outcome.moved, outcome.deleted
            );
        }
        Commands::Duplicate { template, new_text } => {
            let mut doc = load_document(&store, key)?;
            let outcome = duplicate_by_template_name(&mut doc, template, &new_text)
                .map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!(
                "Created {} clone(s): {:?}",
                outcome.created.len(),
                outcome.created
            );
        }
        Commands::Swap { a, b } => {
            let mut doc = load_document(&store, key)?;
            let outcome = paired_swap(&mut doc, a, b).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!("Swapped contents on {} node(s)", outcome.replaced);
        }
        Commands::Rotate { chain } => {
            let mut doc = load_document(&store, key)?;
            let outcome = circular_replace(&mut doc, &chain).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!("Rotated contents on {} node(s)", outcome.replaced);
        }
        Commands::ReplaceDelete { source, target } => {
            let mut doc = load_document(&store, key)?;
            let outcome =
                replace_with_delete(&mut doc, source, target).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!(
                "Replaced {} node(s), removed source {}",
                outcome.replaced, source
            );
        }
        Commands::Classify { id, class } => {
            let class = NodeClass::from_str(&class)
                .ok_or_else(|| format!("unknown classification '{}'", class))?;
            let mut doc = load_document(&store, key)?;
            let active = doc.toggle_class(id, class).map_err(|e| e.to_string())?;
            save_document(&store, key, &doc)?;
            println!("Node {} classification: {}", id, active.as_str());
        }
        Commands::Cluster { action } => {
            let mut doc = load_document(&store, key)?;
            match action {
                ClusterCommands::Assign { id, label } => {
                    if find_node(&doc.tree, id).is_none() {
                        return Err(format!("node {} not found", id));
                    }
                    doc.clusters.assign(id, &label);
                    save_document(&store, key, &doc)?;
                    println!("Node {} -> cluster '{}'", id, label);
                }
                ClusterCommands::Remove { id } => {
                    doc.clusters.remove(id);
                    save_document(&store, key, &doc)?;
                    println!("Node {} unclustered", id);
                }
                ClusterCommands::List => {
                    for label in doc.clusters.available() {
                        println!("{} ({} members)", label, doc.clusters.member_count(label));
                    }
                }
                ClusterCommands::Activate { label } => {
                    if let Some(label) = &label {
                        if !doc.clusters.available().contains(label) {
                            return Err(format!("unknown cluster '{}'", label));
                        }
                    }
                    doc.active_cluster = label.clone();
                    save_document(&store, key, &doc)?;
                    match label {
                        Some(label) => println!("Active cluster: {}", label),
                        None => println!("Cluster filter cleared"),
                    }
                }
            }
        }
        Commands::Search { query, deep } => {
            let doc = load_document(&store, key)?;
            let visible = visible_ids(&doc, &query, deep);
            let mut shown = 0;
            for id in collect_ids(&doc.tree) {
                if visible.contains(&id) {
                    if let Some(node) = find_node(&doc.tree, id) {
                        let depth = node_depth(&doc.tree, id).unwrap_or(0);
                        println!("{}[{}] {}", "  ".repeat(depth), id, node.content.text);
                        shown += 1;
                    }
                }
            }
            println!("-- {} visible node(s)", shown);
        }
        Commands::Completions { shell } => {
            let mut cmd = Cli::command();
            let name = cmd.get_name().to_string();
            generate(shell, &mut cmd, name, &mut io::stdout());
        }
    }
    Ok(())
}
