//! Depth-first deletion of DCC documents: children are always deleted
//! before their parents so no document is left pointing at a deleted one.
//! A document is kept when anything below it could not be deleted.
//!
//! Failures are collected and reported at the end; there is no retry or
//! rollback, a partial deletion is left as is.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 dcc-delete -u user -p password -s 52d8c92f2d3660b9add954d544a0216e \
//!     -t host_seq_prep --dry-run
//! $ hmp2 dcc-delete-query -u user -p password \
//!     -q '"abundance_matrix"[node_type] && "host_transcriptome"[meta.matrix_type]'
//! ```
use std::collections::HashSet;

use anyhow::Result;
use log::{debug, info, warn};

use super::tree::DocTree;
use super::{Document, DocumentStore};

/// Maximum number of links followed upwards from a query hit.
const MAX_DEPTH: usize = 32;

#[derive(Debug, Default, PartialEq)]
pub struct DeleteReport {
    /// Deleted ids, in deletion order. In a dry run, the ids that would be
    /// deleted.
    pub deleted: Vec<String>,
    /// (id, reason)
    pub failed: Vec<(String, String)>,
    /// Ids left in place because a document below them is still stored.
    pub kept: Vec<String>,
}

impl DeleteReport {
    /// Returns whether the document is gone (or would be, in a dry run).
    fn delete<S: DocumentStore>(&mut self, store: &S, doc: &Document, dry_run: bool) -> bool {
        info!("DELETING NODE: {} ({})", doc.id(), doc.node_type);
        if dry_run {
            self.deleted.push(doc.id().to_owned());
            return true;
        }
        match store.delete(doc) {
            Ok(()) => {
                self.deleted.push(doc.id().to_owned());
                true
            }
            Err(e) => {
                warn!("FAILED TO DELETE NODE: {}: {}", doc.id(), e);
                self.failed.push((doc.id().to_owned(), e.to_string()));
                false
            }
        }
    }

    pub fn log_failures(&self) {
        if !self.failed.is_empty() {
            warn!(
                "The following OSDF nodes were not deleted:\n{}",
                self.failed
                    .iter()
                    .map(|(id, reason)| format!("{}: {}", id, reason))
                    .collect::<Vec<_>>()
                    .join("\n")
            );
        }
    }
}

/// Deletes every node of `tree` in post-order. Connecting nodes, and nodes
/// with a child that failed or was kept, stay in the store. The root is only
/// deleted when `delete_root` is set and everything below it is gone.
pub fn delete_tree<S: DocumentStore>(
    store: &S,
    tree: &DocTree,
    dry_run: bool,
    delete_root: bool,
) -> DeleteReport {
    let mut report = DeleteReport::default();
    let mut remains = vec![false; tree.len()];
    for idx in tree.post_order() {
        let node = tree.node(idx);
        if idx == DocTree::ROOT && !delete_root {
            continue;
        }
        if node.connecting || node.children.iter().any(|&c| remains[c]) {
            if node.connecting {
                debug!("Keeping connecting node {} ({})", node.doc.id(), node.node_type());
            } else {
                warn!("Keeping {} ({}): nodes below it were not deleted.", node.doc.id(), node.node_type());
            }
            remains[idx] = true;
            report.kept.push(node.doc.id().to_owned());
            continue;
        }
        if idx == DocTree::ROOT {
            info!("Deleting root node");
        }
        remains[idx] = !report.delete(store, &node.doc, dry_run);
    }
    report.log_failures();
    report
}

/// The hit followed by its ancestors, up to (excluding) the first document
/// of type `stop_type`.
fn ancestry<S: DocumentStore>(store: &S, hit: Document, stop_type: &str) -> Result<Vec<Document>> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = hit;
    while chain.len() < MAX_DEPTH && seen.insert(current.id().to_owned()) {
        let parent_id = current.parent_id().map(str::to_owned);
        chain.push(current);
        let parent = match parent_id {
            Some(id) => store.load(&id)?,
            None => break,
        };
        if parent.node_type == stop_type {
            break;
        }
        current = parent;
    }
    Ok(chain)
}

fn is_attribute(doc: &Document) -> bool {
    doc.node_type.ends_with("_attr") || doc.node_type.ends_with("_attribute")
}

/// Deletes each document matching `query` together with the chain of
/// documents it was derived from, up to a document of type `stop_type`.
/// Attribute documents are deleted before the document they describe.
pub fn delete_from_query<S: DocumentStore>(
    store: &S,
    query: &str,
    stop_type: &str,
    dry_run: bool,
) -> Result<DeleteReport> {
    let hits = store.oql_query(query)?;
    info!("Query returned {} documents.", hits.len());

    let mut report = DeleteReport::default();
    let mut handled = HashSet::new();
    for hit in hits {
        let hit_id = hit.id().to_owned();
        let chain = match ancestry(store, hit, stop_type) {
            Ok(chain) => chain,
            Err(e) => {
                warn!("Could not resolve links of {}: {}", hit_id, e);
                report.failed.push((hit_id, e.to_string()));
                continue;
            }
        };
        for doc in chain {
            if !handled.insert(doc.id().to_owned()) {
                continue;
            }
            match store.linked_to(doc.id(), "associated_with") {
                Ok(attributes) => {
                    for attribute in attributes.iter().filter(|a| is_attribute(a)) {
                        if handled.insert(attribute.id().to_owned()) {
                            report.delete(store, attribute, dry_run);
                        }
                    }
                }
                Err(e) => warn!("Could not list attributes of {}: {}", doc.id(), e),
            }
            report.delete(store, &doc, dry_run);
        }
    }
    report.log_failures();
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcc::testing::{study_store, MemoryStore};

    /// Stored documents linking to a document that is not stored.
    fn dangling(store: &MemoryStore) -> Vec<String> {
        let docs = store.docs.borrow();
        docs.values()
            .filter(|doc| doc.linkage.values().flatten().any(|target| !docs.contains_key(target)))
            .map(|doc| doc.id().to_owned())
            .collect()
    }

    #[test]
    fn test_dry_run_does_not_mutate() {
        let store = study_store();
        let tree = DocTree::build(&store, "study").unwrap();
        let report = delete_tree(&store, &tree, true, true);
        assert_eq!(report.deleted.len(), tree.len());
        assert_eq!(report.deleted.last().map(|s| s.as_str()), Some("study"));
        assert!(store.deleted.borrow().is_empty());
        assert_eq!(store.docs.borrow().len(), 13);
    }

    #[test]
    fn test_delete_tree_collects_failures() {
        let mut store = study_store();
        store.undeletable.insert("prep1".to_owned());
        let tree = DocTree::build(&store, "study").unwrap();
        let report = delete_tree(&store, &tree, false, true);

        assert_eq!(report.failed.len(), 1);
        assert_eq!(report.failed[0].0, "prep1");
        assert_eq!(report.kept, vec!["sample1", "visit1", "subj1", "study"]);
        assert_eq!(
            report.deleted,
            vec!["subj1_attr", "raw1", "matrix2", "raw2", "prep2", "sample2", "visit2"]
        );
        assert!(store.docs.borrow().contains_key("study"));
        assert!(store.docs.borrow().contains_key("prep1"));
        assert_eq!(dangling(&store), vec!["orphan"]);
    }

    #[test]
    fn test_delete_filtered_tree() {
        let store = study_store();
        let tree = DocTree::build(&store, "study")
            .unwrap()
            .filter_by_types(&["host_seq_prep"]);
        let report = delete_tree(&store, &tree, false, true);

        assert!(report.failed.is_empty());
        assert_eq!(report.deleted, vec!["matrix2", "raw2", "prep2"]);
        assert_eq!(report.kept, vec!["sample2", "visit2", "subj1", "study"]);
        assert!(store.docs.borrow().contains_key("visit1"));
        assert!(store.docs.borrow().contains_key("subj1_attr"));
        assert_eq!(dangling(&store), vec!["orphan"]);
    }

    #[test]
    fn test_delete_from_query() {
        let store = study_store();
        store.insert("sample2_attr", "sample_attr", &[("associated_with", "sample2")]);
        let report =
            delete_from_query(&store, "\"abundance_matrix\"[node_type]", "subject", false).unwrap();
        assert_eq!(
            report.deleted,
            vec!["matrix2", "raw2", "prep2", "sample2_attr", "sample2", "visit2"]
        );
        assert!(report.failed.is_empty());
        assert!(store.docs.borrow().contains_key("subj1"));
        assert!(store.docs.borrow().contains_key("sample1"));
    }
}
