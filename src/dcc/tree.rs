//! The documents below a study as a tree, stored as an arena of nodes
//! addressed by index.
//!
//! The store has no recursive children call, so the tree is built level by
//! level (subjects, visits, samples, preps, sequence sets, products), each
//! level querying the documents linked to the nodes of the level above.
use std::collections::HashMap;

use anyhow::Result;
use log::{info, warn};

use super::{Document, DocumentStore};

/// (level name, index of the parent level, link field pointing at the parent)
/// Level 0 is the study.
const LEVELS: &[(&str, usize, &str)] = &[
    ("study", 0, ""),
    ("subjects", 0, "participates_in"),
    ("subject attributes", 1, "associated_with"),
    ("visits", 1, "by"),
    ("visit attributes", 3, "associated_with"),
    ("samples", 3, "collected_during"),
    ("sample attributes", 5, "associated_with"),
    ("preps", 5, "prepared_from"),
    ("sequence sets", 7, "sequenced_from"),
    ("products", 8, "computed_from"),
    ("derived products", 9, "computed_from"),
];

#[derive(Debug, Clone)]
pub struct DocNode {
    pub doc: Document,
    pub parent: Option<usize>,
    pub children: Vec<usize>,
    /// Only present to connect selected nodes to the root; never deleted.
    pub connecting: bool,
}

impl DocNode {
    pub fn node_type(&self) -> &str {
        &self.doc.node_type
    }
}

#[derive(Debug, Clone)]
pub struct DocTree {
    nodes: Vec<DocNode>,
    index: HashMap<String, usize>,
}

impl DocTree {
    pub fn new(root: Document) -> Self {
        let mut index = HashMap::new();
        index.insert(root.id().to_owned(), 0);
        DocTree {
            nodes: vec![DocNode {
                doc: root,
                parent: None,
                children: Vec::new(),
                connecting: false,
            }],
            index,
        }
    }

    pub const ROOT: usize = 0;

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, idx: usize) -> &DocNode {
        &self.nodes[idx]
    }

    pub fn find(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    /// Adds `doc` below the node with id `parent_id`. Documents whose parent
    /// is not in the tree, or that are already in it, are skipped.
    pub fn attach(&mut self, doc: Document, parent_id: &str) -> Option<usize> {
        if self.index.contains_key(doc.id()) {
            return None;
        }
        let parent = match self.find(parent_id) {
            Some(parent) => parent,
            None => {
                warn!(
                    "Could not find parent node {} for {} {}",
                    parent_id,
                    doc.node_type,
                    doc.id()
                );
                return None;
            }
        };
        let idx = self.nodes.len();
        self.index.insert(doc.id().to_owned(), idx);
        self.nodes[parent].children.push(idx);
        self.nodes.push(DocNode {
            doc,
            parent: Some(parent),
            children: Vec::new(),
            connecting: false,
        });
        Some(idx)
    }

    /// Loads the study and everything filed below it.
    pub fn build<S: DocumentStore>(store: &S, study_id: &str) -> Result<Self> {
        let mut tree = DocTree::new(store.load(study_id)?);
        let mut levels: Vec<Vec<usize>> = vec![vec![DocTree::ROOT]];
        for &(name, parent_level, field) in LEVELS.iter().skip(1) {
            let mut level = Vec::new();
            for &parent in &levels[parent_level] {
                let parent_id = tree.nodes[parent].doc.id().to_owned();
                for doc in store.linked_to(&parent_id, field)? {
                    if let Some(idx) = tree.attach(doc, &parent_id) {
                        level.push(idx);
                    }
                }
            }
            info!("Found {} {}.", level.len(), name);
            levels.push(level);
        }
        Ok(tree)
    }

    /// Children before parents, siblings in insertion order. Iterative so
    /// deep trees cannot overflow the stack.
    pub fn post_order(&self) -> Vec<usize> {
        let mut order = Vec::with_capacity(self.nodes.len());
        if self.nodes.is_empty() {
            return order;
        }
        let mut stack = vec![(DocTree::ROOT, 0)];
        while let Some((idx, next_child)) = stack.pop() {
            let children = &self.nodes[idx].children;
            if next_child < children.len() {
                stack.push((idx, next_child + 1));
                stack.push((children[next_child], 0));
            } else {
                order.push(idx);
            }
        }
        order
    }

    /// The subtree made of the nodes of the given types, their descendants
    /// and the ancestors connecting them to the root. The ancestors are
    /// marked as connecting nodes since their other children are not part
    /// of the subtree.
    pub fn filter_by_types(&self, node_types: &[&str]) -> DocTree {
        let mut selected = vec![false; self.nodes.len()];
        // parents precede their children in the arena
        for (idx, node) in self.nodes.iter().enumerate() {
            selected[idx] = node_types.contains(&node.node_type())
                || node.parent.map_or(false, |p| selected[p]);
        }

        let mut keep = vec![false; self.nodes.len()];
        keep[DocTree::ROOT] = true;
        for idx in (0..self.nodes.len()).filter(|&i| selected[i]) {
            let mut current = Some(idx);
            while let Some(c) = current {
                if keep[c] && c != idx {
                    break;
                }
                keep[c] = true;
                current = self.nodes[c].parent;
            }
        }

        let mut filtered = DocTree::new(self.nodes[DocTree::ROOT].doc.clone());
        for (idx, node) in self.nodes.iter().enumerate().skip(1) {
            if keep[idx] {
                if let Some(parent) = node.parent {
                    if let Some(new) = filtered.attach(node.doc.clone(), self.nodes[parent].doc.id()) {
                        filtered.nodes[new].connecting = !selected[idx];
                    }
                }
            }
        }
        filtered
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcc::testing::study_store;

    fn ids(tree: &DocTree, order: &[usize]) -> Vec<String> {
        order.iter().map(|&i| tree.node(i).doc.id().to_owned()).collect()
    }

    #[test]
    fn test_build() {
        let tree = DocTree::build(&study_store(), "study").unwrap();
        assert_eq!(tree.len(), 12);
        assert!(tree.find("orphan").is_none());
        let raw2 = tree.find("raw2").unwrap();
        assert_eq!(tree.node(raw2).parent, tree.find("prep2"));
    }

    #[test]
    fn test_post_order_children_first() {
        let tree = DocTree::build(&study_store(), "study").unwrap();
        let order = tree.post_order();
        assert_eq!(order.len(), tree.len());
        let position: HashMap<usize, usize> = order.iter().enumerate().map(|(p, &i)| (i, p)).collect();
        for idx in 0..tree.len() {
            if let Some(parent) = tree.node(idx).parent {
                assert!(position[&idx] < position[&parent]);
            }
        }
        assert_eq!(*order.last().unwrap(), DocTree::ROOT);
    }

    #[test]
    fn test_post_order_deep_chain() {
        let mut tree = DocTree::new(Document {
            id: Some("n0".to_owned()),
            ..Document::new("study")
        });
        for i in 1..100_000 {
            let mut doc = Document::new("product");
            doc.id = Some(format!("n{}", i));
            tree.attach(doc, &format!("n{}", i - 1));
        }
        let order = tree.post_order();
        assert_eq!(order.first(), Some(&99_999));
        assert_eq!(order.last(), Some(&0));
    }

    #[test]
    fn test_filter_by_types() {
        let tree = DocTree::build(&study_store(), "study").unwrap();
        let filtered = tree.filter_by_types(&["host_seq_prep"]);
        assert_eq!(
            ids(&filtered, &filtered.post_order()),
            vec!["matrix2", "raw2", "prep2", "sample2", "visit2", "subj1", "study"]
        );
        let connecting: Vec<&str> = (0..filtered.len())
            .filter(|&i| filtered.node(i).connecting)
            .map(|i| filtered.node(i).doc.id())
            .collect();
        assert_eq!(connecting, vec!["subj1", "visit2", "sample2"]);
        assert!(!tree.node(tree.find("subj1").unwrap()).connecting);
    }
}
