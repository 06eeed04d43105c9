//! Documents in the iHMP Data Coordination Center (DCC) object store (OSDF)
//! and the operations the submission tools need on them.
//!
//! Documents are typed by `node_type` and point at their parent through
//! `linkage` fields, e.g. a sample is `collected_during` a visit.
pub mod delete;
pub mod osdf;
pub mod tree;
pub mod upload;

use std::collections::BTreeMap;

use anyhow::Result;
use serde::{Deserialize, Serialize};

pub const DEFAULT_SERVER: &str = "http://osdf.ihmpdcc.org:8123";
pub const DEFAULT_NAMESPACE: &str = "ihmp";

/// Link fields pointing at a parent document, most specific first.
const PARENT_LINKS: &[&str] = &[
    "computed_from",
    "sequenced_from",
    "prepared_from",
    "collected_during",
    "by",
    "associated_with",
    "participates_in",
    "subset_of",
    "part_of",
];

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct Acl {
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
}

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ver: Option<u64>,
    #[serde(default = "default_namespace")]
    pub ns: String,
    pub node_type: String,
    #[serde(default)]
    pub linkage: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    pub meta: serde_json::Value,
    #[serde(default)]
    pub acl: Acl,
}

fn default_namespace() -> String {
    DEFAULT_NAMESPACE.to_owned()
}

impl Document {
    pub fn new(node_type: &str) -> Self {
        Document {
            id: None,
            ver: None,
            ns: default_namespace(),
            node_type: node_type.to_owned(),
            linkage: BTreeMap::new(),
            meta: serde_json::Value::Object(Default::default()),
            acl: Acl::default(),
        }
    }

    pub fn id(&self) -> &str {
        self.id.as_deref().unwrap_or("")
    }

    pub fn link(&self, field: &str) -> Option<&str> {
        self.linkage
            .get(field)
            .and_then(|ids| ids.first())
            .map(|id| id.as_str())
    }

    /// The single parent a document is filed under. Documents are assumed
    /// to have one parent; the most specific link wins.
    pub fn parent_id(&self) -> Option<&str> {
        PARENT_LINKS
            .iter()
            .find_map(|field| self.link(field))
            .or_else(|| self.linkage.values().flatten().next().map(|id| id.as_str()))
    }

    /// Same content, ignoring the server assigned id and version.
    pub fn same_content(&self, other: &Document) -> bool {
        self.ns == other.ns
            && self.node_type == other.node_type
            && self.linkage == other.linkage
            && self.meta == other.meta
            && self.acl == other.acl
    }
}

/// The OQL query selecting documents linked to `id` through `field`.
pub fn linkage_query(id: &str, field: &str) -> String {
    format!("\"{}\"[linkage.{}]", id, field)
}

/// Access to the document store. Implemented over HTTP by
/// [`osdf::OsdfClient`].
pub trait DocumentStore {
    fn load(&self, id: &str) -> Result<Document>;

    /// All documents matching an OQL query, across result pages.
    fn oql_query(&self, query: &str) -> Result<Vec<Document>>;

    /// Documents linking to `id` through the link `field`.
    fn linked_to(&self, id: &str, field: &str) -> Result<Vec<Document>> {
        self.oql_query(&linkage_query(id, field))
    }

    /// Creates or updates a document and returns its id.
    fn save(&self, doc: &Document) -> Result<String>;

    fn delete(&self, doc: &Document) -> Result<()>;
}

#[cfg(test)]
pub(crate) mod testing {
    use std::cell::RefCell;
    use std::collections::{BTreeMap, HashSet};

    use anyhow::{anyhow, bail, Result};
    use regex::Regex;

    use super::{Document, DocumentStore};

    /// In-memory store understanding `"<value>"[<field>]` queries on
    /// `node_type` and `linkage.<field>`.
    #[derive(Default)]
    pub struct MemoryStore {
        pub docs: RefCell<BTreeMap<String, Document>>,
        pub undeletable: HashSet<String>,
        pub deleted: RefCell<Vec<String>>,
        next_id: RefCell<usize>,
    }

    impl MemoryStore {
        pub fn insert(&self, id: &str, node_type: &str, links: &[(&str, &str)]) {
            let mut doc = Document::new(node_type);
            doc.id = Some(id.to_owned());
            doc.ver = Some(1);
            for (field, target) in links {
                doc.linkage
                    .entry(field.to_string())
                    .or_default()
                    .push(target.to_string());
            }
            self.docs.borrow_mut().insert(id.to_owned(), doc);
        }
    }

    /// A study with one subject, two visits and a host transcriptomics
    /// branch ending in an abundance matrix.
    pub fn study_store() -> MemoryStore {
        let store = MemoryStore::default();
        store.insert("study", "study", &[]);
        store.insert("subj1", "subject", &[("participates_in", "study")]);
        store.insert("subj1_attr", "subject_attr", &[("associated_with", "subj1")]);
        store.insert("visit1", "visit", &[("by", "subj1")]);
        store.insert("visit2", "visit", &[("by", "subj1")]);
        store.insert("sample1", "sample", &[("collected_during", "visit1")]);
        store.insert("sample2", "sample", &[("collected_during", "visit2")]);
        store.insert("prep1", "wgs_dna_prep", &[("prepared_from", "sample1")]);
        store.insert("prep2", "host_seq_prep", &[("prepared_from", "sample2")]);
        store.insert("raw1", "wgs_raw_seq_set", &[("sequenced_from", "prep1")]);
        store.insert("raw2", "host_transcriptomics_raw_seq_set", &[("sequenced_from", "prep2")]);
        store.insert("matrix2", "abundance_matrix", &[("computed_from", "raw2")]);
        store.insert("orphan", "sample", &[("collected_during", "nowhere")]);
        store
    }

    impl DocumentStore for MemoryStore {
        fn load(&self, id: &str) -> Result<Document> {
            self.docs
                .borrow()
                .get(id)
                .cloned()
                .ok_or_else(|| anyhow!("no document {}", id))
        }

        fn oql_query(&self, query: &str) -> Result<Vec<Document>> {
            let re = Regex::new(r#"^"([^"]*)"\[([^\]]+)\]$"#)?;
            let caps = re
                .captures(query)
                .ok_or_else(|| anyhow!("unsupported query {}", query))?;
            let (value, field) = (&caps[1], &caps[2]);
            Ok(self
                .docs
                .borrow()
                .values()
                .filter(|doc| match field.strip_prefix("linkage.") {
                    Some(link) => doc
                        .linkage
                        .get(link)
                        .map_or(false, |ids| ids.iter().any(|id| id == value)),
                    None => field == "node_type" && doc.node_type == value,
                })
                .cloned()
                .collect())
        }

        fn save(&self, doc: &Document) -> Result<String> {
            let id = match &doc.id {
                Some(id) => id.clone(),
                None => {
                    *self.next_id.borrow_mut() += 1;
                    format!("new{}", self.next_id.borrow())
                }
            };
            let mut stored = doc.clone();
            stored.id = Some(id.clone());
            self.docs.borrow_mut().insert(id.clone(), stored);
            Ok(id)
        }

        fn delete(&self, doc: &Document) -> Result<()> {
            if self.undeletable.contains(doc.id()) {
                bail!("document {} is locked", doc.id());
            }
            self.docs.borrow_mut().remove(doc.id());
            self.deleted.borrow_mut().push(doc.id().to_owned());
            Ok(())
        }
    }
}
