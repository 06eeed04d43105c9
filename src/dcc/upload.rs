//! Submit documents to the DCC, skipping the ones whose stored copy is
//! already up to date.
//!
//! ## Usage:
//!
//! ```bash
//! $ hmp2 dcc-upload -u user -p password documents.json
//! ```
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use log::info;

use super::{Document, DocumentStore};

#[derive(Debug, Default, PartialEq)]
pub struct UploadReport {
    pub saved: Vec<String>,
    pub unchanged: Vec<String>,
}

/// Reads a JSON array of documents.
pub fn read_documents<P: AsRef<Path>>(path: P) -> Result<Vec<Document>> {
    let content = fs::read_to_string(&path)
        .with_context(|| format!("could not read {}", path.as_ref().display()))?;
    Ok(serde_json::from_str(&content)?)
}

/// Saves every new or modified document. A failing save aborts the upload.
pub fn upload_documents<S: DocumentStore>(store: &S, documents: &[Document]) -> Result<UploadReport> {
    let mut report = UploadReport::default();
    for doc in documents {
        let mut doc = doc.clone();
        if let Some(id) = &doc.id {
            let stored = store.load(id)?;
            if stored.same_content(&doc) {
                info!("SKIPPING DOCUMENT DUE TO NO CHANGES: {}", id);
                report.unchanged.push(id.clone());
                continue;
            }
            doc.ver = stored.ver;
        }
        info!("Uploading {} {} to DCC", doc.node_type, doc.id());
        let id = store
            .save(&doc)
            .with_context(|| format!("saving {} document to DCC failed", doc.node_type))?;
        report.saved.push(id);
    }
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dcc::testing::study_store;

    #[test]
    fn test_upload_documents() {
        let store = study_store();
        let unchanged = store.load("sample1").unwrap();
        let mut changed = store.load("sample2").unwrap();
        changed.meta["body_site"] = serde_json::json!("feces");
        let mut new = Document::new("sample_attr");
        new.linkage.insert("associated_with".to_owned(), vec!["sample1".to_owned()]);

        let report = upload_documents(&store, &[unchanged, changed, new]).unwrap();
        assert_eq!(report.unchanged, vec!["sample1"]);
        assert_eq!(report.saved, vec!["sample2", "new1"]);
        assert_eq!(store.load("sample2").unwrap().meta["body_site"], "feces");
        assert_eq!(store.linked_to("sample1", "associated_with").unwrap().len(), 1);
    }
}
