//! Cross-document consistency checks.

use std::collections::{HashMap, HashSet};

use technote_renderer::{LinkTarget, REFERENCES_ID, classify_link, reference_anchor};

use crate::document::Document;
use crate::error::DocumentProblem;

/// Citation problems of every document, in document order.
pub(crate) fn citation_problems(documents: &[Document]) -> Vec<DocumentProblem> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.citation_problems.iter().map(|problem| DocumentProblem {
                document: doc.path.clone(),
                message: problem.to_string(),
            })
        })
        .collect()
}

/// Code block includes that could not be read, in document order.
pub(crate) fn include_problems(documents: &[Document]) -> Vec<DocumentProblem> {
    documents
        .iter()
        .flat_map(|doc| {
            doc.include_problems.iter().map(|problem| DocumentProblem {
                document: doc.path.clone(),
                message: problem.to_string(),
            })
        })
        .collect()
}

/// Links to documents or anchors that do not exist.
pub(crate) fn link_problems(documents: &[Document]) -> Vec<DocumentProblem> {
    let anchors: HashMap<&str, HashSet<String>> = documents
        .iter()
        .map(|doc| (doc.path.as_str(), anchor_set(doc)))
        .collect();

    let mut problems = Vec::new();
    for doc in documents {
        for link in &doc.links {
            let message = match classify_link(link, doc.base_dir()) {
                LinkTarget::External | LinkTarget::Asset => None,
                LinkTarget::Fragment(fragment) => {
                    let own = anchors.get(doc.path.as_str());
                    (!fragment.is_empty() && !own.is_some_and(|a| a.contains(fragment)))
                        .then(|| format!("link to missing anchor '{link}'"))
                }
                LinkTarget::Document { path, fragment } => match anchors.get(path.as_str()) {
                    None => Some(format!("link to missing document '{link}'")),
                    Some(target) => fragment
                        .filter(|f| !f.is_empty() && !target.contains(*f))
                        .map(|_| format!("link to missing anchor '{link}'")),
                },
            };
            if let Some(message) = message {
                problems.push(DocumentProblem {
                    document: doc.path.clone(),
                    message,
                });
            }
        }
    }
    problems
}

/// Every anchor a page will carry: headings plus its reference list.
fn anchor_set(doc: &Document) -> HashSet<String> {
    let mut anchors: HashSet<String> = doc.anchors.iter().cloned().collect();
    if !doc.references.is_empty() {
        anchors.insert(REFERENCES_ID.to_owned());
        anchors.extend(doc.references.iter().map(|e| reference_anchor(&e.key)));
    }
    anchors
}
