//! In-text citation syntax.
//!
//! A citation is a bracketed reference whose label is one or more `@key`
//! items separated by semicolons: `[@smith2020]`, `[@smith2020; @doe2021]`.
//! pulldown-cmark reports such brackets as broken reference links; the
//! renderer claims them through the broken-link callback.

use std::fmt;
use std::path::PathBuf;

/// URL scheme given to citation links so the renderer can recognise them.
pub(crate) const CITE_SCHEME: &str = "cite:";

/// Extract citation keys from a bracket label.
///
/// Returns `None` unless every `;`-separated item is `@key`.
///
/// ```
/// use technote_renderer::citation_keys;
///
/// assert_eq!(citation_keys("@a; @b"), Some(vec!["a".to_owned(), "b".to_owned()]));
/// assert_eq!(citation_keys("not a citation"), None);
/// ```
#[must_use]
pub fn citation_keys(label: &str) -> Option<Vec<String>> {
    let keys: Option<Vec<String>> = label
        .split(';')
        .map(|item| {
            let key = item.trim().strip_prefix('@')?;
            is_valid_key(key).then(|| key.to_owned())
        })
        .collect();
    keys.filter(|k| !k.is_empty())
}

/// BibTeX keys: anything printable without whitespace, commas or braces.
fn is_valid_key(key: &str) -> bool {
    !key.is_empty()
        && key.chars().all(|c| {
            !c.is_whitespace()
                && !c.is_control()
                && !matches!(c, ',' | '{' | '}' | '@' | '[' | ']')
        })
}

/// A citation key that could not be resolved to exactly one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CitationProblem {
    /// No entry carries the key.
    Missing { key: String },
    /// Several entries carry the key.
    Ambiguous { key: String, files: Vec<PathBuf> },
}

impl CitationProblem {
    /// The offending key as written in the document.
    #[must_use]
    pub fn key(&self) -> &str {
        match self {
            Self::Missing { key } | Self::Ambiguous { key, .. } => key,
        }
    }
}

impl fmt::Display for CitationProblem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Missing { key } => {
                write!(f, "citation key '{key}' not found in bibliography")
            }
            Self::Ambiguous { key, files } => {
                let files: Vec<String> = files.iter().map(|p| p.display().to_string()).collect();
                write!(
                    f,
                    "citation key '{key}' is defined more than once ({})",
                    files.join(", ")
                )
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_key() {
        assert_eq!(citation_keys("@smith2020"), Some(vec!["smith2020".to_owned()]));
    }

    #[test]
    fn test_multiple_keys_with_spacing() {
        assert_eq!(
            citation_keys(" @LDM-151 ;@2009arXiv0912.0201L "),
            Some(vec!["LDM-151".to_owned(), "2009arXiv0912.0201L".to_owned()])
        );
    }

    #[test]
    fn test_rejects_non_citations() {
        assert_eq!(citation_keys("link text"), None);
        assert_eq!(citation_keys("@"), None);
        assert_eq!(citation_keys("@a; b"), None);
        assert_eq!(citation_keys("@two words"), None);
        assert_eq!(citation_keys(""), None);
    }

    #[test]
    fn test_problem_display() {
        let missing = CitationProblem::Missing {
            key: "smith2020".to_owned(),
        };
        assert_eq!(
            missing.to_string(),
            "citation key 'smith2020' not found in bibliography"
        );

        let ambiguous = CitationProblem::Ambiguous {
            key: "dup".to_owned(),
            files: vec![PathBuf::from("a.bib"), PathBuf::from("b.bib")],
        };
        assert_eq!(
            ambiguous.to_string(),
            "citation key 'dup' is defined more than once (a.bib, b.bib)"
        );
    }
}
